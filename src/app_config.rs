use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::default::Default;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.

// @const: Speech rate modifier, e.g. "+0%", "-15%"
static RATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]\d{1,3}%$").unwrap()
});

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Voice identifier passed through to the synthesis backend
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Speech rate modifier ("+10%", "-5%")
    #[serde(default = "default_rate")]
    pub rate: String,

    /// Volume of the original audio under the dub (0.0 to 1.0)
    #[serde(default = "default_ducking")]
    pub ducking: f32,

    /// Speech synthesis config
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Timeline mixing config
    #[serde(default)]
    pub mixing: MixingConfig,

    /// Final merge config
    #[serde(default)]
    pub merge: MergeConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech synthesis backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    // @provider: edge-tts command line tool
    #[default]
    Edge,
    // @provider: OpenAI-compatible /audio/speech endpoint
    OpenAI,
}

impl SpeechProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Edge => "Edge TTS",
            Self::OpenAI => "OpenAI",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Edge => "edge".to_string(),
            Self::OpenAI => "openai".to_string(),
        }
    }
}

impl std::fmt::Display for SpeechProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for SpeechProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "edge" | "edge-tts" => Ok(Self::Edge),
            "openai" => Ok(Self::OpenAI),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name (HTTP backends)
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Executable (command backends)
    #[serde(default = "String::new")]
    pub command: String,

    // @field: Timeout seconds per synthesis call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: SpeechProvider) -> Self {
        match provider_type {
            SpeechProvider::Edge => Self {
                provider_type: "edge".to_string(),
                model: String::new(),
                api_key: String::new(),
                endpoint: String::new(),
                command: default_edge_command(),
                timeout_secs: default_timeout_secs(),
            },
            SpeechProvider::OpenAI => Self {
                provider_type: "openai".to_string(),
                model: default_openai_model(),
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                command: String::new(),
                timeout_secs: default_timeout_secs(),
            },
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// Synthesis backend to use
    #[serde(default)]
    pub provider: SpeechProvider,

    /// Available synthesis backends
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Maximum number of synthesis requests in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Retry count for failed HTTP requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff for retries (in milliseconds, doubled on each retry)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: SpeechProvider::default(),
            available_providers: vec![
                ProviderConfig::new(SpeechProvider::Edge),
                ProviderConfig::new(SpeechProvider::OpenAI),
            ],
            concurrent_requests: default_concurrent_requests(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl SynthesisConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &SpeechProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        match self.get_active_provider_config() {
            Some(provider_config) if !provider_config.model.is_empty() => provider_config.model.clone(),
            _ => match self.provider {
                SpeechProvider::Edge => String::new(),
                SpeechProvider::OpenAI => default_openai_model(),
            },
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        match self.get_active_provider_config() {
            Some(provider_config) if !provider_config.endpoint.is_empty() => provider_config.endpoint.clone(),
            _ => match self.provider {
                SpeechProvider::Edge => String::new(),
                SpeechProvider::OpenAI => default_openai_endpoint(),
            },
        }
    }

    /// Get the executable for command backends
    pub fn get_command(&self) -> String {
        match self.get_active_provider_config() {
            Some(provider_config) if !provider_config.command.is_empty() => provider_config.command.clone(),
            _ => default_edge_command(),
        }
    }

    /// Get the per-call timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(default_timeout_secs)
    }
}

/// Timeline mixing configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MixingConfig {
    /// Sample rate used for every decode, the master track and the export
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Silence appended after the last cue when the media duration is unknown
    #[serde(default = "default_trailing_margin_ms")]
    pub trailing_margin_ms: u64,
}

impl Default for MixingConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            trailing_margin_ms: default_trailing_margin_ms(),
        }
    }
}

/// Final audio/video merge configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MergeConfig {
    /// Audio codec of the merged track
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate of the merged track
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Language tag written on the dub track
    #[serde(default = "default_track_language")]
    pub track_language: String,

    /// Title written on the dub track
    #[serde(default = "default_track_title")]
    pub track_title: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            track_language: default_track_language(),
            track_title: default_track_title(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_voice() -> String {
    "en-US-ChristopherNeural".to_string()
}

fn default_rate() -> String {
    "+0%".to_string()
}

fn default_ducking() -> f32 {
    0.20
}

fn default_concurrent_requests() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_trailing_margin_ms() -> u64 {
    10_000
}

fn default_edge_command() -> String {
    "edge-tts".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "tts-1".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_track_language() -> String {
    "eng".to_string()
}

fn default_track_title() -> String {
    "AI English Dub".to_string()
}

/// Check a speech rate modifier such as "+10%"
pub fn is_valid_rate(rate: &str) -> bool {
    RATE_REGEX.is_match(rate)
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.voice.trim().is_empty() {
            return Err(anyhow!("Voice identifier must not be empty"));
        }

        if !is_valid_rate(&self.rate) {
            return Err(anyhow!(
                "Invalid speech rate '{}': expected a signed percentage such as +10% or -5%",
                self.rate
            ));
        }

        if !(0.0..=1.0).contains(&self.ducking) {
            return Err(anyhow!("Ducking must be between 0.0 and 1.0, got {}", self.ducking));
        }

        if self.synthesis.concurrent_requests == 0 {
            return Err(anyhow!("concurrent_requests must be at least 1"));
        }

        if self.mixing.sample_rate == 0 {
            return Err(anyhow!("sample_rate must be greater than zero"));
        }

        if self.synthesis.provider == SpeechProvider::OpenAI {
            if self.synthesis.get_api_key().is_empty() {
                return Err(anyhow!("API key is required for the OpenAI provider"));
            }
            let endpoint = self.synthesis.get_endpoint();
            url::Url::parse(&endpoint)
                .map_err(|e| anyhow!("Invalid endpoint URL '{}': {}", endpoint, e))?;
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            voice: default_voice(),
            rate: default_rate(),
            ducking: default_ducking(),
            synthesis: SynthesisConfig::default(),
            mixing: MixingConfig::default(),
            merge: MergeConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
