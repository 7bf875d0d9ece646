/*!
 * Speech synthesis backends.
 *
 * This module contains client implementations for the services that turn a
 * cue's text into spoken audio:
 * - Edge: the `edge-tts` command line tool
 * - OpenAI: an OpenAI-compatible `/audio/speech` endpoint
 * - Mock: deterministic in-process backend for tests and benchmarks
 *
 * Backends offer no backpressure of their own; callers are expected to bound
 * the number of concurrent `synthesize` calls.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use crate::app_config::{SpeechProvider, SynthesisConfig};
use crate::errors::ProviderError;

/// One synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// Opaque voice identifier
    pub voice: String,
    /// Rate modifier such as "+10%"
    pub rate: String,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>, rate: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            rate: rate.into(),
        }
    }
}

/// Common trait for all speech synthesis backends
///
/// This trait defines the interface that all backends must follow, allowing
/// them to be used interchangeably by the synthesis dispatcher.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Human readable backend name
    fn name(&self) -> &str;

    /// File extension of the artifacts this backend writes
    fn artifact_extension(&self) -> &str;

    /// Synthesize `request` and write the encoded audio to `output_path`
    ///
    /// # Arguments
    /// * `request` - The text, voice and rate to synthesize
    /// * `output_path` - Where the encoded audio artifact is written
    ///
    /// # Returns
    /// * `Result<(), ProviderError>` - Ok once the artifact exists, or an error
    async fn synthesize(&self, request: &SpeechRequest, output_path: &Path) -> Result<(), ProviderError>;
}

/// Build the backend selected in the configuration
pub fn build_provider(config: &SynthesisConfig) -> anyhow::Result<Arc<dyn Provider>> {
    let provider: Arc<dyn Provider> = match config.provider {
        SpeechProvider::Edge => Arc::new(edge::EdgeTts::new(
            config.get_command(),
            config.get_timeout_secs(),
        )),
        SpeechProvider::OpenAI => Arc::new(openai::OpenAISpeech::new(
            config.get_endpoint(),
            config.get_api_key(),
            config.get_model(),
            config.get_timeout_secs(),
            config.retry_count,
            config.retry_backoff_ms,
        )?),
    };
    Ok(provider)
}

pub mod edge;
pub mod mock;
pub mod openai;
