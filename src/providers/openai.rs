use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{Provider, SpeechRequest};

/// Speed range accepted by the speech endpoint
const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

/// Client for an OpenAI-compatible text-to-speech endpoint
#[derive(Debug)]
pub struct OpenAISpeech {
    /// Base URL, e.g. `https://api.openai.com/v1`
    endpoint: String,
    /// API key sent as a bearer token
    api_key: String,
    /// TTS model name
    model: String,
    /// HTTP client for making requests
    client: Client,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Request body for `POST {endpoint}/audio/speech`
#[derive(Debug, Serialize)]
pub struct SpeechBody<'a> {
    pub model: &'a str,
    pub input: &'a str,
    pub voice: &'a str,
    pub speed: f32,
    pub response_format: &'a str,
}

impl OpenAISpeech {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.endpoint)
    }

    /// Exponential backoff with up to 25% jitter
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_base_ms.saturating_mul(1u64 << attempt.min(10));
        let jitter = if base >= 4 {
            rand::rng().random_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }

    fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

/// Map a rate modifier such as "+25%" to a speed multiplier
pub fn rate_to_speed(rate: &str) -> f32 {
    let percent = rate
        .trim()
        .trim_end_matches('%')
        .parse::<f32>()
        .unwrap_or(0.0);
    (1.0 + percent / 100.0).clamp(MIN_SPEED, MAX_SPEED)
}

/// Write a response body to `output_path`, refusing empty audio
pub async fn save_audio(audio: Bytes, output_path: &Path) -> Result<usize, ProviderError> {
    if audio.is_empty() {
        return Err(ProviderError::EmptyAudio);
    }
    tokio::fs::write(output_path, &audio).await?;
    Ok(audio.len())
}

#[async_trait]
impl Provider for OpenAISpeech {
    fn name(&self) -> &str {
        "openai"
    }

    fn artifact_extension(&self) -> &str {
        "mp3"
    }

    async fn synthesize(&self, request: &SpeechRequest, output_path: &Path) -> Result<(), ProviderError> {
        let url = self.speech_url();
        let body = SpeechBody {
            model: &self.model,
            input: &request.text,
            voice: &request.voice,
            speed: rate_to_speed(&request.rate),
            response_format: "mp3",
        };

        let mut attempt = 0;
        loop {
            let response_result = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            let error = match response_result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let audio = response
                            .bytes()
                            .await
                            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
                        let written = save_audio(audio, output_path).await?;
                        debug!("Received {} bytes of audio for '{}'", written, request.text);
                        return Ok(());
                    }

                    let message = response.text().await.unwrap_or_default();
                    let error = ProviderError::ApiError {
                        status_code: status.as_u16(),
                        message,
                    };
                    if !Self::is_retryable(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_timeout() || e.is_connect() => ProviderError::ConnectionError(e.to_string()),
                Err(e) => return Err(ProviderError::RequestFailed(e.to_string())),
            };

            if attempt >= self.max_retries {
                return Err(error);
            }

            let delay = self.backoff_delay(attempt);
            warn!(
                "Speech request failed ({}), retrying in {}ms ({}/{})",
                error,
                delay.as_millis(),
                attempt + 1,
                self.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
