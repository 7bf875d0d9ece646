use async_trait::async_trait;
use log::debug;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::ProviderError;
use crate::providers::{Provider, SpeechRequest};

/// Client for the `edge-tts` command line tool
#[derive(Debug, Clone)]
pub struct EdgeTts {
    /// Executable to run
    command: String,
    /// Per-call timeout
    timeout: Duration,
}

impl EdgeTts {
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Arguments for one synthesis call.
    ///
    /// Values are attached with `=` so text or rates starting with `-` are not
    /// mistaken for options.
    pub fn build_args(request: &SpeechRequest, output_path: &Path) -> Vec<String> {
        vec![
            format!("--voice={}", request.voice),
            format!("--rate={}", request.rate),
            format!("--text={}", request.text),
            "--write-media".to_string(),
            output_path.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Provider for EdgeTts {
    fn name(&self) -> &str {
        "edge-tts"
    }

    fn artifact_extension(&self) -> &str {
        "mp3"
    }

    async fn synthesize(&self, request: &SpeechRequest, output_path: &Path) -> Result<(), ProviderError> {
        debug!("edge-tts: '{}' -> {:?}", request.text, output_path);

        let child = Command::new(&self.command)
            .args(Self::build_args(request, output_path))
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| ProviderError::CommandFailed(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(ProviderError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.command, output.status, last_line.trim()
            )));
        }

        let written = tokio::fs::metadata(output_path).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(ProviderError::EmptyAudio);
        }

        Ok(())
    }
}
