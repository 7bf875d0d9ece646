/*!
 * Error types for the sub2dub application.
 *
 * This module contains custom error types for the different parts of a dub job,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::fmt;
use thiserror::Error;

/// Errors that can occur when talking to a speech synthesis backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The synthesis command could not be started or exited unsuccessfully
    #[error("Synthesis command failed: {0}")]
    CommandFailed(String),

    /// The synthesis call did not finish in time
    #[error("Synthesis timed out after {0} seconds")]
    Timeout(u64),

    /// The backend reported success but produced no audio
    #[error("Synthesis produced no audio")]
    EmptyAudio,

    /// Writing the synthesized artifact failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProviderError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Stage of a dub job that failed after synthesis started.
///
/// Problems found before synthesis are `DubError::FatalInput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    /// Writing the mixed track
    Export,
    /// Final audio/video merge
    Merge,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Export => "export",
            Self::Merge => "merge",
        };
        write!(f, "{}", name)
    }
}

/// Errors raised by the audio assembly engine and the media adapter
#[derive(Error, Debug)]
pub enum DubError {
    /// A single cue could not be converted to audio
    #[error("Synthesis failed for cue {cue_index} ('{text}'): {source}")]
    Synthesis {
        /// Index of the failed cue
        cue_index: usize,
        /// Text that was being synthesized
        text: String,
        /// Underlying provider error
        #[source]
        source: ProviderError,
    },

    /// A synthesized artifact could not be converted to raw samples
    #[error("Decode failed for cue {cue_index}: {message}")]
    Decode {
        /// Index of the failed cue
        cue_index: usize,
        /// What went wrong
        message: String,
    },

    /// The media duration could not be determined
    #[error("Duration probe failed: {0}")]
    DurationProbe(String),

    /// Input is unusable; the job aborts before synthesis
    #[error("Invalid input: {0}")]
    FatalInput(String),

    /// A job-level stage failed
    #[error("{stage} stage failed: {message}")]
    Stage {
        /// Stage that failed
        stage: JobStage,
        /// What went wrong
        message: String,
    },
}

impl DubError {
    /// Build a stage failure
    pub fn stage(stage: JobStage, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
        }
    }

    /// Whether this error only affects a single cue
    pub fn is_per_cue(&self) -> bool {
        matches!(self, Self::Synthesis { .. } | Self::Decode { .. })
    }
}

/// Errors that can occur while reading or cleaning subtitles
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// No usable cue was found in the input
    #[error("No subtitle entries found in {0}")]
    Empty(String),
}
