/*!
 * # sub2dub - subtitle-driven voice dubbing
 *
 * A Rust library that turns a video's subtitles into a synthesized voice
 * track and merges it back over the original audio.
 *
 * ## Features
 *
 * - Concurrent speech synthesis with a bounded number of requests in flight
 * - Sample-accurate placement of every clip on a growable timeline
 * - Overlapping lines are summed, then the whole track is peak-normalized
 * - Speech backends:
 *   - edge-tts command line tool
 *   - OpenAI-compatible speech endpoint
 * - Subtitle extraction, tag cleaning and batch processing of directories
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: SRT parsing and cleaning
 * - `dubbing`: The audio assembly engine:
 *   - `dubbing::cue`: Cue model and timing
 *   - `dubbing::dispatcher`: Bounded concurrent synthesis
 *   - `dubbing::mixer`: Master track and clip placement
 *   - `dubbing::limiter`: Peak normalization
 *   - `dubbing::export`: Clip decoding and WAV export
 * - `media`: ffmpeg/ffprobe adapter
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `providers`: Speech synthesis backends
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod file_utils;
pub mod subtitle_processor;
pub mod dubbing;
pub mod media;
pub mod app_controller;
pub mod providers;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use subtitle_processor::{SubtitleCollection, SubtitleEntry};
pub use dubbing::{Cue, DubEngine, MasterTrack};
pub use errors::{DubError, JobStage, ProviderError, SubtitleError};
