use log::{debug, error};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::MergeConfig;
use crate::errors::{DubError, JobStage};

// @module: ffmpeg/ffprobe adapter for probing, decoding, extracting and merging

/// Timeout for short ffmpeg/ffprobe invocations
const SHORT_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs the external media tools
#[derive(Debug, Clone)]
pub struct MediaTool {
    /// ffmpeg executable
    ffmpeg: String,
    /// ffprobe executable
    ffprobe: String,
}

impl Default for MediaTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl MediaTool {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Fail fast when ffmpeg cannot be run at all
    pub async fn check_available(&self) -> Result<(), DubError> {
        let output = run_tool(&self.ffmpeg, &["-version".to_string()], Some(Duration::from_secs(10)))
            .await
            .map_err(|e| DubError::FatalInput(format!("{} is not available: {}", self.ffmpeg, e)))?;
        if !output.status.success() {
            return Err(DubError::FatalInput(format!("{} is not working", self.ffmpeg)));
        }
        Ok(())
    }

    /// Total duration of a media file in seconds
    pub async fn probe_duration(&self, media: &Path) -> Result<f64, DubError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            media.to_string_lossy().to_string(),
        ];
        let output = run_tool(&self.ffprobe, &args, Some(SHORT_TIMEOUT))
            .await
            .map_err(DubError::DurationProbe)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::DurationProbe(filter_ffmpeg_stderr(&stderr)));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    /// Convert any audio file to mono WAV at `sample_rate`
    pub async fn decode_to_wav(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<(), String> {
        let args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            sample_rate.to_string(),
            output.to_string_lossy().to_string(),
        ];
        let result = run_tool(&self.ffmpeg, &args, Some(SHORT_TIMEOUT)).await?;
        if !result.status.success() {
            return Err(filter_ffmpeg_stderr(&String::from_utf8_lossy(&result.stderr)));
        }
        Ok(())
    }

    /// Extract the first subtitle stream of a video to an SRT file
    pub async fn extract_subtitles(&self, video: &Path, output: &Path) -> Result<(), DubError> {
        let args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:s:0".to_string(),
            output.to_string_lossy().to_string(),
        ];
        let result = run_tool(&self.ffmpeg, &args, Some(SHORT_TIMEOUT))
            .await
            .map_err(|e| DubError::FatalInput(e))?;
        if !result.status.success() {
            let filtered = filter_ffmpeg_stderr(&String::from_utf8_lossy(&result.stderr));
            error!("Subtitle extraction failed: {}", filtered);
            return Err(DubError::FatalInput(format!(
                "failed to extract subtitles from {:?}: {}",
                video, filtered
            )));
        }
        Ok(())
    }

    /// Merge the mixed dub into the video, keeping the original audio as a
    /// ducked background.
    ///
    /// The merge writes to a partial file next to `output` and renames it on
    /// success, so a failed or interrupted merge leaves no output behind.
    pub async fn merge_dub(
        &self,
        video: &Path,
        mixed_audio: &Path,
        output: &Path,
        ducking: f32,
        config: &MergeConfig,
    ) -> Result<(), DubError> {
        let partial = PartialOutput::new(output);
        let args = merge_args(video, mixed_audio, partial.path(), ducking, config);

        let result = run_tool(&self.ffmpeg, &args, None)
            .await
            .map_err(|e| DubError::stage(JobStage::Merge, e))?;
        if !result.status.success() {
            let filtered = filter_ffmpeg_stderr(&String::from_utf8_lossy(&result.stderr));
            return Err(DubError::stage(JobStage::Merge, filtered));
        }

        partial
            .commit()
            .map_err(|e| DubError::stage(JobStage::Merge, format!("failed to move output into place: {}", e)))
    }
}

/// ffmpeg arguments for the final merge
pub fn merge_args(
    video: &Path,
    mixed_audio: &Path,
    output: &Path,
    ducking: f32,
    config: &MergeConfig,
) -> Vec<String> {
    let filter = format!(
        "[0:a:0]aresample=async=1,volume={}[bg];\
         [1:a:0]pan=stereo|c0=c0|c1=c0,volume=1.0[fg];\
         [bg][fg]amix=inputs=2:duration=first[aout]",
        ducking
    );

    [
        "-y",
        "-i",
        &video.to_string_lossy(),
        "-i",
        &mixed_audio.to_string_lossy(),
        "-filter_complex",
        &filter,
        "-map",
        "0:v:0",
        "-map",
        "[aout]",
        "-map",
        "0:s?",
        "-c:v",
        "copy",
        "-c:a",
        &config.audio_codec,
        "-b:a",
        &config.audio_bitrate,
        "-c:s",
        "copy",
        "-disposition:a:0",
        "default",
        "-metadata:s:a:0",
        &format!("language={}", config.track_language),
        "-metadata:s:a:0",
        &format!("title={}", config.track_title),
        "-shortest",
        &output.to_string_lossy(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Parse ffprobe's bare `format=duration` output
pub fn parse_duration(stdout: &str) -> Result<f64, DubError> {
    let trimmed = stdout.trim();
    let duration: f64 = trimmed
        .parse()
        .map_err(|_| DubError::DurationProbe(format!("unexpected ffprobe output: '{}'", trimmed)))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(DubError::DurationProbe(format!("invalid duration: {}", duration)));
    }
    Ok(duration)
}

/// Run a tool to completion, killing it if the future is dropped or times out
async fn run_tool(program: &str, args: &[String], timeout: Option<Duration>) -> Result<Output, String> {
    debug!("Running {} {}", program, args.join(" "));
    let child = Command::new(program).args(args).kill_on_drop(true).output();

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, child)
            .await
            .map_err(|_| format!("{} timed out after {} seconds", program, limit.as_secs()))?,
        None => child.await,
    };

    result.map_err(|e| format!("failed to execute {}: {}", program, e))
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}

/// Output file that is written under a temporary name and only appears at its
/// final path once committed
struct PartialOutput {
    partial: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartialOutput {
    fn new(target: &Path) -> Self {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let extension = target
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mkv".to_string());
        let partial = target.with_file_name(format!("{}.partial.{}", stem, extension));
        Self {
            partial,
            target: target.to_path_buf(),
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.partial
    }

    fn commit(mut self) -> std::io::Result<()> {
        std::fs::rename(&self.partial, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed && self.partial.exists() {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}
