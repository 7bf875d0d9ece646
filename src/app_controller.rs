use anyhow::{Result, Context, anyhow};
use log::{error, warn, info, debug};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use indicatif::{ProgressBar, ProgressStyle, MultiProgress};

use crate::app_config::Config;
use crate::dubbing::cue::{Cue, cues_from_entries};
use crate::dubbing::export::{self, ClipDecoder, FfmpegDecoder};
use crate::dubbing::{AssembledTrack, DubEngine};
use crate::errors::{DubError, JobStage};
use crate::file_utils::FileManager;
use crate::media::MediaTool;
use crate::providers::{self, Provider};
use crate::subtitle_processor::{self, SubtitleCollection};

// @module: Application controller for dub jobs

/// File failed cues are appended to, next to the job output
pub const ISSUES_LOG_FILE: &str = "sub2dub.issues.log";

/// Name of the mixed track inside the job's temporary directory
const MIXED_TRACK_FILE: &str = "full_dub.wav";

/// Outcome of one dub job
#[derive(Debug, Clone, PartialEq)]
pub struct DubSummary {
    /// Cues read from the subtitle file
    pub cues: usize,
    /// Cues whose audio is on the track
    pub synthesized: usize,
    /// Cues without text
    pub skipped: usize,
    /// Cues that failed and are silent
    pub failed: usize,
    /// Peak before limiting
    pub peak: f32,
    /// Whether the limiter rescaled the track
    pub normalized: bool,
    /// Length of the mixed track
    pub duration_secs: f64,
    /// Where the result was written
    pub output: PathBuf,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Main application controller for subtitle dubbing
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Speech backend shared by all jobs
    provider: Arc<dyn Provider>,
    // @field: Artifact decoder
    decoder: Arc<dyn ClipDecoder>,
    // @field: ffmpeg/ffprobe runner
    media: MediaTool,
}

impl Controller {
    // @method: Create a controller using the backend selected in the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = providers::build_provider(&config.synthesis)
            .context("Failed to create speech backend")?;
        let media = MediaTool::default();
        let decoder: Arc<dyn ClipDecoder> = Arc::new(FfmpegDecoder::new(media.clone()));
        Ok(Self::with_components(config, provider, decoder, media))
    }

    /// Create a controller from explicit collaborators
    pub fn with_components(
        config: Config,
        provider: Arc<dyn Provider>,
        decoder: Arc<dyn ClipDecoder>,
        media: MediaTool,
    ) -> Self {
        Self {
            config,
            provider,
            decoder,
            media,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dub one video with the given subtitle file
    pub async fn run(&self, video: PathBuf, srt: PathBuf, output: PathBuf) -> Result<DubSummary> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&video, &srt, &output, &multi_progress).await
    }

    async fn run_with_progress(
        &self,
        video: &Path,
        srt: &Path,
        output: &Path,
        multi_progress: &MultiProgress,
    ) -> Result<DubSummary> {
        let start_time = Instant::now();

        // Preflight: nothing is synthesized unless every input is usable
        if !FileManager::file_exists(video) {
            return Err(DubError::FatalInput(format!("video file not found: {:?}", video)).into());
        }
        let cues = Self::load_cues(srt)?;
        self.media.check_available().await?;

        let duration_secs = match self.media.probe_duration(video).await {
            Ok(duration) => {
                debug!("Media duration: {:.3}s", duration);
                Some(duration)
            }
            Err(e) => {
                warn!("{}; sizing the track from the subtitles instead", e);
                None
            }
        };

        let work_dir = tempfile::Builder::new()
            .prefix("sub2dub_")
            .tempdir()
            .context("Failed to create temporary directory")?;
        let mixed_track = work_dir.path().join(MIXED_TRACK_FILE);

        let mut summary = self
            .render_track(&cues, duration_secs, work_dir.path(), &mixed_track, output, multi_progress)
            .await?;

        info!("Merging dub into {}", output.display());
        if let Some(parent) = output.parent() {
            FileManager::ensure_dir(parent)?;
        }
        self.media
            .merge_dub(video, &mixed_track, output, self.config.ducking, &self.config.merge)
            .await?;

        summary.output = output.to_path_buf();
        info!(
            "Success: {} ({} of {} cues voiced) in {}",
            output.display(),
            summary.synthesized,
            summary.cues,
            Self::format_duration(start_time.elapsed())
        );
        Ok(summary)
    }

    /// Parse the subtitle file into cues, rejecting files with nothing to speak
    pub fn load_cues(srt: &Path) -> Result<Vec<Cue>> {
        if !FileManager::file_exists(srt) {
            return Err(DubError::FatalInput(format!("subtitle file not found: {:?}", srt)).into());
        }
        let subtitles = SubtitleCollection::from_file(srt)
            .map_err(|e| DubError::FatalInput(format!("{:#}", e)))?;
        let cues = cues_from_entries(&subtitles.entries);
        if cues.iter().all(Cue::is_empty) {
            return Err(DubError::FatalInput(format!("no speakable cues in {:?}", srt)).into());
        }
        Ok(cues)
    }

    /// Synthesize, mix and limit `cues`, then write the mixed track to `wav_path`.
    ///
    /// `work_dir` receives the per-cue artifacts. Failed cues are appended to
    /// the issues log next to `job_output`.
    pub async fn render_track(
        &self,
        cues: &[Cue],
        duration_secs: Option<f64>,
        work_dir: &Path,
        wav_path: &Path,
        job_output: &Path,
        multi_progress: &MultiProgress,
    ) -> Result<DubSummary> {
        let engine = DubEngine::new(self.provider.clone(), self.decoder.clone(), &self.config);

        let speakable = cues.iter().filter(|cue| !cue.is_empty()).count();
        let progress_bar = multi_progress.add(ProgressBar::new(speakable as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message("Synthesizing");

        info!(
            "sub2dub: {} - {} ({} at {})",
            self.provider.name(),
            self.config.voice,
            speakable,
            self.config.rate
        );

        let pb = progress_bar.clone();
        let assembled = engine
            .assemble(
                cues,
                &self.config.voice,
                &self.config.rate,
                work_dir,
                duration_secs,
                move |completed, _total| {
                    pb.set_position(completed as u64);
                },
            )
            .await;
        progress_bar.finish_and_clear();

        if assembled.failed() > 0 {
            self.write_issues(&assembled, job_output);
        }

        let summary = DubSummary {
            cues: cues.len(),
            synthesized: assembled.placed(),
            skipped: assembled.dispatch.skipped,
            failed: assembled.failed(),
            peak: assembled.limiter.peak,
            normalized: assembled.limiter.scaled,
            duration_secs: assembled.track.duration_secs(),
            output: wav_path.to_path_buf(),
        };

        export::export_wav(assembled.track, wav_path.to_path_buf())
            .await
            .map_err(|e| DubError::stage(JobStage::Export, format!("{:#}", e)))?;

        Ok(summary)
    }

    /// Append every failed cue to the issues log; failure to log is not fatal
    fn write_issues(&self, assembled: &AssembledTrack, job_output: &Path) {
        let log_path = Self::issues_log_path(job_output);
        let context = format!("{} - {}", self.provider.name(), job_output.display());

        let dispatch_lines = assembled
            .dispatch
            .failures
            .iter()
            .map(|failure| format!("{}: cue {} '{}': {}", context, failure.cue_index, failure.text, failure.error));
        let mix_lines = assembled
            .mix
            .rejected
            .iter()
            .map(|e| format!("{}: {}", context, e));

        for line in dispatch_lines.chain(mix_lines) {
            if let Err(e) = FileManager::append_to_log_file(&log_path, &line) {
                warn!("Failed to write issues log: {}", e);
                return;
            }
        }
        info!(
            "{} cues could not be voiced, see {}",
            assembled.failed(),
            log_path.display()
        );
    }

    /// Location of the issues log for a job writing `job_output`
    pub fn issues_log_path(job_output: &Path) -> PathBuf {
        match job_output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(ISSUES_LOG_FILE),
            _ => PathBuf::from(ISSUES_LOG_FILE),
        }
    }

    /// Strip markup from a subtitle file
    pub fn clean_subtitle_file(&self, input: &Path, output: &Path) -> Result<()> {
        if !FileManager::file_exists(input) {
            return Err(anyhow!("Subtitle file does not exist: {:?}", input));
        }
        subtitle_processor::clean_file(input, output)?;
        info!("Cleaned SRT saved to: {}", output.display());
        Ok(())
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }

    /// Dub every video under `input_dir`, writing results to `output_dir`.
    ///
    /// Videos whose dubbed output already exists are skipped unless `force`
    /// is set. A failing video is logged and the batch moves on.
    pub async fn run_folder(&self, input_dir: PathBuf, output_dir: PathBuf, force: bool) -> Result<BatchSummary> {
        let start_time = Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let video_files = FileManager::find_video_files(&input_dir)?;
        if video_files.is_empty() {
            return Err(anyhow!("No video files found in directory: {:?}", input_dir));
        }
        FileManager::ensure_dir(&output_dir)?;
        info!("Found {} videos to process", video_files.len());

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(video_files.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(style.progress_chars("█▓▒░"));

        let mut summary = BatchSummary::default();

        for video_file in &video_files {
            let file_name = video_file
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let paths = FileManager::batch_paths(video_file, &output_dir);
            if FileManager::file_exists(&paths.dubbed) && !force {
                warn!("Skipping {}, dubbed output already exists (use --force to redo)", file_name);
                summary.skipped += 1;
                folder_pb.inc(1);
                continue;
            }

            match self.process_video(video_file, &paths, &multi_progress).await {
                Ok(_) => summary.processed += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");

        info!(
            "Folder processing completed: {} processed, {} skipped, {} errors in {}",
            summary.processed,
            summary.skipped,
            summary.failed,
            Self::format_duration(start_time.elapsed())
        );
        Ok(summary)
    }

    /// Extract, clean and dub a single video of a batch
    async fn process_video(
        &self,
        video: &Path,
        paths: &crate::file_utils::BatchPaths,
        multi_progress: &MultiProgress,
    ) -> Result<DubSummary> {
        self.media.extract_subtitles(video, &paths.raw_srt).await?;
        subtitle_processor::clean_file(&paths.raw_srt, &paths.clean_srt)?;

        let summary = self
            .run_with_progress(video, &paths.clean_srt, &paths.dubbed, multi_progress)
            .await?;

        FileManager::remove_if_exists(&paths.raw_srt)?;
        Ok(summary)
    }
}
