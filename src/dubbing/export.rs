/*!
 * Export adapter.
 *
 * Converts synthesized artifacts into raw mono samples, and encodes the
 * finished master track as a mono 16-bit PCM WAV file for the merge step.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::media::MediaTool;

use super::mixer::MasterTrack;

/// Turns an encoded audio artifact into mono samples at a given rate
#[async_trait]
pub trait ClipDecoder: Send + Sync + Debug {
    /// Decode `artifact` to mono `f32` samples at `sample_rate`
    async fn decode(&self, artifact: &Path, sample_rate: u32) -> Result<Vec<f32>>;
}

/// Reads WAV artifacts directly
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

#[async_trait]
impl ClipDecoder for WavDecoder {
    async fn decode(&self, artifact: &Path, sample_rate: u32) -> Result<Vec<f32>> {
        let path = artifact.to_path_buf();
        tokio::task::spawn_blocking(move || read_wav_mono(&path, sample_rate))
            .await
            .context("WAV decode task panicked")?
    }
}

/// Converts any artifact format to WAV with ffmpeg, then reads it
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
    media: MediaTool,
}

impl FfmpegDecoder {
    pub fn new(media: MediaTool) -> Self {
        Self { media }
    }

    fn decoded_path(artifact: &Path) -> PathBuf {
        artifact.with_extension("decoded.wav")
    }
}

#[async_trait]
impl ClipDecoder for FfmpegDecoder {
    async fn decode(&self, artifact: &Path, sample_rate: u32) -> Result<Vec<f32>> {
        let decoded = Self::decoded_path(artifact);
        self.media
            .decode_to_wav(artifact, &decoded, sample_rate)
            .await
            .map_err(|e| anyhow!("ffmpeg could not decode {:?}: {}", artifact, e))?;

        let samples = WavDecoder.decode(&decoded, sample_rate).await;
        let _ = tokio::fs::remove_file(&decoded).await;
        samples
    }
}

/// Read a WAV file as mono samples in `[-1.0, 1.0]`, averaging channels.
///
/// Fails when the file's sample rate differs from `sample_rate`.
pub fn read_wav_mono(path: &Path, sample_rate: u32) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("Failed to open WAV {:?}", path))?;
    let spec = reader.spec();

    if spec.sample_rate != sample_rate {
        return Err(anyhow!(
            "WAV {:?} is {} Hz, expected {} Hz",
            path,
            spec.sample_rate,
            sample_rate
        ));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Failed to read samples from {:?}", path))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Failed to read samples from {:?}", path))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    if channels == 1 {
        return Ok(interleaved);
    }

    Ok(interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect())
}

/// Write the master track as mono 16-bit PCM, clamping to unit range
pub fn write_wav(track: &MasterTrack, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: track.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;
    for sample in track.samples() {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value)?;
    }
    writer.finalize().with_context(|| format!("Failed to finalize {:?}", path))?;

    debug!(
        "Exported {} samples ({:.2}s) to {:?}",
        track.len(),
        track.duration_secs(),
        path
    );
    Ok(())
}

/// Write the master track on the blocking pool, handing the track back
pub async fn export_wav(track: MasterTrack, path: PathBuf) -> Result<MasterTrack> {
    tokio::task::spawn_blocking(move || write_wav(&track, &path).map(|_| track))
        .await
        .context("WAV export task panicked")?
}
