/*!
 * Timeline mixer.
 *
 * The mixer owns the master track for the duration of one job and places each
 * synthesized clip at its cue offset. Clips are summed into whatever is already
 * on the timeline, and the track grows (zero-filled, to the exact end of the
 * clip) when a clip runs past the current end. Placement only depends on the
 * cue offset, so the order in which results arrive does not matter.
 */

use log::{debug, warn};
use std::collections::HashMap;
use std::ops::Range;

use crate::app_config::MixingConfig;
use crate::errors::DubError;

use super::cue::{Cue, estimated_duration_ms, ms_to_samples_floor};
use super::dispatcher::SynthesisResult;

/// The growable sample buffer holding the whole dub timeline
#[derive(Debug, Clone, PartialEq)]
pub struct MasterTrack {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl MasterTrack {
    /// Zero-filled track of `len` samples
    pub fn new(len: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    /// Zero-filled track covering `duration_secs`, truncated to whole samples
    pub fn for_duration_secs(duration_secs: f64, sample_rate: u32) -> Self {
        let len = if duration_secs.is_finite() && duration_secs > 0.0 {
            (duration_secs * sample_rate as f64) as usize
        } else {
            0
        };
        Self::new(len, sample_rate)
    }

    /// Wrap existing samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Track length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// Sum `clip` into the track starting at `start_sample`.
    ///
    /// Grows the track with zero-fill to exactly the clip end when needed;
    /// never shrinks it. Returns the range that was written.
    pub fn mix_in(&mut self, start_sample: usize, clip: &[f32]) -> Range<usize> {
        let end_sample = start_sample + clip.len();
        if end_sample > self.samples.len() {
            self.samples.resize(end_sample, 0.0);
        }

        for (dst, src) in self.samples[start_sample..end_sample].iter_mut().zip(clip) {
            *dst += *src;
        }

        start_sample..end_sample
    }
}

/// Outcome of placing a set of results
#[derive(Debug, Default)]
pub struct MixReport {
    /// Number of clips summed into the track
    pub placed: usize,
    /// Samples appended beyond the initial track length
    pub grown_by: usize,
    /// Results that could not be placed
    pub rejected: Vec<DubError>,
}

/// Single owner of the master track while clips are being placed
#[derive(Debug)]
pub struct TimelineMixer {
    track: MasterTrack,
}

impl TimelineMixer {
    /// Start mixing onto an existing track
    pub fn new(track: MasterTrack) -> Self {
        Self { track }
    }

    /// Allocate the initial track from the probed media duration, or from the
    /// last cue end plus the configured trailing margin when the duration is
    /// unknown
    pub fn for_job(duration_secs: Option<f64>, cues: &[Cue], config: &MixingConfig) -> Self {
        let track = match duration_secs {
            Some(duration_secs) => MasterTrack::for_duration_secs(duration_secs, config.sample_rate),
            None => {
                let estimate_ms = estimated_duration_ms(cues, config.trailing_margin_ms);
                MasterTrack::new(ms_to_samples_floor(estimate_ms, config.sample_rate), config.sample_rate)
            }
        };
        debug!(
            "Allocating master track for {:.2}s at {} Hz",
            track.duration_secs(),
            config.sample_rate
        );
        Self::new(track)
    }

    /// Place one clip at its cue offset
    pub fn place(&mut self, cue: &Cue, result: &SynthesisResult) -> Result<Range<usize>, DubError> {
        if result.sample_rate != self.track.sample_rate {
            return Err(DubError::Decode {
                cue_index: cue.index,
                message: format!(
                    "clip sample rate {} Hz does not match track sample rate {} Hz",
                    result.sample_rate, self.track.sample_rate
                ),
            });
        }

        let start_sample = cue.start_sample(self.track.sample_rate);
        Ok(self.track.mix_in(start_sample, &result.samples))
    }

    /// Place every result, in whatever order they are given, keyed by cue index
    pub fn place_all(&mut self, cues: &[Cue], results: &[SynthesisResult]) -> MixReport {
        let by_index: HashMap<usize, &Cue> = cues.iter().map(|cue| (cue.index, cue)).collect();
        let initial_len = self.track.len();
        let mut report = MixReport::default();

        for result in results {
            let Some(cue) = by_index.get(&result.cue_index) else {
                warn!("Dropping audio for unknown cue {}", result.cue_index);
                report.rejected.push(DubError::Decode {
                    cue_index: result.cue_index,
                    message: "no cue with this index".to_string(),
                });
                continue;
            };

            match self.place(cue, result) {
                Ok(_) => report.placed += 1,
                Err(e) => {
                    warn!("Skipping cue {} ('{}'): {}", cue.index, cue.text, e);
                    report.rejected.push(e);
                }
            }
        }

        report.grown_by = self.track.len().saturating_sub(initial_len);
        report
    }

    pub fn track(&self) -> &MasterTrack {
        &self.track
    }

    /// Hand the finished track over to the limiter/export
    pub fn finish(self) -> MasterTrack {
        self.track
    }
}
