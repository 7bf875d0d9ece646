/*!
 * Audio assembly engine.
 *
 * Turns a cue list into one mixed dub track:
 * - `cue`: the cue model and timing helpers
 * - `dispatcher`: bounded concurrent synthesis and clip decoding
 * - `mixer`: the growable master track and offset-based clip placement
 * - `limiter`: global peak normalization
 * - `export`: artifact decoding and WAV encoding
 *
 * `DubEngine` runs these stages in order for one job.
 */

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::app_config::{Config, MixingConfig};
use crate::providers::Provider;

pub mod cue;
pub mod dispatcher;
pub mod export;
pub mod limiter;
pub mod mixer;

pub use cue::Cue;
pub use dispatcher::{CueFailure, DispatchOptions, DispatchReport, SynthesisDispatcher, SynthesisResult};
pub use export::{ClipDecoder, FfmpegDecoder, WavDecoder};
pub use limiter::{Limiter, LimiterReport};
pub use mixer::{MasterTrack, MixReport, TimelineMixer};

/// Finished track of one job and what happened on the way
#[derive(Debug)]
pub struct AssembledTrack {
    /// Limited master track, ready for export
    pub track: MasterTrack,
    /// Synthesis outcome per cue
    pub dispatch: DispatchReport,
    /// Placement outcome
    pub mix: MixReport,
    /// Limiter outcome
    pub limiter: LimiterReport,
}

impl AssembledTrack {
    /// Number of cues whose audio is on the track
    pub fn placed(&self) -> usize {
        self.mix.placed
    }

    /// Number of cues that were scheduled but are missing from the track
    pub fn failed(&self) -> usize {
        self.dispatch.failures.len() + self.mix.rejected.len()
    }
}

/// Dispatch, mix and limit a cue list
#[derive(Debug, Clone)]
pub struct DubEngine {
    dispatcher: SynthesisDispatcher,
    mixing: MixingConfig,
    limiter: Limiter,
}

impl DubEngine {
    pub fn new(provider: Arc<dyn Provider>, decoder: Arc<dyn ClipDecoder>, config: &Config) -> Self {
        Self {
            dispatcher: SynthesisDispatcher::new(provider, decoder, DispatchOptions::from_config(config)),
            mixing: config.mixing.clone(),
            limiter: Limiter::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.mixing.sample_rate
    }

    /// Build the master track for `cues`.
    ///
    /// `duration_secs` is the probed media duration; when `None` the track is
    /// sized from the last cue end plus the trailing margin. Per-cue failures
    /// are reported in the result and never abort the job.
    pub async fn assemble(
        &self,
        cues: &[Cue],
        voice: &str,
        rate: &str,
        work_dir: &Path,
        duration_secs: Option<f64>,
        progress_callback: impl Fn(usize, usize) + Clone + Send + 'static,
    ) -> AssembledTrack {
        let dispatch = self
            .dispatcher
            .dispatch(cues, voice, rate, work_dir, progress_callback)
            .await;

        if !dispatch.failures.is_empty() {
            warn!(
                "{} of {} cues could not be synthesized and will be silent",
                dispatch.failures.len(),
                dispatch.total
            );
        }

        let mut mixer = TimelineMixer::for_job(duration_secs, cues, &self.mixing);
        let mix = mixer.place_all(cues, &dispatch.results);
        if mix.grown_by > 0 {
            info!("Master track extended by {} samples past the media end", mix.grown_by);
        }

        let mut track = mixer.finish();
        let limiter = self.limiter.apply(&mut track);

        AssembledTrack {
            track,
            dispatch,
            mix,
            limiter,
        }
    }
}
