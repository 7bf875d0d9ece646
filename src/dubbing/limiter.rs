/*!
 * Post-mix limiter.
 *
 * One global pass over the finished master track: if any sample exceeds unit
 * amplitude, the whole track is scaled down by its peak so the loudest sample
 * lands exactly on 1.0.
 */

use log::info;

use super::mixer::MasterTrack;

/// Amplitude no output sample may exceed
pub const UNIT_CEILING: f32 = 1.0;

/// What the limiter did to a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterReport {
    /// Peak amplitude before limiting
    pub peak: f32,
    /// Whether the track was rescaled
    pub scaled: bool,
}

/// Uniform peak normalizer
#[derive(Debug, Default, Clone, Copy)]
pub struct Limiter;

impl Limiter {
    pub fn new() -> Self {
        Self
    }

    /// Rescale `track` in place when its peak exceeds 1.0
    pub fn apply(&self, track: &mut MasterTrack) -> LimiterReport {
        let peak = track.peak();
        if peak <= UNIT_CEILING {
            return LimiterReport { peak, scaled: false };
        }

        info!("Clipping detected (peak {:.3}), normalizing", peak);
        for sample in track.samples_mut() {
            *sample /= peak;
        }

        LimiterReport { peak, scaled: true }
    }
}
