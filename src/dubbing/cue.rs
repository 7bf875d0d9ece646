/*!
 * Cue model.
 *
 * A cue is one subtitle line to be spoken: its position in the subtitle file,
 * the text, and the time range it occupies on the dub timeline.
 */

use crate::subtitle_processor::SubtitleEntry;

/// Number of leading characters considered when naming a clip artifact
const ARTIFACT_TEXT_CHARS: usize = 15;

/// One timestamped subtitle line to be spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// 0-based position in the subtitle list
    pub index: usize,

    /// Text to synthesize, newlines folded into spaces and trimmed
    pub text: String,

    /// Start time in milliseconds
    pub start_ms: u64,

    /// End time in milliseconds, never before `start_ms`
    pub end_ms: u64,
}

impl Cue {
    /// Create a cue, normalizing the text and clamping `end_ms` to `start_ms`
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: impl AsRef<str>) -> Self {
        Self {
            index,
            text: normalize_text(text.as_ref()),
            start_ms,
            end_ms: end_ms.max(start_ms),
        }
    }

    /// Whether there is nothing to speak for this cue
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length of the cue's time range
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Timeline offset of the cue at `sample_rate`, rounded to the nearest sample
    pub fn start_sample(&self, sample_rate: u32) -> usize {
        ms_to_samples_rounded(self.start_ms, sample_rate)
    }

    /// Collision-free artifact file name: `{index:04}_{safe_text}.{extension}`
    ///
    /// The index prefix keeps names unique even when several cues share the
    /// same text.
    pub fn artifact_name(&self, extension: &str) -> String {
        let safe: String = self
            .text
            .chars()
            .take(ARTIFACT_TEXT_CHARS)
            .filter(|c| c.is_alphanumeric())
            .collect();
        let safe = if safe.is_empty() { "line".to_string() } else { safe };
        format!("{:04}_{}.{}", self.index, safe, extension.trim_start_matches('.'))
    }
}

/// Fold line breaks into spaces and trim
fn normalize_text(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace('\n', " ")
        .trim()
        .to_string()
}

/// Convert milliseconds to a sample count, rounding half up
pub fn ms_to_samples_rounded(ms: u64, sample_rate: u32) -> usize {
    ((ms as u128 * sample_rate as u128 + 500) / 1000) as usize
}

/// Convert milliseconds to a sample count, truncating partial samples
pub fn ms_to_samples_floor(ms: u64, sample_rate: u32) -> usize {
    (ms as u128 * sample_rate as u128 / 1000) as usize
}

/// Build cues from parsed subtitle entries, indexed by their position
pub fn cues_from_entries(entries: &[SubtitleEntry]) -> Vec<Cue> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| Cue::new(index, entry.start_time_ms, entry.end_time_ms, &entry.text))
        .collect()
}

/// Timeline length estimate used when the media duration is unknown:
/// the end of the last cue in file order plus a trailing margin.
///
/// Clips of earlier cues ending later still fit, the mixer grows the track.
pub fn estimated_duration_ms(cues: &[Cue], trailing_margin_ms: u64) -> u64 {
    cues.last().map_or(0, |cue| cue.end_ms) + trailing_margin_ms
}
