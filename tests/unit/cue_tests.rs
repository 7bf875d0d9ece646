/*!
 * Tests for the cue model
 */

use std::collections::HashSet;
use sub2dub::dubbing::cue::{Cue, cues_from_entries, ms_to_samples_rounded};
use sub2dub::subtitle_processor::SubtitleCollection;

/// Test that repeated lines still get distinct artifact names
#[test]
fn test_artifact_name_withRepeatedText_shouldBeUnique() {
    let cues: Vec<Cue> = (0..50).map(|i| Cue::new(i, i as u64 * 1000, i as u64 * 1000 + 500, "What?")).collect();

    let names: HashSet<String> = cues.iter().map(|c| c.artifact_name("mp3")).collect();

    assert_eq!(names.len(), 50);
    assert!(names.contains("0000_What.mp3"));
    assert!(names.contains("0049_What.mp3"));
}

/// Test that non-ASCII letters are kept in artifact names
#[test]
fn test_artifact_name_withAccentedText_shouldKeepLetters() {
    let cue = Cue::new(3, 0, 10, "Café, s'il vous plaît");
    assert_eq!(cue.artifact_name("mp3"), "0003_Cafésilvous.mp3");
}

/// Test millisecond to sample conversion at the engine rate
#[test]
fn test_ms_to_samples_rounded_withEngineRate_shouldRoundHalfUp() {
    assert_eq!(ms_to_samples_rounded(0, 44100), 0);
    assert_eq!(ms_to_samples_rounded(500, 44100), 22050);
    assert_eq!(ms_to_samples_rounded(1000, 44100), 44100);
    // 10 ms at 44100 Hz is 441 samples, 11 ms is 485.1
    assert_eq!(ms_to_samples_rounded(11, 44100), 485);
    // very long media must not overflow
    assert_eq!(ms_to_samples_rounded(36_000_000, 44100), 1_587_600_000);
}

/// Test that empty subtitle entries keep their position
#[test]
fn test_cues_from_entries_withEmptyEntry_shouldKeepIndices() -> anyhow::Result<()> {
    let content = "1\n00:00:00,000 --> 00:00:01,000\nHi\n\n2\n00:00:01,000 --> 00:00:02,000\n\n3\n00:00:02,000 --> 00:00:03,000\n<i></i>\n\n4\n00:00:03,000 --> 00:00:04,000\nBye\n";
    let entries = SubtitleCollection::parse_srt_string(&sub2dub::subtitle_processor::clean_subtitle_text(content))?;

    let cues = cues_from_entries(&entries);

    assert_eq!(cues.len(), 4);
    assert!(cues[1].is_empty());
    assert!(cues[2].is_empty());
    assert_eq!(cues[3].index, 3);
    assert_eq!(cues[3].text, "Bye");
    Ok(())
}
