/*!
 * Tests for SRT parsing and cleaning
 */

use anyhow::Result;
use sub2dub::errors::SubtitleError;
use sub2dub::subtitle_processor::{self, SubtitleCollection, clean_subtitle_text};
use crate::common;

/// Test parsing a well-formed SRT file
#[test]
fn test_from_file_withValidSrt_shouldParseAllEntries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let collection = SubtitleCollection::from_file(&path)?;

    assert_eq!(collection.len(), 3);
    assert_eq!(collection.entries[0].start_time_ms, 1000);
    assert_eq!(collection.entries[0].end_time_ms, 4000);
    assert_eq!(collection.entries[2].text, "For testing purposes.");
    Ok(())
}

/// Test that BOM, CRLF line endings and multi-line text are handled
#[test]
fn test_parse_srt_string_withBomAndCrlf_shouldParse() -> Result<()> {
    let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,500\r\nHello\r\nthere\r\n\r\n2\r\n00:01:00.250 --> 00:01:01.000\r\nBye\r\n";

    let entries = SubtitleCollection::parse_srt_string(content)?;

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq_num, 1);
    assert_eq!(entries[0].text, "Hello\nthere");
    assert_eq!(entries[1].start_time_ms, 60_250);
    Ok(())
}

/// Test that file order is preserved even when timings are not sorted
#[test]
fn test_parse_srt_string_withUnsortedEntries_shouldKeepFileOrder() -> Result<()> {
    let content = "1\n00:00:05,000 --> 00:00:06,000\nSecond in time\n\n2\n00:00:01,000 --> 00:00:02,000\nFirst in time\n";

    let entries = SubtitleCollection::parse_srt_string(content)?;

    assert_eq!(entries[0].text, "Second in time");
    assert_eq!(entries[1].text, "First in time");
    Ok(())
}

/// Test that content without any timed entry is rejected
#[test]
fn test_parse_srt_string_withNoEntries_shouldFail() {
    let err = SubtitleCollection::parse_srt_string("just some text\n\nmore text\n").unwrap_err();
    assert!(matches!(err.downcast_ref::<SubtitleError>(), Some(SubtitleError::Empty(_))));
}

/// Test the cleaning rules on tags, hard spaces and repeated spaces
#[test]
fn test_clean_subtitle_text_withMarkup_shouldStripIt() {
    let input = "{\\an8}<font color=\"#ffffff\">Hello</font>\\hworld  <b>again</b>";
    assert_eq!(clean_subtitle_text(input), "Hello world again");
}

/// Test that unmatched brackets survive cleaning
#[test]
fn test_clean_subtitle_text_withPlainText_shouldBeUnchanged() {
    assert_eq!(clean_subtitle_text("2 < 3 and {nothing"), "2 < 3 and {nothing");
}

/// Test cleaning a whole file
#[test]
fn test_clean_file_withTaggedSrt_shouldWriteCleanSrt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "raw.srt")?;
    let output = temp_dir.path().join("clean.srt");

    subtitle_processor::clean_file(&input, &output)?;

    let collection = SubtitleCollection::from_file(&output)?;
    assert_eq!(collection.entries[1].text, "It contains multiple entries.");
    Ok(())
}
