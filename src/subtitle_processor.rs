use regex::Regex;
use once_cell::sync::Lazy;
use anyhow::{Result, Context};
use std::path::{Path, PathBuf};
use log::{warn, debug};

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;

// @module: SRT parsing and cleaning

// @const: SRT timestamp line
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})").unwrap()
});

// @const: HTML-style markup such as <i> or <font color="...">
static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

// @const: ASS/SSA override blocks such as {\an8}
static ASS_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]+\}").unwrap());

// @const: Runs of spaces
static MULTI_SPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    // @field: Sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text, may be empty
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
        }
    }
}

/// Subtitle entries read from one file, in file order
#[derive(Debug)]
pub struct SubtitleCollection {
    /// Source filename
    pub source_file: PathBuf,

    /// List of subtitle entries
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleCollection {
    /// Load and parse an SRT file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let entries = Self::parse_srt_file(path)?;
        debug!("Parsed {} subtitle entries from {:?}", entries.len(), path);
        Ok(SubtitleCollection {
            source_file: path.to_path_buf(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse SRT file content to subtitle entries
    fn parse_srt_file(path: &Path) -> Result<Vec<SubtitleEntry>> {
        let content = FileManager::read_to_string(path)?;
        Self::parse_srt_string(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse SRT format string into subtitle entries.
    ///
    /// Entries are returned in file order. An entry whose text is empty is
    /// kept so positions stay stable; blocks without a valid timestamp line
    /// are skipped with a warning.
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleEntry>> {
        let content = content.trim_start_matches('\u{feff}');
        let mut entries = Vec::new();

        let mut block: Vec<&str> = Vec::new();
        let mut block_start_line = 1;
        for (line_idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if !block.is_empty() {
                    if let Some(entry) = Self::parse_block(&block, entries.len() + 1, block_start_line) {
                        entries.push(entry);
                    }
                    block.clear();
                }
                continue;
            }
            if block.is_empty() {
                block_start_line = line_idx + 1;
            }
            block.push(trimmed);
        }
        if !block.is_empty() {
            if let Some(entry) = Self::parse_block(&block, entries.len() + 1, block_start_line) {
                entries.push(entry);
            }
        }

        if entries.is_empty() {
            return Err(SubtitleError::Empty("SRT content".to_string()).into());
        }

        let overlap_count = entries
            .windows(2)
            .filter(|pair| pair[0].end_time_ms > pair[1].start_time_ms)
            .count();
        if overlap_count > 0 {
            warn!("Found {} overlapping subtitle entries", overlap_count);
        }

        Ok(entries)
    }

    /// Parse one blank-line separated block: optional sequence number, a
    /// timestamp line, then any number of text lines
    fn parse_block(block: &[&str], fallback_seq: usize, line_number: usize) -> Option<SubtitleEntry> {
        let timestamp_pos = block.iter().position(|line| TIMESTAMP_REGEX.is_match(line));
        let Some(timestamp_pos) = timestamp_pos else {
            warn!("Skipping block without timestamp at line {}: {}", line_number, block[0]);
            return None;
        };

        let seq_num = if timestamp_pos > 0 {
            block[timestamp_pos - 1].parse::<usize>().unwrap_or(fallback_seq)
        } else {
            fallback_seq
        };

        let caps = TIMESTAMP_REGEX.captures(block[timestamp_pos])?;
        let start_ms = Self::parse_timestamp_to_ms(&caps, 1);
        let end_ms = Self::parse_timestamp_to_ms(&caps, 5);
        if end_ms < start_ms {
            warn!(
                "Subtitle {} ends before it starts ({} < {}), treating it as zero length",
                seq_num, end_ms, start_ms
            );
        }

        let text = block[timestamp_pos + 1..].join("\n");
        Some(SubtitleEntry::new(seq_num, start_ms, end_ms, text))
    }

    /// Parse timestamp captures starting at `start_idx` to milliseconds
    fn parse_timestamp_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
        let field = |i: usize| -> u64 {
            caps.get(start_idx + i)
                .map_or(0, |m| m.as_str().parse().unwrap_or(0))
        };
        let millis_str = caps.get(start_idx + 3).map_or("0", |m| m.as_str());
        // "5" in "00:00:01,5" means 500 ms
        let millis = field(3) * 10_u64.pow(3 - millis_str.len().min(3) as u32);

        (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + millis
    }
}

/// Strip display markup so only speakable text remains.
///
/// Removes HTML-style tags and ASS/SSA override blocks, turns the `\h` hard
/// space into a normal space and collapses runs of spaces. Line structure,
/// and with it the SRT layout, is left intact.
pub fn clean_subtitle_text(content: &str) -> String {
    let cleaned = HTML_TAG_REGEX.replace_all(content, "");
    let cleaned = ASS_TAG_REGEX.replace_all(&cleaned, "");
    let cleaned = cleaned.replace(r"\h", " ");
    MULTI_SPACE_REGEX.replace_all(&cleaned, " ").into_owned()
}

/// Clean an SRT file into `output`
pub fn clean_file(input: &Path, output: &Path) -> Result<()> {
    let content = FileManager::read_to_string(input)?;
    FileManager::write_to_file(output, &clean_subtitle_text(&content))?;
    debug!("Cleaned {:?} -> {:?}", input, output);
    Ok(())
}
