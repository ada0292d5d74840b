//! FFmpeg `FFMETADATA1` generation for M4B chapter markers (§4.4 step 4).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{NarratorError, Result};

#[derive(Debug, Clone)]
pub struct ChapterInfo {
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChapterInfo {
    pub fn new(title: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            title: title.into(),
            start_ms,
            end_ms,
        }
    }
}

/// Writes the `;FFMETADATA1` file: book-level tags followed by one
/// `[CHAPTER]` block per entry. Offsets are accumulated from probed
/// per-chapter durations, not estimated, so they match the stream-copied
/// concat exactly.
pub fn create_ffmpeg_metadata(
    title: &str,
    author: &str,
    date: Option<&str>,
    chapters: &[ChapterInfo],
    output_path: &Path,
) -> Result<()> {
    let mut file = File::create(output_path).map_err(NarratorError::Io)?;

    writeln!(file, ";FFMETADATA1").map_err(NarratorError::Io)?;
    writeln!(file, "title={}", escape_metadata_value(title)).map_err(NarratorError::Io)?;
    writeln!(file, "artist={}", escape_metadata_value(author)).map_err(NarratorError::Io)?;
    writeln!(file, "album={}", escape_metadata_value(title)).map_err(NarratorError::Io)?;
    writeln!(file, "genre=Audiobook").map_err(NarratorError::Io)?;
    if let Some(date) = date {
        writeln!(file, "date={}", escape_metadata_value(date)).map_err(NarratorError::Io)?;
    }
    writeln!(file).map_err(NarratorError::Io)?;

    for chapter in chapters {
        writeln!(file, "[CHAPTER]").map_err(NarratorError::Io)?;
        writeln!(file, "TIMEBASE=1/1000").map_err(NarratorError::Io)?;
        writeln!(file, "START={}", chapter.start_ms).map_err(NarratorError::Io)?;
        writeln!(file, "END={}", chapter.end_ms).map_err(NarratorError::Io)?;
        writeln!(file, "title={}", escape_metadata_value(&chapter.title)).map_err(NarratorError::Io)?;
        writeln!(file).map_err(NarratorError::Io)?;
    }

    Ok(())
}

/// FFmpeg metadata values must escape `= ; # \` and newlines.
fn escape_metadata_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Builds chapter markers from per-chapter titles and their probed AAC
/// durations, accumulating offsets in order (`offset_0 = 0`, `offset_{i+1} =
/// offset_i + duration_ms[i]`).
pub fn build_chapter_markers(titles: &[String], duration_ms: &[u64]) -> Vec<ChapterInfo> {
    let mut chapters = Vec::with_capacity(titles.len());
    let mut offset = 0u64;
    for (title, &duration) in titles.iter().zip(duration_ms.iter()) {
        chapters.push(ChapterInfo::new(title.clone(), offset, offset + duration));
        offset += duration;
    }
    chapters
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn escape_handles_all_special_chars() {
        assert_eq!(escape_metadata_value("Simple"), "Simple");
        assert_eq!(escape_metadata_value("Test=Value"), "Test\\=Value");
        assert_eq!(escape_metadata_value("Test;Value"), "Test\\;Value");
        assert_eq!(escape_metadata_value("Test#Value"), "Test\\#Value");
        assert_eq!(escape_metadata_value("Test\\Value"), "Test\\\\Value");
        assert_eq!(escape_metadata_value("Line1\nLine2"), "Line1\\nLine2");
    }

    #[test]
    fn build_chapter_markers_accumulates_offsets() {
        let titles = vec!["One".to_string(), "Two".to_string(), "Three".to_string()];
        let durations = vec![1000, 2000, 3000];
        let chapters = build_chapter_markers(&titles, &durations);
        assert_eq!(chapters[0].start_ms, 0);
        assert_eq!(chapters[0].end_ms, 1000);
        assert_eq!(chapters[1].start_ms, 1000);
        assert_eq!(chapters[1].end_ms, 3000);
        assert_eq!(chapters[2].start_ms, 3000);
        assert_eq!(chapters[2].end_ms, 6000);
    }

    #[test]
    fn metadata_file_contains_expected_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.txt");
        let chapters = vec![ChapterInfo::new("Chapter 1", 0, 60000), ChapterInfo::new("Chapter 2", 60000, 120000)];
        create_ffmpeg_metadata("My Book", "An Author", Some("2024"), &chapters, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(";FFMETADATA1"));
        assert!(content.contains("title=My Book"));
        assert!(content.contains("artist=An Author"));
        assert!(content.contains("date=2024"));
        assert!(content.contains("[CHAPTER]"));
        assert!(content.contains("START=60000"));
        assert!(content.contains("title=Chapter 2"));
    }
}
