//! OutputWriter (C5): places the finished M4B under
//! `{output_root}/{author}/[series/]title/` alongside its sidecars.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use crate::epub::text::html_to_text;
use crate::error::{NarratorError, Result};
use crate::settings::sanitize_filename;

const COVER_MAX_DIM: u32 = 800;

#[derive(Clone)]
pub struct OutputWriter {
    output_root: PathBuf,
}

/// What's required to place one finished book.
pub struct PlacementInput<'a> {
    pub author: &'a str,
    pub title: &'a str,
    pub series: Option<&'a str>,
    pub description: Option<&'a str>,
    pub voice: &'a str,
    pub cover_image: Option<&'a [u8]>,
}

impl OutputWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    fn book_dir(&self, author: &str, title: &str, series: Option<&str>) -> PathBuf {
        let mut dir = self.output_root.join(sanitize_filename(author));
        if let Some(series) = series {
            dir = dir.join(sanitize_filename(series));
        }
        dir.join(sanitize_filename(title))
    }

    /// `true` iff the computed final M4B path already exists. Used by the
    /// Worker as a cheap pre-dequeue skip; it is NOT the JobStore duplicate
    /// guard.
    pub fn already_exists(&self, author: &str, title: &str, series: Option<&str>) -> bool {
        let dir = self.book_dir(author, title, series);
        dir.join(format!("{}.m4b", sanitize_filename(title))).exists()
    }

    /// Moves `m4b_path` into place and writes `cover.jpg` / `desc.txt` /
    /// `reader.txt` alongside it. Returns the final `.m4b` path.
    pub fn write(&self, m4b_path: &Path, input: &PlacementInput) -> Result<PathBuf> {
        let title = sanitize_filename(input.title);
        let book_dir = self.book_dir(input.author, input.title, input.series);
        std::fs::create_dir_all(&book_dir).map_err(NarratorError::Io)?;

        let dest_m4b = book_dir.join(format!("{title}.m4b"));
        move_file(m4b_path, &dest_m4b)?;

        if let Some(cover_bytes) = input.cover_image {
            if let Err(e) = write_cover(cover_bytes, &book_dir.join("cover.jpg")) {
                tracing::warn!(error = %e, "failed to write cover image, continuing without it");
            }
        }

        if let Some(description) = input.description {
            if !description.trim().is_empty() {
                let plain = html_to_text(description);
                std::fs::write(book_dir.join("desc.txt"), plain.trim()).map_err(NarratorError::Io)?;
            }
        }

        std::fs::write(book_dir.join("reader.txt"), format!("AI Narration ({})", input.voice))
            .map_err(NarratorError::Io)?;

        tracing::info!(path = %dest_m4b.display(), "output written");
        Ok(dest_m4b)
    }
}

fn move_file(src: &Path, dest: &Path) -> Result<()> {
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        // rename fails across filesystems; fall back to copy + remove.
        Err(_) => {
            std::fs::copy(src, dest).map_err(NarratorError::Io)?;
            std::fs::remove_file(src).map_err(NarratorError::Io)?;
            Ok(())
        }
    }
}

fn write_cover(cover_bytes: &[u8], dest: &Path) -> Result<()> {
    let img = image::load_from_memory(cover_bytes)
        .map_err(|e| NarratorError::OutputWriteError(format!("failed to decode cover image: {e}")))?;
    let resized = img.resize(COVER_MAX_DIM, COVER_MAX_DIM, FilterType::Lanczos3);
    resized
        .to_rgb8()
        .save_with_format(dest, image::ImageFormat::Jpeg)
        .map_err(|e| NarratorError::OutputWriteError(format!("failed to write cover image: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer() -> (TempDir, OutputWriter) {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path());
        (dir, writer)
    }

    #[test]
    fn book_dir_without_series() {
        let (dir, writer) = writer();
        let book_dir = writer.book_dir("Jane Doe", "My Book", None);
        assert_eq!(book_dir, dir.path().join("Jane Doe").join("My Book"));
    }

    #[test]
    fn book_dir_with_series_inserts_sanitized_segment() {
        let (dir, writer) = writer();
        let book_dir = writer.book_dir("Jane Doe", "Book One", Some("Saga: Part 1"));
        assert_eq!(book_dir, dir.path().join("Jane Doe").join("Saga_ Part 1").join("Book One"));
    }

    #[test]
    fn already_exists_false_until_written() {
        let (_dir, writer) = writer();
        assert!(!writer.already_exists("Author", "Title", None));
    }

    #[test]
    fn write_moves_m4b_and_writes_sidecars() {
        let (dir, writer) = writer();
        let src_m4b = dir.path().join("source.m4b");
        std::fs::write(&src_m4b, b"fake m4b bytes").unwrap();

        let input = PlacementInput {
            author: "Jane Doe",
            title: "My Book",
            series: None,
            description: Some("<p>A <b>great</b> book.</p>"),
            voice: "af_heart",
            cover_image: None,
        };
        let m4b_path = writer.write(&src_m4b, &input).unwrap();
        let book_dir = m4b_path.parent().unwrap();

        assert!(m4b_path.exists());
        assert_eq!(m4b_path.file_name().unwrap(), "My Book.m4b");
        assert!(!src_m4b.exists());
        assert!(book_dir.join("desc.txt").exists());
        let reader = std::fs::read_to_string(book_dir.join("reader.txt")).unwrap();
        assert_eq!(reader, "AI Narration (af_heart)");
        assert!(writer.already_exists("Jane Doe", "My Book", None));
    }
}
