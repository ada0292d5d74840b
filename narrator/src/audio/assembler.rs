//! M4BBuilder (C4): transcode each chapter WAV to AAC, probe its real
//! duration, stream-copy concat the AACs, embed chapter markers computed
//! from those probed durations, mux in a cover, and validate the result.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::metadata::{build_chapter_markers, create_ffmpeg_metadata};
use crate::bootstrap::ffmpeg as bootstrap_ffmpeg;
use crate::error::{NarratorError, Result};

fn ffmpeg_command() -> Command {
    if let Ok(path) = bootstrap_ffmpeg::get_ffmpeg_executable() {
        if path.exists() {
            return Command::new(path);
        }
    }
    Command::new("ffmpeg")
}

fn ffprobe_command() -> Command {
    if let Ok(path) = bootstrap_ffmpeg::get_ffprobe_executable() {
        if path.exists() {
            return Command::new(path);
        }
    }
    Command::new("ffprobe")
}

fn build_error(context: &str, output: &std::process::Output) -> NarratorError {
    NarratorError::M4BBuildError(format!(
        "{context}: {}",
        String::from_utf8_lossy(&output.stderr)
    ))
}

/// Transcodes one chapter WAV to AAC at `bitrate` (e.g. `"128k"`).
fn transcode_to_aac(wav_path: &Path, aac_path: &Path, bitrate: &str) -> Result<()> {
    let output = ffmpeg_command()
        .args(["-y", "-i"])
        .arg(wav_path)
        .args(["-c:a", "aac", "-b:a", bitrate, "-f", "mp4"])
        .arg(aac_path)
        .output()
        .map_err(NarratorError::Io)?;

    if !output.status.success() {
        return Err(build_error("ffmpeg transcode failed", &output));
    }
    Ok(())
}

/// Probes a media file's duration via ffprobe, in milliseconds.
pub fn probe_duration_ms(path: &Path) -> Result<u64> {
    let output = ffprobe_command()
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .map_err(NarratorError::Io)?;

    if !output.status.success() {
        return Err(build_error("ffprobe duration failed", &output));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    let duration_secs: f64 = duration_str
        .trim()
        .parse()
        .map_err(|e| NarratorError::M4BBuildError(format!("failed to parse duration: {e}")))?;
    Ok((duration_secs * 1000.0).round() as u64)
}

fn probe_chapter_count(path: &Path) -> Result<usize> {
    let output = ffprobe_command()
        .args(["-v", "quiet", "-show_entries", "chapter=id", "-of", "csv=p=0"])
        .arg(path)
        .output()
        .map_err(NarratorError::Io)?;

    if !output.status.success() {
        return Err(build_error("ffprobe chapter count failed", &output));
    }

    let count = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .count();
    Ok(count)
}

/// Stream-copy concatenates AAC files in order into a single `.m4a`.
fn concat_stream_copy(aac_files: &[PathBuf], output_path: &Path, temp_dir: &Path) -> Result<()> {
    if aac_files.is_empty() {
        return Err(NarratorError::M4BBuildError("no chapter audio to concatenate".to_string()));
    }

    let list_file = temp_dir.join("concat_list.txt");
    let mut list_content = String::new();
    for path in aac_files {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        list_content.push_str(&format!("file '{escaped}'\n"));
    }
    std::fs::write(&list_file, list_content).map_err(NarratorError::Io)?;

    let output = ffmpeg_command()
        .args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(&list_file)
        .args(["-c", "copy"])
        .arg(output_path)
        .output()
        .map_err(NarratorError::Io)?;

    if !output.status.success() {
        return Err(build_error("ffmpeg concat failed", &output));
    }
    Ok(())
}

fn mux_final(
    combined_audio: &Path,
    metadata_file: &Path,
    cover_path: Option<&Path>,
    output_path: &Path,
) -> Result<()> {
    let mut cmd = ffmpeg_command();
    cmd.args(["-y", "-i"]).arg(combined_audio).arg("-i").arg(metadata_file);

    if let Some(cover) = cover_path {
        cmd.arg("-i").arg(cover);
        cmd.args([
            "-map", "0:a", "-map", "2:v", "-c:v", "mjpeg", "-disposition:v:0", "attached_pic",
        ]);
    } else {
        cmd.args(["-map", "0:a"]);
    }

    cmd.args(["-map_metadata", "1", "-c:a", "copy", "-movflags", "+faststart", "-f", "mp4"])
        .arg(output_path);

    let output = cmd.output().map_err(NarratorError::Io)?;
    if !output.status.success() {
        return Err(build_error("ffmpeg mux failed", &output));
    }
    Ok(())
}

/// Result of validating the final M4B (§4.4 step 6).
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_ms: u64,
    pub actual_chapters: usize,
    pub expected_chapters: usize,
}

fn validate(output_path: &Path, expected_chapters: usize) -> Result<ValidationResult> {
    let file_meta = std::fs::metadata(output_path).map_err(NarratorError::Io)?;
    if file_meta.len() == 0 {
        return Err(NarratorError::M4BBuildError("output file is empty".to_string()));
    }

    let duration_ms = probe_duration_ms(output_path)?;
    let actual_chapters = probe_chapter_count(output_path)?;

    if actual_chapters != expected_chapters {
        return Err(NarratorError::M4BBuildError(format!(
            "chapter count mismatch: expected {expected_chapters}, got {actual_chapters}"
        )));
    }

    Ok(ValidationResult {
        path: output_path.to_path_buf(),
        size_bytes: file_meta.len(),
        duration_ms,
        actual_chapters,
        expected_chapters,
    })
}

/// Full per-book pipeline: each `(title, wav_path)` is one already-synthesized
/// chapter, in reading order. Returns the validated result on success.
pub fn build_m4b(
    chapters: &[(String, PathBuf)],
    title: &str,
    author: &str,
    date: Option<&str>,
    cover_path: Option<&Path>,
    output_path: &Path,
    aac_bitrate: &str,
    cleanup_wavs: bool,
) -> Result<ValidationResult> {
    if chapters.is_empty() {
        return Err(NarratorError::M4BBuildError("no chapters to assemble".to_string()));
    }

    let temp_dir = TempDir::new().map_err(NarratorError::Io)?;
    let mut aac_files = Vec::with_capacity(chapters.len());
    let mut durations_ms = Vec::with_capacity(chapters.len());
    let titles: Vec<String> = chapters.iter().map(|(t, _)| t.clone()).collect();

    for (i, (chapter_title, wav_path)) in chapters.iter().enumerate() {
        let aac_path = temp_dir.path().join(format!("chapter_{i:04}.m4a"));
        transcode_to_aac(wav_path, &aac_path, aac_bitrate)?;
        if cleanup_wavs {
            let _ = std::fs::remove_file(wav_path);
        }
        let duration = probe_duration_ms(&aac_path)?;
        tracing::info!(chapter = %chapter_title, duration_ms = duration, "transcoded chapter");
        durations_ms.push(duration);
        aac_files.push(aac_path);
    }

    let combined = temp_dir.path().join("combined.m4a");
    concat_stream_copy(&aac_files, &combined, temp_dir.path())?;

    let markers = build_chapter_markers(&titles, &durations_ms);
    let metadata_file = temp_dir.path().join("metadata.txt");
    create_ffmpeg_metadata(title, author, date, &markers, &metadata_file)?;

    mux_final(&combined, &metadata_file, cover_path, output_path)?;

    validate(output_path, chapters.len())
}

pub fn is_ffmpeg_available() -> bool {
    ffmpeg_command().arg("-version").output().map(|o| o.status.success()).unwrap_or(false)
}

pub fn is_ffprobe_available() -> bool {
    ffprobe_command().arg("-version").output().map(|o| o.status.success()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_probe_does_not_panic() {
        let _ = is_ffmpeg_available();
        let _ = is_ffprobe_available();
    }

    #[test]
    fn build_m4b_rejects_empty_chapter_list() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_m4b(&[], "Title", "Author", None, None, &dir.path().join("out.m4b"), "128k", false);
        assert!(result.is_err());
    }
}
