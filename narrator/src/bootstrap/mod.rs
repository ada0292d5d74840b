//! Bootstrap module for the FFmpeg toolchain `audio::assembler` needs.
//!
//! Synthesis always happens against the remote TTS endpoint, so there is no
//! local-runtime install path here — only the portable FFmpeg/FFprobe
//! binaries the M4B pipeline shells out to.

pub mod download;
pub mod ffmpeg;
pub mod platform;
pub mod versions;

use anyhow::{Context, Result};
use platform::Platform;
use std::path::PathBuf;
use versions::{get_data_dir, InstalledVersions, FFMPEG_VERSION};

/// Paths to bootstrapped components.
pub struct BootstrapPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Bootstrap status indicating what needs to be done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStatus {
    /// Everything is ready to use.
    Ready,
    /// FFmpeg needs to be downloaded (first run).
    NeedsFfmpeg,
    /// Platform has changed, needs reinstall.
    PlatformChanged,
}

/// Check the current bootstrap status.
pub fn check_status() -> Result<BootstrapStatus> {
    let platform = Platform::detect()?;
    let data_dir = get_data_dir()?;
    let versions = InstalledVersions::load(&data_dir)?;

    if versions.platform.is_some() && !versions.platform_matches(&platform.to_version_string()) {
        return Ok(BootstrapStatus::PlatformChanged);
    }
    if !ffmpeg::is_ffmpeg_installed()? {
        return Ok(BootstrapStatus::NeedsFfmpeg);
    }
    Ok(BootstrapStatus::Ready)
}

/// Ensure FFmpeg/FFprobe are present, downloading them if needed.
pub async fn ensure_bootstrapped() -> Result<BootstrapPaths> {
    let status = check_status()?;
    match status {
        BootstrapStatus::Ready => {}
        BootstrapStatus::NeedsFfmpeg | BootstrapStatus::PlatformChanged => {
            run_ffmpeg_bootstrap().await?;
        }
    }
    Ok(BootstrapPaths {
        ffmpeg: ffmpeg::get_ffmpeg_executable()?,
        ffprobe: ffmpeg::get_ffprobe_executable()?,
    })
}

async fn run_ffmpeg_bootstrap() -> Result<()> {
    let platform = Platform::detect()?;
    let data_dir = get_data_dir()?;
    let mut versions = InstalledVersions::load(&data_dir)?;

    eprintln!("Downloading FFmpeg {}...", FFMPEG_VERSION);
    ffmpeg::install_ffmpeg(&platform).await?;
    versions.set_ffmpeg(FFMPEG_VERSION);
    versions.set_platform(&platform.to_version_string());
    versions.save(&data_dir)?;
    Ok(())
}

/// Remove all bootstrap data (for uninstall command).
pub fn clean_all() -> Result<CleanupStats> {
    let data_dir = get_data_dir()?;
    let mut stats = CleanupStats::default();

    if data_dir.exists() {
        stats.size = dir_size(&data_dir).unwrap_or(0);
        std::fs::remove_dir_all(&data_dir).context("failed to remove bootstrap data directory")?;
        stats.removed = true;
    }
    Ok(stats)
}

#[derive(Default)]
pub struct CleanupStats {
    pub removed: bool,
    pub size: u64,
}

fn dir_size(path: &std::path::Path) -> Result<u64> {
    let mut size = 0;
    if path.is_file() {
        return Ok(std::fs::metadata(path)?.len());
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            size += dir_size(&entry.path())?;
        } else {
            size += metadata.len();
        }
    }
    Ok(size)
}

/// Get information about the current bootstrap state.
pub fn get_info() -> Result<String> {
    let platform = Platform::detect()?;
    let data_dir = get_data_dir()?;
    let versions = InstalledVersions::load(&data_dir)?;
    let status = check_status()?;

    let mut info = String::new();
    info.push_str(&format!("Platform: {}\n", platform));
    info.push_str(&format!("Data directory: {:?}\n", data_dir));
    info.push_str(&format!("Bootstrap status: {:?}\n\n", status));

    if let Some(ref v) = versions.ffmpeg_version {
        info.push_str(&format!("FFmpeg version: {}\n", v));
    } else {
        info.push_str("FFmpeg: not installed\n");
    }
    info.push_str(&format!(
        "FFprobe installed: {}\n",
        ffmpeg::is_ffprobe_installed().unwrap_or(false)
    ));

    Ok(info)
}
