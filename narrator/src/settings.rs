//! Internal tunables: compile-time defaults overlaid by the `settings` table,
//! plus the compiled regex tables used by extraction and filename sanitization.
//!
//! This is distinct from (and does not replace) environment-driven server
//! configuration, which is out of scope for this crate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,
    #[serde(default = "default_token_floor")]
    pub token_floor: usize,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f32,

    #[serde(default = "default_min_chapter_words")]
    pub min_chapter_words: usize,
    #[serde(default = "default_fallback_chapter_words")]
    pub fallback_chapter_words: usize,

    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: u32,
    #[serde(default = "default_aac_bitrate")]
    pub aac_bitrate: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_tts_startup_timeout")]
    pub tts_startup_timeout_secs: u64,
    #[serde(default = "default_tts_warmup_pause")]
    pub tts_warmup_pause_secs: u64,
    #[serde(default = "default_tts_cooldown")]
    pub tts_cooldown_secs: f32,
    #[serde(default = "default_tts_rest_interval")]
    pub tts_rest_interval: u32,
    #[serde(default = "default_tts_rest_duration")]
    pub tts_rest_duration_secs: u64,

    #[serde(default)]
    pub quiet_hours_start: Option<String>,
    #[serde(default)]
    pub quiet_hours_end: Option<String>,
    #[serde(default)]
    pub delay_between_books_secs: u64,

    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_tts_url")]
    pub tts_url: String,
}

fn default_token_limit() -> usize {
    250
}
fn default_token_floor() -> usize {
    80
}
fn default_chars_per_token() -> f32 {
    3.5
}
fn default_min_chapter_words() -> usize {
    50
}
fn default_fallback_chapter_words() -> usize {
    5000
}
fn default_crossfade_ms() -> u32 {
    50
}
fn default_aac_bitrate() -> String {
    "128k".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_tts_startup_timeout() -> u64 {
    300
}
fn default_tts_warmup_pause() -> u64 {
    15
}
fn default_tts_cooldown() -> f32 {
    1.0
}
fn default_tts_rest_interval() -> u32 {
    10
}
fn default_tts_rest_duration() -> u64 {
    5
}
fn default_voice() -> String {
    "af_heart".to_string()
}
fn default_tts_url() -> String {
    "http://kokoro-tts:8880".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
            token_floor: default_token_floor(),
            chars_per_token: default_chars_per_token(),
            min_chapter_words: default_min_chapter_words(),
            fallback_chapter_words: default_fallback_chapter_words(),
            crossfade_ms: default_crossfade_ms(),
            aac_bitrate: default_aac_bitrate(),
            max_retries: default_max_retries(),
            tts_startup_timeout_secs: default_tts_startup_timeout(),
            tts_warmup_pause_secs: default_tts_warmup_pause(),
            tts_cooldown_secs: default_tts_cooldown(),
            tts_rest_interval: default_tts_rest_interval(),
            tts_rest_duration_secs: default_tts_rest_duration(),
            quiet_hours_start: None,
            quiet_hours_end: None,
            delay_between_books_secs: 0,
            voice: default_voice(),
            tts_url: default_tts_url(),
        }
    }
}

impl Settings {
    /// `~/.config/narrator/narrator.toml`
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("narrator")
            .join("narrator.toml"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Skip-title front-matter patterns (§6, authoritative literal set).
pub static SKIP_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(copyright|legal|disclaimer|dedication|epigraph|acknowledgm|table of contents|contents|title page|about the (author|publisher)|also by|other books|cover|frontispiece|half.?title|colophon|imprint|praise|acclaim|blurb|reviews|notes|endnotes|footnotes|index|bibliography|references|glossary|further reading|sources)")
        .expect("static regex is valid")
});

/// Front-matter body boilerplate signatures (§6, authoritative literal set).
pub static BODY_SIGNATURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(all rights reserved|isbn[\s:\-]|published by|library of congress|cataloging.in.publication|printed in|first (edition|printing|published)|no part of this (book|publication)|permission.*(publisher|reproduce)|cover (design|art|image|illustration) by)")
        .expect("static regex is valid")
});

/// A line that looks like a TOC/listing entry.
pub static TOC_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(chapter|part|section|appendix|introduction|foreword|preface|prologue|epilogue)\b|^\d+[.)]\s")
        .expect("static regex is valid")
});

/// `Chapter N` / `Part N` style heading used by the regex-driven cascade strategy.
pub static CHAPTER_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(Chapter \d+|CHAPTER \d+|Part \w+|PART \w+)")
        .expect("static regex is valid")
});

/// Filesystem-hostile characters replaced by `_` in sanitized path components.
pub const SANITIZE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if SANITIZE_CHARS.contains(&c) {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = Settings::default();
        assert_eq!(s.token_limit, 250);
        assert_eq!(s.token_floor, 80);
        assert_eq!(s.chars_per_token, 3.5);
        assert_eq!(s.min_chapter_words, 50);
        assert_eq!(s.fallback_chapter_words, 5000);
        assert_eq!(s.max_retries, 5);
    }

    #[test]
    fn sanitize_replaces_hostile_chars() {
        assert_eq!(sanitize_filename("Foo: Bar/Baz?"), "Foo_ Bar_Baz_");
    }

    #[test]
    fn skip_title_matches_known_front_matter() {
        assert!(SKIP_TITLE_RE.is_match("Copyright"));
        assert!(SKIP_TITLE_RE.is_match("Table of Contents"));
        assert!(SKIP_TITLE_RE.is_match("About the Author"));
        assert!(!SKIP_TITLE_RE.is_match("Chapter One"));
    }

    #[test]
    fn body_signature_matches_boilerplate() {
        assert!(BODY_SIGNATURE_RE.is_match("All rights reserved."));
        assert!(BODY_SIGNATURE_RE.is_match("ISBN: 978-0-00-000000-0"));
        assert!(!BODY_SIGNATURE_RE.is_match("It was a dark and stormy night."));
    }

    #[test]
    fn chapter_heading_matches_expected_forms() {
        assert!(CHAPTER_HEADING_RE.is_match("Chapter 1\nIt was..."));
        assert!(CHAPTER_HEADING_RE.is_match("PART ONE"));
        assert!(!CHAPTER_HEADING_RE.is_match("chapter one lowercase"));
    }
}
