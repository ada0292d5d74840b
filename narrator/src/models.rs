//! In-memory domain types shared across components.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Epub,
    Kepub,
}

/// A source ebook record as returned by a `LibraryReader`.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub cover: Option<PathBuf>,
    pub source_path: PathBuf,
    pub format: BookFormat,
}

/// A narration-ready, post-filtered chapter.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub title: String,
    pub text: String,
    pub word_count: usize,
}

impl Chapter {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            title: title.into(),
            text,
            word_count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub description: Option<String>,
}

/// Output of the EPUB extraction cascade.
#[derive(Debug, Clone)]
pub struct ExtractedBook {
    pub metadata: BookMetadata,
    pub chapters: Vec<Chapter>,
    pub cover_image: Option<Vec<u8>>,
}

/// Process-wide, in-memory queue control. Volatile across restarts by design
/// (§9: "documented volatile-on-restart semantics").
#[derive(Debug, Default)]
pub struct QueueState {
    paused: AtomicBool,
    current_job_id: AtomicI64,
}

impl QueueState {
    pub fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            current_job_id: AtomicI64::new(0),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn current_job_id(&self) -> Option<i64> {
        match self.current_job_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn set_current_job(&self, id: Option<i64>) {
        self.current_job_id.store(id.unwrap_or(0), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_state_starts_unpaused_and_idle() {
        let q = QueueState::new();
        assert!(!q.is_paused());
        assert_eq!(q.current_job_id(), None);
    }

    #[test]
    fn queue_state_pause_resume_round_trips() {
        let q = QueueState::new();
        q.pause();
        assert!(q.is_paused());
        q.resume();
        assert!(!q.is_paused());
    }

    #[test]
    fn chapter_word_count_matches_whitespace_split() {
        let c = Chapter::new("Title", "one two three");
        assert_eq!(c.word_count, 3);
    }
}
