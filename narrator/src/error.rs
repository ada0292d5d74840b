//! Crate-wide error hierarchy.

use std::path::PathBuf;
use thiserror::Error;

use crate::db::JobStatus;

#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("failed to read from library: {0}")]
    LibraryReadFailure(String),

    #[error("epub extraction failed for {path}: {reason}")]
    EpubExtractionError { path: PathBuf, reason: String },

    #[error("TTS endpoint unavailable: {0}")]
    TtsUnavailable(String),

    #[error("TTS synthesis failed after retries: {0}")]
    TtsSynthesisError(String),

    #[error("M4B build failed: {0}")]
    M4BBuildError(String),

    #[error("failed to write output: {0}")]
    OutputWriteError(String),

    #[error("job {0} not found")]
    JobNotFound(i64),

    #[error("job {id} cannot transition from {from:?} via {requested}")]
    JobStateConflict {
        id: i64,
        from: JobStatus,
        requested: &'static str,
    },

    #[error("a non-failed job already exists for library_book_id {0}")]
    DuplicateJob(i64),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("background task failed: {0}")]
    TaskJoinError(String),
}

pub type Result<T> = std::result::Result<T, NarratorError>;
