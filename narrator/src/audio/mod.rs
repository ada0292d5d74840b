//! M4BBuilder (C4): WAV-per-chapter -> validated M4B audiobook.

pub mod assembler;
mod metadata;

pub use assembler::{build_m4b, probe_duration_ms, ValidationResult};
pub use metadata::ChapterInfo;
