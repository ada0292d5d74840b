//! The `LibraryReader` capability (§6): the seam between this crate and
//! whatever catalogs the source ebooks. Both concrete implementations named
//! in the design notes — a database-backed reader and a bare-folder scanner —
//! belong to the collaborating service and are out of scope here; this crate
//! only depends on the trait.

use std::path::PathBuf;

use crate::error::Result;
use crate::models::Book;

/// Read-only view over a library of source ebooks. Implementations are
/// expected to be selected once at startup and shared behind an `Arc`.
pub trait LibraryReader: Send + Sync {
    fn list_books(&self) -> Result<Vec<Book>>;
    fn get_book(&self, id: i64) -> Result<Book>;
    fn get_source_path(&self, book: &Book) -> PathBuf;
    fn get_cover_path(&self, book: &Book) -> Option<PathBuf>;
}
