//! EPUB/KEPUB extraction (C3): parses an archive, runs the four-strategy
//! chapter detection cascade (§4.3), and resolves cover art and metadata.

pub mod cascade;
pub mod cover;
pub mod dom;
pub mod filters;
pub mod kepub;
pub mod text;

use std::path::Path;

use epub::doc::EpubDoc;

use crate::error::{NarratorError, Result};
use crate::models::{BookMetadata, ExtractedBook};
use crate::settings::Settings;
use cascade::{SpineFile, TocNode};
use cover::ArchiveImage;

/// Parses `path` and returns its chapters, metadata, and cover art. `path`'s
/// own extension decides KEPUB handling (`*.kepub.epub` or `*.kepub`).
pub fn extract(path: &Path, settings: &Settings) -> Result<ExtractedBook> {
    if !path.exists() {
        return Err(NarratorError::EpubExtractionError {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    let is_kepub = is_kepub_path(path);

    let mut doc = EpubDoc::new(path).map_err(|e| NarratorError::EpubExtractionError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let metadata = extract_metadata(&doc, path);
    let spine_files = load_spine_files(&mut doc, is_kepub);
    let toc = build_toc(&doc);

    let raw_chapters = cascade::detect_chapters(&spine_files, &toc, settings.fallback_chapter_words);
    let chapters = filters::post_filter(raw_chapters, settings.min_chapter_words);

    if chapters.is_empty() {
        return Err(NarratorError::EpubExtractionError {
            path: path.to_path_buf(),
            reason: "no chapters found with sufficient text".to_string(),
        });
    }

    let cover_image = resolve_cover(path, &mut doc);

    tracing::info!(
        chapters = chapters.len(),
        book = %metadata.title,
        "extracted chapters"
    );

    Ok(ExtractedBook {
        metadata,
        chapters,
        cover_image,
    })
}

fn is_kepub_path(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    name.ends_with(".kepub.epub") || name.ends_with(".kepub")
}

fn extract_metadata(doc: &EpubDoc<std::io::BufReader<std::fs::File>>, path: &Path) -> BookMetadata {
    let title = doc.mdata("title").filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown Title".to_string())
    });
    let author = doc
        .mdata("creator")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Unknown Author".to_string());
    let description = doc.mdata("description").filter(|s| !s.trim().is_empty());
    let series = doc.mdata("calibre:series").filter(|s| !s.trim().is_empty());
    let series_index = doc
        .mdata("calibre:series_index")
        .and_then(|s| s.trim().parse::<f64>().ok());

    BookMetadata {
        title,
        author,
        series,
        series_index,
        description,
    }
}

/// Pulls every spine document out of the archive in reading order, applying
/// KEPUB `koboSpan`/drop-cap unwrapping up front so every downstream strategy
/// sees already-clean HTML.
fn load_spine_files(doc: &mut EpubDoc<std::io::BufReader<std::fs::File>>, is_kepub: bool) -> Vec<SpineFile> {
    let spine_ids: Vec<String> = doc.spine.clone();
    let mut files = Vec::with_capacity(spine_ids.len());

    for id in spine_ids {
        let Some((content, mime)) = doc.get_resource(&id) else {
            continue;
        };
        if !mime.contains("html") && !mime.contains("xml") {
            continue;
        }
        let Ok(mut html) = String::from_utf8(content) else {
            continue;
        };
        if is_kepub {
            html = kepub::unwrap_kobo_spans(&html);
        }
        html = kepub::unwrap_dropcap_spans(&html);

        let name = doc
            .resources
            .get(&id)
            .map(|(path, _)| path.to_string_lossy().to_string())
            .unwrap_or(id);

        files.push(SpineFile { name, html });
    }

    files
}

fn build_toc(doc: &EpubDoc<std::io::BufReader<std::fs::File>>) -> Vec<TocNode> {
    doc.toc.iter().map(navpoint_to_toc).collect()
}

fn navpoint_to_toc(np: &epub::doc::NavPoint) -> TocNode {
    TocNode {
        title: np.label.clone(),
        href: np.content.to_string_lossy().to_string(),
        children: np.children.iter().map(navpoint_to_toc).collect(),
    }
}

fn resolve_cover(path: &Path, doc: &mut EpubDoc<std::io::BufReader<std::fs::File>>) -> Option<Vec<u8>> {
    if let Some(bytes) = cover::find_external_cover(path) {
        return Some(bytes);
    }
    if let Some((bytes, _mime)) = doc.get_cover() {
        return Some(bytes);
    }

    let ids: Vec<String> = doc
        .resources
        .iter()
        .filter(|(_, (_, mime))| mime.starts_with("image/"))
        .map(|(id, _)| id.clone())
        .collect();
    let images: Vec<ArchiveImage> = ids
        .into_iter()
        .filter_map(|id| {
            let (data, _mime) = doc.get_resource(&id)?;
            let name = doc
                .resources
                .get(&id)
                .map(|(p, _)| p.to_string_lossy().to_string())
                .unwrap_or_else(|| id.clone());
            Some(ArchiveImage { id, name, data })
        })
        .collect();

    cover::resolve_embedded_cover(None, &images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kepub_path_detection() {
        assert!(is_kepub_path(Path::new("book.kepub.epub")));
        assert!(is_kepub_path(Path::new("book.kepub")));
        assert!(!is_kepub_path(Path::new("book.epub")));
    }
}
