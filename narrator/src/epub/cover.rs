//! Cover image resolution cascade (§4.3): a sibling file next to the archive
//! takes precedence over anything embedded in the EPUB itself, since readers
//! that ship a separate cover usually keep it more current than the OPF
//! metadata.

use std::path::Path;

/// One image-typed item pulled from the archive, independent of whatever
/// shape the EPUB-parsing crate's own item type takes.
pub struct ArchiveImage {
    pub id: String,
    pub name: String,
    pub data: Vec<u8>,
}

const EXTERNAL_COVER_NAMES: &[&str] = &["cover.jpg", "cover.jpeg", "cover.png"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];

pub fn is_image_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Strategy 1: a `cover.{jpg,jpeg,png}` sitting next to the archive file.
pub fn find_external_cover(epub_path: &Path) -> Option<Vec<u8>> {
    let dir = epub_path.parent()?;
    for name in EXTERNAL_COVER_NAMES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            if let Ok(bytes) = std::fs::read(&candidate) {
                return Some(bytes);
            }
        }
    }
    None
}

/// Strategies 2-4: the OPF `cover` meta-tag's referenced item id, then any
/// item whose name mentions "cover", then the first embedded image at all.
pub fn resolve_embedded_cover(cover_item_id: Option<&str>, images: &[ArchiveImage]) -> Option<Vec<u8>> {
    if let Some(id) = cover_item_id {
        if let Some(img) = images.iter().find(|i| i.id == id) {
            return Some(img.data.clone());
        }
    }

    if let Some(img) = images.iter().find(|i| i.name.to_lowercase().contains("cover")) {
        return Some(img.data.clone());
    }

    images.first().map(|i| i.data.clone())
}

/// Full cascade: external sibling file, then whatever the archive itself offers.
pub fn resolve_cover(
    epub_path: &Path,
    cover_item_id: Option<&str>,
    images: &[ArchiveImage],
) -> Option<Vec<u8>> {
    find_external_cover(epub_path).or_else(|| resolve_embedded_cover(cover_item_id, images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn image(id: &str, name: &str, data: &[u8]) -> ArchiveImage {
        ArchiveImage { id: id.to_string(), name: name.to_string(), data: data.to_vec() }
    }

    #[test]
    fn is_image_name_recognizes_common_extensions() {
        assert!(is_image_name("Cover.JPG"));
        assert!(is_image_name("foo/bar.png"));
        assert!(!is_image_name("chapter1.xhtml"));
    }

    #[test]
    fn external_cover_wins_over_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let epub_path = dir.path().join("book.epub");
        std::fs::write(&epub_path, b"fake epub").unwrap();
        let cover_path = dir.path().join("cover.jpg");
        let mut f = std::fs::File::create(&cover_path).unwrap();
        f.write_all(b"external-bytes").unwrap();

        let images = vec![image("img1", "images/embedded.png", b"embedded-bytes")];
        let cover = resolve_cover(&epub_path, Some("img1"), &images).unwrap();
        assert_eq!(cover, b"external-bytes");
    }

    #[test]
    fn falls_back_to_meta_referenced_item() {
        let dir = tempfile::tempdir().unwrap();
        let epub_path = dir.path().join("book.epub");
        let images = vec![
            image("img1", "images/one.png", b"one"),
            image("img2", "images/two.png", b"two"),
        ];
        let cover = resolve_cover(&epub_path, Some("img2"), &images).unwrap();
        assert_eq!(cover, b"two");
    }

    #[test]
    fn falls_back_to_name_containing_cover() {
        let dir = tempfile::tempdir().unwrap();
        let epub_path = dir.path().join("book.epub");
        let images = vec![
            image("img1", "images/one.png", b"one"),
            image("img2", "images/cover-art.png", b"cover-bytes"),
        ];
        let cover = resolve_cover(&epub_path, None, &images).unwrap();
        assert_eq!(cover, b"cover-bytes");
    }

    #[test]
    fn falls_back_to_first_image_when_nothing_else_matches() {
        let dir = tempfile::tempdir().unwrap();
        let epub_path = dir.path().join("book.epub");
        let images = vec![image("img1", "images/one.png", b"first")];
        let cover = resolve_cover(&epub_path, None, &images).unwrap();
        assert_eq!(cover, b"first");
    }

    #[test]
    fn no_cover_anywhere_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let epub_path = dir.path().join("book.epub");
        assert!(resolve_cover(&epub_path, None, &[]).is_none());
    }
}
