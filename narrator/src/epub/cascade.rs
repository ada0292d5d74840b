//! Four-strategy chapter detection cascade (§4.3). Each strategy runs in
//! order; the first to produce any raw `(title, body)` pairs wins and its
//! output goes to [`super::filters::post_filter`]. Earlier strategies are
//! preferred because they carry the most structural signal (an author's own
//! TOC beats a guessed heading, which beats a guessed regex, which beats
//! guessing nothing at all).

use crate::settings::CHAPTER_HEADING_RE;
use std::collections::HashMap;

use super::dom;
use super::text::html_to_text;

/// One document in spine order, with KEPUB/drop-cap span unwrapping already
/// applied to `html`.
pub struct SpineFile {
    pub name: String,
    pub html: String,
}

/// A neutral stand-in for the `epub` crate's nav-point tree, built by the
/// caller so this module never has to guess at that crate's exact shape.
pub struct TocNode {
    pub title: String,
    pub href: String,
    pub children: Vec<TocNode>,
}

fn flatten_toc(nodes: &[TocNode]) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for node in nodes {
        entries.push((node.title.clone(), node.href.clone()));
        entries.extend(flatten_toc(&node.children));
    }
    entries
}

fn basename(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or(href)
}

fn split_href(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (href, None),
    }
}

fn find_file<'a>(files: &'a [SpineFile], base_href: &str) -> Option<&'a SpineFile> {
    let target = basename(base_href);
    files
        .iter()
        .find(|f| f.name == base_href || basename(&f.name) == target)
}

/// Strategy 1: follow the book's own table of contents.
pub fn detect_chapters_toc(files: &[SpineFile], toc: &[TocNode]) -> Vec<(String, String)> {
    let entries = flatten_toc(toc);
    if entries.is_empty() {
        return Vec::new();
    }

    // Group entry indices by the spine filename they point into, preserving
    // encounter order both across and within groups.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<(usize, String, Option<String>)>> = HashMap::new();
    for (i, (title, href)) in entries.iter().enumerate() {
        let (base, fragment) = split_href(href);
        let key = basename(base).to_string();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups
            .entry(key)
            .or_default()
            .push((i, title.clone(), fragment.map(str::to_string)));
    }

    let mut chapters: Vec<Option<(String, String)>> = vec![None; entries.len()];
    for key in &order {
        let group = &groups[key];
        let Some(file) = find_file(files, key) else {
            continue;
        };

        let has_fragments = group.iter().any(|(_, _, f)| f.is_some());
        if !has_fragments || group.len() == 1 {
            let text = html_to_text(&file.html);
            if !text.trim().is_empty() {
                for (idx, title, _) in group {
                    chapters[*idx] = Some((title.clone(), text.clone()));
                }
            }
            continue;
        }

        let fragment_ids: Vec<String> = group
            .iter()
            .filter_map(|(_, _, f)| f.clone())
            .collect();
        let buffers = dom::split_by_anchor_ids(&file.html, &fragment_ids);
        let mut buffer_iter = buffers.into_iter();

        for (idx, title, fragment) in group {
            let text = if fragment.is_some() {
                buffer_iter.next().unwrap_or_default()
            } else {
                html_to_text(&file.html)
            };
            let text = super::text::postprocess(&text).trim().to_string();
            if !text.is_empty() {
                chapters[*idx] = Some((title.clone(), text));
            }
        }
    }

    chapters.into_iter().flatten().collect()
}

/// Strategy 2: split on `h1`/`h2` elements within each spine file.
pub fn detect_chapters_headings(files: &[SpineFile]) -> Vec<(String, String)> {
    let mut chapters: Vec<(String, String)> = Vec::new();
    for file in files {
        let parts = dom::split_by_heading_selector(&file.html, "h1, h2");
        if parts.is_empty() {
            let text = html_to_text(&file.html);
            if !text.trim().is_empty() {
                chapters.push((format!("Section {}", chapters.len() + 1), text));
            }
            continue;
        }
        for (title, body) in parts {
            let body = super::text::postprocess(&body);
            if !title.trim().is_empty() {
                chapters.push((title, body));
            }
        }
    }
    chapters
}

/// Strategy 3: scan the whole book's flattened text for `Chapter N` / `Part
/// N` style headings.
pub fn detect_chapters_regex(files: &[SpineFile]) -> Vec<(String, String)> {
    let mut full_text = String::new();
    for file in files {
        full_text.push_str(&html_to_text(&file.html));
        full_text.push_str("\n\n");
    }

    let matches: Vec<_> = CHAPTER_HEADING_RE.find_iter(&full_text).collect();
    if matches.is_empty() {
        return Vec::new();
    }

    let mut chapters = Vec::with_capacity(matches.len());
    for (i, m) in matches.iter().enumerate() {
        let title = m.as_str().trim().to_string();
        let start = m.start();
        let end = matches.get(i + 1).map(|n| n.start()).unwrap_or(full_text.len());
        let mut text = full_text[start..end].trim().to_string();
        if let Some(pos) = text.find('\n') {
            text = text[pos + 1..].trim().to_string();
        }
        chapters.push((title, text));
    }
    chapters
}

/// Strategy 4: no structural signal at all, so accumulate whole paragraphs
/// into `fallback_chapter_words`-sized parts.
pub fn detect_chapters_fixed(files: &[SpineFile], fallback_chapter_words: usize) -> Vec<(String, String)> {
    let mut full_text = String::new();
    for file in files {
        full_text.push_str(&html_to_text(&file.html));
        full_text.push_str("\n\n");
    }

    if full_text.split_whitespace().next().is_none() {
        return Vec::new();
    }

    let mut chapters = Vec::new();
    let mut current_chunk: Vec<&str> = Vec::new();
    let mut current_word_count = 0usize;

    for para in full_text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_words = para.split_whitespace().count();
        if current_word_count + para_words > fallback_chapter_words && !current_chunk.is_empty() {
            chapters.push((
                format!("Part {}", chapters.len() + 1),
                current_chunk.join("\n\n"),
            ));
            current_chunk.clear();
            current_word_count = 0;
        }
        current_chunk.push(para);
        current_word_count += para_words;
    }

    if !current_chunk.is_empty() {
        chapters.push((format!("Part {}", chapters.len() + 1), current_chunk.join("\n\n")));
    }

    chapters
}

/// Runs all four strategies in order, returning the first one that detects
/// anything at all. Post-filtering (which may still drop every chapter it's
/// handed) happens one layer up.
pub fn detect_chapters(
    files: &[SpineFile],
    toc: &[TocNode],
    fallback_chapter_words: usize,
) -> Vec<(String, String)> {
    let toc_chapters = detect_chapters_toc(files, toc);
    if !toc_chapters.is_empty() {
        return toc_chapters;
    }

    let heading_chapters = detect_chapters_headings(files);
    if !heading_chapters.is_empty() {
        return heading_chapters;
    }

    let regex_chapters = detect_chapters_regex(files);
    if !regex_chapters.is_empty() {
        return regex_chapters;
    }

    detect_chapters_fixed(files, fallback_chapter_words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, html: &str) -> SpineFile {
        SpineFile {
            name: name.to_string(),
            html: html.to_string(),
        }
    }

    #[test]
    fn toc_driven_whole_file_per_entry() {
        let files = vec![
            file("ch1.html", "<body><p>First chapter body.</p></body>"),
            file("ch2.html", "<body><p>Second chapter body.</p></body>"),
        ];
        let toc = vec![
            TocNode { title: "One".into(), href: "ch1.html".into(), children: vec![] },
            TocNode { title: "Two".into(), href: "ch2.html".into(), children: vec![] },
        ];
        let chapters = detect_chapters_toc(&files, &toc);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].0, "One");
        assert!(chapters[0].1.contains("First chapter body"));
        assert_eq!(chapters[1].0, "Two");
    }

    #[test]
    fn toc_driven_splits_single_file_by_fragment() {
        let files = vec![file(
            "book.html",
            r#"<body><a id="ch1"></a><p>First.</p><a id="ch2"></a><p>Second.</p></body>"#,
        )];
        let toc = vec![
            TocNode { title: "One".into(), href: "book.html#ch1".into(), children: vec![] },
            TocNode { title: "Two".into(), href: "book.html#ch2".into(), children: vec![] },
        ];
        let chapters = detect_chapters_toc(&files, &toc);
        assert_eq!(chapters.len(), 2);
        assert!(chapters[0].1.contains("First"));
        assert!(!chapters[0].1.contains("Second"));
        assert!(chapters[1].1.contains("Second"));
    }

    #[test]
    fn toc_driven_nested_children_flatten_in_order() {
        let files = vec![file("a.html", "<body><p>A text.</p></body>")];
        let toc = vec![TocNode {
            title: "Part One".into(),
            href: "a.html".into(),
            children: vec![TocNode {
                title: "Nested".into(),
                href: "a.html".into(),
                children: vec![],
            }],
        }];
        let entries = flatten_toc(&toc);
        assert_eq!(entries, vec![
            ("Part One".to_string(), "a.html".to_string()),
            ("Nested".to_string(), "a.html".to_string()),
        ]);
    }

    #[test]
    fn empty_toc_returns_empty() {
        let files = vec![file("a.html", "<body><p>Text.</p></body>")];
        assert!(detect_chapters_toc(&files, &[]).is_empty());
    }

    #[test]
    fn heading_driven_splits_on_h1() {
        let files = vec![file(
            "book.html",
            "<body><h1>Chapter One</h1><p>Body one.</p><h1>Chapter Two</h1><p>Body two.</p></body>",
        )];
        let chapters = detect_chapters_headings(&files);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].0, "Chapter One");
        assert_eq!(chapters[1].0, "Chapter Two");
    }

    #[test]
    fn heading_driven_falls_back_to_whole_file_section() {
        let files = vec![file("a.html", "<body><p>Just a paragraph.</p></body>")];
        let chapters = detect_chapters_headings(&files);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].0, "Section 1");
    }

    #[test]
    fn regex_driven_finds_chapter_markers() {
        let files = vec![file(
            "a.html",
            "<body><p>Chapter 1</p><p>First body text here.</p><p>Chapter 2</p><p>Second body text here.</p></body>",
        )];
        let chapters = detect_chapters_regex(&files);
        assert_eq!(chapters.len(), 2);
        assert!(chapters[0].0.starts_with("Chapter 1"));
        assert!(chapters[1].1.contains("Second body text"));
    }

    #[test]
    fn regex_driven_empty_when_no_markers() {
        let files = vec![file("a.html", "<body><p>Nothing special here.</p></body>")];
        assert!(detect_chapters_regex(&files).is_empty());
    }

    #[test]
    fn fixed_fallback_accumulates_to_word_budget() {
        let para = "word ".repeat(400);
        let html = format!("<body><p>{para}</p><p>{para}</p><p>{para}</p></body>");
        let files = vec![file("a.html", &html)];
        let chapters = detect_chapters_fixed(&files, 500);
        assert!(chapters.len() >= 2);
        assert_eq!(chapters[0].0, "Part 1");
    }

    #[test]
    fn fixed_fallback_empty_input_yields_nothing() {
        let files = vec![file("a.html", "<body></body>")];
        assert!(detect_chapters_fixed(&files, 5000).is_empty());
    }

    #[test]
    fn detect_chapters_prefers_toc_over_headings() {
        let files = vec![file(
            "a.html",
            "<body><h1>Ignored Heading</h1><p>Text.</p></body>",
        )];
        let toc = vec![TocNode { title: "Real Title".into(), href: "a.html".into(), children: vec![] }];
        let chapters = detect_chapters(&files, &toc, 5000);
        assert_eq!(chapters[0].0, "Real Title");
    }

    #[test]
    fn detect_chapters_falls_through_to_fixed_when_nothing_else_matches() {
        let para = "word ".repeat(10);
        let files = vec![file("a.html", &format!("<body><p>{para}</p></body>"))];
        let chapters = detect_chapters(&files, &[], 5000);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].0, "Part 1");
    }
}
