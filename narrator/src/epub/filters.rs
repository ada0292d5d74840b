//! Post-filtering applied to every chapter produced by the detection
//! cascade (§4.3).

use crate::models::Chapter;
use crate::settings::{BODY_SIGNATURE_RE, SKIP_TITLE_RE, TOC_LINE_RE};

/// Strips a duplicated title from the opening of the body: if the first
/// `title_words.len()` word tokens within the first `3 * title.len()`
/// characters of the body match the title word-for-word (case-insensitive),
/// those tokens (and the whitespace separating them) are removed.
pub fn strip_title_from_body(title: &str, body: &str) -> String {
    let title_words: Vec<String> = title
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if title_words.is_empty() {
        return body.trim_start().to_string();
    }

    let window_len = (3 * title.chars().count()).max(title.chars().count());
    let window: String = body.chars().take(window_len).collect();

    let mut word_spans: Vec<(usize, usize)> = Vec::new();
    let mut iter = window.char_indices().peekable();
    while let Some((start, c)) = iter.next() {
        if c.is_whitespace() {
            continue;
        }
        let mut end = start + c.len_utf8();
        while let Some(&(i, c2)) = iter.peek() {
            if c2.is_whitespace() {
                break;
            }
            end = i + c2.len_utf8();
            iter.next();
        }
        word_spans.push((start, end));
        if word_spans.len() >= title_words.len() {
            break;
        }
    }

    if word_spans.len() < title_words.len() {
        return body.trim_start().to_string();
    }

    let matches = word_spans
        .iter()
        .zip(title_words.iter())
        .all(|(&(s, e), tw)| {
            window[s..e]
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
                == tw.trim_matches(|c: char| !c.is_alphanumeric())
        });

    if matches {
        let cut = word_spans.last().unwrap().1;
        body[cut..].trim_start().to_string()
    } else {
        body.trim_start().to_string()
    }
}

pub fn is_skip_title(title: &str) -> bool {
    SKIP_TITLE_RE.is_match(title.trim())
}

pub fn has_body_signature(body: &str) -> bool {
    BODY_SIGNATURE_RE.is_match(body)
}

/// A chapter body "looks like a TOC" when at least 5 non-empty lines exist
/// and at least 4-of-5 (ratio >= 0.3) look like chapter-listing entries.
pub fn looks_like_toc(body: &str) -> bool {
    let lines: Vec<&str> = body.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() < 5 {
        return false;
    }
    let matching = lines.iter().filter(|l| TOC_LINE_RE.is_match(l)).count();
    let ratio = matching as f32 / lines.len() as f32;
    ratio >= 0.3
}

/// Applies the full post-filter pipeline to a raw `(title, body)` cascade
/// result, yielding only chapters that survive every drop rule.
pub fn post_filter(raw: Vec<(String, String)>, min_chapter_words: usize) -> Vec<Chapter> {
    raw.into_iter()
        .filter_map(|(title, body)| {
            let stripped = strip_title_from_body(&title, &body);
            let word_count = stripped.split_whitespace().count();

            if word_count < min_chapter_words {
                return None;
            }
            if is_skip_title(&title) {
                return None;
            }
            if word_count < 500 && has_body_signature(&stripped) {
                return None;
            }
            if looks_like_toc(&stripped) {
                return None;
            }
            if stripped.trim().is_empty() {
                return None;
            }

            Some(Chapter::new(title, stripped))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_duplicated_title_case_insensitively() {
        let body = "Chapter 1\nIt was a dark and stormy night.";
        let stripped = strip_title_from_body("Chapter 1", body);
        assert_eq!(stripped, "It was a dark and stormy night.");
    }

    #[test]
    fn leaves_body_untouched_when_title_not_repeated() {
        let body = "It was a dark and stormy night.";
        let stripped = strip_title_from_body("Chapter 1", body);
        assert_eq!(stripped, body);
    }

    #[test]
    fn detects_front_matter_titles() {
        assert!(is_skip_title("Copyright"));
        assert!(is_skip_title("Table of Contents"));
        assert!(!is_skip_title("Chapter One"));
    }

    #[test]
    fn detects_body_signatures() {
        assert!(has_body_signature("All rights reserved. ISBN: 000-0"));
        assert!(!has_body_signature("She walked into the room."));
    }

    #[test]
    fn detects_toc_like_bodies() {
        let body = "Chapter 1\nChapter 2\nChapter 3\nChapter 4\nChapter 5\nSome trailer";
        assert!(looks_like_toc(body));
    }

    #[test]
    fn narrative_body_is_not_toc_like() {
        let body = "It was a dark and stormy night.\nShe walked on.\nThe end.";
        assert!(!looks_like_toc(body));
    }

    #[test]
    fn post_filter_drops_short_and_front_matter_chapters() {
        let raw = vec![
            ("Copyright".to_string(), "ISBN 000. All rights reserved.".to_string()),
            ("Chapter One".to_string(), "word ".repeat(60)),
            ("Chapter Two".to_string(), "word ".repeat(10)),
        ];
        let chapters = post_filter(raw, 50);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Chapter One");
    }
}
