//! KEPUB `koboSpan` and drop-cap span unwrapping (§4.3).
//!
//! Both are handled at the HTML-string level before DOM parsing: KEPUB wraps
//! every word in `<span class="koboSpan">`, and some readers' stylesheets
//! wrap a chapter's first letter in a drop-cap span. Both must be unwrapped
//! so a word is never split from the rest of its text by tag boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

static KOBO_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span\s+[^>]*class="[^"]*koboSpan[^"]*"[^>]*>(.*?)</span>"#)
        .expect("static regex is valid")
});

static DROPCAP_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span\s+[^>]*class="[^"]*(?:dropcap|initial|first[-_. ]?letter)[^"]*"[^>]*>(.*?)</span>"#)
        .expect("static regex is valid")
});

fn unwrap_fixpoint(html: &str, re: &Regex) -> String {
    let mut current = html.to_string();
    loop {
        let next = re.replace_all(&current, "$1").to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Unwrap `koboSpan` word wrappers, repeatedly to a fixed point to cover
/// nested wrapping.
pub fn unwrap_kobo_spans(html: &str) -> String {
    unwrap_fixpoint(html, &KOBO_SPAN_RE)
}

/// Unwrap drop-cap decoration spans so the first letter rejoins its word.
pub fn unwrap_dropcap_spans(html: &str) -> String {
    unwrap_fixpoint(html, &DROPCAP_SPAN_RE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_simple_kobo_spans() {
        let html = r#"<p><span class="koboSpan" id="kobo.1.1">Hello</span> <span class="koboSpan" id="kobo.1.2">world</span></p>"#;
        let out = unwrap_kobo_spans(html);
        assert_eq!(out, "<p>Hello world</p>");
    }

    #[test]
    fn unwraps_nested_kobo_spans() {
        let html = r#"<span class="koboSpan"><span class="koboSpan">Nested</span></span>"#;
        let out = unwrap_kobo_spans(html);
        assert_eq!(out, "Nested");
    }

    #[test]
    fn unwraps_dropcap_span_variants() {
        assert_eq!(
            unwrap_dropcap_spans(r#"<span class="dropcap">T</span>he"#),
            "The"
        );
        assert_eq!(
            unwrap_dropcap_spans(r#"<span class="first-letter">T</span>he"#),
            "The"
        );
        assert_eq!(
            unwrap_dropcap_spans(r#"<span class="initial-cap">T</span>he"#),
            "The"
        );
    }

    #[test]
    fn leaves_unrelated_spans_untouched() {
        let html = r#"<span class="emphasis">hi</span>"#;
        assert_eq!(unwrap_kobo_spans(html), html);
        assert_eq!(unwrap_dropcap_spans(html), html);
    }
}
