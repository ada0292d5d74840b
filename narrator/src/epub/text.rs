//! Flat HTML-to-text conversion and the text-level cleanup applied after
//! every extraction strategy (§4.3).

use once_cell::sync::Lazy;
use regex::Regex;

static RUNS_OF_NEWLINES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n{3,}").expect("static regex is valid")
});

static BROKEN_HEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([A-Z])\n([a-z])").expect("static regex is valid")
});

/// Converts an HTML fragment to plain text via `html2text`, then collapses
/// runs of 3+ newlines to 2 and rejoins a single capital letter broken onto
/// its own line from the word that follows it (a common drop-cap artifact).
pub fn html_to_text(html: &str) -> String {
    let raw = html2text::from_read(html.as_bytes(), 1_000);
    postprocess(&raw)
}

pub fn postprocess(text: &str) -> String {
    let collapsed = RUNS_OF_NEWLINES_RE.replace_all(text, "\n\n");
    BROKEN_HEAD_RE.replace_all(&collapsed, "$1$2").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_of_newlines() {
        let text = "one\n\n\n\n\ntwo";
        assert_eq!(postprocess(text), "one\n\ntwo");
    }

    #[test]
    fn rejoins_broken_drop_cap_head() {
        let text = "T\nhe cat sat.";
        assert_eq!(postprocess(text), "The cat sat.");
    }

    #[test]
    fn leaves_normal_text_untouched() {
        let text = "A normal paragraph.\n\nAnother one.";
        assert_eq!(postprocess(text), text);
    }
}
