//! Token-budgeted text chunking for TTS processing.

use super::cleaner::clean_text;
use super::seams::split_into_sentences;
use super::TextChunk;

/// Default token budget per chunk.
pub const DEFAULT_LIMIT: usize = 250;
/// Minimum size (in tokens) a chunk must reach before a new one is started;
/// below this a trailing chunk is folded into its predecessor instead.
pub const DEFAULT_FLOOR: usize = 80;
/// Rough characters-per-token ratio used to estimate token counts without a
/// real tokenizer.
pub const DEFAULT_CHARS_PER_TOKEN: f32 = 3.5;

fn estimate_tokens(s: &str, chars_per_token: f32) -> usize {
    ((s.chars().count() as f32) / chars_per_token).ceil() as usize
}

/// Split text into TTS-ready chunks bounded by an estimated token budget.
///
/// Sentence boundaries are preserved except when a single sentence alone
/// exceeds `limit` tokens, in which case it is split on progressively
/// coarser delimiters (`"; "`, `", "`, whitespace, hard character cut).
pub fn chunk_text(text: &str, limit: usize, floor: usize, chars_per_token: f32) -> Vec<String> {
    let text = clean_text(text);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let sentences = split_into_sentences(&text);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    let flush = |current: &mut String, current_tokens: &mut usize, chunks: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        current.clear();
        *current_tokens = 0;
    };

    for sentence in sentences {
        let sentence_tokens = estimate_tokens(&sentence, chars_per_token);

        if sentence_tokens > limit {
            flush(&mut current, &mut current_tokens, &mut chunks);
            for piece in split_oversized_sentence(&sentence, limit, chars_per_token) {
                if !piece.is_empty() {
                    chunks.push(piece);
                }
            }
            continue;
        }

        if current_tokens > 0 && current_tokens + sentence_tokens > limit && current_tokens >= floor
        {
            flush(&mut current, &mut current_tokens, &mut chunks);
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        current_tokens = estimate_tokens(&current, chars_per_token);
    }

    if !current.trim().is_empty() {
        let tail_tokens = estimate_tokens(current.trim(), chars_per_token);
        if tail_tokens < floor && !chunks.is_empty() {
            let last = chunks.last_mut().unwrap();
            last.push(' ');
            last.push_str(current.trim());
        } else {
            chunks.push(current.trim().to_string());
        }
    }

    chunks
}

/// Split a single sentence that alone exceeds the token budget, trying
/// progressively coarser delimiters before falling back to a hard cut.
fn split_oversized_sentence(sentence: &str, limit: usize, chars_per_token: f32) -> Vec<String> {
    for delimiter in ["; ", ", "] {
        if sentence.contains(delimiter) {
            let packed = pack_on_delimiter(sentence, delimiter, limit, chars_per_token);
            if packed.len() > 1 {
                return packed
                    .into_iter()
                    .flat_map(|p| {
                        if estimate_tokens(&p, chars_per_token) > limit {
                            split_oversized_sentence(&p, limit, chars_per_token)
                        } else {
                            vec![p]
                        }
                    })
                    .collect();
            }
        }
    }

    let by_words = pack_words(sentence, limit, chars_per_token);
    if by_words.len() > 1 {
        return by_words
            .into_iter()
            .flat_map(|p| {
                if estimate_tokens(&p, chars_per_token) > limit {
                    hard_split(&p, limit, chars_per_token)
                } else {
                    vec![p]
                }
            })
            .collect();
    }

    hard_split(sentence, limit, chars_per_token)
}

fn pack_on_delimiter(text: &str, delimiter: &str, limit: usize, chars_per_token: f32) -> Vec<String> {
    let parts: Vec<&str> = text.split(delimiter).filter(|p| !p.trim().is_empty()).collect();
    let mut chunks = Vec::new();
    let mut current = String::new();

    for (i, part) in parts.iter().enumerate() {
        let part = part.trim();
        let candidate = if current.is_empty() {
            part.to_string()
        } else {
            format!("{}{}{}", current, delimiter, part)
        };
        let _ = i;
        if !current.is_empty() && estimate_tokens(&candidate, chars_per_token) > limit {
            chunks.push(current.clone());
            current = part.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn pack_words(text: &str, limit: usize, chars_per_token: f32) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in words {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if !current.is_empty() && estimate_tokens(&candidate, chars_per_token) > limit {
            chunks.push(current);
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Last-resort hard cut at a character boundary sized to stay under `limit` tokens.
fn hard_split(text: &str, limit: usize, chars_per_token: f32) -> Vec<String> {
    let max_chars = ((limit as f32) * chars_per_token).floor().max(1.0) as usize;
    let mut chunks = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if current.chars().count() >= max_chars && !current.is_empty() {
            chunks.push(current.clone());
            current.clear();
        }
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Process a chapter's text into TTS-ready chunks using the default budget.
pub fn process_chapter(chapter_id: usize, text: &str) -> Vec<TextChunk> {
    chunk_text(text, DEFAULT_LIMIT, DEFAULT_FLOOR, DEFAULT_CHARS_PER_TOKEN)
        .into_iter()
        .enumerate()
        .map(|(chunk_id, text)| TextChunk::new(chapter_id, chunk_id, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> usize {
        estimate_tokens(s, DEFAULT_CHARS_PER_TOKEN)
    }

    #[test]
    fn short_text_is_one_chunk() {
        let text = "Hello world. How are you?";
        let chunks = chunk_text(text, 250, 80, 3.5);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn every_chunk_respects_limit() {
        let text = "First sentence. Second sentence. Third sentence. Fourth sentence. Fifth sentence. Sixth sentence. Seventh sentence. Eighth sentence. Ninth sentence. Tenth sentence.";
        let chunks = chunk_text(text, 10, 3, 3.5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(tokens(chunk) <= 10, "chunk exceeds limit: {chunk:?}");
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_text("", 250, 80, 3.5).is_empty());
        assert!(chunk_text("   \n\n  ", 250, 80, 3.5).is_empty());
    }

    #[test]
    fn trailing_small_tail_merges_into_previous_chunk() {
        // Two sentences sized so the second alone is below floor but the
        // combined pair stays under limit: expect a single merged chunk.
        let text = "Alpha beta gamma delta epsilon zeta. Eta theta.";
        let chunks = chunk_text(text, 250, 80, 3.5);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn oversized_sentence_is_split_and_each_piece_within_limit() {
        let sentence = "This is a very long sentence with many parts; it has semicolons, commas, and other punctuation, all of which can serve as natural break points for splitting a single oversized sentence into pieces that each individually respect the configured token budget.";
        let chunks = chunk_text(sentence, 10, 3, 3.5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(tokens(chunk) <= 10, "piece exceeds limit: {chunk:?}");
        }
    }

    #[test]
    fn long_word_with_no_delimiters_hard_splits() {
        let long_word = "a".repeat(500);
        let chunks = chunk_text(&long_word, 10, 3, 3.5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(tokens(chunk) <= 10);
        }
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn process_chapter_assigns_ids() {
        let text = "Hello world. This is a test.";
        let chunks = process_chapter(5, text);
        assert!(chunks.iter().all(|c| c.chapter_id == 5));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, i);
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_every_chunk_within_limit(s in "[a-zA-Z .,;!?]{1,800}") {
                let chunks = chunk_text(&s, 50, 15, 3.5);
                for chunk in &chunks {
                    prop_assert!(tokens(chunk) <= 50);
                }
            }

            #[test]
            fn prop_nonempty_alpha_input_produces_output(s in "[a-zA-Z]{1,200}") {
                let chunks = chunk_text(&s, 50, 15, 3.5);
                prop_assert!(!chunks.is_empty());
            }
        }
    }
}
