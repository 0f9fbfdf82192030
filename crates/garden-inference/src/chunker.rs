//! Sentence-boundary text chunking for embedding generation.
//!
//! Text is split in two passes:
//!
//! 1. A linear scan cuts sentences at `.`, `!`, or `?` followed by a space or
//!    line terminator, and at a bare newline.
//! 2. Sentences are packed greedily, space separated, into chunks of at most
//!    `max_chars` characters. A single sentence longer than the limit becomes
//!    its own chunk.
//!
//! Lengths are counted in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use garden_inference::chunker::SentenceChunker;
//!
//! let chunker = SentenceChunker::new(20);
//! let chunks = chunker.chunk("One sentence. Another one here. Last.");
//! assert_eq!(chunks, vec!["One sentence.", "Another one here.", "Last."]);
//! ```

use garden_core::defaults::CHUNK_SIZE;

/// Splits text at sentence boundaries into bounded chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceChunker {
    max_chars: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(CHUNK_SIZE)
    }
}

impl SentenceChunker {
    /// Create a chunker with the given limit in characters.
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Chunk `text`. Empty input yields no chunks; input within the limit
    /// yields itself unchanged.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if text.chars().count() <= self.max_chars {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for sentence in split_sentences(text) {
            let sentence_len = sentence.chars().count();
            let joined_len = if current_len == 0 {
                sentence_len
            } else {
                current_len + 1 + sentence_len
            };

            if joined_len > self.max_chars && current_len > 0 {
                chunks.push(current.trim().to_string());
                current = sentence;
                current_len = sentence_len;
            } else {
                if current_len > 0 {
                    current.push(' ');
                }
                current.push_str(&sentence);
                current_len = joined_len;
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }
}

/// Split text into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            sentences.push(trimmed.to_string());
        }
        current.clear();
    };

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        match c {
            '.' | '!' | '?' => {
                if matches!(chars.get(i + 1), Some(' ' | '\n' | '\r')) {
                    flush(&mut current);
                }
            }
            '\n' if current.chars().count() > 1 => flush(&mut current),
            _ => {}
        }
    }
    flush(&mut current);

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Sentence splitting
    // =========================================================================

    #[test]
    fn test_split_on_terminal_punctuation() {
        assert_eq!(
            split_sentences("Hi there. How are you? Great!"),
            vec!["Hi there.", "How are you?", "Great!"]
        );
    }

    #[test]
    fn test_split_ignores_decimals_and_inline_dots() {
        assert_eq!(
            split_sentences("Pi is 3.14 roughly. See example.com now."),
            vec!["Pi is 3.14 roughly.", "See example.com now."]
        );
    }

    #[test]
    fn test_split_on_bare_newline() {
        assert_eq!(
            split_sentences("heading\nbody text\n\nnext"),
            vec!["heading", "body text", "next"]
        );
    }

    #[test]
    fn test_split_keeps_trailing_text() {
        assert_eq!(split_sentences("Done. trailing"), vec!["Done.", "trailing"]);
    }

    // =========================================================================
    // Chunking
    // =========================================================================

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(SentenceChunker::default().chunk("").is_empty());
    }

    #[test]
    fn test_short_input_is_returned_unchanged() {
        let text = "  Short text.\n";
        assert_eq!(SentenceChunker::new(100).chunk(text), vec![text.to_string()]);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(SentenceChunker::default().max_chars(), 8000);
    }

    #[test]
    fn test_chunks_respect_limit() {
        let text = "Alpha beta gamma. ".repeat(200);
        let chunker = SentenceChunker::new(100);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_packing_counts_joining_space() {
        // Two 5-char sentences need 11 chars when joined.
        let chunker = SentenceChunker::new(10);
        assert_eq!(chunker.chunk("Abcd. Efgh. Ijkl."), vec!["Abcd.", "Efgh.", "Ijkl."]);
        let chunker = SentenceChunker::new(11);
        assert_eq!(chunker.chunk("Abcd. Efgh. Ijkl."), vec!["Abcd. Efgh.", "Ijkl."]);
    }

    #[test]
    fn test_oversized_sentence_is_its_own_chunk() {
        let long = "x".repeat(50);
        let text = format!("Short. {} Tail.", long);
        let chunks = SentenceChunker::new(20).chunk(&text);
        assert_eq!(chunks[0], "Short.");
        assert_eq!(chunks[1], format!("{} Tail.", long));
    }

    #[test]
    fn test_limit_is_counted_in_characters() {
        // 10 two-byte characters fit a 10-character limit.
        let text = "é".repeat(10);
        assert_eq!(SentenceChunker::new(10).chunk(&text), vec![text.clone()]);
    }

    #[test]
    fn test_chunk_count_for_large_input() {
        let sentence = format!("{}.", "w".repeat(99));
        let text = vec![sentence; 420].join(" ");
        // 79 sentences of 100 chars plus separators fit in 8000.
        let chunks = SentenceChunker::new(8000).chunk(&text);
        assert_eq!(chunks.len(), 6);
    }
}
