//! Text chunking for low-latency synthesis
//!
//! Long utterances are cut into short pieces so the first one can be
//! synthesized and played while the rest are still waiting. Pieces are cut
//! at the last sentence end that fits, otherwise at the last whitespace,
//! otherwise hard at the length limit. Lengths are counted in characters.

use super::request::Chunk;
use once_cell::sync::Lazy;
use regex::Regex;

/// Default maximum chunk length in characters
pub const DEFAULT_MAX_CHUNK_LEN: usize = 150;

/// Sentence terminators. Latin ones need trailing whitespace so that
/// "3.14" or "e.g.x" are not treated as boundaries; CJK full stops don't.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:[.!?…]+["'”’)\]]*\s|[。！？]+["'”’)\]」』]*)"#)
        .expect("sentence boundary pattern is valid")
});

/// Iterator over the chunks of one utterance
///
/// Consumes the text once, front to back. Only whitespace at chunk
/// boundaries is dropped.
#[derive(Debug, Clone)]
pub struct TextChunker<'a> {
    rest: &'a str,
    max_len: usize,
    ordinal: usize,
}

impl<'a> TextChunker<'a> {
    /// Create a chunker; a `max_len` of zero is treated as one
    pub fn new(text: &'a str, max_len: usize) -> Self {
        Self {
            rest: text,
            max_len: max_len.max(1),
            ordinal: 0,
        }
    }

    /// Byte offset where the next piece ends, and where the remainder starts
    fn split_point(&self, rest: &str) -> Option<(usize, usize)> {
        // Fits entirely
        let (limit, next_char) = rest.char_indices().nth(self.max_len)?;

        // Let the boundary whitespace sit just past the window
        let lookahead = &rest[..limit + next_char.len_utf8()];
        let sentence_cut = SENTENCE_END
            .find_iter(lookahead)
            .map(|m| m.end())
            .filter(|&end| lookahead[..end].trim_end().len() <= limit)
            .last();
        if let Some(end) = sentence_cut {
            return Some((lookahead[..end].trim_end().len(), end));
        }

        if next_char.is_whitespace() {
            return Some((limit, limit));
        }

        let window = &rest[..limit];
        match window.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => Some((window[..pos].trim_end().len(), pos)),
            _ => Some((limit, limit)),
        }
    }
}

impl<'a> Iterator for TextChunker<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let rest = self.rest.trim_start();
        if rest.is_empty() {
            self.rest = rest;
            return None;
        }

        let piece = match self.split_point(rest) {
            Some((piece_end, rest_start)) => {
                self.rest = &rest[rest_start..];
                &rest[..piece_end]
            }
            None => {
                self.rest = "";
                rest.trim_end()
            }
        };

        let chunk = Chunk {
            text: piece.to_string(),
            ordinal: self.ordinal,
        };
        self.ordinal += 1;
        Some(chunk)
    }
}

impl std::iter::FusedIterator for TextChunker<'_> {}

/// Split text into chunks of at most `max_len` characters
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    TextChunker::new(text, max_len).map(|c| c.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn assert_well_formed(text: &str, max_len: usize) {
        let chunks = chunk_text(text, max_len);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= max_len.max(1),
                "chunk {:?} longer than {}",
                chunk,
                max_len
            );
            assert!(!chunk.is_empty());
            assert_eq!(chunk.trim(), chunk);
        }
        assert_eq!(strip_ws(&chunks.concat()), strip_ws(text));
    }

    #[test]
    fn test_empty_and_blank() {
        assert!(chunk_text("", 150).is_empty());
        assert!(chunk_text("   ", 150).is_empty());
        assert!(chunk_text("\n\t  \n", 10).is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("  Hello world.  ", 150), vec!["Hello world."]);
    }

    #[test]
    fn test_prefers_sentence_end() {
        let chunks = chunk_text("Hello world. This is a test.", 20);
        assert_eq!(chunks, vec!["Hello world.", "This is a test."]);
    }

    #[test]
    fn test_takes_last_sentence_end_in_window() {
        let chunks = chunk_text("One. Two. Three four five six.", 12);
        assert_eq!(chunks, vec!["One. Two.", "Three four", "five six."]);
    }

    #[test]
    fn test_sentence_end_right_at_limit() {
        // '!' is the 12th char; the space that qualifies it is the 13th
        let chunks = chunk_text("Hello world! Next part here", 12);
        assert_eq!(chunks[0], "Hello world!");
    }

    #[test]
    fn test_decimal_point_is_not_a_boundary() {
        let chunks = chunk_text("Pi is 3.14159 roughly speaking", 16);
        assert_eq!(chunks[0], "Pi is 3.14159");
    }

    #[test]
    fn test_falls_back_to_whitespace() {
        let chunks = chunk_text("alpha beta gamma delta", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn test_hard_cut_without_boundary() {
        let chunks = chunk_text("abcdefghijklmnop", 5);
        assert_eq!(chunks, vec!["abcde", "fghij", "klmno", "p"]);
    }

    #[test]
    fn test_multibyte_counts_chars() {
        let text = "안녕하세요 반갑습니다. 오늘 날씨가 좋네요.";
        assert_well_formed(text, 8);
        let chunks = chunk_text("ééééééé", 3);
        assert_eq!(chunks, vec!["ééé", "ééé", "é"]);
    }

    #[test]
    fn test_cjk_full_stop_without_space() {
        let chunks = chunk_text("今日は晴れです。明日は雨です。", 10);
        assert_eq!(chunks, vec!["今日は晴れです。", "明日は雨です。"]);
    }

    #[test]
    fn test_ordinals_are_sequential() {
        let ordinals: Vec<usize> = TextChunker::new("a b c d e f g", 3)
            .map(|c| c.ordinal)
            .collect();
        assert_eq!(ordinals, (0..ordinals.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_max_len_is_one() {
        assert_eq!(chunk_text("ab c", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_length_and_content_invariants() {
        let samples = [
            "The quick brown fox jumps over the lazy dog. It was not amused! Was it?",
            "No punctuation at all just many words running on and on without a stop",
            "Supercalifragilisticexpialidocious is long. So is pneumonoultramicroscopic.",
            "Mixed   spacing\tand\nnewlines.  Quotes \"end here.\" Then (brackets.) more",
            "Ellipsis… then more text… and more",
        ];
        for text in samples {
            for max_len in [1, 2, 5, 7, 13, 20, 150] {
                assert_well_formed(text, max_len);
            }
        }
    }
}
