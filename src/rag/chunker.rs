//! Fixed-size character windows with overlap.
//!
//! Windows are measured in `char`s, never bytes, so a multi-byte code point is
//! never split. Text is normalized once before windowing so boundaries are
//! computed on the same string every time.

use crate::types::{AppError, Chunk, Document, Result};

pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a chunker. `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = normalize(text).chars().collect();
        let step = self.chunk_size - self.chunk_overlap;

        (0..chars.len())
            .step_by(step)
            .map(|start| {
                let end = (start + self.chunk_size).min(chars.len());
                chars[start..end].iter().collect()
            })
            .collect()
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk(&document.raw_text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                source_name: document.name.clone(),
                index,
                text,
            })
            .collect()
    }
}

/// Strip trailing whitespace from every line and cap blank-line runs at one.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_breaks = 0usize;

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            pending_breaks += 1;
            if pending_breaks <= 2 {
                out.push('\n');
            }
        }
        let line = line.trim_end();
        if !line.is_empty() {
            pending_breaks = 0;
            out.push_str(line);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abcdefghij", 4, 1, vec!["abcd", "defg", "ghij", "j"])]
    #[case("abc", 4, 1, vec!["abc"])]
    #[case("abcdef", 3, 0, vec!["abc", "def"])]
    #[case("abcdefg", 3, 0, vec!["abc", "def", "g"])]
    #[case("abcde", 2, 1, vec!["ab", "bc", "cd", "de", "e"])]
    fn test_windows(
        #[case] text: &str,
        #[case] size: usize,
        #[case] overlap: usize,
        #[case] expected: Vec<&str>,
    ) {
        let chunker = TextChunker::new(size, overlap).unwrap();
        assert_eq!(chunker.chunk(text), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\n\n\t \n")]
    fn test_blank_input_yields_nothing(#[case] text: &str) {
        let chunker = TextChunker::new(4, 1).unwrap();
        assert!(chunker.chunk(text).is_empty());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            TextChunker::new(4, 4),
            Err(AppError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            TextChunker::new(4, 9),
            Err(AppError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            TextChunker::new(0, 0),
            Err(AppError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = "The permit application is due on March 3rd.\n\n\n\nLate filings incur a fee. "
            .repeat(20);
        for (size, overlap) in [(10, 0), (17, 5), (100, 99), (1000, 200)] {
            let chunker = TextChunker::new(size, overlap).unwrap();
            assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
        }
    }

    #[test]
    fn test_multibyte_characters_are_not_split() {
        let chunker = TextChunker::new(2, 0).unwrap();
        assert_eq!(chunker.chunk("héllo"), vec!["hé", "ll", "o"]);
    }

    #[test]
    fn test_normalize_collapses_blank_lines() {
        assert_eq!(normalize("a  \n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize("a\t\nb"), "a\nb");
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
        assert_eq!(normalize("  indented"), "  indented");
    }

    #[test]
    fn test_chunk_document_indexes_from_zero() {
        let chunker = TextChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk_document(&Document::new("letters.txt", "abcdefghij"));

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[3].index, 3);
        assert_eq!(chunks[3].position(), 4);
        assert!(chunks.iter().all(|c| c.source_name == "letters.txt"));
    }
}
