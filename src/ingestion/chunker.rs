//! Page-aware recursive text splitting.
//!
//! Text is split by paragraph, then line, then sentence, then word, until
//! every piece fits `chunk_size` characters. Pieces are merged back greedily,
//! and each new chunk starts with up to `chunk_overlap` trailing characters of
//! the previous one. Chunks never cross a page boundary, which keeps page
//! numbers non-decreasing in chunk order.

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// A chunk of text with the page it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    /// One-based.
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Chunk pages in order. Blank pages contribute no chunks but still
    /// consume a page number.
    pub fn chunk_pages(&self, pages: &[String]) -> Vec<PageChunk> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(i, page)| {
                let page_number = i as u32 + 1;
                self.split_text(page)
                    .into_iter()
                    .map(move |text| PageChunk { page_number, text })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let pieces = split_recursive(text, self.chunk_size, SEPARATORS);
        self.merge(pieces)
    }

    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for piece in pieces {
            if char_len(&current) + char_len(&piece) <= self.chunk_size {
                current.push_str(&piece);
                continue;
            }

            let tail = overlap_tail(&current, self.chunk_overlap);
            push_trimmed(&mut chunks, &current);

            current = if char_len(&tail) + char_len(&piece) <= self.chunk_size {
                format!("{}{}", tail, piece)
            } else {
                piece
            };
        }
        push_trimmed(&mut chunks, &current);

        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split until every piece is at most `size` characters, keeping separators
/// attached to the preceding piece so merging restores the original text.
fn split_recursive(text: &str, size: usize, separators: &[&str]) -> Vec<String> {
    if char_len(text) <= size {
        return vec![text.to_string()];
    }

    let Some((separator, rest)) = separators.split_first() else {
        return hard_split(text, size);
    };

    let segments = split_keeping_separator(text, separator);
    if segments.len() == 1 {
        return split_recursive(text, size, rest);
    }

    segments
        .into_iter()
        .flat_map(|segment| split_recursive(segment, size, rest))
        .collect()
}

fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

fn hard_split(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Last `overlap` characters of `text`, without a leading partial word.
fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(overlap);
    let mut window = &chars[start..];

    if start > 0 && !chars[start - 1].is_whitespace() {
        match window.iter().position(|c| c.is_whitespace()) {
            Some(pos) => window = &window[pos..],
            // unbroken text, e.g. after a hard split
            None => return window.iter().collect(),
        }
    }

    let tail = window.iter().collect::<String>().trim().to_string();
    if tail.is_empty() {
        tail
    } else {
        tail + " "
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = RecursiveChunker::new(100, 10);
        assert_eq!(chunker.split_text("Just one line."), vec!["Just one line."]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        let chunker = RecursiveChunker::new(100, 10);
        assert!(chunker.split_text("  \n\n ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = (0..100)
            .map(|i| format!("This is sentence number {}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunker = RecursiveChunker::new(120, 20);
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 120, "chunk too long: {}", chunk);
        }
        assert!(chunks[0].starts_with("This is sentence number 0."));
        assert!(chunks.last().unwrap().ends_with("sentence number 99."));
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunker = RecursiveChunker::new(30, 12);
        let chunks = chunker.split_text(text);

        assert!(chunks.len() >= 2);
        let last_word_of_first = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].contains(last_word_of_first));
    }

    #[test]
    fn test_unbroken_text_is_hard_split() {
        let text = "x".repeat(25);
        let chunker = RecursiveChunker::new(10, 0);
        let chunks = chunker.split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "xxxxx");
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let text = "案件概要書 ".repeat(40);
        let chunker = RecursiveChunker::new(16, 4);
        let chunks = chunker.split_text(&text);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| char_len(c) <= 16));
    }

    #[test]
    fn test_pages_never_share_a_chunk() {
        let pages = vec![
            "First page text.".to_string(),
            String::new(),
            "Third page. With two sentences.".to_string(),
        ];
        let chunker = RecursiveChunker::new(1000, 50);
        let chunks = chunker.chunk_pages(&pages);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page_number, 1);
        assert_eq!(chunks[1].page_number, 3);
        assert_eq!(chunks[1].text, "Third page. With two sentences.");
    }
}
