//! Text chunking
//!
//! Splits document text on blank-line boundaries and greedily
//! accumulates paragraphs into bounded chunks. Paragraph order is
//! preserved and no paragraph is ever split: a lone paragraph longer
//! than the limit becomes its own oversized chunk, a documented
//! limitation of this chunker.

use seekr_common::model::{Chunk, ChunkSource};
use tracing::debug;

/// Separator re-inserted between accumulated paragraphs
const PARAGRAPH_SEP: &str = "\n\n";

/// Split text into bounded chunk texts.
///
/// `max_len` is measured in characters. Whitespace-only paragraphs are
/// dropped; every returned chunk is non-empty after trimming.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let paragraphs: Vec<&str> = split_paragraphs(text);

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for paragraph in paragraphs {
        let para_chars = paragraph.chars().count();

        if buffer.is_empty() {
            buffer.push_str(paragraph);
            buffer_chars = para_chars;
            continue;
        }

        let sep_chars = PARAGRAPH_SEP.chars().count();
        if buffer_chars + sep_chars + para_chars > max_len {
            chunks.push(std::mem::take(&mut buffer));
            buffer.push_str(paragraph);
            buffer_chars = para_chars;
        } else {
            buffer.push_str(PARAGRAPH_SEP);
            buffer.push_str(paragraph);
            buffer_chars += sep_chars + para_chars;
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    debug!(
        input_chars = text.chars().count(),
        chunk_count = chunks.len(),
        max_len,
        "Text chunked"
    );

    chunks
}

/// Split into non-empty trimmed paragraphs on blank-line boundaries
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start = 0usize;
    let mut in_blank_run = false;

    let bytes = text.as_bytes();
    let mut line_start = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            let line = &text[line_start..i];
            if line.trim().is_empty() {
                if !in_blank_run {
                    let para = text[start..line_start].trim();
                    if !para.is_empty() {
                        paragraphs.push(para);
                    }
                    in_blank_run = true;
                }
                start = i + 1;
            } else {
                in_blank_run = false;
            }
            line_start = i + 1;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        paragraphs.push(tail);
    }

    paragraphs
}

/// Chunk a document's text, attaching the originating hit's provenance
pub fn chunk(text: &str, max_len: usize, source: &ChunkSource) -> Vec<Chunk> {
    chunk_text(text, max_len)
        .into_iter()
        .map(|chunk_text| Chunk::new(chunk_text, source.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekr_common::model::SourceType;

    fn source() -> ChunkSource {
        ChunkSource {
            source_type: SourceType::Web,
            url: "https://example.com".into(),
            title: "Example".into(),
            author: None,
            subreddit: None,
        }
    }

    #[test]
    fn test_single_paragraph_single_chunk() {
        let chunks = chunk_text("One short paragraph.", 1500);
        assert_eq!(chunks, vec!["One short paragraph.".to_string()]);
    }

    #[test]
    fn test_accumulates_until_limit() {
        let text = "alpha\n\nbravo\n\ncharlie";
        // "alpha\n\nbravo" is 12 chars; adding charlie would exceed 15
        let chunks = chunk_text(text, 15);
        assert_eq!(chunks, vec!["alpha\n\nbravo".to_string(), "charlie".to_string()]);
    }

    #[test]
    fn test_oversized_paragraph_kept_whole() {
        let long = "x".repeat(4000);
        let text = format!("intro\n\n{}\n\noutro", long);
        let chunks = chunk_text(&text, 1500);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "intro");
        assert_eq!(chunks[1].chars().count(), 4000);
        assert_eq!(chunks[2], "outro");
    }

    #[test]
    fn test_size_bound_outside_overflow_case() {
        let para = "word ".repeat(60).trim().to_string();
        let text = vec![para.clone(); 20].join("\n\n");
        let max_len = 1000;

        for chunk in chunk_text(&text, max_len) {
            assert!(chunk.chars().count() <= max_len);
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn test_blank_and_whitespace_paragraphs_dropped() {
        let chunks = chunk_text("first\n\n   \n\n\t\n\nsecond", 1500);
        assert_eq!(chunks, vec!["first\n\nsecond".to_string()]);
    }

    #[test]
    fn test_round_trip_preserves_paragraph_order() {
        let text = "para one\n\npara two\n\npara three\n\npara four";
        let chunks = chunk_text(text, 20);

        let rejoined = chunks.join(PARAGRAPH_SEP);
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1500).is_empty());
        assert!(chunk_text("  \n\n  \n", 1500).is_empty());
    }

    #[test]
    fn test_chunk_attaches_provenance() {
        let chunks = chunk("body text", 1500, &source());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source.url, "https://example.com");
        assert_ne!(chunks[0].id, uuid::Uuid::nil());
    }

    #[test]
    fn test_windows_line_endings() {
        let chunks = chunk_text("first\r\n\r\nsecond", 1500);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("first"));
        assert!(chunks[0].contains("second"));
    }
}
