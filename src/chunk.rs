//! Overlapping-window text chunker.
//!
//! Splits document content into windows of at most `chunk_size` characters,
//! with consecutive windows sharing exactly `chunk_overlap` characters.
//! Cuts prefer natural boundaries (paragraph break, line break, sentence
//! end, word gap) over a hard character cut, but every chunk remains an
//! exact substring of the input: concatenating chunk 0 with each later
//! chunk minus its first `chunk_overlap` characters reconstructs the input.
//!
//! Each chunk receives a v4 UUID plus a SHA-256 hash of its text for
//! staleness detection in the embedding store.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Boundary separators tried in order of preference. The cut lands just
/// after the separator so the separator stays with the earlier chunk.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split text into overlapping windows of at most `chunk_size` characters.
///
/// Returns an empty vector for empty input. Errors on invalid
/// configuration (`chunk_size == 0` or `chunk_overlap >= chunk_size`).
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        bail!("chunk_size must be > 0");
    }
    if chunk_overlap >= chunk_size {
        bail!(
            "chunk_overlap ({}) must be < chunk_size ({})",
            chunk_overlap,
            chunk_size
        );
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, plus the end of the string.
    // Index i is the byte offset of char i, so char-counted windows can
    // be sliced without ever landing inside a multi-byte codepoint.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(total_chars);
        let end = if hard_end < total_chars {
            natural_cut(text, &bounds, start, hard_end, chunk_overlap).unwrap_or(hard_end)
        } else {
            hard_end
        };

        chunks.push(text[bounds[start]..bounds[end]].to_string());

        if end == total_chars {
            break;
        }
        // Next window starts exactly chunk_overlap characters back, so the
        // shared region between neighbors has a fixed, known width.
        start = end - chunk_overlap;
    }

    Ok(chunks)
}

/// Find the latest natural boundary within the window `[start, hard_end)`
/// that still leaves room for the overlap (the cut must advance past
/// `start + chunk_overlap`, or the next window would not move forward).
/// Returns the cut position as a char index, or None for a hard cut.
fn natural_cut(
    text: &str,
    bounds: &[usize],
    start: usize,
    hard_end: usize,
    chunk_overlap: usize,
) -> Option<usize> {
    let window = &text[bounds[start]..bounds[hard_end]];

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            let abs_byte = bounds[start] + pos + sep.len();
            // rfind on a char-aligned window returns a char boundary.
            let cut = bounds.binary_search(&abs_byte).ok()?;
            if cut > start + chunk_overlap {
                return Some(cut);
            }
        }
    }

    None
}

/// Split a document's content and build [`Chunk`] rows with contiguous
/// indices starting at 0.
pub fn chunk_document(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    let pieces = split_text(text, chunk_size, chunk_overlap)?;
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(document_id, i as i64, piece))
        .collect())
}

fn make_chunk(document_id: &str, index: i64, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild the original text from overlapping chunks: chunk 0 plus each
    /// later chunk with its first `overlap` characters dropped.
    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = split_text("Hello, world!", 100, 20).unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_no_chunks() {
        let chunks = split_text("", 100, 20).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn invalid_config_fails_fast() {
        assert!(split_text("abc", 0, 0).is_err());
        assert!(split_text("abc", 10, 10).is_err());
        assert!(split_text("abc", 10, 12).is_err());
    }

    #[test]
    fn chunks_respect_max_length() {
        let text = "word ".repeat(500);
        let chunks = split_text(&text, 100, 20).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn consecutive_chunks_share_exact_overlap() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let overlap = 30;
        let chunks = split_text(&text, 120, overlap).unwrap();
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let suffix: String = prev[prev.len() - overlap..].iter().collect();
            let prefix: String = pair[1].chars().take(overlap).collect();
            assert_eq!(suffix, prefix);
        }
    }

    #[test]
    fn round_trip_reconstructs_original() {
        let texts = [
            "Para one.\n\nPara two is a bit longer than the first.\n\nPara three.".repeat(10),
            "no separators here just one long run of letters".repeat(20),
            "Line a\nLine b\nLine c\n".repeat(50),
        ];
        for text in &texts {
            for (size, overlap) in [(100, 20), (64, 0), (37, 11)] {
                let chunks = split_text(text, size, overlap).unwrap();
                assert_eq!(
                    &reconstruct(&chunks, overlap),
                    text,
                    "round trip failed for size={} overlap={}",
                    size,
                    overlap
                );
            }
        }
    }

    #[test]
    fn round_trip_with_multibyte_text() {
        let text = "Überraschung! Das Straßenfest war schön.\n\n".repeat(30);
        let chunks = split_text(&text, 80, 16).unwrap();
        assert_eq!(reconstruct(&chunks, 16), text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 80);
        }
    }

    #[test]
    fn prefers_paragraph_boundary() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let chunks = split_text(&text, 100, 10).unwrap();
        // The first cut should land after the paragraph break, not at the
        // hard 100-char limit in the middle of the b-run.
        assert!(chunks[0].ends_with("\n\n"));
        assert_eq!(chunks[0].chars().count(), 62);
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta gamma delta. ".repeat(30);
        let a = split_text(&text, 90, 15).unwrap();
        let b = split_text(&text, 90, 15).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_rows_have_contiguous_indices_and_hashes() {
        let text = "Sentence one. Sentence two. Sentence three. ".repeat(20);
        let chunks = chunk_document("doc1", &text, 100, 20).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.document_id, "doc1");
            assert_eq!(c.hash.len(), 64);
        }
    }
}
