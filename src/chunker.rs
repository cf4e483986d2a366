//! Boundary-aware overlapping text chunker.
//!
//! Splits extracted document text into chunks of a target character length,
//! preferring to cut at paragraph breaks (`\n\n`), then sentence breaks
//! (`. `), before falling back to a hard cut. Consecutive chunks share a
//! fixed overlap so retrieval keeps context across cut points.
//!
//! Chunk ids are deterministic (`<document_id>-chunk-<ordinal>`), and each
//! chunk records its byte span within the source text.

use crate::config::ChunkingConfig;
use crate::models::{Chunk, ChunkSpan};

/// How far around the naive cut point to look for a paragraph break.
const PARAGRAPH_WINDOW: usize = 200;
/// How far around the naive cut point to look for a sentence break.
const SENTENCE_WINDOW: usize = 100;

/// Split `text` into overlapping chunks for `document_id`.
///
/// Returns an empty vec for empty or whitespace-only input. Indices are
/// contiguous starting at 0, and concatenating chunk texts in index order
/// covers the whole input (overlap regions duplicate content by design).
pub fn chunk_text(text: &str, document_id: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let len = text.len();
    // Large documents get a bigger target so the total chunk count stays
    // bounded.
    let target = if len > cfg.large_doc_threshold {
        cfg.large_chunk_size
    } else {
        cfg.chunk_size
    };
    let overlap = cfg.chunk_overlap.min(target.saturating_sub(1));

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < len {
        let naive = floor_char_boundary(text, (start + target).min(len));
        let mut end = naive;

        if naive < len {
            if let Some(cut) = boundary_cut(text, start, naive, "\n\n", PARAGRAPH_WINDOW) {
                end = cut;
            } else if let Some(cut) = boundary_cut(text, start, naive, ". ", SENTENCE_WINDOW) {
                end = cut;
            }
        }

        chunks.push(make_chunk(document_id, index, &text[start..end], start, end));
        index += 1;

        let next_start = floor_char_boundary(text, end.saturating_sub(overlap)).max(start + 1);

        // Fold an undersized tail into the last chunk instead of emitting it.
        if len - next_start < target / 4 {
            if end < len {
                let last = chunks
                    .last_mut()
                    .expect("at least one chunk emitted before tail handling");
                last.text.push_str(&text[end..]);
                last.span.end_offset = len;
            }
            break;
        }

        start = next_start;
    }

    chunks
}

/// Look for `pattern` starting `window` bytes before `naive`, accepting a
/// hit that lands within `window` bytes after it. Returns the cut position
/// just past the pattern, or None.
fn boundary_cut(
    text: &str,
    start: usize,
    naive: usize,
    pattern: &str,
    window: usize,
) -> Option<usize> {
    let from = floor_char_boundary(text, naive.saturating_sub(window));
    let pos = text[from..].find(pattern)? + from;
    let cut = pos + pattern.len();
    // Reject breaks beyond the search window or inside the previous overlap.
    if pos < naive + window && cut > start && cut <= text.len() {
        Some(cut)
    } else {
        None
    }
}

fn make_chunk(document_id: &str, index: usize, text: &str, start: usize, end: usize) -> Chunk {
    Chunk {
        id: format!("{}-chunk-{}", document_id, index),
        document_id: document_id.to_string(),
        text: text.to_string(),
        index,
        span: ChunkSpan {
            start_offset: start,
            end_offset: end,
        },
    }
}

/// Largest byte position `<= at` that falls on a UTF-8 char boundary.
fn floor_char_boundary(text: &str, at: usize) -> usize {
    let mut at = at.min(text.len());
    while at > 0 && !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChunkingConfig {
        ChunkingConfig::default()
    }

    fn small_cfg(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap: overlap,
            large_doc_threshold: 100_000,
            large_chunk_size: chunk_size * 2,
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", "doc-1", &cfg()).is_empty());
    }

    #[test]
    fn test_whitespace_only_yields_no_chunks() {
        assert!(chunk_text("   \n\t  \n", "doc-1", &cfg()).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", "doc-1", &cfg());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "doc-1-chunk-0");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].span.start_offset, 0);
        assert_eq!(chunks[0].span.end_offset, 13);
    }

    #[test]
    fn test_indices_contiguous_and_ids_deterministic() {
        let text = "word ".repeat(2000);
        let chunks = chunk_text(&text, "doc-7", &cfg());
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.id, format!("doc-7-chunk-{}", i));
            assert_eq!(c.document_id, "doc-7");
        }
    }

    #[test]
    fn test_chunks_cover_input_with_overlap() {
        let text = "alpha beta gamma ".repeat(500);
        let overlap = cfg().chunk_overlap;
        let chunks = chunk_text(&text, "doc-1", &cfg());

        assert_eq!(chunks[0].span.start_offset, 0);
        assert_eq!(chunks.last().unwrap().span.end_offset, text.len());
        for pair in chunks.windows(2) {
            // Each chunk starts inside the previous one (shared overlap) and
            // never leaves a gap.
            assert!(pair[1].span.start_offset <= pair[0].span.end_offset);
            assert!(
                pair[0].span.end_offset - pair[1].span.start_offset <= overlap,
                "overlap larger than configured"
            );
        }
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        // A paragraph break sits just before the naive cut point.
        let mut text = "a".repeat(950);
        text.push_str("\n\n");
        text.push_str(&"b".repeat(2000));
        let chunks = chunk_text(&text, "doc-1", &cfg());
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[0].span.end_offset, 952);
    }

    #[test]
    fn test_prefers_sentence_boundary_when_no_paragraph() {
        let mut text = "a".repeat(950);
        text.push_str(". ");
        text.push_str(&"b".repeat(2000));
        let chunks = chunk_text(&text, "doc-1", &cfg());
        assert!(chunks[0].text.ends_with(". "));
        assert_eq!(chunks[0].span.end_offset, 952);
    }

    #[test]
    fn test_small_tail_merged_into_last_chunk() {
        // 1050 chars: the 50-char remainder is under a quarter of the target,
        // so it lands in chunk 0 instead of becoming its own sliver.
        let text = "c".repeat(1050);
        let chunks = chunk_text(&text, "doc-1", &cfg());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.len(), 1050);
        assert_eq!(chunks[0].span.end_offset, 1050);
    }

    #[test]
    fn test_large_document_uses_larger_target() {
        let text = "x".repeat(150_000);
        let small = chunk_text(&"x".repeat(50_000), "doc-1", &cfg());
        let large = chunk_text(&text, "doc-2", &cfg());
        let small_rate = 50_000 / small.len();
        let large_rate = 150_000 / large.len();
        assert!(
            large_rate > small_rate,
            "large documents should produce proportionally fewer chunks"
        );
    }

    #[test]
    fn test_multibyte_input_never_splits_a_char() {
        let text = "héllo wörld ★ ".repeat(300);
        let chunks = chunk_text(&text, "doc-1", &small_cfg(100, 10));
        for c in &chunks {
            // Would have panicked on a bad slice already; double-check spans.
            assert!(text.is_char_boundary(c.span.start_offset));
        }
        assert_eq!(chunks.last().unwrap().span.end_offset, text.len());
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox. ".repeat(200);
        let a = chunk_text(&text, "doc-1", &cfg());
        let b = chunk_text(&text, "doc-1", &cfg());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.span, y.span);
        }
    }
}
