//! In-memory vector index.
//!
//! Stores one embedding per chunk and answers top-k cosine-similarity
//! queries by brute-force scan. Sized for tens to low-hundreds of
//! documents; there is deliberately no ANN structure here.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::Chunk;

/// One indexed chunk: its embedding plus enough identity to attribute a hit.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk_id: String,
    pub document_id: String,
    pub ordinal: usize,
    pub text: String,
}

/// A raw similarity hit from [`VectorIndex::search`].
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub chunk_id: String,
    pub document_id: String,
    pub score: f32,
    pub text: String,
}

/// Brute-force cosine-similarity index over chunk embeddings.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
        }
    }

    /// Embed and store the given chunks. No-op on empty input.
    ///
    /// A chunk whose id is already present is skipped with a warning: the
    /// index holds at most one entry per chunk id, so re-adding cannot
    /// inflate counts or duplicate search results.
    pub fn add(&mut self, chunks: &[Chunk]) {
        if chunks.is_empty() {
            return;
        }

        let existing: HashSet<&str> = self.entries.iter().map(|e| e.chunk_id.as_str()).collect();
        let mut added = 0usize;
        let mut new_entries = Vec::new();

        for chunk in chunks {
            if existing.contains(chunk.id.as_str())
                || new_entries
                    .iter()
                    .any(|e: &IndexEntry| e.chunk_id == chunk.id)
            {
                warn!(chunk_id = %chunk.id, "duplicate chunk id, skipping add");
                continue;
            }
            new_entries.push(IndexEntry {
                vector: self.embedder.embed(&chunk.text),
                chunk_id: chunk.id.clone(),
                document_id: chunk.document_id.clone(),
                ordinal: chunk.index,
                text: chunk.text.clone(),
            });
            added += 1;
        }

        self.entries.append(&mut new_entries);
        debug!(added, total = self.entries.len(), "indexed chunks");
    }

    /// Remove every entry whose chunk id appears in `chunk_ids`. Unknown ids
    /// are silently ignored; remaining entries keep their insertion order.
    pub fn remove(&mut self, chunk_ids: &[String]) {
        if chunk_ids.is_empty() {
            return;
        }
        let doomed: HashSet<&str> = chunk_ids.iter().map(String::as_str).collect();
        let before = self.entries.len();
        self.entries.retain(|e| !doomed.contains(e.chunk_id.as_str()));
        debug!(
            removed = before - self.entries.len(),
            total = self.entries.len(),
            "removed chunks from index"
        );
    }

    /// Top-`k` entries by cosine similarity to the embedded query, descending.
    /// Ties keep insertion order. Empty query or empty index yields no hits.
    pub fn search(&self, query: &str, k: usize) -> Vec<IndexHit> {
        if query.is_empty() || self.entries.is_empty() || k == 0 {
            return Vec::new();
        }

        let query_vec = self.embedder.embed(query);

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&query_vec, &e.vector)))
            .collect();

        // Stable sort: equal scores fall back to insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| {
                let e = &self.entries[i];
                IndexHit {
                    chunk_id: e.chunk_id.clone(),
                    document_id: e.document_id.clone(),
                    score,
                    text: e.text.clone(),
                }
            })
            .collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
