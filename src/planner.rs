//! Retrieval query planner.
//!
//! Exact and keyword matches against document identity are far
//! higher-precision signals than a hashed bag-of-words similarity score,
//! so the planner tries them first and only falls back to generic vector
//! search when nothing targets a specific document. When the generic path
//! spans several documents, results collapse to the single document with
//! the highest mean similarity so one answer never interleaves unrelated
//! sources.
//!
//! Strategy order:
//! 1. no chunks at all → synthetic result from the newest document;
//! 2. a document name extracted from the query ([`NameExtractor`]);
//! 3. the raw query containing a document name verbatim;
//! 4. "pdf" / "docx"-style keywords targeting the newest document of that
//!    kind;
//! 5. vector search plus the multi-document collapse.

use regex::Regex;
use tracing::{debug, warn};

use crate::index::VectorIndex;
use crate::models::{Chunk, Document, DocumentKind, QueryHit};

/// How many characters of the newest document to surface when no chunks
/// exist yet.
const SYNTHETIC_PREVIEW_CHARS: usize = 1000;

/// Extracts an explicit document name from a query string.
///
/// The pattern list is order-dependent and deliberately kept in the
/// precedence the widget has always used. It lives behind this one type so
/// a more principled intent classifier can replace it later.
pub struct NameExtractor {
    patterns: Vec<Regex>,
}

impl NameExtractor {
    pub fn new() -> Self {
        let sources = [
            // "document called 'X'" or "document 'X'"
            r#"(?i)document(?:\s+called)?\s+["'](.+?)["']"#,
            // "'X.pdf' document"
            r#"(?i)["'](.+?)(?:\.\w+)?["']\s+document"#,
            // any bare filename with a known extension
            r#"(?i)\b(\w+\.(?:pdf|docx|txt|json))\b"#,
            // "about 'X'"
            r#"(?i)about\s+["'](.+?)["']"#,
            // "in 'X'"
            r#"(?i)in\s+["'](.+?)["']"#,
            // "from 'X'"
            r#"(?i)from\s+["'](.+?)["']"#,
        ];
        let patterns = sources
            .iter()
            .map(|s| Regex::new(s).expect("name extraction pattern must compile"))
            .collect();
        Self { patterns }
    }

    /// First capture of the first matching pattern, trimmed.
    pub fn extract(&self, query: &str) -> Option<String> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(query) {
                if let Some(name) = caps.get(1) {
                    let name = name.as_str().trim();
                    if !name.is_empty() {
                        return Some(name.to_string());
                    }
                }
            }
        }
        None
    }
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Rule-ordered dispatcher over the store's collections and vector index.
pub struct QueryPlanner {
    extractor: NameExtractor,
    /// Extra candidates requested from vector search before collapsing.
    candidate_extra: usize,
}

impl QueryPlanner {
    pub fn new(candidate_extra: usize) -> Self {
        Self {
            extractor: NameExtractor::new(),
            candidate_extra,
        }
    }

    /// Produce up to `top_k` ranked hits for `query`.
    pub fn plan(
        &self,
        query: &str,
        top_k: usize,
        documents: &[Document],
        chunks: &[Chunk],
        index: &VectorIndex,
    ) -> Vec<QueryHit> {
        if chunks.is_empty() {
            return synthetic_fallback(documents);
        }

        // Name-targeted lookup beats any similarity score.
        if let Some(name) = self.extractor.extract(query) {
            debug!(name = %name, "extracted document name from query");
            if let Some(doc) = match_document_by_name(documents, &name) {
                let hits = document_order_hits(doc, chunks, top_k);
                if !hits.is_empty() {
                    return hits;
                }
            }
        }

        // The raw query may carry a document name verbatim.
        let query_lower = query.to_lowercase();
        if let Some(doc) = documents.iter().find(|d| {
            let doc_name = d.name.to_lowercase();
            query_lower.contains(&doc_name) || doc_name == query_lower
        }) {
            let hits = document_order_hits(doc, chunks, top_k);
            if !hits.is_empty() {
                return hits;
            }
        }

        // Type-targeted lookup: "what does the pdf say", "in the document".
        if query_lower.contains("pdf") {
            if let Some(hits) =
                newest_of_kind_hits(documents, chunks, DocumentKind::Pdf, top_k)
            {
                return hits;
            }
        } else if query_lower.contains("docx")
            || query_lower.contains("word")
            || query_lower.contains("in the document")
        {
            if let Some(hits) =
                newest_of_kind_hits(documents, chunks, DocumentKind::Docx, top_k)
            {
                return hits;
            }
        }

        self.vector_hits(query, top_k, documents, index)
    }

    /// Generic vector search with the multi-document collapse rule.
    fn vector_hits(
        &self,
        query: &str,
        top_k: usize,
        documents: &[Document],
        index: &VectorIndex,
    ) -> Vec<QueryHit> {
        // A few extra candidates so collapsing to one document can still
        // fill top_k.
        let raw = index.search(query, top_k + self.candidate_extra);
        if raw.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<QueryHit> = raw
            .into_iter()
            .filter_map(|hit| {
                let Some(doc) = documents.iter().find(|d| d.id == hit.document_id) else {
                    warn!(document_id = %hit.document_id, "index entry references unknown document");
                    return None;
                };
                Some(QueryHit {
                    chunk_id: hit.chunk_id,
                    document_id: doc.id.clone(),
                    document_name: doc.name.clone(),
                    document_kind: doc.kind,
                    score: hit.score,
                    text: hit.text,
                })
            })
            .collect();

        // Collapse to the document with the highest mean score when the
        // candidates span more than one.
        let mut doc_order: Vec<&str> = Vec::new();
        for hit in &hits {
            if !doc_order.contains(&hit.document_id.as_str()) {
                doc_order.push(&hit.document_id);
            }
        }
        if doc_order.len() > 1 {
            let mut best_doc: Option<String> = None;
            let mut best_mean = f32::MIN;
            for doc_id in doc_order {
                let scores: Vec<f32> = hits
                    .iter()
                    .filter(|h| h.document_id == doc_id)
                    .map(|h| h.score)
                    .collect();
                let mean = scores.iter().sum::<f32>() / scores.len() as f32;
                if mean > best_mean {
                    best_mean = mean;
                    best_doc = Some(doc_id.to_string());
                }
            }
            if let Some(best) = best_doc {
                debug!(document_id = %best, "collapsed results to best-scoring document");
                hits.retain(|h| h.document_id == best);
            }
        }

        hits.truncate(top_k);
        hits
    }
}

/// When nothing is indexed but documents exist, surface the newest
/// document's leading text so the caller always gets some context.
fn synthetic_fallback(documents: &[Document]) -> Vec<QueryHit> {
    let Some(doc) = documents.iter().max_by_key(|d| d.created_at) else {
        return Vec::new();
    };
    warn!(document_id = %doc.id, "no chunks indexed, falling back to newest document");
    vec![QueryHit {
        chunk_id: format!("{}-synthetic", doc.id),
        document_id: doc.id.clone(),
        document_name: doc.name.clone(),
        document_kind: doc.kind,
        score: 1.0,
        text: doc.content.chars().take(SYNTHETIC_PREVIEW_CHARS).collect(),
    }]
}

/// Match an extracted name against known documents: exact, substring, or
/// the extracted text containing the name minus its extension.
fn match_document_by_name<'a>(documents: &'a [Document], name: &str) -> Option<&'a Document> {
    let needle = name.to_lowercase();
    documents.iter().find(|doc| {
        let doc_name = doc.name.to_lowercase();
        let stem = doc_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| doc_name.clone());
        doc_name == needle || doc_name.contains(&needle) || needle.contains(&stem)
    })
}

/// All of one document's chunks in index order, up to `top_k`, scored 1.0.
fn document_order_hits(doc: &Document, chunks: &[Chunk], top_k: usize) -> Vec<QueryHit> {
    let mut doc_chunks: Vec<&Chunk> = chunks.iter().filter(|c| c.document_id == doc.id).collect();
    doc_chunks.sort_by_key(|c| c.index);
    doc_chunks
        .into_iter()
        .take(top_k)
        .map(|c| QueryHit {
            chunk_id: c.id.clone(),
            document_id: doc.id.clone(),
            document_name: doc.name.clone(),
            document_kind: doc.kind,
            score: 1.0,
            text: c.text.clone(),
        })
        .collect()
}

/// Chunks of the most recently created document of `kind`, if any has
/// chunks at all.
fn newest_of_kind_hits(
    documents: &[Document],
    chunks: &[Chunk],
    kind: DocumentKind,
    top_k: usize,
) -> Option<Vec<QueryHit>> {
    let doc = documents
        .iter()
        .filter(|d| d.kind == kind)
        .max_by_key(|d| d.created_at)?;
    let hits = document_order_hits(doc, chunks, top_k);
    if hits.is_empty() {
        None
    } else {
        Some(hits)
    }
}
