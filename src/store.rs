//! Document store: ingestion, retrieval, and lifecycle.
//!
//! Owns the document and chunk collections, the vector index, and the
//! persistence handle. Ingest rejections ([`IngestError`]) are the only
//! caller-visible failures; extraction and persistence problems degrade to
//! logged warnings so an upload that reached us never half-succeeds.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::chunker::chunk_text;
use crate::config::Config;
use crate::embedding::HashedBagOfWords;
use crate::index::VectorIndex;
use crate::models::{Chunk, Document, DocumentKind, FileUpload, IngestSummary, QueryHit};
use crate::persist::{load_snapshot, save_snapshot, BlobStore};
use crate::planner::QueryPlanner;

/// Characters of extracted text echoed back in the ingest summary.
const PREVIEW_CHARS: usize = 100;

/// Why an upload was rejected before entering the pipeline.
#[derive(Debug)]
pub enum IngestError {
    /// Upload exceeds the configured size limit.
    SizeExceeded { size: u64, limit: u64 },
    /// Neither the declared MIME type nor the extension maps to a
    /// supported format.
    UnsupportedType(String),
    /// The upload bytes could not be obtained.
    ReadFailure(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeExceeded { size, limit } => {
                write!(f, "document is {} bytes, limit is {} bytes", size, limit)
            }
            Self::UnsupportedType(name) => write!(f, "unsupported document type: {}", name),
            Self::ReadFailure(msg) => write!(f, "failed to read upload: {}", msg),
        }
    }
}

impl Error for IngestError {}

impl IngestError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::ReadFailure(_) => "read_failure",
        }
    }
}

/// In-memory document store with blob-backed persistence.
pub struct DocumentStore {
    config: Config,
    blob_store: Arc<dyn BlobStore>,
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    index: VectorIndex,
    planner: QueryPlanner,
}

impl DocumentStore {
    /// Open the store over a persistence backend, restoring any surviving
    /// state and rebuilding the vector index from it.
    pub async fn open(config: Config, blob_store: Arc<dyn BlobStore>) -> Self {
        let (documents, chunks) =
            load_snapshot(blob_store.as_ref(), config.storage.chunks_per_batch).await;
        let (documents, chunks) = reconcile(documents, chunks);

        let mut index = VectorIndex::new(Arc::new(HashedBagOfWords::new(config.embedding.dims)));
        index.add(&chunks);

        if !documents.is_empty() {
            info!(
                documents = documents.len(),
                chunks = chunks.len(),
                "restored persisted state"
            );
        }

        let planner = QueryPlanner::new(config.retrieval.candidate_extra);
        Self {
            config,
            blob_store,
            documents,
            chunks,
            index,
            planner,
        }
    }

    /// Ingest one upload: validate, extract, chunk, index, persist.
    pub async fn ingest(&mut self, upload: FileUpload) -> Result<IngestSummary, IngestError> {
        let size = upload.bytes.len() as u64;
        let limit = self.config.storage.max_document_size;
        if size > limit {
            return Err(IngestError::SizeExceeded { size, limit });
        }

        let kind = resolve_kind(&upload)?;
        let extraction = crate::extract::extract_text(&upload.name, &upload.bytes, kind);

        let created_at = Utc::now();
        let id = self.fresh_document_id(created_at.timestamp_millis());

        let chunks = chunk_text(&extraction.text, &id, &self.config.chunking);
        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let chunk_count = chunks.len();

        self.index.add(&chunks);
        self.chunks.extend(chunks);
        self.documents.push(Document {
            id: id.clone(),
            name: upload.name.clone(),
            kind,
            size,
            content: extraction.text.clone(),
            chunk_ids,
            created_at,
        });

        self.persist().await;

        info!(document_id = %id, name = %upload.name, chunk_count, "ingested document");
        Ok(IngestSummary {
            document_id: id,
            name: upload.name,
            kind,
            chunk_count,
            content_preview: Some(extraction.text.chars().take(PREVIEW_CHARS).collect()),
            note: extraction.note,
        })
    }

    /// Ranked retrieval over the current state. `top_k` falls back to the
    /// configured default.
    pub fn query(&self, text: &str, top_k: Option<usize>) -> Vec<QueryHit> {
        let k = top_k.unwrap_or(self.config.retrieval.top_k);
        self.planner
            .plan(text, k, &self.documents, &self.chunks, &self.index)
    }

    pub fn get(&self, document_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    /// All documents in ingestion order.
    pub fn list(&self) -> &[Document] {
        &self.documents
    }

    /// Remove a document and everything derived from it. Returns false if
    /// the id is unknown.
    pub async fn delete(&mut self, document_id: &str) -> bool {
        let Some(pos) = self.documents.iter().position(|d| d.id == document_id) else {
            return false;
        };
        let doc = self.documents.remove(pos);
        self.chunks.retain(|c| c.document_id != doc.id);
        self.index.remove(&doc.chunk_ids);
        self.persist().await;
        info!(document_id = %doc.id, name = %doc.name, "deleted document");
        true
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Best-effort snapshot write; failure is logged, never surfaced.
    async fn persist(&self) {
        if let Err(e) = save_snapshot(
            self.blob_store.as_ref(),
            &self.documents,
            &self.chunks,
            self.config.storage.chunks_per_batch,
            self.config.storage.content_keep_chars,
        )
        .await
        {
            warn!(error = %e, "failed to persist state, continuing with in-memory data");
        }
    }

    /// Document ids derive from the creation instant. Bump the millisecond
    /// until free so two ingests in the same instant cannot collide.
    fn fresh_document_id(&self, millis: i64) -> String {
        let mut candidate = millis;
        loop {
            let id = format!("doc-{}", candidate);
            if !self.documents.iter().any(|d| d.id == id) {
                return id;
            }
            candidate += 1;
        }
    }
}

/// Resolve the document kind: declared MIME type first, extension second.
fn resolve_kind(upload: &FileUpload) -> Result<DocumentKind, IngestError> {
    if let Some(kind) = DocumentKind::from_mime(&upload.content_type) {
        return Ok(kind);
    }
    upload
        .name
        .rsplit_once('.')
        .and_then(|(_, ext)| DocumentKind::from_extension(&ext.to_lowercase()))
        .ok_or_else(|| IngestError::UnsupportedType(upload.name.clone()))
}

/// Drop persisted chunks whose document no longer exists and rebuild each
/// document's chunk id list from what actually loaded.
fn reconcile(documents: Vec<Document>, chunks: Vec<Chunk>) -> (Vec<Document>, Vec<Chunk>) {
    let mut chunks: Vec<Chunk> = chunks
        .into_iter()
        .filter(|c| {
            let known = documents.iter().any(|d| d.id == c.document_id);
            if !known {
                warn!(chunk_id = %c.id, "dropping persisted chunk with unknown document");
            }
            known
        })
        .collect();
    chunks.sort_by(|a, b| a.document_id.cmp(&b.document_id).then(a.index.cmp(&b.index)));

    let documents = documents
        .into_iter()
        .map(|mut d| {
            d.chunk_ids = chunks
                .iter()
                .filter(|c| c.document_id == d.id)
                .map(|c| c.id.clone())
                .collect();
            d
        })
        .collect();
    (documents, chunks)
}
