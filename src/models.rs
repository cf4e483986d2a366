//! Core data models for the retrieval pipeline.
//!
//! These types represent the documents, chunks, and query results that flow
//! through ingestion, indexing, and retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document format, resolved from the declared MIME type or file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Pdf,
    Docx,
    Csv,
    Json,
    Markdown,
}

impl DocumentKind {
    /// Resolve from a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "text/plain" => Some(Self::Text),
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/csv" => Some(Self::Csv),
            "application/json" => Some(Self::Json),
            "text/markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Resolve from a lowercase file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Short label used in summaries and query results (`"pdf"`, `"text"`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Markdown => "markdown",
        }
    }
}

/// An ingested document. Owns its chunks: deleting a document cascades to
/// every chunk whose `document_id` matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
    /// Original upload size in bytes.
    pub size: u64,
    /// Extracted text. Full for documents ingested this session; may be a
    /// truncated preview for documents restored from persistence.
    pub content: String,
    /// Ids of this document's chunks, in index order.
    pub chunk_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Character span of a chunk within its document's extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub start_offset: usize,
    pub end_offset: usize,
}

/// A contiguous, possibly overlapping slice of a document's text — the unit
/// of embedding and retrieval.
///
/// Chunk ids are deterministic (`<document_id>-chunk-<index>`) and indices
/// are contiguous from 0 within a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub index: usize,
    pub span: ChunkSpan,
}

/// A ranked retrieval result, carrying enough document identity for the
/// caller to assemble model context.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub document_kind: DocumentKind,
    pub score: f32,
    pub text: String,
}

/// A file handed over the ingest boundary: name, declared type, raw bytes.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    /// Declared MIME type; may be empty or unrecognized, in which case the
    /// extension decides.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Summary returned by a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub document_id: String,
    pub name: String,
    pub kind: DocumentKind,
    pub chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
    /// Present when extraction degraded to fallback content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(
            DocumentKind::from_mime("text/plain"),
            Some(DocumentKind::Text)
        );
        assert_eq!(
            DocumentKind::from_mime("application/pdf"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            DocumentKind::from_extension("md"),
            Some(DocumentKind::Markdown)
        );
        assert_eq!(
            DocumentKind::from_extension("docx"),
            Some(DocumentKind::Docx)
        );
        assert_eq!(DocumentKind::from_extension("exe"), None);
    }
}
