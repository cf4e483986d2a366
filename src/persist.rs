//! Key-value blob persistence.
//!
//! The store survives restarts through a small key-value contract: the
//! document collection under one key, chunks split into fixed-size batches
//! under indexed keys (purely to respect a per-key size ceiling), and a
//! total-chunk-count key used to bound the batch scan on load.
//!
//! Persistence is best-effort. A failed write is logged and never rolls
//! back the in-memory state; corrupted persisted records are discarded
//! individually with a warning instead of poisoning the whole load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::db;
use crate::models::{Chunk, Document};

/// Key holding the serialized document collection.
pub const KEY_DOCUMENTS: &str = "documents";
/// Key holding the total persisted chunk count.
pub const KEY_CHUNK_COUNT: &str = "chunk_count";
/// Prefix for chunk batch keys (`chunks_0`, `chunks_1`, ...).
pub const CHUNK_BATCH_PREFIX: &str = "chunks_";

fn chunk_batch_key(batch: usize) -> String {
    format!("{}{}", CHUNK_BATCH_PREFIX, batch)
}

/// A durable string key-value store. Any backend with per-key get/put
/// satisfies the persistence boundary.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// All stored keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

// ============ SQLite blob store ============

/// SQLite-backed blob store: one `kv` table, one row per key.
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    /// Open the database at `path`, creating the schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM kv WHERE key LIKE ? || '%'")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }
}

// ============ In-memory blob store ============

/// In-memory blob store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBlobStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .map
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ============ Snapshot save / load ============

/// Write the full document + chunk state to the blob store.
///
/// Document content is truncated to `content_keep_chars` in the persisted
/// record; the in-memory copy for the current session stays intact.
pub async fn save_snapshot(
    store: &dyn BlobStore,
    documents: &[Document],
    chunks: &[Chunk],
    chunks_per_batch: usize,
    content_keep_chars: usize,
) -> Result<()> {
    let slim: Vec<Document> = documents
        .iter()
        .map(|d| Document {
            content: truncate_chars(&d.content, content_keep_chars),
            ..d.clone()
        })
        .collect();
    store
        .put(KEY_DOCUMENTS, &serde_json::to_string(&slim)?)
        .await?;

    // Drop stale batch keys before rewriting, so shrinking state doesn't
    // leave orphan batches behind.
    for key in store.keys_with_prefix(CHUNK_BATCH_PREFIX).await? {
        store.remove(&key).await?;
    }

    for (batch, group) in chunks.chunks(chunks_per_batch).enumerate() {
        store
            .put(&chunk_batch_key(batch), &serde_json::to_string(group)?)
            .await?;
    }
    store.put(KEY_CHUNK_COUNT, &chunks.len().to_string()).await?;

    Ok(())
}

/// Read persisted state back, discarding anything malformed.
///
/// Never fails: a corrupted collection resets to empty, a corrupted record
/// is skipped, and both are logged.
pub async fn load_snapshot(
    store: &dyn BlobStore,
    chunks_per_batch: usize,
) -> (Vec<Document>, Vec<Chunk>) {
    let documents = match store.get(KEY_DOCUMENTS).await {
        Ok(Some(raw)) => decode_documents(&raw),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "failed to read persisted documents, starting empty");
            Vec::new()
        }
    };

    let total: usize = match store.get(KEY_CHUNK_COUNT).await {
        Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(raw = %raw, "persisted chunk count is not a number, assuming 0");
            0
        }),
        Ok(None) => 0,
        Err(e) => {
            warn!(error = %e, "failed to read persisted chunk count, assuming 0");
            0
        }
    };

    let mut chunks = Vec::new();
    let batches = total.div_ceil(chunks_per_batch);
    for batch in 0..batches {
        match store.get(&chunk_batch_key(batch)).await {
            Ok(Some(raw)) => chunks.extend(decode_chunk_batch(batch, &raw)),
            Ok(None) => warn!(batch, "missing persisted chunk batch"),
            Err(e) => warn!(batch, error = %e, "failed to read chunk batch"),
        }
    }

    (documents, chunks)
}

fn decode_documents(raw: &str) -> Vec<Document> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "persisted documents are not valid JSON, resetting");
            return Vec::new();
        }
    };
    let Some(items) = value.as_array() else {
        warn!("persisted documents are not an array, resetting");
        return Vec::new();
    };

    let mut documents = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Document>(item.clone()) {
            Ok(doc) => documents.push(doc),
            Err(e) => warn!(error = %e, "discarding invalid persisted document"),
        }
    }
    documents
}

fn decode_chunk_batch(batch: usize, raw: &str) -> Vec<Chunk> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(batch, error = %e, "chunk batch is not valid JSON, discarding");
            return Vec::new();
        }
    };
    let Some(items) = value.as_array() else {
        warn!(batch, "chunk batch is not an array, discarding");
        return Vec::new();
    };

    let mut chunks = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Chunk>(item.clone()) {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => warn!(batch, error = %e, "discarding invalid persisted chunk"),
        }
    }
    chunks
}

fn truncate_chars(text: &str, keep: usize) -> String {
    if text.chars().count() <= keep {
        return text.to_string();
    }
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkSpan, DocumentKind};
    use chrono::Utc;

    fn make_document(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{}.txt", id),
            kind: DocumentKind::Text,
            size: content.len() as u64,
            content: content.to_string(),
            chunk_ids: vec![],
            created_at: Utc::now(),
        }
    }

    fn make_chunk(doc: &str, index: usize) -> Chunk {
        Chunk {
            id: format!("{}-chunk-{}", doc, index),
            document_id: doc.to_string(),
            text: format!("chunk {} text", index),
            index,
            span: ChunkSpan {
                start_offset: 0,
                end_offset: 10,
            },
        }
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = MemoryBlobStore::new();
        let docs = vec![make_document("doc-1", "short content")];
        let chunks: Vec<Chunk> = (0..7).map(|i| make_chunk("doc-1", i)).collect();

        save_snapshot(&store, &docs, &chunks, 3, 1000).await.unwrap();
        let (loaded_docs, loaded_chunks) = load_snapshot(&store, 3).await;

        assert_eq!(loaded_docs.len(), 1);
        assert_eq!(loaded_chunks.len(), 7);
        assert_eq!(loaded_chunks[6].id, "doc-1-chunk-6");
        // 7 chunks at batch size 3 => 3 batch keys
        assert_eq!(
            store.keys_with_prefix(CHUNK_BATCH_PREFIX).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn test_persisted_content_is_truncated() {
        let store = MemoryBlobStore::new();
        let long = "x".repeat(5000);
        let docs = vec![make_document("doc-1", &long)];

        save_snapshot(&store, &docs, &[], 50, 1000).await.unwrap();
        let (loaded_docs, _) = load_snapshot(&store, 50).await;

        assert_eq!(loaded_docs[0].content.len(), 1003);
        assert!(loaded_docs[0].content.ends_with("..."));
    }

    #[tokio::test]
    async fn test_shrinking_state_drops_stale_batches() {
        let store = MemoryBlobStore::new();
        let chunks: Vec<Chunk> = (0..10).map(|i| make_chunk("doc-1", i)).collect();
        save_snapshot(&store, &[], &chunks, 2, 1000).await.unwrap();
        save_snapshot(&store, &[], &chunks[..2], 2, 1000)
            .await
            .unwrap();

        let (_, loaded) = load_snapshot(&store, 2).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            store.keys_with_prefix(CHUNK_BATCH_PREFIX).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_corrupt_documents_collection_resets() {
        let store = MemoryBlobStore::new();
        store.put(KEY_DOCUMENTS, r#"{"not": "an array"}"#).await.unwrap();
        let (docs, _) = load_snapshot(&store, 50).await;
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_records_are_skipped_not_fatal() {
        let store = MemoryBlobStore::new();
        let good = serde_json::to_value(make_chunk("doc-1", 0)).unwrap();
        let batch = serde_json::json!([good, {"id": "orphan"}, 42]);
        store.put(KEY_DOCUMENTS, "[]").await.unwrap();
        store.put(KEY_CHUNK_COUNT, "3").await.unwrap();
        store.put("chunks_0", &batch.to_string()).await.unwrap();

        let (_, chunks) = load_snapshot(&store, 50).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "doc-1-chunk-0");
    }

    #[tokio::test]
    async fn test_garbage_chunk_count_assumes_zero() {
        let store = MemoryBlobStore::new();
        store.put(KEY_CHUNK_COUNT, "lots").await.unwrap();
        let (_, chunks) = load_snapshot(&store, 50).await;
        assert!(chunks.is_empty());
    }
}
