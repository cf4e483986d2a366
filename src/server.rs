//! JSON HTTP API over the document store.
//!
//! Exposes ingestion, retrieval, and document lifecycle to embedding
//! clients (chat widgets, scripts). Uploads arrive as base64 so a single
//! JSON content type covers binary formats like PDF and DOCX.
//!
//! # Endpoints
//!
//! | Method   | Path              | Description |
//! |----------|-------------------|-------------|
//! | `POST`   | `/documents`      | Ingest an uploaded document |
//! | `GET`    | `/documents`      | List documents (metadata only) |
//! | `GET`    | `/documents/{id}` | Fetch one document with content |
//! | `DELETE` | `/documents/{id}` | Delete a document and its chunks |
//! | `POST`   | `/query`          | Ranked retrieval |
//! | `GET`    | `/health`         | Health check (version + counts) |
//!
//! # Error Contract
//!
//! Every error response carries the same shape:
//!
//! ```json
//! { "error": { "code": "size_exceeded", "message": "document is 6000000 bytes, limit is 5000000 bytes" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `size_exceeded` (413),
//! `unsupported_type` (415), `read_failure` (400).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted: the primary caller is
//! a widget embedded in arbitrary host pages.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{DocumentKind, FileUpload, QueryHit};
use crate::store::{DocumentStore, IngestError};

/// Shared application state: the store behind a mutex so queries observe a
/// consistent snapshot while an ingest is in flight.
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<DocumentStore>>,
}

/// Starts the HTTP server over an already-opened store.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config, store: Arc<Mutex<DocumentStore>>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/documents", post(handle_ingest).get(handle_list))
        .route("/documents/{id}", get(handle_get).delete(handle_delete))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { store });

    println!("docrag server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"size_exceeded"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let status = match &err {
            IngestError::SizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            IngestError::ReadFailure(_) => StatusCode::BAD_REQUEST,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ Request / response bodies ============

#[derive(Deserialize)]
struct IngestRequest {
    name: String,
    /// Declared MIME type; optional, the extension decides otherwise.
    #[serde(default)]
    content_type: String,
    /// Raw file bytes, standard base64.
    content_base64: String,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    results: Vec<QueryHit>,
}

/// Document metadata without the extracted content.
#[derive(Serialize)]
struct DocumentInfo {
    id: String,
    name: String,
    kind: DocumentKind,
    size: u64,
    chunk_count: usize,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    documents: usize,
    chunks: usize,
}

// ============ Handlers ============

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.content_base64)
        .map_err(|e| AppError::from(IngestError::ReadFailure(e.to_string())))?;

    let upload = FileUpload {
        name: req.name,
        content_type: req.content_type,
        bytes,
    };

    let mut store = state.store.lock().await;
    let summary = store.ingest(upload).await?;
    Ok(Json(summary))
}

async fn handle_list(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    let docs: Vec<DocumentInfo> = store
        .list()
        .iter()
        .map(|d| DocumentInfo {
            id: d.id.clone(),
            name: d.name.clone(),
            kind: d.kind,
            size: d.size,
            chunk_count: d.chunk_ids.len(),
            created_at: d.created_at,
        })
        .collect();
    Json(docs)
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.lock().await;
    match store.get(&id) {
        Some(doc) => Ok(Json(doc.clone())),
        None => Err(not_found(format!("document not found: {}", id))),
    }
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut store = state.store.lock().await;
    if store.delete(&id).await {
        Ok(Json(DeleteResponse { deleted: true }))
    } else {
        Err(not_found(format!("document not found: {}", id)))
    }
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let store = state.store.lock().await;
    let results = store.query(&req.query, req.top_k);
    Ok(Json(QueryResponse { results }))
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        documents: store.document_count(),
        chunks: store.chunk_count(),
    })
}
