//! # docrag
//!
//! A local-first document retrieval engine for embeddable chat assistants.
//!
//! docrag ingests user-uploaded documents (text, Markdown, CSV, JSON, PDF,
//! DOCX), chunks and embeds them with a dependency-free hashed bag-of-words
//! model, and answers retrieval queries through a rule-ordered planner that
//! prefers explicit document references over raw vector similarity. State
//! persists in SQLite and is served over a CLI and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ Uploads   │──▶│   Pipeline    │──▶│  SQLite    │
//! │ txt/pdf/… │   │ Extract+Chunk │   │ blob store │
//! └──────────┘   │   +Embed      │   └─────┬─────┘
//!                └──────┬───────┘         │
//!                       ▼                  ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │ Planner  │◀──────│   CLI    │
//!                 │ + Index  │       │  + HTTP  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docrag init                         # create database
//! docrag add ./report.pdf             # ingest a document
//! docrag query "Tell me about report.pdf"
//! docrag serve                        # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format text extraction |
//! | [`chunker`] | Boundary-aware overlapping chunking |
//! | [`embedding`] | Hashed bag-of-words embeddings |
//! | [`index`] | In-memory cosine-similarity index |
//! | [`planner`] | Rule-ordered retrieval planner |
//! | [`store`] | Document store and ingest pipeline |
//! | [`persist`] | Key-value blob persistence |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | Database connection |

pub mod chunker;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod models;
pub mod persist;
pub mod planner;
pub mod server;
pub mod store;
