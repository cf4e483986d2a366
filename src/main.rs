//! # docrag CLI
//!
//! The `docrag` binary is the primary interface for the retrieval engine.
//! It provides commands for database initialization, document ingestion,
//! retrieval queries, document lifecycle, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docrag --config ./config/docrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docrag init` | Create the SQLite database and schema |
//! | `docrag add <path>` | Ingest a document from the filesystem |
//! | `docrag query "<text>"` | Run a retrieval query |
//! | `docrag list` | List ingested documents |
//! | `docrag get <id>` | Print a document's metadata and content |
//! | `docrag delete <id>` | Delete a document and its chunks |
//! | `docrag serve` | Start the JSON HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use docrag::config::{self, Config};
use docrag::models::FileUpload;
use docrag::persist::SqliteBlobStore;
use docrag::server;
use docrag::store::DocumentStore;

/// docrag — a local-first document retrieval engine for chat assistants.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults apply.
#[derive(Parser)]
#[command(
    name = "docrag",
    about = "docrag — a local-first document retrieval engine for chat assistants",
    version,
    long_about = "docrag ingests documents (text, Markdown, CSV, JSON, PDF, DOCX), chunks and \
    embeds them locally, and answers retrieval queries through a planner that prefers explicit \
    document references over raw vector similarity. State persists in SQLite."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docrag.toml`. Falls back to built-in defaults
    /// when the file does not exist.
    #[arg(long, global = true, default_value = "./config/docrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database.
    ///
    /// Creates the SQLite database file and the key-value schema. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a document from the filesystem.
    ///
    /// Reads the file, extracts its text, chunks and indexes it, and
    /// persists the result. The document kind is resolved from the file
    /// extension.
    Add {
        /// Path to the document file.
        path: PathBuf,

        /// Override the stored document name (defaults to the file name).
        #[arg(long)]
        name: Option<String>,
    },

    /// Run a retrieval query.
    ///
    /// Prints ranked chunks with their scores and source documents.
    Query {
        /// The query text.
        text: String,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List ingested documents.
    List,

    /// Print a document's metadata and extracted content.
    Get {
        /// Document id (e.g., `doc-1724500000000`).
        id: String,
    },

    /// Delete a document and everything derived from it.
    Delete {
        /// Document id.
        id: String,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// ingestion and retrieval endpoints.
    Serve,
}

async fn open_store(cfg: &Config) -> anyhow::Result<DocumentStore> {
    let blob = SqliteBlobStore::open(&cfg.storage.path).await?;
    Ok(DocumentStore::open(cfg.clone(), Arc::new(blob)).await)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::minimal()
    };

    match cli.command {
        Commands::Init => {
            SqliteBlobStore::open(&cfg.storage.path).await?;
            println!("Database initialized at {}", cfg.storage.path.display());
        }
        Commands::Add { path, name } => {
            let bytes = std::fs::read(&path)?;
            let file_name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            });

            let mut store = open_store(&cfg).await?;
            let summary = store
                .ingest(FileUpload {
                    name: file_name,
                    content_type: String::new(),
                    bytes,
                })
                .await?;

            println!(
                "Ingested {} ({}) as {} — {} chunks",
                summary.name,
                summary.kind.label(),
                summary.document_id,
                summary.chunk_count
            );
            if let Some(note) = summary.note {
                println!("  note: {}", note);
            }
        }
        Commands::Query { text, top_k } => {
            let store = open_store(&cfg).await?;
            let hits = store.query(&text, top_k);
            if hits.is_empty() {
                println!("No results.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {} ({}) — {}",
                        i + 1,
                        hit.score,
                        hit.document_name,
                        hit.document_kind.label(),
                        hit.chunk_id
                    );
                    println!("   {}", snippet(&hit.text, 200));
                }
            }
        }
        Commands::List => {
            let store = open_store(&cfg).await?;
            let docs = store.list();
            if docs.is_empty() {
                println!("No documents.");
            } else {
                for doc in docs {
                    println!(
                        "{}  {}  ({}, {} bytes, {} chunks)",
                        doc.id,
                        doc.name,
                        doc.kind.label(),
                        doc.size,
                        doc.chunk_ids.len()
                    );
                }
            }
        }
        Commands::Get { id } => {
            let store = open_store(&cfg).await?;
            match store.get(&id) {
                Some(doc) => {
                    println!("id:       {}", doc.id);
                    println!("name:     {}", doc.name);
                    println!("kind:     {}", doc.kind.label());
                    println!("size:     {} bytes", doc.size);
                    println!("chunks:   {}", doc.chunk_ids.len());
                    println!("created:  {}", doc.created_at.to_rfc3339());
                    println!("---");
                    println!("{}", doc.content);
                }
                None => {
                    println!("Document not found: {}", id);
                    std::process::exit(1);
                }
            }
        }
        Commands::Delete { id } => {
            let mut store = open_store(&cfg).await?;
            if store.delete(&id).await {
                println!("Deleted {}", id);
            } else {
                println!("Document not found: {}", id);
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            let store = open_store(&cfg).await?;
            server::run_server(&cfg, Arc::new(Mutex::new(store))).await?;
        }
    }

    Ok(())
}

/// First `max` characters of `text` with newlines flattened.
fn snippet(text: &str, max: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(max)
        .collect();
    if text.chars().count() > max {
        format!("{}...", flat)
    } else {
        flat
    }
}
