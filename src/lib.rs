#![warn(missing_docs)]
//! Documentation indexing for workflow-automation nodes.
//!
//! Pages are scraped from the documentation site, parsed into structured
//! records, cached on disk, embedded with a keyword vectorizer and stored in
//! Postgres + pgvector (or an in-memory fallback) for lookup and search.

pub mod cache;
pub mod config;
pub mod docs;
pub mod embeddings;
pub mod error;
pub mod fetcher;
pub mod html;
pub mod parser;
pub mod service;
pub mod urls;
pub mod vector_store;

pub use cache::DocCache;
pub use config::{ConfigArgs, ConnectionProfile, DocsConfig, FetchControls};
pub use docs::{Example, NodeDocumentation, Parameter};
pub use embeddings::{cosine_similarity, EmbeddingService};
pub use error::{DocsError, Result};
pub use fetcher::{CrawlProgress, DocumentFetcher};
pub use parser::DocParser;
pub use service::{CrawlHandle, CrawlReport, DocumentationService};
pub use vector_store::{BackendKind, SearchHit, TableName, VectorStore};
