//! Error types shared by the fetcher, cache and storage layers.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

use crate::html::IndexStreamError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DocsError>;

/// Failures surfaced by documentation acquisition and storage.
#[derive(Error, Debug)]
pub enum DocsError {
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status.
    #[error("{url} responded with {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status returned by the server.
        status: StatusCode,
    },

    /// Local filesystem access failed.
    #[error("io error at {path:?}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Durable backend query or connection failure.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// The index page could not be read or rewritten.
    #[error("index page error: {0}")]
    IndexStream(#[from] IndexStreamError),
}

impl DocsError {
    pub(crate) fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
