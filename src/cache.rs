//! One-JSON-file-per-node documentation cache.

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;

use crate::docs::NodeDocumentation;
use crate::error::{DocsError, Result};
use crate::urls::node_key;

/// Directory-backed cache keyed by node type.
///
/// Nothing is ever evicted; the directory grows with every node fetched.
#[derive(Debug, Clone)]
pub struct DocCache {
    dir: PathBuf,
}

impl DocCache {
    /// Cache rooted at `dir`; nothing is touched until [`DocCache::ensure_dir`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the cache directory if needed.
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| DocsError::io(&self.dir, err))
    }

    /// File holding the record for `node_type`.
    pub fn path_for(&self, node_type: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_file_stem(node_type)))
    }

    /// Cached record, or `None` when missing or unreadable.
    pub async fn get(&self, node_type: &str) -> Option<NodeDocumentation> {
        let path = self.path_for(node_type);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %err, "cache read failed");
                }
                return None;
            }
        };
        match serde_json::from_slice::<NodeDocumentation>(&bytes) {
            Ok(doc) => Some(doc),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Writes (or replaces) the record for its node type.
    pub async fn save(&self, doc: &NodeDocumentation) -> Result<()> {
        let path = self.path_for(&doc.node_type);
        let json = serde_json::to_vec_pretty(doc)?;
        fs::write(&path, json)
            .await
            .map_err(|err| DocsError::io(path, err))
    }
}

/// Lowercased node type with every character outside `[a-z0-9._-]` replaced by `_`.
///
/// Case variants of one node type share a file.
pub fn cache_file_stem(node_type: &str) -> String {
    node_key(node_type)
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
