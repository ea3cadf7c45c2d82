//! Process-local storage backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{rank_hits, BackendKind, SearchHit, StorageBackend};
use crate::docs::NodeDocumentation;
use crate::embeddings::cosine_similarity;
use crate::error::Result;
use crate::urls::node_key;

struct StoredDoc {
    doc: NodeDocumentation,
    embedding: Vec<f32>,
}

/// Map-backed store keyed case-insensitively; last write for a node type wins.
#[derive(Default)]
pub struct InMemoryBackend {
    docs: RwLock<HashMap<String, StoredDoc>>,
}

impl InMemoryBackend {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn get(&self, node_type: &str) -> Result<Option<NodeDocumentation>> {
        Ok(self
            .docs
            .read()
            .await
            .get(&node_key(node_type))
            .map(|stored| stored.doc.clone()))
    }

    async fn put(&self, doc: &NodeDocumentation, embedding: &[f32]) -> Result<()> {
        self.docs.write().await.insert(
            node_key(&doc.node_type),
            StoredDoc {
                doc: doc.clone(),
                embedding: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn search(&self, embedding: &[f32], query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let docs = self.docs.read().await;
        let hits = docs
            .values()
            .map(|stored| {
                let relevance = cosine_similarity(embedding, &stored.embedding);
                (stored, relevance)
            })
            .filter(|(_, relevance)| *relevance > 0.0)
            .map(|(stored, relevance)| SearchHit::from_doc(&stored.doc, relevance, query))
            .collect();
        Ok(rank_hits(hits, limit))
    }

    async fn node_types(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .docs
            .read()
            .await
            .values()
            .map(|stored| stored.doc.node_type.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn documents(&self) -> Result<Vec<NodeDocumentation>> {
        let mut docs: Vec<NodeDocumentation> = self
            .docs
            .read()
            .await
            .values()
            .map(|stored| stored.doc.clone())
            .collect();
        docs.sort_by_key(|doc| node_key(&doc.node_type));
        Ok(docs)
    }

    async fn close(&self) {}
}
