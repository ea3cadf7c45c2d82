//! Documentation storage with similarity search.
//!
//! [`VectorStore`] fronts one [`StorageBackend`]: pgvector when a connection
//! profile is configured and provisioning succeeds, otherwise a process-local
//! map. The first durable-backend failure switches the store to memory for the
//! rest of its life.

mod memory;
mod postgres;
mod table;

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

pub use memory::InMemoryBackend;
pub use postgres::PgVectorBackend;
pub use table::TableName;

use crate::config::ConnectionProfile;
use crate::docs::NodeDocumentation;
use crate::embeddings::{tokenize, EmbeddingService};
use crate::error::{DocsError, Result};

/// Which backend currently serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Process-local map.
    Memory,
    /// Postgres with pgvector.
    Postgres,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Matched node type.
    pub node_type: String,
    /// Matched node's display name.
    pub display_name: String,
    /// Matched node's description.
    pub description: String,
    /// Cosine similarity to the query, in (0, 1].
    pub relevance: f32,
    /// Passage of the record that mentions a query term.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl SearchHit {
    pub(crate) fn from_doc(doc: &NodeDocumentation, relevance: f32, query: &str) -> Self {
        Self {
            node_type: doc.node_type.clone(),
            display_name: doc.display_name.clone(),
            description: doc.description.clone(),
            relevance,
            snippet: find_snippet(doc, query),
        }
    }
}

/// Storage capability shared by the memory and pgvector backends.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend identity.
    fn kind(&self) -> BackendKind;

    /// Lookup by node type, ignoring case.
    async fn get(&self, node_type: &str) -> Result<Option<NodeDocumentation>>;

    /// Inserts or wholesale replaces the record for `doc.node_type` (or a case variant of it).
    async fn put(&self, doc: &NodeDocumentation, embedding: &[f32]) -> Result<()>;

    /// At most `limit` hits with positive similarity, most relevant first.
    async fn search(&self, embedding: &[f32], query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Every stored node type.
    async fn node_types(&self) -> Result<Vec<String>>;

    /// Every stored record, ordered by node key.
    async fn documents(&self) -> Result<Vec<NodeDocumentation>>;

    /// Releases held connections.
    async fn close(&self);
}

/// Orders hits by descending relevance (ties by node type) and truncates to `limit`.
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.node_type.cmp(&b.node_type))
    });
    hits.truncate(limit);
    hits
}

/// Rewrites every stored vector with `embedder`, returning how many records were touched.
///
/// Vocabulary slots belong to the embedder that assigned them; vectors written
/// by an earlier process must be rebuilt before they compare with new queries.
pub(crate) async fn reembed_all(
    backend: &dyn StorageBackend,
    embedder: &EmbeddingService,
) -> Result<usize> {
    let docs = backend.documents().await?;
    for doc in &docs {
        backend.put(doc, &embedder.embed(&doc.embedding_text())).await?;
    }
    Ok(docs.len())
}

/// First parameter, then example, mentioning a query token; else the description.
pub fn find_snippet(doc: &NodeDocumentation, query: &str) -> Option<String> {
    let tokens = tokenize(query);
    let mentions = |text: &str| {
        let lowered = text.to_lowercase();
        tokens.iter().any(|token| lowered.contains(token.as_str()))
    };

    if !tokens.is_empty() {
        for param in &doc.parameters {
            if mentions(&format!("{} {}", param.name, param.description)) {
                return Some(format!("{}: {}", param.name, param.description));
            }
        }
        for example in &doc.examples {
            if mentions(&format!("{} {}", example.title, example.description)) {
                return Some(format!("{}: {}", example.title, example.description));
            }
        }
    }
    (!doc.description.is_empty()).then(|| doc.description.clone())
}

/// Documentation store with automatic fallback from pgvector to memory.
pub struct VectorStore {
    profile: Option<ConnectionProfile>,
    table: TableName,
    embedder: Arc<EmbeddingService>,
    force_memory: bool,
    backend: RwLock<Arc<dyn StorageBackend>>,
    initialized: OnceCell<()>,
    fell_back: AtomicBool,
}

impl VectorStore {
    /// Store that will try `profile` on initialization unless `force_memory` is set.
    pub fn new(
        profile: Option<ConnectionProfile>,
        embedder: Arc<EmbeddingService>,
        force_memory: bool,
    ) -> Self {
        Self {
            profile,
            table: TableName::default(),
            embedder,
            force_memory,
            backend: RwLock::new(Arc::new(InMemoryBackend::new())),
            initialized: OnceCell::new(),
            fell_back: AtomicBool::new(false),
        }
    }

    /// Store that never touches a database.
    pub fn in_memory(embedder: Arc<EmbeddingService>) -> Self {
        Self::new(None, embedder, true)
    }

    /// Overrides the durable table.
    pub fn with_table(mut self, table: TableName) -> Self {
        self.table = table;
        self
    }

    /// Embedding service used for records and queries.
    pub fn embedder(&self) -> &Arc<EmbeddingService> {
        &self.embedder
    }

    /// Selects the backend; repeated and concurrent calls share one attempt.
    ///
    /// Never fails: any provisioning error leaves the in-memory backend active.
    pub async fn initialize(&self) {
        self.initialized
            .get_or_init(|| async move {
                let Some(profile) = self.profile.as_ref().filter(|_| !self.force_memory) else {
                    debug!("using in-memory documentation store");
                    return;
                };
                match PgVectorBackend::connect(profile, &self.table, self.embedder.dimensions())
                    .await
                {
                    Ok(backend) => match reembed_all(&backend, &self.embedder).await {
                        Ok(count) => {
                            info!(
                                host = %profile.host,
                                table = %self.table.qualified(),
                                reembedded = count,
                                "using pgvector documentation store"
                            );
                            *self.backend.write().await = Arc::new(backend);
                        }
                        Err(err) => {
                            backend.close().await;
                            self.note_fallback(&err);
                        }
                    },
                    Err(err) => self.note_fallback(&err),
                }
            })
            .await;
    }

    /// Backend currently serving requests.
    pub async fn backend_kind(&self) -> BackendKind {
        self.backend.read().await.kind()
    }

    /// Stores `doc`, embedding its text unless a vector is supplied.
    ///
    /// A supplied vector must match the embedder's dimension.
    pub async fn store_documentation(
        &self,
        doc: &NodeDocumentation,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let embedding = match embedding {
            Some(vector) if vector.len() != self.embedder.dimensions() => {
                return Err(DocsError::Config(format!(
                    "embedding for {} has {} dimensions, expected {}",
                    doc.node_type,
                    vector.len(),
                    self.embedder.dimensions()
                )));
            }
            Some(vector) => vector,
            None => self.embedder.embed(&doc.embedding_text()),
        };

        let backend = self.active().await;
        if let Err(err) = backend.put(doc, &embedding).await {
            self.fall_back(&err).await.put(doc, &embedding).await?;
        }
        Ok(())
    }

    /// Lookup ignoring node-name case; `None` when the node type is not stored.
    pub async fn get_by_node_type(&self, node_type: &str) -> Option<NodeDocumentation> {
        let backend = self.active().await;
        match backend.get(node_type).await {
            Ok(doc) => doc,
            Err(err) => self
                .fall_back(&err)
                .await
                .get(node_type)
                .await
                .ok()
                .flatten(),
        }
    }

    /// Records most similar to `query`, at most `limit`, by non-increasing relevance.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let embedding = self.embedder.embed(query);
        if limit == 0 || embedding.iter().all(|value| *value == 0.0) {
            return Vec::new();
        }

        let backend = self.active().await;
        let hits = match backend.search(&embedding, query, limit).await {
            Ok(hits) => hits,
            Err(err) => self
                .fall_back(&err)
                .await
                .search(&embedding, query, limit)
                .await
                .unwrap_or_default(),
        };
        rank_hits(hits, limit)
    }

    /// Every stored node type, sorted.
    pub async fn get_all_node_types(&self) -> Vec<String> {
        let backend = self.active().await;
        match backend.node_types().await {
            Ok(keys) => keys,
            Err(err) => self
                .fall_back(&err)
                .await
                .node_types()
                .await
                .unwrap_or_default(),
        }
    }

    /// Releases the durable connection, if any.
    pub async fn close(&self) {
        self.backend.read().await.close().await;
    }

    async fn active(&self) -> Arc<dyn StorageBackend> {
        self.initialize().await;
        Arc::clone(&*self.backend.read().await)
    }

    async fn fall_back(&self, err: &DocsError) -> Arc<dyn StorageBackend> {
        let mut backend = self.backend.write().await;
        if backend.kind() == BackendKind::Postgres {
            self.note_fallback(err);
            backend.close().await;
            *backend = Arc::new(InMemoryBackend::new());
        }
        Arc::clone(&*backend)
    }

    fn note_fallback(&self, err: &DocsError) {
        if !self.fell_back.swap(true, AtomicOrdering::SeqCst) {
            warn!(error = %err, "durable store unavailable; falling back to in-memory store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::{Example, Parameter};

    fn store() -> VectorStore {
        VectorStore::in_memory(Arc::new(EmbeddingService::default()))
    }

    fn doc(node_type: &str, display_name: &str, description: &str) -> NodeDocumentation {
        NodeDocumentation::new(node_type, display_name, description)
    }

    #[tokio::test]
    async fn http_request_outranks_webhook() {
        let store = store();
        store
            .store_documentation(&doc("httpRequest", "HTTP Request", "Makes HTTP requests"), None)
            .await
            .expect("store");
        store
            .store_documentation(&doc("webhook", "Webhook", "Listens for HTTP webhooks"), None)
            .await
            .expect("store");

        let hits = store.semantic_search("HTTP request", 1).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_type, "httpRequest");

        let all = store.semantic_search("HTTP request", 10).await;
        assert_eq!(all.len(), 2);
        assert!(all.windows(2).all(|w| w[0].relevance >= w[1].relevance));
    }

    #[tokio::test]
    async fn round_trip_and_overwrite() {
        let store = store();
        store.initialize().await;
        assert_eq!(store.backend_kind().await, BackendKind::Memory);

        let original = doc("n8n-nodes-base.if", "If", "Branches on conditions");
        store.store_documentation(&original, None).await.expect("store");
        assert_eq!(store.get_by_node_type("n8n-nodes-base.if").await, Some(original));

        let replacement = doc("n8n-nodes-base.if", "If", "Routes items true or false");
        store.store_documentation(&replacement, None).await.expect("store");
        assert_eq!(
            store.get_by_node_type("n8n-nodes-base.if").await,
            Some(replacement)
        );
        assert_eq!(store.get_all_node_types().await, vec!["n8n-nodes-base.if"]);
        assert_eq!(store.get_by_node_type("n8n-nodes-base.missing").await, None);
    }

    #[tokio::test]
    async fn reembedding_realigns_vectors_from_another_vocabulary() {
        let backend = InMemoryBackend::new();
        let previous = EmbeddingService::new(64);
        previous.embed("unrelated warmup tokens shift every slot");
        let http = doc("n8n-nodes-base.httpRequest", "HTTP Request", "Makes HTTP requests");
        let code = doc("n8n-nodes-base.code", "Code", "Runs JavaScript");
        for record in [&http, &code] {
            backend
                .put(record, &previous.embed(&record.embedding_text()))
                .await
                .expect("put");
        }

        let fresh = EmbeddingService::new(64);
        assert_eq!(reembed_all(&backend, &fresh).await.expect("reembed"), 2);

        let query = fresh.embed("http request");
        let hits = backend.search(&query, "http request", 5).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_type, http.node_type);
    }

    #[tokio::test]
    async fn rejects_mismatched_supplied_embedding() {
        let store = store();
        let result = store
            .store_documentation(&doc("set", "Set", "Sets values"), Some(vec![1.0; 3]))
            .await;
        assert!(matches!(result, Err(DocsError::Config(_))));
    }

    #[tokio::test]
    async fn empty_or_stopword_queries_return_nothing() {
        let store = store();
        store
            .store_documentation(&doc("set", "Set", "Sets values"), None)
            .await
            .expect("store");
        assert!(store.semantic_search("the and of", 5).await.is_empty());
        assert!(store.semantic_search("values", 0).await.is_empty());
    }

    #[test]
    fn snippet_prefers_parameters_then_examples() {
        let mut record = doc("slack", "Slack", "Chat integration");
        record.parameters.push(Parameter {
            name: "channel".into(),
            param_type: "string".into(),
            description: "Where to post".into(),
            required: true,
            default: None,
            options: None,
        });
        record.examples.push(Example {
            title: "Upload".into(),
            description: "Send a file".into(),
            code: None,
        });

        assert_eq!(
            find_snippet(&record, "Channel name").as_deref(),
            Some("channel: Where to post")
        );
        assert_eq!(
            find_snippet(&record, "upload file").as_deref(),
            Some("Upload: Send a file")
        );
        assert_eq!(
            find_snippet(&record, "unrelated").as_deref(),
            Some("Chat integration")
        );
    }

    #[test]
    fn rank_hits_sorts_and_truncates() {
        let hit = |key: &str, relevance: f32| SearchHit {
            node_type: key.into(),
            display_name: key.into(),
            description: String::new(),
            relevance,
            snippet: None,
        };
        let ranked = rank_hits(vec![hit("b", 0.2), hit("a", 0.9), hit("c", 0.2)], 2);
        let keys: Vec<_> = ranked.iter().map(|h| h.node_type.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
