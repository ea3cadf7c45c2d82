//! Documentation service: lazy initialization, lookup, search and refresh.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, OnceCell};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::DocsConfig;
use crate::docs::NodeDocumentation;
use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::fetcher::{CrawlProgress, DocumentFetcher};
use crate::vector_store::{BackendKind, SearchHit, VectorStore};

/// Outcome of a full crawl-and-store pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Nodes queued by the crawl.
    pub discovered: usize,
    /// Records fetched live.
    pub fetched: usize,
    /// Records served from the cache.
    pub cached: usize,
    /// Nodes that could not be fetched.
    pub failed: usize,
    /// Records written to the store.
    pub stored: usize,
}

/// Handle to a rebuild running on the runtime.
pub struct CrawlHandle {
    progress: watch::Receiver<CrawlProgress>,
    task: JoinHandle<CrawlReport>,
}

impl CrawlHandle {
    /// Receiver notified on every counter change.
    pub fn subscribe(&self) -> watch::Receiver<CrawlProgress> {
        self.progress.clone()
    }

    /// True once the task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the rebuild to complete.
    pub async fn wait(self) -> std::result::Result<CrawlReport, JoinError> {
        self.task.await
    }
}

/// Single entry point for documentation lookups.
///
/// Construct once per process and share by reference (or `Arc`); the fetcher,
/// store and embedder are initialized on first use.
pub struct DocumentationService {
    fetcher: DocumentFetcher,
    store: VectorStore,
    prewarm_nodes: Vec<String>,
    politeness_delay: Duration,
    initialized: OnceCell<()>,
}

impl DocumentationService {
    /// Builds the service; no I/O happens until the first call.
    pub fn new(config: DocsConfig) -> Result<Self> {
        let embedder = Arc::new(EmbeddingService::new(config.embedding_dimensions));
        let fetcher = DocumentFetcher::new(&config)?;
        let store = VectorStore::new(config.connection.clone(), embedder, config.force_in_memory)
            .with_table(config.table.clone());
        Ok(Self {
            fetcher,
            store,
            prewarm_nodes: config.prewarm_nodes,
            politeness_delay: config.controls.politeness_delay(),
            initialized: OnceCell::new(),
        })
    }

    /// Underlying store.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Prepares the cache and store, then pre-warms the curated node list.
    ///
    /// Concurrent callers wait on the same attempt; later calls return at once.
    pub async fn initialize(&self) {
        self.initialized
            .get_or_init(|| async move {
                if let Err(err) = self.fetcher.initialize().await {
                    warn!(error = %err, "documentation cache unavailable");
                }
                self.store.initialize().await;
                self.prewarm().await;
            })
            .await;
    }

    /// Backend serving the store.
    pub async fn backend_kind(&self) -> BackendKind {
        self.store.backend_kind().await
    }

    /// Stored record, else a fetched one (which is then stored); `None` when the site lacks it.
    pub async fn get_node_documentation(&self, node_type: &str) -> Option<NodeDocumentation> {
        self.initialize().await;
        if let Some(doc) = self.store.get_by_node_type(node_type).await {
            return Some(doc);
        }
        let doc = self.fetcher.fetch_node_documentation(node_type).await?;
        self.store_doc(&doc).await;
        Some(doc)
    }

    /// Records ranked by keyword similarity to `query`.
    pub async fn search_documentation(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        self.initialize().await;
        self.store.semantic_search(query, limit).await
    }

    /// Every node type currently stored.
    pub async fn list_all_node_types(&self) -> Vec<String> {
        self.initialize().await;
        self.store.get_all_node_types().await
    }

    /// Re-fetches `node_type` from the site and overwrites the cached and stored copies.
    pub async fn refresh_node_documentation(&self, node_type: &str) -> Option<NodeDocumentation> {
        self.initialize().await;
        let doc = self.fetcher.refresh_node_documentation(node_type).await?;
        self.store_doc(&doc).await;
        Some(doc)
    }

    /// Crawls every discoverable node and stores the results.
    pub async fn rebuild_index(&self) -> CrawlReport {
        let (progress, _) = watch::channel(CrawlProgress::default());
        self.rebuild_with_progress(&progress).await
    }

    /// Runs [`DocumentationService::rebuild_index`] as a task whose progress and result stay observable.
    pub fn spawn_rebuild(self: &Arc<Self>) -> CrawlHandle {
        let (tx, rx) = watch::channel(CrawlProgress::default());
        let service = Arc::clone(self);
        let task = tokio::spawn(async move { service.rebuild_with_progress(&tx).await });
        CrawlHandle { progress: rx, task }
    }

    /// Releases the durable store connection.
    pub async fn close(&self) {
        self.store.close().await;
    }

    async fn rebuild_with_progress(&self, progress: &watch::Sender<CrawlProgress>) -> CrawlReport {
        self.initialize().await;
        let known = self.store.get_all_node_types().await;
        let docs = self.fetcher.crawl_nodes(progress, &known).await;
        let mut stored = 0usize;
        for doc in &docs {
            if self.store_doc(doc).await {
                stored += 1;
            }
        }
        let counters = *progress.borrow();
        let report = CrawlReport {
            discovered: counters.discovered,
            fetched: counters.fetched,
            cached: counters.cached,
            failed: counters.failed,
            stored,
        };
        info!(?report, "documentation index rebuilt");
        report
    }

    async fn prewarm(&self) {
        let mut live_fetches = 0usize;
        for node_type in &self.prewarm_nodes {
            if self.store.get_by_node_type(node_type).await.is_some() {
                debug!(node_type = %node_type, "already stored");
                continue;
            }
            let doc = match self.fetcher.cache().get(node_type).await {
                Some(doc) => Some(doc),
                None => {
                    if live_fetches > 0 && !self.politeness_delay.is_zero() {
                        sleep(self.politeness_delay).await;
                    }
                    live_fetches += 1;
                    self.fetcher.refresh_node_documentation(node_type).await
                }
            };
            match doc {
                Some(doc) => {
                    self.store_doc(&doc).await;
                }
                None => warn!(node_type = %node_type, "pre-warm node not found"),
            }
        }
    }

    async fn store_doc(&self, doc: &NodeDocumentation) -> bool {
        match self.store.store_documentation(doc, None).await {
            Ok(()) => true,
            Err(err) => {
                warn!(node_type = %doc.node_type, error = %err, "failed to store documentation");
                false
            }
        }
    }
}
