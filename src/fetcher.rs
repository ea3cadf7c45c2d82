//! Documentation acquisition: index discovery, candidate URL probing and caching.

use std::collections::{HashMap, HashSet};

use reqwest::Client;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::DocCache;
use crate::config::{DocsConfig, FetchControls};
use crate::docs::NodeDocumentation;
use crate::error::{DocsError, Result};
use crate::html::{collect_node_links, IndexLink};
use crate::parser::DocParser;
use crate::urls::{candidate_urls, node_key};

const USER_AGENT: &str = concat!("nodedocs/", env!("CARGO_PKG_VERSION"));

/// Counters published while a full crawl runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlProgress {
    /// Node pages queued for this crawl.
    pub discovered: usize,
    /// Records fetched live and cached.
    pub fetched: usize,
    /// Records served from the cache.
    pub cached: usize,
    /// Nodes skipped because fetching, parsing or caching failed.
    pub failed: usize,
    /// Set once every queued node was handled.
    pub finished: bool,
}

/// Node queued by a crawl; `page` is set when the index linked it directly.
struct CrawlTarget {
    node_type: String,
    page: Option<Url>,
}

/// Scrapes node documentation pages and keeps an on-disk cache of parsed records.
pub struct DocumentFetcher {
    client: Client,
    base_url: String,
    index_url: Url,
    controls: FetchControls,
    supplemental_nodes: Vec<String>,
    known_nodes: Vec<String>,
    cache: DocCache,
    parser: DocParser,
}

impl DocumentFetcher {
    /// Builds a fetcher from configuration; no network or disk access happens yet.
    pub fn new(config: &DocsConfig) -> Result<Self> {
        let index_url = Url::parse(&config.index_url)
            .map_err(|err| DocsError::Config(format!("invalid index url {}: {err}", config.index_url)))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.controls.request_timeout())
            .build()
            .map_err(|err| DocsError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            index_url,
            controls: config.controls.clone(),
            supplemental_nodes: config.supplemental_nodes.clone(),
            known_nodes: config
                .prewarm_nodes
                .iter()
                .chain(&config.supplemental_nodes)
                .cloned()
                .collect(),
            cache: DocCache::new(&config.cache_dir),
            parser: DocParser::new(),
        })
    }

    /// Underlying record cache.
    pub fn cache(&self) -> &DocCache {
        &self.cache
    }

    /// Creates the cache directory; safe to call repeatedly.
    pub async fn initialize(&self) -> Result<()> {
        self.cache.ensure_dir().await
    }

    /// Crawls every discoverable node, see [`DocumentFetcher::fetch_all_nodes_with_progress`].
    pub async fn fetch_all_nodes(&self) -> Vec<NodeDocumentation> {
        let (progress, _) = watch::channel(CrawlProgress::default());
        self.fetch_all_nodes_with_progress(&progress).await
    }

    /// Crawls the index plus the supplemental node list, one page at a time.
    ///
    /// Cached records are returned without a request. Live fetches are spaced by
    /// the politeness delay. A node that fails is logged, counted and skipped, so
    /// the result may be partial but the crawl itself never fails.
    pub async fn fetch_all_nodes_with_progress(
        &self,
        progress: &watch::Sender<CrawlProgress>,
    ) -> Vec<NodeDocumentation> {
        self.crawl_nodes(progress, &[]).await
    }

    /// Full crawl in which index slugs matching one of `known_node_types` (or a
    /// configured pre-warm or supplemental node) case-insensitively are keyed by
    /// that name instead of the slug.
    pub async fn crawl_nodes(
        &self,
        progress: &watch::Sender<CrawlProgress>,
        known_node_types: &[String],
    ) -> Vec<NodeDocumentation> {
        let targets = self.crawl_targets(known_node_types).await;
        progress.send_modify(|p| *p = CrawlProgress {
            discovered: targets.len(),
            ..CrawlProgress::default()
        });
        info!(nodes = targets.len(), "starting documentation crawl");

        let mut docs = Vec::with_capacity(targets.len());
        let mut live_fetches = 0usize;
        for target in &targets {
            let node_type = target.node_type.as_str();
            if let Some(mut doc) = self.cache.get(node_type).await {
                // the cached copy may have been written under a case variant
                doc.node_type.clone_from(&target.node_type);
                progress.send_modify(|p| p.cached += 1);
                docs.push(doc);
                continue;
            }

            if live_fetches > 0 && !self.controls.politeness_delay().is_zero() {
                sleep(self.controls.politeness_delay()).await;
            }
            live_fetches += 1;

            match self.crawl_target(target).await {
                Ok(Some(doc)) => {
                    progress.send_modify(|p| p.fetched += 1);
                    docs.push(doc);
                }
                Ok(None) => {
                    info!(node_type, "no documentation page found");
                    progress.send_modify(|p| p.failed += 1);
                }
                Err(err) => {
                    warn!(node_type, error = %err, "skipping node");
                    progress.send_modify(|p| p.failed += 1);
                }
            }
        }

        progress.send_modify(|p| p.finished = true);
        let summary = *progress.borrow();
        info!(
            fetched = summary.fetched,
            cached = summary.cached,
            failed = summary.failed,
            "documentation crawl finished"
        );
        docs
    }

    /// Cached record for `node_type`, else the first candidate page that answers.
    ///
    /// Returns `None` when no candidate URL serves the node.
    pub async fn fetch_node_documentation(&self, node_type: &str) -> Option<NodeDocumentation> {
        if let Some(doc) = self.cache.get(node_type).await {
            debug!(node_type, "cache hit");
            return Some(doc);
        }
        self.refresh_node_documentation(node_type).await
    }

    /// Like [`DocumentFetcher::fetch_node_documentation`] but always asks the site.
    pub async fn refresh_node_documentation(&self, node_type: &str) -> Option<NodeDocumentation> {
        let doc = self.fetch_from_candidates(node_type).await?;
        if let Err(err) = self.cache.save(&doc).await {
            warn!(node_type, error = %err, "failed to cache documentation");
        }
        Some(doc)
    }

    /// Parses an already downloaded page.
    pub fn parse_documentation(&self, node_type: &str, html: &str, source_url: &str) -> NodeDocumentation {
        self.parser.parse_documentation(node_type, html, source_url)
    }

    async fn crawl_targets(&self, known_node_types: &[String]) -> Vec<CrawlTarget> {
        let links = match self.discover_links().await {
            Ok(links) => links,
            Err(err) => {
                warn!(url = %self.index_url, error = %err, "index page unavailable");
                Vec::new()
            }
        };

        let mut canonical: HashMap<String, &str> = HashMap::new();
        for name in known_node_types.iter().chain(&self.known_nodes) {
            canonical.entry(node_key(name)).or_insert(name.as_str());
        }

        let mut queued = HashSet::new();
        let mut targets = Vec::with_capacity(links.len() + self.supplemental_nodes.len());
        for IndexLink { node_type, url, .. } in links {
            let key = node_key(&node_type);
            if !queued.insert(key.clone()) {
                continue;
            }
            let node_type = canonical
                .get(&key)
                .map_or(node_type, |name| name.to_string());
            targets.push(CrawlTarget {
                node_type,
                page: Some(url),
            });
        }
        for node_type in &self.supplemental_nodes {
            if queued.insert(node_key(node_type)) {
                targets.push(CrawlTarget {
                    node_type: node_type.clone(),
                    page: None,
                });
            }
        }
        targets
    }

    async fn discover_links(&self) -> Result<Vec<IndexLink>> {
        let url = self.index_url.as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DocsError::http(url, err))?;
        if !response.status().is_success() {
            return Err(DocsError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        let links =
            collect_node_links(response, &self.index_url, self.controls.max_index_links()).await?;
        debug!(links = links.len(), "index links discovered");
        Ok(links)
    }

    async fn crawl_target(&self, target: &CrawlTarget) -> Result<Option<NodeDocumentation>> {
        let doc = match &target.page {
            Some(url) => {
                let html = self.fetch_page(url.as_str()).await?;
                self.parser
                    .parse_documentation(&target.node_type, &html, url.as_str())
            }
            None => match self.fetch_from_candidates(&target.node_type).await {
                Some(doc) => doc,
                None => return Ok(None),
            },
        };
        self.cache.save(&doc).await?;
        Ok(Some(doc))
    }

    async fn fetch_from_candidates(&self, node_type: &str) -> Option<NodeDocumentation> {
        for url in candidate_urls(&self.base_url, node_type) {
            match self.fetch_page(&url).await {
                Ok(html) => {
                    debug!(node_type, url = %url, "documentation page found");
                    return Some(self.parser.parse_documentation(node_type, &html, &url));
                }
                Err(err) => debug!(node_type, error = %err, "candidate url rejected"),
            }
        }
        None
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DocsError::http(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocsError::Status {
                url: url.to_string(),
                status,
            });
        }
        response.text().await.map_err(|err| DocsError::http(url, err))
    }
}
