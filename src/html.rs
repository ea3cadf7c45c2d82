//! Node link extraction from the documentation index, built on `lol_html`.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};

use lol_html::{element, HtmlRewriter, OutputSink, Settings};
use reqwest::Response;
use url::Url;

use crate::urls::NodeCategory;

/// Node page discovered on the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLink {
    /// Node-type key taken from the trailing path segment.
    pub node_type: String,
    /// Absolute page URL.
    pub url: Url,
    /// Documentation section the link lives under.
    pub category: NodeCategory,
}

impl IndexLink {
    /// Classifies an absolute URL; `None` when it is not a node page.
    pub fn from_url(mut url: Url) -> Option<Self> {
        url.set_fragment(None);
        url.set_query(None);
        let path = url.path().to_string();
        let category = NodeCategory::ALL
            .iter()
            .copied()
            .filter(|category| path.contains(&format!("/{}/", category.path_segment())))
            // cluster sub/root segments are longer and more specific than plain prefixes
            .max_by_key(|category| category.path_segment().len())?;
        let node_type = node_type_from_path(&path)?;
        Some(Self {
            node_type,
            url,
            category,
        })
    }
}

/// Last non-empty path segment when it looks like a qualified node name.
pub fn node_type_from_path(path: &str) -> Option<String> {
    let segment = path.split('/').filter(|s| !s.is_empty()).next_back()?;
    if !segment.contains('.') || segment.ends_with(".html") {
        return None;
    }
    Some(segment.to_string())
}

/// Reads the index response body and extracts its node links.
pub async fn collect_node_links(
    response: Response,
    base: &Url,
    limit: usize,
) -> Result<Vec<IndexLink>, IndexStreamError> {
    let body = response.bytes().await.map_err(IndexStreamError::Http)?;
    extract_node_links(&body, base, limit)
}

/// Runs anchors through the rewriter and keeps node links, deduplicated by node type.
///
/// Relative `href` values are resolved against `base`. At most `limit` links are returned.
pub fn extract_node_links(
    html: &[u8],
    base: &Url,
    limit: usize,
) -> Result<Vec<IndexLink>, IndexStreamError> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let links: Arc<Mutex<LinkCollector>> = Arc::new(Mutex::new(LinkCollector::default()));
    let links_handle = Arc::clone(&links);
    let base = base.clone();

    let handler = element!("a[href]", move |el| {
        let mut collector = links_handle
            .lock()
            .map_err(|_| "link collector mutex poisoned")?;
        if collector.links.len() >= limit {
            return Ok(());
        }
        if let Some(href) = el.get_attribute("href") {
            if let Some(link) = base.join(&href).ok().and_then(IndexLink::from_url) {
                collector.accept(link);
            }
        }
        Ok(())
    });

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![handler],
            ..Settings::default()
        },
        NoopSink,
    );
    for chunk in html.chunks(8 * 1024) {
        rewriter.write(chunk).map_err(IndexStreamError::Rewrite)?;
    }
    rewriter.end().map_err(IndexStreamError::Rewrite)?;

    let collected = Arc::try_unwrap(links)
        .map_err(|_| IndexStreamError::CollectorInUse)?
        .into_inner()
        .map_err(|_| IndexStreamError::CollectorPoisoned)?;

    Ok(collected.links)
}

#[derive(Default)]
struct LinkCollector {
    seen: HashSet<String>,
    links: Vec<IndexLink>,
}

impl LinkCollector {
    fn accept(&mut self, link: IndexLink) {
        if self.seen.insert(link.node_type.clone()) {
            self.links.push(link);
        }
    }
}

/// Errors surfaced while reading the index page.
#[derive(Debug)]
pub enum IndexStreamError {
    /// Reading the response body failed.
    Http(reqwest::Error),
    /// The HTML rewriter encountered malformed markup.
    Rewrite(lol_html::errors::RewritingError),
    /// Internal buffer still had outstanding references.
    CollectorInUse,
    /// Collector mutex was poisoned.
    CollectorPoisoned,
}

impl fmt::Display for IndexStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "http stream error: {err}"),
            Self::Rewrite(err) => write!(f, "html rewrite error: {err}"),
            Self::CollectorInUse => write!(f, "link collector still in use"),
            Self::CollectorPoisoned => write!(f, "link collector mutex poisoned"),
        }
    }
}

impl Error for IndexStreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Rewrite(err) => Some(err),
            Self::CollectorInUse | Self::CollectorPoisoned => None,
        }
    }
}

struct NoopSink;

impl OutputSink for NoopSink {
    fn handle_chunk(&mut self, _chunk: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(raw: &str) -> Option<IndexLink> {
        IndexLink::from_url(Url::parse(raw).unwrap())
    }

    #[test]
    fn classifies_node_pages() {
        let core = link("https://docs.test/integrations/builtin/core-nodes/n8n-nodes-base.set/#top")
            .expect("core link");
        assert_eq!(core.node_type, "n8n-nodes-base.set");
        assert_eq!(core.category, NodeCategory::Core);
        assert_eq!(core.url.fragment(), None);

        let sub = link(
            "https://docs.test/integrations/builtin/cluster-nodes/sub-nodes/n8n-nodes-langchain.lmchatopenai/",
        )
        .expect("sub link");
        assert_eq!(sub.category, NodeCategory::ClusterSub);
    }

    #[test]
    fn extracts_and_dedups_relative_links() {
        let html = br#"
            <nav>
              <a href="/integrations/builtin/core-nodes/n8n-nodes-base.if/">If</a>
              <a href="core-nodes/n8n-nodes-base.set/">Set</a>
              <a href="/integrations/builtin/core-nodes/n8n-nodes-base.if/#options">If again</a>
              <a href="/integrations/builtin/app-nodes/n8n-nodes-base.slack/">Slack</a>
              <a href="/integrations/builtin/trigger-nodes/n8n-nodes-base.slacktrigger/">Slack Trigger</a>
              <a href="https://github.com/n8n-io/n8n">GitHub</a>
            </nav>
        "#;
        let base = Url::parse("https://docs.test/integrations/builtin/").unwrap();
        let links = extract_node_links(html, &base, 10).expect("links");
        let keys: Vec<_> = links.iter().map(|l| l.node_type.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "n8n-nodes-base.if",
                "n8n-nodes-base.set",
                "n8n-nodes-base.slack",
                "n8n-nodes-base.slacktrigger",
            ]
        );
        assert_eq!(links[3].category, NodeCategory::Trigger);

        let capped = extract_node_links(html, &base, 2).expect("links");
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn rejects_section_and_unrelated_pages() {
        assert!(link("https://docs.test/integrations/builtin/core-nodes/").is_none());
        assert!(link("https://docs.test/integrations/builtin/credentials/slack/").is_none());
        assert!(link("https://docs.test/hosting/installation/").is_none());
    }
}
