#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use nodedocs::{DocsConfig, FetchControls};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const HTTP_REQUEST_PAGE: &str = include_str!("../fixtures/html/http_request.html");
pub const WEBHOOK_PAGE: &str = include_str!("../fixtures/html/webhook.html");
pub const INDEX_PAGE: &str = include_str!("../fixtures/html/index.html");

pub const INDEX_PATH: &str = "/integrations/builtin/node-types/";
pub const HTTP_REQUEST_PATH: &str = "/integrations/builtin/core-nodes/n8n-nodes-base.httprequest/";
pub const WEBHOOK_PATH: &str = "/integrations/builtin/core-nodes/n8n-nodes-base.webhook/";
pub const SLACK_PATH: &str = "/integrations/builtin/app-nodes/n8n-nodes-base.slack/";

/// Configuration pointed at `server` with no delays, no pre-warm and no supplemental nodes.
pub fn config_for(server: &MockServer, cache_dir: &Path) -> DocsConfig {
    DocsConfig {
        base_url: server.uri(),
        index_url: format!("{}{INDEX_PATH}", server.uri()),
        cache_dir: cache_dir.to_path_buf(),
        controls: FetchControls::new(Duration::ZERO, Duration::from_secs(5), 100),
        force_in_memory: true,
        prewarm_nodes: Vec::new(),
        supplemental_nodes: Vec::new(),
        ..DocsConfig::default()
    }
}

pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

/// Serves `body` at `route`, asserting it is requested exactly `hits` times.
pub async fn mount_page(server: &MockServer, route: &str, body: &str, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .expect(hits)
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}
