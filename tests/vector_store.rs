use std::env;
use std::sync::Arc;
use std::time::Duration;

use nodedocs::{
    BackendKind, ConnectionProfile, EmbeddingService, Example, NodeDocumentation, Parameter,
    TableName, VectorStore,
};
use tokio_postgres::NoTls;

fn unreachable_profile() -> ConnectionProfile {
    let mut profile = ConnectionProfile::new("127.0.0.1", 1, "nodedocs", "postgres", "");
    profile.connect_timeout = Duration::from_secs(1);
    profile
}

fn embedder() -> Arc<EmbeddingService> {
    Arc::new(EmbeddingService::default())
}

#[tokio::test]
async fn unreachable_database_falls_back_to_memory() {
    let store = VectorStore::new(Some(unreachable_profile()), embedder(), false);
    store.initialize().await;
    assert_eq!(store.backend_kind().await, BackendKind::Memory);

    let doc = NodeDocumentation::new("n8n-nodes-base.code", "Code", "Runs custom JavaScript");
    store.store_documentation(&doc, None).await.expect("store");
    assert_eq!(store.get_by_node_type("n8n-nodes-base.code").await, Some(doc));

    let hits = store.semantic_search("javascript", 3).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node_type, "n8n-nodes-base.code");
}

#[tokio::test]
async fn forced_memory_never_connects() {
    let store = VectorStore::new(Some(unreachable_profile()), embedder(), true);
    store.initialize().await;
    assert_eq!(store.backend_kind().await, BackendKind::Memory);
    assert!(store.get_all_node_types().await.is_empty());
}

#[tokio::test]
async fn operations_before_initialize_initialize_implicitly() {
    let store = VectorStore::in_memory(embedder());
    assert_eq!(store.get_by_node_type("n8n-nodes-base.set").await, None);
    assert!(store.semantic_search("set fields", 5).await.is_empty());
}

fn live_profile() -> Option<ConnectionProfile> {
    let host = env::var("NODEDOCS_TEST_PGHOST").ok()?;
    let port = env::var("NODEDOCS_TEST_PGPORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5432);
    let database = env::var("NODEDOCS_TEST_PGDATABASE").unwrap_or_else(|_| "postgres".into());
    let user = env::var("NODEDOCS_TEST_PGUSER").unwrap_or_else(|_| "postgres".into());
    let password = env::var("NODEDOCS_TEST_PGPASSWORD").unwrap_or_default();
    Some(ConnectionProfile::new(host, port, database, user, password))
}

fn scratch_table(suffix: &str) -> (TableName, String) {
    let name = format!("nodedocs_test_{}_{suffix}", std::process::id());
    let table = TableName::new("public", name.clone()).expect("table");
    (table, name)
}

async fn drop_table(profile: &ConnectionProfile, name: &str) {
    let (client, connection) = tokio_postgres::Config::new()
        .host(&profile.host)
        .port(profile.port)
        .dbname(&profile.database)
        .user(&profile.user)
        .password(&profile.password)
        .connect(NoTls)
        .await
        .expect("connect for cleanup");
    let connection = tokio::spawn(connection);
    client
        .batch_execute(&format!("DROP TABLE IF EXISTS \"public\".\"{name}\""))
        .await
        .expect("drop table");
    drop(client);
    let _ = connection.await;
}

fn http_request_doc() -> NodeDocumentation {
    let mut doc = NodeDocumentation::new(
        "n8n-nodes-base.httpRequest",
        "HTTP Request",
        "Makes HTTP requests to any URL",
    );
    doc.version = "4.2".into();
    doc.source_url =
        "https://docs.n8n.io/integrations/builtin/core-nodes/n8n-nodes-base.httprequest/".into();
    doc.parameters = vec![
        Parameter {
            name: "Method".into(),
            param_type: "options".into(),
            description: "HTTP verb to use".into(),
            required: true,
            default: Some("GET".into()),
            options: Some(vec!["GET".into(), "POST".into()]),
        },
        Parameter {
            name: "URL".into(),
            param_type: "string".into(),
            description: "Target address".into(),
            required: true,
            default: None,
            options: None,
        },
    ];
    doc.examples = vec![Example {
        title: "Fetch items".into(),
        description: "List every item".into(),
        code: Some("GET https://api.example.com/items".into()),
    }];
    doc
}

fn webhook_doc() -> NodeDocumentation {
    NodeDocumentation::new(
        "n8n-nodes-base.webhook",
        "Webhook",
        "Starts workflows from incoming calls",
    )
}

/// Runs against a live database only when `NODEDOCS_TEST_PGHOST` is set.
#[tokio::test]
async fn pgvector_round_trip() {
    let Some(profile) = live_profile() else {
        return;
    };
    let (table, name) = scratch_table("round_trip");
    let store = VectorStore::new(Some(profile.clone()), embedder(), false).with_table(table);
    store.initialize().await;
    assert_eq!(store.backend_kind().await, BackendKind::Postgres);

    let http = http_request_doc();
    let webhook = webhook_doc();
    store.store_documentation(&http, None).await.expect("store");
    store.store_documentation(&webhook, None).await.expect("store");
    store.store_documentation(&http, None).await.expect("upsert");

    let stored = store
        .get_by_node_type("n8n-nodes-base.httpRequest")
        .await
        .expect("stored");
    assert_eq!(stored, http);
    assert_eq!(
        store.get_by_node_type("n8n-nodes-base.HTTPREQUEST").await,
        Some(http)
    );
    assert_eq!(
        store.get_all_node_types().await,
        vec!["n8n-nodes-base.httpRequest", "n8n-nodes-base.webhook"]
    );

    let hits = store.semantic_search("http request", 5).await;
    assert_eq!(hits[0].node_type, "n8n-nodes-base.httpRequest");
    store.close().await;
    drop_table(&profile, &name).await;
}

/// A second process starts with an empty vocabulary; stored vectors must still rank.
#[tokio::test]
async fn pgvector_search_survives_fresh_embedder() {
    let Some(profile) = live_profile() else {
        return;
    };
    let (table, name) = scratch_table("restart");

    let first = VectorStore::new(Some(profile.clone()), embedder(), false).with_table(table.clone());
    first.initialize().await;
    assert_eq!(first.backend_kind().await, BackendKind::Postgres);
    first
        .store_documentation(&webhook_doc(), None)
        .await
        .expect("store");
    first
        .store_documentation(&http_request_doc(), None)
        .await
        .expect("store");
    first.close().await;

    let fresh = embedder();
    fresh.embed("google sheets append spreadsheet rows");
    let second = VectorStore::new(Some(profile.clone()), fresh, false).with_table(table);
    second.initialize().await;
    assert_eq!(second.backend_kind().await, BackendKind::Postgres);

    let hits = second.semantic_search("http request", 5).await;
    assert!(!hits.is_empty());
    assert_eq!(hits[0].node_type, "n8n-nodes-base.httpRequest");
    assert!(hits[0].relevance > 0.0);
    second.close().await;
    drop_table(&profile, &name).await;
}
