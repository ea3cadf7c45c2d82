//! Postgres + pgvector storage backend.

use async_trait::async_trait;
use pgvector::Vector;
use tokio::task::JoinHandle;
use tokio_postgres::types::Json;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use super::{rank_hits, BackendKind, SearchHit, StorageBackend, TableName};
use crate::config::ConnectionProfile;
use crate::docs::NodeDocumentation;
use crate::error::{DocsError, Result};
use crate::urls::node_key;

/// Durable backend holding one row per case-insensitive node key with a cosine-indexed embedding.
pub struct PgVectorBackend {
    client: Client,
    connection: JoinHandle<()>,
    upsert_sql: String,
    get_sql: String,
    search_sql: String,
    keys_sql: String,
    documents_sql: String,
}

impl PgVectorBackend {
    /// Connects and provisions the extension, table and similarity index.
    ///
    /// On any failure the connection is torn down before the error is returned.
    pub async fn connect(
        profile: &ConnectionProfile,
        table: &TableName,
        dims: usize,
    ) -> Result<Self> {
        let (client, connection) = profile.to_pg_config().connect(NoTls).await?;
        let connection = tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection error");
            }
        });

        if let Err(err) = provision(&client, table, dims).await {
            connection.abort();
            return Err(err);
        }
        debug!(table = %table.qualified(), dims, "pgvector table ready");

        let qualified = table.qualified();
        Ok(Self {
            client,
            connection,
            upsert_sql: upsert_sql(&qualified),
            get_sql: format!("SELECT doc FROM {qualified} WHERE node_key = $1"),
            search_sql: format!(
                "SELECT doc, (1 - (embedding <=> $1))::float8 AS relevance \
                 FROM {qualified} ORDER BY embedding <=> $1 LIMIT $2"
            ),
            keys_sql: format!("SELECT node_type FROM {qualified} ORDER BY node_type"),
            documents_sql: format!("SELECT doc FROM {qualified} ORDER BY node_key"),
        })
    }
}

async fn provision(client: &Client, table: &TableName, dims: usize) -> Result<()> {
    if dims == 0 {
        return Err(DocsError::Config("embedding dimension must be positive".into()));
    }
    client
        .execute("CREATE EXTENSION IF NOT EXISTS vector", &[])
        .await?;

    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            node_key TEXT PRIMARY KEY,
            node_type TEXT NOT NULL,
            display_name TEXT NOT NULL,
            description TEXT NOT NULL,
            doc JSONB NOT NULL,
            embedding VECTOR({dims}) NOT NULL,
            fetched_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        table.qualified()
    );
    client.execute(&ddl, &[]).await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} USING hnsw (embedding vector_cosine_ops)",
        table.embedding_index_name(),
        table.qualified()
    );
    client.execute(&index, &[]).await?;
    Ok(())
}

fn upsert_sql(qualified: &str) -> String {
    format!(
        "INSERT INTO {qualified} \
            (node_key, node_type, display_name, description, doc, embedding, fetched_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (node_key) DO UPDATE SET \
            node_type = EXCLUDED.node_type, \
            display_name = EXCLUDED.display_name, \
            description = EXCLUDED.description, \
            doc = EXCLUDED.doc, \
            embedding = EXCLUDED.embedding, \
            fetched_at = EXCLUDED.fetched_at, \
            updated_at = now()"
    )
}

#[async_trait]
impl StorageBackend for PgVectorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn get(&self, node_type: &str) -> Result<Option<NodeDocumentation>> {
        let key = node_key(node_type);
        let row = self.client.query_opt(&self.get_sql, &[&key]).await?;
        Ok(row.map(|row| row.get::<_, Json<NodeDocumentation>>(0).0))
    }

    async fn put(&self, doc: &NodeDocumentation, embedding: &[f32]) -> Result<()> {
        let vector = Vector::from(embedding.to_vec());
        let payload = Json(doc);
        let key = node_key(&doc.node_type);
        self.client
            .execute(
                &self.upsert_sql,
                &[
                    &key,
                    &doc.node_type,
                    &doc.display_name,
                    &doc.description,
                    &payload,
                    &vector,
                    &doc.fetched_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn search(&self, embedding: &[f32], query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let vector = Vector::from(embedding.to_vec());
        let limit_param = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .client
            .query(&self.search_sql, &[&vector, &limit_param])
            .await?;
        let hits = rows
            .iter()
            .filter_map(|row| {
                let relevance = row.get::<_, f64>(1) as f32;
                if relevance.is_nan() || relevance <= 0.0 {
                    return None;
                }
                let doc = row.get::<_, Json<NodeDocumentation>>(0).0;
                Some(SearchHit::from_doc(&doc, relevance, query))
            })
            .collect();
        Ok(rank_hits(hits, limit))
    }

    async fn node_types(&self) -> Result<Vec<String>> {
        let rows = self.client.query(&self.keys_sql, &[]).await?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn documents(&self) -> Result<Vec<NodeDocumentation>> {
        let rows = self.client.query(&self.documents_sql, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| row.get::<_, Json<NodeDocumentation>>(0).0)
            .collect())
    }

    async fn close(&self) {
        self.connection.abort();
    }
}

impl Drop for PgVectorBackend {
    fn drop(&mut self) {
        self.connection.abort();
    }
}
