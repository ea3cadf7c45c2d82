//! Runtime configuration for fetching, caching and storage.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::embeddings::DEFAULT_DIMENSIONS;
use crate::error::{DocsError, Result};
use crate::vector_store::TableName;

/// Default documentation site.
pub const DEFAULT_BASE_URL: &str = "https://docs.n8n.io";
/// Default page listing every built-in node.
pub const DEFAULT_INDEX_URL: &str = "https://docs.n8n.io/integrations/builtin/node-types/";

/// Nodes fetched and stored when the documentation service first initializes.
pub const DEFAULT_PREWARM_NODES: &[&str] = &[
    "n8n-nodes-base.httpRequest",
    "n8n-nodes-base.webhook",
    "n8n-nodes-base.code",
    "n8n-nodes-base.set",
    "n8n-nodes-base.if",
    "n8n-nodes-base.switch",
    "n8n-nodes-base.merge",
    "n8n-nodes-base.splitInBatches",
    "n8n-nodes-base.scheduleTrigger",
    "n8n-nodes-base.emailSend",
    "n8n-nodes-base.slack",
    "n8n-nodes-base.gmail",
    "n8n-nodes-base.googleSheets",
    "n8n-nodes-base.postgres",
    "n8n-nodes-langchain.agent",
];

/// Langchain cluster nodes whose pages the index navigation does not reliably link.
pub const DEFAULT_SUPPLEMENTAL_NODES: &[&str] = &[
    "n8n-nodes-langchain.agent",
    "n8n-nodes-langchain.chainLlm",
    "n8n-nodes-langchain.chainRetrievalQa",
    "n8n-nodes-langchain.chainSummarization",
    "n8n-nodes-langchain.vectorStoreInMemory",
    "n8n-nodes-langchain.vectorStorePinecone",
    "n8n-nodes-langchain.vectorStorePGVector",
    "n8n-nodes-langchain.lmChatOpenAi",
    "n8n-nodes-langchain.lmChatAnthropic",
    "n8n-nodes-langchain.embeddingsOpenAi",
    "n8n-nodes-langchain.memoryBufferWindow",
    "n8n-nodes-langchain.outputParserStructured",
    "n8n-nodes-langchain.textSplitterRecursiveCharacterTextSplitter",
    "n8n-nodes-langchain.documentDefaultDataLoader",
    "n8n-nodes-langchain.toolCode",
    "n8n-nodes-langchain.toolHttpRequest",
];

/// Knobs that bound request behavior against the documentation site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchControls {
    politeness_delay: Duration,
    request_timeout: Duration,
    max_index_links: usize,
}

impl FetchControls {
    /// Constructs a new set of fetch controls.
    pub fn new(politeness_delay: Duration, request_timeout: Duration, max_index_links: usize) -> Self {
        Self {
            politeness_delay,
            request_timeout,
            max_index_links,
        }
    }

    /// Time to wait after each live page fetch during bulk operations.
    pub fn politeness_delay(&self) -> Duration {
        self.politeness_delay
    }

    /// Per-request timeout applied by the HTTP client.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Maximum number of node links collected from the index page.
    pub fn max_index_links(&self) -> usize {
        self.max_index_links
    }
}

impl Default for FetchControls {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            max_index_links: 2000,
        }
    }
}

/// Connection settings for the durable Postgres + pgvector backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Give up connecting after this long.
    pub connect_timeout: Duration,
}

impl ConnectionProfile {
    /// Builds a profile with the default five second connect timeout.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub(crate) fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .connect_timeout(self.connect_timeout)
            .application_name("nodedocs");
        config
    }
}

/// Complete configuration for the documentation core.
#[derive(Clone, Debug)]
pub struct DocsConfig {
    /// Root of the documentation site used to build per-node URLs.
    pub base_url: String,
    /// Page scanned for node links during full crawls.
    pub index_url: String,
    /// Directory holding one cached JSON record per node.
    pub cache_dir: PathBuf,
    /// Request pacing and limits.
    pub controls: FetchControls,
    /// Durable backend; `None` keeps everything in memory.
    pub connection: Option<ConnectionProfile>,
    /// Target table for the durable backend.
    pub table: TableName,
    /// Skip the durable backend even when a profile is present.
    pub force_in_memory: bool,
    /// Embedding vector length.
    pub embedding_dimensions: usize,
    /// Nodes fetched and stored on first initialization.
    pub prewarm_nodes: Vec<String>,
    /// Node types appended to every full crawl.
    pub supplemental_nodes: Vec<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index_url: DEFAULT_INDEX_URL.to_string(),
            cache_dir: PathBuf::from("data/docs-cache"),
            controls: FetchControls::default(),
            connection: None,
            table: TableName::default(),
            force_in_memory: false,
            embedding_dimensions: DEFAULT_DIMENSIONS,
            prewarm_nodes: to_strings(DEFAULT_PREWARM_NODES),
            supplemental_nodes: to_strings(DEFAULT_SUPPLEMENTAL_NODES),
        }
    }
}

/// Command-line flags for binaries embedding the documentation service.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Documentation site root
    #[arg(long, env = "NODEDOCS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Page listing node documentation links
    #[arg(long, env = "NODEDOCS_INDEX_URL", default_value = DEFAULT_INDEX_URL)]
    pub index_url: String,

    /// Directory for cached node records
    #[arg(long, env = "NODEDOCS_CACHE_DIR", default_value = "data/docs-cache")]
    pub cache_dir: PathBuf,

    /// Milliseconds to wait between live page fetches
    #[arg(long, env = "NODEDOCS_POLITENESS_MS", default_value_t = 500)]
    pub politeness_ms: u64,

    /// Seconds before a page request times out
    #[arg(long, env = "NODEDOCS_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Maximum node links read from the index page
    #[arg(long, env = "NODEDOCS_MAX_INDEX_LINKS", default_value_t = 2000)]
    pub max_index_links: usize,

    /// Postgres host; omit to use the in-memory store
    #[arg(long, env = "PGHOST")]
    pub pg_host: Option<String>,

    /// Postgres port
    #[arg(long, env = "PGPORT", default_value_t = 5432)]
    pub pg_port: u16,

    /// Postgres database
    #[arg(long, env = "PGDATABASE", default_value = "nodedocs")]
    pub pg_database: String,

    /// Postgres user
    #[arg(long, env = "PGUSER", default_value = "postgres")]
    pub pg_user: String,

    /// Postgres password
    #[arg(long, env = "PGPASSWORD", default_value = "", hide_env_values = true)]
    pub pg_password: String,

    /// Schema holding the documentation table
    #[arg(long, env = "NODEDOCS_PG_SCHEMA", default_value = "public")]
    pub pg_schema: String,

    /// Documentation table name
    #[arg(long, env = "NODEDOCS_PG_TABLE", default_value = "node_documentation")]
    pub pg_table: String,

    /// Always use the in-memory store
    #[arg(long, env = "NODEDOCS_IN_MEMORY", default_value_t = false)]
    pub in_memory: bool,

    /// Embedding vector length
    #[arg(long, env = "NODEDOCS_DIMENSIONS", default_value_t = DEFAULT_DIMENSIONS)]
    pub dimensions: usize,

    /// Comma separated node types to pre-warm (defaults to a curated list)
    #[arg(long, env = "NODEDOCS_PREWARM")]
    pub prewarm: Option<String>,
}

impl ConfigArgs {
    /// Converts the parsed flags into a `DocsConfig`.
    pub fn build_config(&self) -> Result<DocsConfig> {
        if self.dimensions == 0 {
            return Err(DocsError::Config(
                "embedding dimensions must be positive".into(),
            ));
        }
        let connection = self.pg_host.as_ref().map(|host| {
            ConnectionProfile::new(
                host.clone(),
                self.pg_port,
                self.pg_database.clone(),
                self.pg_user.clone(),
                self.pg_password.clone(),
            )
        });
        let prewarm_nodes = match &self.prewarm {
            Some(list) => split_list(list),
            None => to_strings(DEFAULT_PREWARM_NODES),
        };

        Ok(DocsConfig {
            base_url: self.base_url.clone(),
            index_url: self.index_url.clone(),
            cache_dir: self.cache_dir.clone(),
            controls: FetchControls::new(
                Duration::from_millis(self.politeness_ms),
                Duration::from_secs(self.timeout_secs.max(1)),
                self.max_index_links,
            ),
            connection,
            table: TableName::new(self.pg_schema.clone(), self.pg_table.clone())?,
            force_in_memory: self.in_memory,
            embedding_dimensions: self.dimensions,
            prewarm_nodes,
            supplemental_nodes: to_strings(DEFAULT_SUPPLEMENTAL_NODES),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ConfigArgs,
    }

    #[test]
    fn builds_in_memory_config_without_host() {
        let harness = Harness::try_parse_from(["nodedocs", "--in-memory", "--prewarm", "a, b,,c"])
            .expect("parse");
        let config = harness.args.build_config().expect("config");
        assert!(config.force_in_memory);
        assert_eq!(config.prewarm_nodes, vec!["a", "b", "c"]);
        assert_eq!(config.embedding_dimensions, DEFAULT_DIMENSIONS);
    }

    #[test]
    fn host_flag_produces_connection_profile() {
        let harness = Harness::try_parse_from([
            "nodedocs",
            "--pg-host",
            "db.internal",
            "--pg-port",
            "6543",
            "--politeness-ms",
            "0",
        ])
        .expect("parse");
        let config = harness.args.build_config().expect("config");
        let profile = config.connection.expect("profile");
        assert_eq!(profile.host, "db.internal");
        assert_eq!(profile.port, 6543);
        assert_eq!(config.controls.politeness_delay(), Duration::ZERO);
    }

    #[test]
    fn zero_dimensions_rejected() {
        let harness =
            Harness::try_parse_from(["nodedocs", "--dimensions", "0"]).expect("parse");
        assert!(matches!(
            harness.args.build_config(),
            Err(DocsError::Config(_))
        ));
    }
}
