use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use nodedocs::{ConfigArgs, DocumentationService};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "nodedocs",
    about = "Fetch, index and search workflow node documentation"
)]
struct NodeDocsCli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the documentation record for a node type
    Get {
        /// Qualified node type, e.g. n8n-nodes-base.httpRequest
        node_type: String,
    },
    /// Rank stored nodes against a free-text query
    Search {
        /// Query text
        query: String,
        /// Maximum number of hits
        #[arg(long, short, default_value_t = 5)]
        limit: usize,
    },
    /// List every stored node type
    List,
    /// Re-fetch a node from the site, bypassing cache and store
    Refresh {
        /// Qualified node type
        node_type: String,
    },
    /// Crawl every discoverable node and store the results
    Crawl,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = NodeDocsCli::parse();
    let config = cli
        .config
        .build_config()
        .context("invalid configuration")?;
    let service = Arc::new(
        DocumentationService::new(config).context("failed to build documentation service")?,
    );

    let outcome = run(&service, cli.command).await;
    service.close().await;
    outcome
}

async fn run(service: &Arc<DocumentationService>, command: Command) -> Result<()> {
    match command {
        Command::Get { node_type } => {
            let doc = service
                .get_node_documentation(&node_type)
                .await
                .ok_or_else(|| anyhow!("no documentation found for {node_type}"))?;
            print_json(&doc)
        }
        Command::Search { query, limit } => {
            let hits = service.search_documentation(&query, limit).await;
            print_json(&hits)
        }
        Command::List => {
            let node_types = service.list_all_node_types().await;
            print_json(&node_types)
        }
        Command::Refresh { node_type } => {
            let doc = service
                .refresh_node_documentation(&node_type)
                .await
                .ok_or_else(|| anyhow!("no documentation found for {node_type}"))?;
            print_json(&doc)
        }
        Command::Crawl => {
            let handle = service.spawn_rebuild();
            let mut progress = handle.subscribe();
            while progress.changed().await.is_ok() {
                let snapshot = *progress.borrow_and_update();
                info!(
                    discovered = snapshot.discovered,
                    fetched = snapshot.fetched,
                    cached = snapshot.cached,
                    failed = snapshot.failed,
                    "crawl progress"
                );
                if snapshot.finished {
                    break;
                }
            }
            let report = handle.wait().await.context("crawl task failed")?;
            print_json(&report)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to write JSON output")?;
    writeln!(out)?;
    Ok(())
}
