//! `chatflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `migrate`:  run pending database migrations.
//! - `validate`: validate a flow definition JSON file.
//! - `chat`:     talk to one or more flows from the terminal.

mod chat;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::FlowDefinition;

#[derive(Parser)]
#[command(
    name = "chatflow",
    about = "Conversational flow engine for messaging channels",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a flow definition JSON file.
    Validate {
        /// Path to the flow JSON file.
        path: PathBuf,
    },
    /// Interactive simulator over in-memory storage.
    Chat(chat::ChatArgs),
}

/// Read and parse one flow definition file.
pub(crate) fn read_flow(path: &Path) -> Result<FlowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid flow JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatflow=info,engine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database_url, db::pool::DEFAULT_MAX_CONNECTIONS)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool)
                .await
                .context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let flow = read_flow(&path)?;

            match engine::validate_flow(&flow) {
                Ok(start) => {
                    println!(
                        "✅ Flow '{}' is valid: {} nodes, {} edges, starts at '{start}'.",
                        flow.name,
                        flow.nodes.len(),
                        flow.edges.len()
                    );
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Chat(args) => chat::run(args).await?,
    }

    Ok(())
}
