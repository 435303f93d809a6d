// ABOUTME: Entry point for the inkwell diagnostic binary.
// ABOUTME: Loads .env and the YAML config, initializes tracing, then lists agents, workflows, or probes providers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use inkwell_agent::Orchestrator;
use inkwell_store::{CollaborationStore, FileConfigStore, MemoryStore, SqliteStore};

const CONFIG_ENV: &str = "INKWELL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "inkwell.yaml";

#[derive(Parser)]
#[command(name = "inkwell")]
#[command(about = "Inspect inkwell agents, workflows, and model providers", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: $INKWELL_CONFIG, then ./inkwell.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite collaboration store; an in-memory store is used when omitted
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List agents
    Agents {
        /// Include disabled agents
        #[arg(short, long)]
        all: bool,
    },

    /// List built-in and configured workflows
    Workflows,

    /// Send a short probe to every registered provider
    CheckProviders,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("inkwell=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let orchestrator = build_orchestrator(&cli)?;

    match cli.command {
        Commands::Agents { all } => {
            let agents = if all {
                orchestrator.list_all_agents()
            } else {
                orchestrator.list_available_agents()
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
            } else {
                for agent in agents {
                    let state = if agent.enabled { "" } else { " (disabled)" };
                    println!("{:<20} {:<13} {}{}", agent.id, agent.specialty.to_string(), agent.provider, state);
                }
            }
        }
        Commands::Workflows => {
            let workflows = orchestrator.list_workflows();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(workflows)?);
            } else {
                for workflow in workflows {
                    let steps: Vec<&str> = workflow.steps.iter().map(|s| s.id.as_str()).collect();
                    println!("{:<24} {}", workflow.id, steps.join(" -> "));
                }
            }
        }
        Commands::CheckProviders => {
            let keys = orchestrator.gateway().keys();
            if keys.is_empty() {
                println!("no providers registered; check API keys and {}", CONFIG_ENV);
            }
            let mut results = Vec::new();
            for key in keys {
                let probe = orchestrator.test_provider(&key).await?;
                let label = key.to_string();
                if !cli.json {
                    match &probe.error {
                        None => println!("{:<40} ok      {} ms", label, probe.latency_ms),
                        Some(e) => println!("{:<40} FAILED  {}", label, e),
                    }
                }
                results.push(serde_json::json!({ "provider": label, "probe": probe }));
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
        }
    }

    Ok(())
}

fn build_orchestrator(cli: &Cli) -> anyhow::Result<Orchestrator> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = FileConfigStore::new(path.clone())
        .load()
        .with_context(|| format!("loading config from {}", path.display()))?;
    config.apply_env().context("applying environment overrides")?;
    tracing::info!(config = %path.display(), providers = config.providers.len(), "inkwell starting up");

    let store: Arc<dyn CollaborationStore> = match &cli.db {
        Some(db) => Arc::new(
            SqliteStore::open(db).with_context(|| format!("opening store at {}", db.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    Ok(Orchestrator::from_config(&config, store)?)
}
