//! Graphmint CLI - publish and query knowledge assets on a decentralized
//! knowledge graph

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::info;

use graphmint_core::config::Config;
use graphmint_core::graph::{GraphClient, GraphService, PublishOptions, Ual};
use graphmint_core::ingest::{
    AttachmentOutcome, BatchRunner, PublishStatus, enumerate_assets,
};
use graphmint_core::llm::LlmClient;
use graphmint_core::query::constructor::{EXAMPLE_QUERY, FALLBACK_QUERY};
use graphmint_core::query::{QueryConstructor, QueryExecutor, StructuredQuery};
use graphmint_core::schema::SchemaTemplate;

/// Explorer URL prefixes, keyed by whether the target network is a mainnet
const EXPLORER_MAINNET: &str = "https://dkg.origintrail.io/explore?ual=";
const EXPLORER_TESTNET: &str = "https://dkg-testnet.origintrail.io/explore?ual=";

/// Blockchain names that resolve to the mainnet explorer
const MAINNET_CHAINS: [&str; 3] = ["otp:2043", "base:8453", "gnosis:100"];

#[derive(Parser)]
#[command(name = "graphmint")]
#[command(author, version, about = "Publish and query knowledge assets on a decentralized knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish all assets in a directory as knowledge assets
    Publish {
        /// Input directory (defaults to assets.dir from config)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Ask a natural-language question against the graph
    Query {
        /// The question to answer
        question: String,
    },

    /// Run configuration and connectivity health checks
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Show config file path
    Path,
    /// Reset configuration to defaults
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("graphmint=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Publish { dir } => cmd_publish(dir, cli.quiet).await,
        Commands::Query { question } => cmd_query(&question, cli.quiet).await,
        Commands::Doctor => cmd_doctor(cli.quiet).await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_publish(dir: Option<PathBuf>, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let assets_dir = dir.unwrap_or_else(|| config.assets.dir.clone());
    let assets = enumerate_assets(&assets_dir)?;

    if assets.is_empty() {
        if !quiet {
            println!("No asset files found in {}", assets_dir.display());
        }
        return Ok(());
    }

    let options = PublishOptions::from_config(&config)?;
    let paranet = config
        .paranet
        .ual
        .as_deref()
        .map(Ual::parse)
        .transpose()?;

    let api_key = config
        .llm
        .resolved_api_key()?
        .ok_or_else(|| anyhow!("No LLM API key found. Set GRAPHMINT_API_KEY or OPENROUTER_API_KEY"))?;
    let generator = Arc::new(LlmClient::new(config.llm.clone(), api_key)?);
    let graph = Arc::new(GraphClient::new(&config.node)?);

    let template = SchemaTemplate::memory();
    let runner = BatchRunner::new(generator, graph, paranet);

    if !quiet {
        println!(
            "Publishing {} asset(s) from {}...",
            assets.len(),
            assets_dir.display()
        );
    }

    let outcomes = runner.run(&assets, &template, &options).await?;

    let mut published = 0;
    let mut any_attached = false;
    for outcome in &outcomes {
        match &outcome.status {
            PublishStatus::Published { ual, attachment } => {
                published += 1;
                println!("{}: published", outcome.source);
                println!("  UAL: {}", ual);
                println!("  Explore at: {}{}", explorer_prefix(&options.blockchain_name), ual);
                match attachment {
                    Some(AttachmentOutcome::Attached { paranet }) => {
                        any_attached = true;
                        println!("  Submitted to paranet: {}", paranet);
                    }
                    Some(AttachmentOutcome::AttachFailed { reason }) => {
                        println!("  Paranet submission failed: {}", reason);
                    }
                    None => {}
                }
            }
            PublishStatus::Failed { reason } => {
                println!("{}: failed - {}", outcome.source, reason);
            }
        }
    }

    if !quiet {
        println!("\n{}/{} asset(s) published", published, outcomes.len());
    }

    // Best-effort wait for graph propagation before the paranet is queried.
    // This is a configurable delay, not a consistency guarantee.
    if any_attached && config.publish.propagation_wait_secs > 0 {
        info!(
            secs = config.publish.propagation_wait_secs,
            "Waiting for graph propagation"
        );
        tokio::time::sleep(Duration::from_secs(config.publish.propagation_wait_secs)).await;
    }

    Ok(())
}

async fn cmd_query(question: &str, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let options = PublishOptions::from_config(&config)?;
    let graph = Arc::new(GraphClient::new(&config.node)?);

    // Probe before anything else; a dead node means zero query executions.
    let node = graph.node_info().await?;
    if !quiet {
        println!("Connected to node (version {})", node.version);
    }

    let template = SchemaTemplate::memory();

    // Query generation is best-effort: a missing or malformed model response
    // drops to the static fallback query.
    let query = match build_generator(&config)? {
        Some(generator) => {
            let constructor = QueryConstructor::new(generator);
            match constructor.construct(question, &template, EXAMPLE_QUERY).await {
                Ok(query) => query,
                Err(e) => {
                    if !quiet {
                        println!("Query generation failed ({}), using fallback query", e);
                    }
                    StructuredQuery::Fallback
                }
            }
        }
        None => {
            if !quiet {
                println!("No LLM API key configured, using fallback query");
            }
            StructuredQuery::Fallback
        }
    };

    let executor = QueryExecutor::new(graph, FALLBACK_QUERY);
    let results = executor.execute(query, &options).await?;

    if results.is_empty() {
        println!("No results.");
    } else {
        for line in results.flatten() {
            println!("{}", line);
        }
        if !quiet {
            println!("\n{} row(s)", results.len());
        }
    }

    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    let mut healthy = true;

    let config = match Config::load() {
        Ok(config) => {
            println!("config: ok ({})", Config::config_path()?.display());
            Some(config)
        }
        Err(e) => {
            println!("config: FAILED - {}", e);
            healthy = false;
            None
        }
    };

    if let Some(config) = &config {
        match config.validate() {
            Ok(()) => println!("config validation: ok"),
            Err(e) => {
                println!("config validation: FAILED - {}", e);
                healthy = false;
            }
        }

        match config.blockchain.redacted_private_key()? {
            Some(key) => println!("signer key: ok ({})", key),
            None => {
                println!("signer key: not set (GRAPHMINT_PRIVATE_KEY or PRIVATE_KEY)");
                healthy = false;
            }
        }

        match config.llm.redacted_api_key()? {
            Some(key) => println!("llm api key: ok ({})", key),
            None => {
                println!("llm api key: not set (GRAPHMINT_API_KEY or OPENROUTER_API_KEY)");
                healthy = false;
            }
        }

        let graph = GraphClient::new(&config.node)?;
        match graph.node_info().await {
            Ok(info) => println!("node: ok (version {})", info.version),
            Err(e) => {
                println!("node: FAILED - {}", e);
                healthy = false;
            }
        }
    }

    if !quiet {
        println!();
        if healthy {
            println!("All checks passed.");
        } else {
            println!("Some checks failed.");
        }
    }

    if healthy {
        Ok(())
    } else {
        Err(anyhow!("health check failed"))
    }
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, config.get(&key)?);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults");
            }
        }
    }
    Ok(())
}

/// Build the LLM client when an API key is available; queries can proceed
/// without one by using the fallback query.
fn build_generator(config: &Config) -> anyhow::Result<Option<Arc<LlmClient>>> {
    match config.llm.resolved_api_key()? {
        Some(api_key) => Ok(Some(Arc::new(LlmClient::new(config.llm.clone(), api_key)?))),
        None => Ok(None),
    }
}

/// Pick the explorer prefix for a blockchain name
fn explorer_prefix(blockchain_name: &str) -> &'static str {
    if MAINNET_CHAINS.contains(&blockchain_name) {
        EXPLORER_MAINNET
    } else {
        EXPLORER_TESTNET
    }
}
