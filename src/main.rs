use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rank_keeper::api::{build_router, state::AppState};
use rank_keeper::config::AppConfig;
use rank_keeper::ingest::Ingestor;
use rank_keeper::models::Pagination;
use rank_keeper::ranking::{Partition, RankQuery};
use rank_keeper::storage::{JsonlLedger, MemoryProfiles, ResultStore};

#[derive(Parser)]
#[command(name = "rank-keeper")]
#[command(about = "Score ingestion and leaderboard service")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },

    /// Rebuild aggregates and the leaderboard from the ledger and print a summary
    Replay {
        /// Leaderboard rows to print
        #[arg(long, default_value = "10")]
        top: u32,
    },

    /// Check aggregates and the leaderboard against the ledger
    Audit,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        AppConfig::from_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        AppConfig::default()
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

async fn open_ingestor(config: &AppConfig) -> Result<Arc<Ingestor>> {
    let store: Arc<dyn ResultStore> = Arc::new(JsonlLedger::open(&config.storage()).await?);
    let ingestor = Ingestor::open(store, config.ranking.storage_timeout()).await?;
    Ok(Arc::new(ingestor))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting rank-keeper v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { host, port } => {
            let ingestor = open_ingestor(&config).await?;
            let profiles = Arc::new(MemoryProfiles::load(&config.storage())?);
            let state = AppState::new(ingestor, profiles, &config.ranking);
            let app = build_router(state, &config.server.cors_origin);

            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Replay { top } => {
            let ingestor = open_ingestor(&config).await?;
            let state = ingestor.state();
            let query = RankQuery::new(
                ingestor.store(),
                Arc::new(MemoryProfiles::load(&config.storage())?),
                state.clone(),
                config.ranking.storage_timeout(),
            );

            println!("Players:        {}", state.player_count());
            println!("Ranked players: {}", state.cache().len());

            let page = query
                .top_n(&Partition::Global, Pagination::new(Some(1), Some(top)))
                .await?;
            for row in page.rows {
                println!(
                    "{:>4}. {:<24} {:>10}  ({}, level {})",
                    row.rank,
                    row.player.username.as_deref().unwrap_or(row.player.id.as_str()),
                    row.best_score,
                    row.game_mode,
                    row.level
                );
            }
        }
        Commands::Audit => {
            let ingestor = open_ingestor(&config).await?;
            let query = RankQuery::new(
                ingestor.store(),
                Arc::new(MemoryProfiles::new()),
                ingestor.state(),
                config.ranking.storage_timeout(),
            );

            let divergences = query.audit().await?;
            if divergences.is_empty() {
                println!("Ledger, aggregates and leaderboard agree");
            } else {
                for d in &divergences {
                    println!("{}", serde_json::to_string(d)?);
                }
                bail!("{} players diverge from the ledger", divergences.len());
            }
        }
    }

    Ok(())
}
