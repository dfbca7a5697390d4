//! Enrichment backfill service.
//!
//! Fills battery-history records with weather and irradiance data:
//! - Bounded runs that stop at a deadline or unit limit and resume later
//! - Skips work already persisted, so repeated runs converge
//! - One-shot CLI runs or an HTTP API for schedulers to call

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use backfill::server::{self, ServerState};
use backfill::{BackfillConfig, BackfillDriver};
use enrich_common::{BackfillKind, BackfillRequest};
use storage::{DocumentStore, SqliteStore};
use weather_provider::OpenMeteoClient;

#[derive(Parser, Debug)]
#[command(name = "backfill")]
#[command(about = "Resumable weather and irradiance enrichment backfill")]
struct Args {
    /// Path to the SQLite document store
    #[arg(long, env = "DATABASE_PATH", default_value = "/data/backfill/enrich.db")]
    database_path: PathBuf,

    /// Backfill configuration file (YAML)
    #[arg(long, env = "BACKFILL_CONFIG", default_value = "config/backfill.yaml")]
    config: PathBuf,

    /// Override the weather provider base URL
    #[arg(long, env = "WEATHER_API_URL")]
    weather_api_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one invocation (or several with --until-complete) and print the summary
    Run {
        /// weather-point, hourly-cloud or hourly-irradiance
        #[arg(long)]
        kind: BackfillKind,

        /// Maximum units processed by one invocation
        #[arg(long)]
        max_units: Option<u32>,

        /// Wall-clock budget of one invocation in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Keep invoking until the backlog is done
        #[arg(long)]
        until_complete: bool,

        /// Upper bound on invocations with --until-complete
        #[arg(long, default_value = "100")]
        max_invocations: u32,
    },

    /// Serve the HTTP API
    Serve {
        /// Port for the HTTP server
        #[arg(long, env = "PORT", default_value = "8085")]
        port: u16,
    },

    /// Print collection counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = BackfillConfig::load_or_default(&args.config)?;
    if let Some(url) = &args.weather_api_url {
        config.provider.base_url = url.clone();
    }

    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(&args.database_path)
            .await
            .with_context(|| format!("Failed to open {}", args.database_path.display()))?,
    );

    match args.command {
        Command::Run {
            kind,
            max_units,
            deadline_ms,
            until_complete,
            max_invocations,
        } => {
            let driver = build_driver(store, config)?;
            let request = BackfillRequest {
                kind,
                max_units,
                deadline_ms,
            };

            let summaries = if until_complete {
                driver.run_until_complete(&request, max_invocations).await?
            } else {
                vec![driver.run(&request).await?]
            };

            for summary in &summaries {
                println!("{}", serde_json::to_string(summary)?);
            }
        }
        Command::Serve { port } => {
            let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .context("Failed to install Prometheus recorder")?;
            info!("Prometheus metrics exporter initialized");

            let driver = Arc::new(build_driver(store.clone(), config)?);
            let state = Arc::new(ServerState::new(driver, store, Some(prometheus)));
            server::run_server(state, port).await?;
        }
        Command::Status => {
            let stats = store.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn build_driver(store: Arc<dyn DocumentStore>, config: BackfillConfig) -> Result<BackfillDriver> {
    let provider = OpenMeteoClient::new(config.provider_config())
        .context("Failed to build weather provider client")?;
    info!(url = %provider.archive_url(), "Using Open-Meteo archive");
    Ok(BackfillDriver::new(store, Arc::new(provider), config))
}
