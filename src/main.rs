mod config;
mod error;
mod ml;
mod types;
mod web;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogFormat, LoggingSettings};
use ml::evaluation::{self, DEFAULT_ACCURACY_THRESHOLD};
use ml::{InferenceAggregator, ModelRegistry};
use types::{InputRecord, PredictionResponse};
use web::{start_api_server, AppState};

#[derive(Parser)]
#[command(name = "salary-band-estimator")]
#[command(version)]
#[command(about = "Salary band estimates from an ensemble of classifiers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the prediction API
    Serve {
        /// Listen address (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Predict one record read from a JSON file or stdin
    Predict {
        /// Input record file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// List the registered models and their artifacts
    Models,
    /// Score every model against a labelled dataset
    Evaluate {
        /// JSON array of records with a `target` field
        #[arg(short, long)]
        dataset: PathBuf,
        /// Minimum accuracy a model must reach
        #[arg(short, long, default_value_t = DEFAULT_ACCURACY_THRESHOLD)]
        threshold: f64,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config = AppConfig::load(&cli.config)?;
    init_logging(&app_config.logging, cli.verbose)?;

    info!("Salary band estimator v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| app_config.server.host.clone());
            let port = port.unwrap_or(app_config.server.port);
            let aggregator = build_aggregator(&app_config)?;
            let state = AppState::new(Arc::new(aggregator));
            start_api_server(state, &host, port, &app_config.server.cors_origins).await?;
        }
        Commands::Predict { input } => {
            run_predict(&app_config, input.as_deref()).await?;
        }
        Commands::Models => {
            show_models(&app_config)?;
        }
        Commands::Evaluate { dataset, threshold } => {
            run_evaluation(&app_config, &dataset, threshold).await?;
        }
        Commands::Config => {
            print!("{}", app_config.to_toml()?);
        }
    }

    Ok(())
}

fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&settings.level))
            .context("Invalid logging.level")?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

fn build_aggregator(app_config: &AppConfig) -> Result<InferenceAggregator> {
    let registry = ModelRegistry::new(&app_config.models.dir, app_config.models.registry.clone())?;
    let aggregator = InferenceAggregator::from_registry(Arc::new(registry));
    if app_config.models.cache {
        info!("Classifier cache enabled");
        Ok(aggregator.with_cache())
    } else {
        Ok(aggregator)
    }
}

async fn run_predict(app_config: &AppConfig, input: Option<&Path>) -> Result<()> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read record from stdin")?;
            buf
        }
    };
    let record: InputRecord = serde_json::from_str(&raw).context("Invalid input record")?;

    let aggregator = build_aggregator(app_config)?;
    let previsoes = tokio::task::spawn_blocking(move || aggregator.predict_all(&record)).await?;
    if previsoes.failure_count() > 0 {
        warn!("{} of {} models failed", previsoes.failure_count(), previsoes.len());
    }

    println!("{}", serde_json::to_string_pretty(&PredictionResponse { previsoes })?);
    Ok(())
}

fn show_models(app_config: &AppConfig) -> Result<()> {
    let registry = ModelRegistry::new(&app_config.models.dir, app_config.models.registry.clone())?;

    println!("\n=== Registered Models ({}) ===\n", registry.base_dir().display());
    for info in registry.describe() {
        let status = if info.exists { "ok" } else { "MISSING" };
        println!("  {:<12} {:<8} {}", info.id, status, info.path.display());
        if let (Some(size), Some(sha)) = (info.size_bytes, info.sha256.as_deref()) {
            println!("  {:<12} {} bytes, sha256 {}", "", size, sha);
        }
    }
    println!();
    Ok(())
}

async fn run_evaluation(app_config: &AppConfig, dataset: &Path, threshold: f64) -> Result<()> {
    let records = evaluation::load_dataset(dataset)?;
    info!("Evaluating {} records from {}", records.len(), dataset.display());

    let aggregator = build_aggregator(app_config)?;
    let report = tokio::task::spawn_blocking(move || {
        evaluation::evaluate(&aggregator, &records, threshold)
    })
    .await?;

    report.print_summary();

    if report.all_passed() {
        info!("All models reached accuracy {:.3}", threshold);
        Ok(())
    } else {
        Err(anyhow!(
            "Models below accuracy {:.3}: {}",
            threshold,
            report.failing_models().join(", ")
        ))
    }
}
