use cfstats_agent::api::{self, ApiError};
use cfstats_agent::store::StoreError;
use cfstats_agent::{Dispatcher, RowAggregator, SqliteStore};
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use org_metadata::{MetadataCache, MetadataError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use telemetry::TelemetryError;

mod config;
mod telemetry;

#[derive(Parser)]
#[command(version, about = "Cloud Foundry statistics enriched with org metadata")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the HTTP API
    Serve(ConfigArgs),
    /// Load and validate the configuration, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    OrgMetadata(#[from] MetadataError),
    #[error("could not open database: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        CliCommand::Serve(args) => serve(&args.config),
        CliCommand::CheckConfig(args) => check_config(&args.config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Exiting");
            eprintln!("foundrystats: {err}");
            ExitCode::FAILURE
        }
    }
}

fn check_config(path: &Path) -> Result<(), CliError> {
    let config = Config::from_file(path)?;
    let context = org_metadata::context::resolve_context(
        &config.foundation,
        config.org_metadata.context.as_deref(),
    )
    .map_err(MetadataError::from)?;
    println!(
        "{}: ok (foundation {}, context {context})",
        path.display(),
        config.foundation
    );
    Ok(())
}

fn serve(path: &Path) -> Result<(), CliError> {
    let config = Config::from_file(path)?;
    let _sentry = telemetry::init_logging(&config.logging)?;
    telemetry::init_metrics(config.metrics.as_ref())?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<(), CliError> {
    tracing::info!(foundation = %config.foundation, "Starting foundrystats");

    let cache = MetadataCache::from_config(&config.foundation, &config.org_metadata).await?;
    let store = SqliteStore::open(&config.database.path)?;

    let aggregator = RowAggregator::new(Arc::new(store), Arc::new(cache), config.foundation);
    let dispatcher = Arc::new(Dispatcher::new(aggregator, env!("CARGO_PKG_VERSION")));

    api::serve(&config.listener, dispatcher).await?;
    Ok(())
}
