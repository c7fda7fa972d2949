//! Process wide logging, error reporting and metrics.
use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use shared::metrics_defs::describe_metrics;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const METRICS_PREFIX: &str = "foundrystats";

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log level: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("could not install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid sentry dsn: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),

    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] StatsdError),

    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
}

/// Installs the log subscriber. `RUST_LOG` takes precedence over the
/// configured level. The returned guard flushes Sentry events on drop.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<sentry::ClientInitGuard>, TelemetryError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let guard = match &config.sentry_dsn {
        Some(dsn) if !dsn.is_empty() => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(dsn.parse()?),
            release: sentry::release_name!(),
            ..Default::default()
        })),
        _ => None,
    };
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry_layer)
        .try_init()?;

    Ok(guard)
}

/// Sends metrics to statsd when configured. Without a recorder the metric
/// macros are no-ops.
pub fn init_metrics(config: Option<&MetricsConfig>) -> Result<(), TelemetryError> {
    let Some(config) = config else {
        tracing::info!("No metrics configured");
        return Ok(());
    };

    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))?;
    metrics::set_global_recorder(recorder).map_err(|_| TelemetryError::RecorderInstalled)?;

    describe_metrics(org_metadata::metrics_defs::ALL_METRICS);
    describe_metrics(cfstats_agent::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}
