use cfstats_agent::config::{DatabaseConfig, Listener};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

fn default_log_level() -> String {
    "info".into()
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            sentry_dsn: None,
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Local deployment identifier, e.g. `pcf-npe01-east`.
    pub foundation: String,
    #[serde(default)]
    pub listener: Listener,
    pub database: DatabaseConfig,
    pub org_metadata: org_metadata::config::Config,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub metrics: Option<MetricsConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.foundation.trim().is_empty() {
            return Err(ValidationError::EmptyFoundation);
        }
        self.listener.validate()?;
        self.database.validate()?;
        self.org_metadata.validate()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("foundation cannot be empty")]
    EmptyFoundation,

    #[error(transparent)]
    Agent(#[from] cfstats_agent::config::ValidationError),

    #[error(transparent)]
    OrgMetadata(#[from] org_metadata::config::ValidationError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ValidationError),
}
