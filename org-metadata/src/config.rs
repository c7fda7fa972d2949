use serde::Deserialize;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("org metadata url cannot be empty")]
    EmptyUrl,

    #[error("org metadata request timeout must be greater than 0")]
    InvalidTimeout,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Base URL of the org metadata service.
    pub url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Explicit context name. Skips resolving the context from the foundation.
    #[serde(default)]
    pub context: Option<String>,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}
