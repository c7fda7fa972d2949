use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for aggregation and dispatch.
pub type Result<T, E = AgentError> = std::result::Result<T, E>;

/// Errors returned in place of data. The HTTP layer picks the status code
/// from [`AgentError::kind`].
#[derive(Error, Debug)]
pub enum AgentError {
    /// The request's filters cannot be combined. No query was run.
    #[error("{message}")]
    Validation { message: String },

    #[error("No such endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Query failed: {0}")]
    Store(#[from] StoreError),
}

impl AgentError {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Validation { .. } => "validation",
            AgentError::UnknownEndpoint(_) => "unknown_endpoint",
            AgentError::Store(_) => "store",
        }
    }
}
