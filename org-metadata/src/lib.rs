//! Client side of the remote org-metadata service.
//!
//! The remote service keeps its own cache of organization metadata (most
//! notably the "director" of each org) partitioned by context. This crate
//! mirrors that data locally and only re-downloads it when the remote cache
//! timestamp moves.

pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod metrics_defs;
pub mod types;

#[cfg(test)]
mod testutils;

pub use cache::{MetadataCache, RefreshOutcome};
pub use client::{MetadataSource, RemoteStatusClient};
pub use context::{ContextError, FetchContext};
pub use types::{CacheTimestamp, OrgMetadata, UNKNOWN_DIRECTOR};

use tokio::sync::AcquireError;

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("invalid foundation: {0}")]
    InvalidFoundation(#[from] ContextError),

    #[error("context {context} is not available from the org metadata service (available: {available:?})")]
    ContextUnavailable {
        context: String,
        available: Vec<String>,
    },

    #[error("invalid org metadata url: {0}")]
    InvalidUrl(String),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("refresh lock closed")]
    ConcurrentRefresh(#[from] AcquireError),
}
