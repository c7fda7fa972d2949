//! Read-only aggregation of Cloud Foundry records with org metadata.
//!
//! Rows come from the relational mirror of the Cloud Foundry database and are
//! enriched with the director (and optionally the full metadata) of their
//! organization, taken from the [`org_metadata::MetadataCache`].

pub mod aggregator;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod entities;
pub mod errors;
pub mod filters;
pub mod metrics_defs;
pub mod projection;
pub mod store;

#[cfg(test)]
mod testutils;

pub use aggregator::{AggregatedRow, RowAggregator};
pub use dispatch::Dispatcher;
pub use entities::EntityKind;
pub use errors::AgentError;
pub use filters::QueryFilterSet;
pub use store::{RelationalStore, SqliteStore};
