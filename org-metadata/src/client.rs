//! Read-only HTTP client for the org metadata service.
//!
//! Every public read degrades to "no data" on failure. Errors are logged here
//! and never reach the caller.
use crate::MetadataError;
use crate::types::{OrgMetadata, ReaderStatus};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// The reads the metadata cache needs from the remote service.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Contexts the remote service serves. Empty if unknown.
    async fn list_contexts(&self) -> Vec<String>;

    /// Status of the remote cache, None if unknown.
    async fn cache_status(&self) -> Option<ReaderStatus>;

    /// Metadata for every org in the context, or for a single org.
    async fn bulk_fetch(
        &self,
        context: &str,
        org: Option<&str>,
    ) -> Option<HashMap<String, OrgMetadata>>;
}

#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    #[error("request to {url} timed out")]
    Timeout { url: Url },

    #[error("request to {url} failed: {source}")]
    Transport { url: Url, source: reqwest::Error },

    #[error("{url} returned {status}")]
    Status { url: Url, status: StatusCode },

    #[error("malformed response body from {url}: {source}")]
    Body { url: Url, source: reqwest::Error },

    #[error("cannot build url from {0}")]
    InvalidUrl(String),
}

#[derive(Clone)]
pub struct RemoteStatusClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RemoteStatusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MetadataError> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| MetadataError::InvalidUrl(base_url.to_string()))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(RemoteStatusClient { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, RemoteError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "Org metadata GET request");

        let response = self.client.get(url.clone()).send().await.map_err(|source| {
            if source.is_timeout() {
                RemoteError::Timeout { url: url.clone() }
            } else {
                RemoteError::Transport {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status { url, status });
        }

        response.json::<T>().await.map_err(|source| {
            if source.is_timeout() {
                RemoteError::Timeout { url: url.clone() }
            } else {
                RemoteError::Body {
                    url: url.clone(),
                    source,
                }
            }
        })
    }

    fn log_failure(what: &str, err: &RemoteError) {
        match err {
            RemoteError::Status { .. } => {
                tracing::info!(error = %err, "Error requesting {what} from org metadata service")
            }
            _ => tracing::error!(error = %err, "Error requesting {what} from org metadata service"),
        }
    }
}

#[async_trait]
impl MetadataSource for RemoteStatusClient {
    async fn list_contexts(&self) -> Vec<String> {
        match self.get_json::<Option<Vec<String>>>(&["contexts", ""]).await {
            Ok(Some(contexts)) if !contexts.is_empty() => contexts,
            Ok(_) => {
                tracing::warn!("No contexts available");
                Vec::new()
            }
            Err(err) => {
                Self::log_failure("contexts", &err);
                Vec::new()
            }
        }
    }

    async fn cache_status(&self) -> Option<ReaderStatus> {
        self.get_json::<ReaderStatus>(&["reader_status"])
            .await
            .inspect_err(|err| Self::log_failure("reader status", err))
            .ok()
    }

    async fn bulk_fetch(
        &self,
        context: &str,
        org: Option<&str>,
    ) -> Option<HashMap<String, OrgMetadata>> {
        let mut segments = vec!["contexts", context, "orgs_metadata"];
        if let Some(org) = org {
            segments.push(org);
        }

        let body = self
            .get_json::<HashMap<String, Value>>(&segments)
            .await
            .inspect_err(|err| Self::log_failure("org metadata", err))
            .ok()?;

        let orgs = body
            .into_iter()
            .filter_map(|(org, metadata)| match metadata {
                Value::Object(metadata) => Some((org, metadata)),
                other => {
                    tracing::debug!(%org, value = %other, "Skipping non-object org metadata");
                    None
                }
            })
            .collect();

        Some(orgs)
    }
}
