use crate::MetadataError;
use crate::client::{MetadataSource, RemoteStatusClient};
use crate::config::Config;
use crate::context::{FetchContext, resolve_context};
use crate::metrics_defs::{
    BULK_FETCH, CACHE_HIT, CACHE_MISS, CACHED_ORGS, REFRESH_SKIPPED, SYNC_DURATION, SYNC_ROWS,
};
use crate::types::{CacheTimestamp, OrgMetadata, director_of};
use parking_lot::RwLock;
use shared::{counter, gauge, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Result of a single refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// No remote context applies to this deployment.
    Disabled,
    /// The remote cache timestamp could not be read.
    StatusUnavailable,
    /// The remote cache has not moved since the last sync.
    Unchanged,
    /// The timestamp moved but the bulk download failed.
    FetchUnavailable,
    Refreshed { orgs: usize },
}

struct CacheState {
    // Keyed by lower-cased org name.
    orgs: HashMap<String, OrgMetadata>,
    last_synced: Option<CacheTimestamp>,
}

/// Local mirror of the remote org metadata, re-synchronized only when the
/// remote cache timestamp changes.
///
/// Entries are only ever inserted or replaced wholesale by a refresh. Orgs
/// missing from a refresh response keep their previous entry.
pub struct MetadataCache {
    context: FetchContext,
    source: Arc<dyn MetadataSource>,
    state: RwLock<CacheState>,
    // Only one refresh runs at a time. Callers queued behind it observe the
    // timestamp it stored and skip the download.
    update_lock: Semaphore,
}

impl MetadataCache {
    /// Fails with `ContextUnavailable` when the remote service does not serve
    /// the resolved context.
    pub async fn new(
        context: FetchContext,
        source: Arc<dyn MetadataSource>,
    ) -> Result<Self, MetadataError> {
        if let FetchContext::Remote(name) = &context {
            let available = source.list_contexts().await;
            if !available.contains(name) {
                tracing::error!(
                    context = %name,
                    available = ?available,
                    "Context not in the org metadata service's context list"
                );
                return Err(MetadataError::ContextUnavailable {
                    context: name.clone(),
                    available,
                });
            }
        }

        tracing::info!(%context, "Initialized org metadata cache");

        Ok(MetadataCache {
            context,
            source,
            state: RwLock::new(CacheState {
                orgs: HashMap::new(),
                last_synced: None,
            }),
            update_lock: Semaphore::new(1),
        })
    }

    /// Resolves the context for `foundation` and connects to the remote
    /// service described by `config`.
    pub async fn from_config(foundation: &str, config: &Config) -> Result<Self, MetadataError> {
        let context = resolve_context(foundation, config.context.as_deref())?;
        let client = RemoteStatusClient::new(&config.url, config.request_timeout())?;
        Self::new(context, Arc::new(client)).await
    }

    pub fn context(&self) -> &FetchContext {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.state.read().orgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_synced(&self) -> Option<CacheTimestamp> {
        self.state.read().last_synced.clone()
    }

    /// Downloads fresh metadata if the remote cache moved since the last sync.
    ///
    /// The new timestamp is recorded before the download, so a failed download
    /// is not retried until the remote cache moves again.
    pub async fn refresh(&self, org: Option<&str>) -> Result<RefreshOutcome, MetadataError> {
        let Some(context) = self.context.name() else {
            tracing::debug!("No org metadata context, skip refresh");
            return Ok(RefreshOutcome::Disabled);
        };

        let _permit = self.update_lock.acquire().await?;
        let start = Instant::now();

        let remote = self
            .source
            .cache_status()
            .await
            .and_then(|status| status.cache_timestamp());

        let Some(remote) = remote else {
            tracing::info!("Remote cache not ready, skip refresh");
            counter!(REFRESH_SKIPPED, "reason" => "status_unavailable").increment(1);
            return Ok(RefreshOutcome::StatusUnavailable);
        };

        {
            let mut state = self.state.write();
            if state.last_synced.as_ref() == Some(&remote) {
                tracing::debug!(timestamp = %remote, "Remote cache timestamp unchanged, skip refresh");
                counter!(REFRESH_SKIPPED, "reason" => "unchanged").increment(1);
                return Ok(RefreshOutcome::Unchanged);
            }
            state.last_synced = Some(remote.clone());
        }

        tracing::debug!(%context, timestamp = %remote, "Requesting org metadata bulk download");
        let Some(orgs) = self.source.bulk_fetch(context, org).await else {
            counter!(BULK_FETCH, "outcome" => "unavailable").increment(1);
            return Ok(RefreshOutcome::FetchUnavailable);
        };

        let fetched = orgs.len();
        let cached = {
            let mut state = self.state.write();
            state.orgs.extend(
                orgs.into_iter()
                    .filter(|(_, metadata)| !metadata.is_empty())
                    .map(|(org, metadata)| (org.to_lowercase(), metadata)),
            );
            state.orgs.len()
        };

        counter!(BULK_FETCH, "outcome" => "ok").increment(1);
        histogram!(SYNC_DURATION).record(start.elapsed().as_secs_f64());
        histogram!(SYNC_ROWS).record(fetched as f64);
        gauge!(CACHED_ORGS).set(cached as f64);
        tracing::debug!(%context, fetched, cached, "Refreshed org metadata cache");

        Ok(RefreshOutcome::Refreshed { orgs: fetched })
    }

    /// Metadata for `org`, empty if unknown. Never fails.
    ///
    /// On a miss with `refresh_on_miss` set, one (throttled) refresh is
    /// attempted before looking up again.
    pub async fn get_metadata(&self, org: &str, refresh_on_miss: bool) -> OrgMetadata {
        let org = org.to_lowercase();

        if let Some(metadata) = self.lookup(&org) {
            counter!(CACHE_HIT).increment(1);
            tracing::debug!(%org, "Org metadata retrieved from cache");
            return metadata;
        }

        counter!(CACHE_MISS).increment(1);
        if !refresh_on_miss {
            return OrgMetadata::new();
        }

        tracing::debug!(%org, "Org not in cache, refresh");
        if let Err(err) = self.refresh(None).await {
            tracing::error!(error = %err, "Org metadata refresh failed");
        }
        self.lookup(&org).unwrap_or_default()
    }

    /// The director of `org`, or "Unknown".
    pub async fn get_director(&self, org: &str, refresh_on_miss: bool) -> String {
        let director = director_of(&self.get_metadata(org, refresh_on_miss).await);
        tracing::debug!(%org, %director, "Org/director lookup");
        director
    }

    fn lookup(&self, org: &str) -> Option<OrgMetadata> {
        self.state.read().orgs.get(org).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::FakeSource;
    use crate::types::UNKNOWN_DIRECTOR;
    use serde_json::json;
    use std::time::Duration;

    async fn cache_with(source: &Arc<FakeSource>) -> MetadataCache {
        MetadataCache::new(FetchContext::Remote("PCF_NPE".into()), source.clone())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_director_lookup_scenario() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        source.set_timestamp(json!("T1"));
        source.set_orgs(Some(json!({"acme": {"director": "J. Doe"}})));
        let cache = cache_with(&source).await;

        assert_eq!(cache.get_director("ACME", true).await, "J. Doe");
        assert_eq!(cache.get_director("acme", true).await, "J. Doe");
        assert_eq!(source.fetch_calls(), 1);
        // The second lookup is a hit, the remote is not consulted at all
        assert_eq!(source.status_calls(), 1);
        assert_eq!(cache.last_synced(), CacheTimestamp::from_value(json!("T1")));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        source.set_timestamp(json!(1714557600));
        source.set_orgs(Some(json!({"acme": {"director": "J. Doe"}})));
        let cache = cache_with(&source).await;

        assert_eq!(
            cache.refresh(None).await.unwrap(),
            RefreshOutcome::Refreshed { orgs: 1 }
        );
        assert_eq!(cache.refresh(None).await.unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(source.fetch_calls(), 1);
        assert_eq!(source.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_miss_on_unchanged_remote_skips_download() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        source.set_timestamp(json!("T1"));
        source.set_orgs(Some(json!({"acme": {"director": "J. Doe"}})));
        let cache = cache_with(&source).await;

        assert_eq!(cache.get_director("nonexistent-org", true).await, UNKNOWN_DIRECTOR);
        assert_eq!(cache.get_director("other-org", true).await, UNKNOWN_DIRECTOR);
        assert_eq!(source.fetch_calls(), 1);
        assert_eq!(source.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_remote_unreachable() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        let cache = cache_with(&source).await;

        assert_eq!(
            cache.refresh(None).await.unwrap(),
            RefreshOutcome::StatusUnavailable
        );
        assert_eq!(cache.get_director("acme", true).await, UNKNOWN_DIRECTOR);
        assert!(cache.get_metadata("acme", true).await.is_empty());
        assert_eq!(source.fetch_calls(), 0);
        assert_eq!(cache.last_synced(), None);
    }

    #[tokio::test]
    async fn test_no_refresh_without_refresh_on_miss() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        source.set_timestamp(json!("T1"));
        source.set_orgs(Some(json!({"acme": {"director": "J. Doe"}})));
        let cache = cache_with(&source).await;

        assert_eq!(cache.get_director("acme", false).await, UNKNOWN_DIRECTOR);
        assert_eq!(source.status_calls(), 0);
        assert_eq!(source.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_only_adds_or_replaces() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        source.set_timestamp(json!("T1"));
        source.set_orgs(Some(json!({
            "Acme": {"director": "J. Doe", "cost_center": "42"},
            "beta": {"director": "R. Roe"},
            "empty": {},
        })));
        let cache = cache_with(&source).await;
        cache.refresh(None).await.unwrap();
        assert_eq!(cache.len(), 2);

        source.set_timestamp(json!("T2"));
        source.set_orgs(Some(json!({"acme": {"director": "A. New"}, "empty": {}})));
        assert_eq!(
            cache.refresh(None).await.unwrap(),
            RefreshOutcome::Refreshed { orgs: 2 }
        );

        // Replaced wholesale, not merged
        let acme = cache.get_metadata("acme", false).await;
        assert_eq!(acme.get("director"), Some(&json!("A. New")));
        assert_eq!(acme.get("cost_center"), None);

        // Absent from the response, left untouched
        assert_eq!(cache.get_director("beta", false).await, "R. Roe");
        assert!(cache.get_metadata("empty", false).await.is_empty());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_download_waits_for_next_timestamp() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        source.set_timestamp(json!("T1"));
        let cache = cache_with(&source).await;

        assert_eq!(
            cache.refresh(None).await.unwrap(),
            RefreshOutcome::FetchUnavailable
        );

        source.set_orgs(Some(json!({"acme": {"director": "J. Doe"}})));
        assert_eq!(cache.refresh(None).await.unwrap(), RefreshOutcome::Unchanged);

        source.set_timestamp(json!("T2"));
        assert_eq!(
            cache.refresh(None).await.unwrap(),
            RefreshOutcome::Refreshed { orgs: 1 }
        );
        assert_eq!(source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_single_org_refresh() {
        let source = Arc::new(FakeSource::new(&["PCF_NPE"]));
        source.set_timestamp(json!("T1"));
        source.set_orgs(Some(json!({
            "acme": {"director": "J. Doe"},
            "beta": {"director": "R. Roe"},
        })));
        let cache = cache_with(&source).await;

        assert_eq!(
            cache.refresh(Some("beta")).await.unwrap(),
            RefreshOutcome::Refreshed { orgs: 1 }
        );
        assert_eq!(cache.get_director("beta", false).await, "R. Roe");
        assert_eq!(cache.get_director("acme", false).await, UNKNOWN_DIRECTOR);
    }

    #[tokio::test]
    async fn test_concurrent_misses_download_once() {
        let source =
            Arc::new(FakeSource::new(&["PCF_NPE"]).with_latency(Duration::from_millis(20)));
        source.set_timestamp(json!("T1"));
        source.set_orgs(Some(json!({"acme": {"director": "J. Doe"}})));
        let cache = Arc::new(cache_with(&source).await);

        let lookups = (0..8).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_director("acme", true).await })
        });
        for lookup in lookups.collect::<Vec<_>>() {
            assert_eq!(lookup.await.unwrap(), "J. Doe");
        }

        assert_eq!(source.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_context() {
        let source = Arc::new(FakeSource::new(&[]));
        source.set_timestamp(json!("T1"));
        source.set_orgs(Some(json!({"acme": {"director": "J. Doe"}})));
        let cache = MetadataCache::new(FetchContext::Disabled, source.clone())
            .await
            .unwrap();

        assert_eq!(cache.refresh(None).await.unwrap(), RefreshOutcome::Disabled);
        assert_eq!(cache.get_director("acme", true).await, UNKNOWN_DIRECTOR);
        assert!(cache.is_empty());
        assert_eq!(source.status_calls(), 0);
        assert_eq!(source.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_context_unavailable() {
        let source = Arc::new(FakeSource::new(&["PCF_PRD"]));
        let result = MetadataCache::new(FetchContext::Remote("PCF_NPE".into()), source).await;
        assert!(matches!(
            result,
            Err(MetadataError::ContextUnavailable { ref context, ref available })
                if context == "PCF_NPE" && available == &vec!["PCF_PRD".to_string()]
        ));

        let source = Arc::new(FakeSource::new(&[]));
        let result = MetadataCache::new(FetchContext::Remote("PCF_NPE".into()), source).await;
        assert!(matches!(
            result,
            Err(MetadataError::ContextUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_config_invalid_foundation() {
        let config = Config {
            url: "http://127.0.0.1:9".into(),
            request_timeout_secs: 1,
            context: None,
        };
        let result = MetadataCache::from_config("pcf-dev01", &config).await;
        assert!(matches!(result, Err(MetadataError::InvalidFoundation(_))));

        // An unmapped tier never talks to the remote service
        let cache = MetadataCache::from_config("pcf-stg01", &config).await.unwrap();
        assert_eq!(cache.context(), &FetchContext::Disabled);
    }
}
