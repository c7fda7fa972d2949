use crate::client::MetadataSource;
use crate::types::{OrgMetadata, ReaderStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory stand-in for the org metadata service that counts its calls.
pub struct FakeSource {
    contexts: Vec<String>,
    timestamp: Mutex<Value>,
    orgs: Mutex<Option<Value>>,
    latency: Duration,
    status_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(contexts: &[&str]) -> Self {
        FakeSource {
            contexts: contexts.iter().map(|c| c.to_string()).collect(),
            timestamp: Mutex::new(Value::Null),
            orgs: Mutex::new(None),
            latency: Duration::ZERO,
            status_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Null makes the reader status unavailable.
    pub fn set_timestamp(&self, timestamp: Value) {
        *self.timestamp.lock() = timestamp;
    }

    /// None makes the bulk fetch unavailable.
    pub fn set_orgs(&self, orgs: Option<Value>) {
        *self.orgs.lock() = orgs;
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    async fn list_contexts(&self) -> Vec<String> {
        self.contexts.clone()
    }

    async fn cache_status(&self) -> Option<ReaderStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let timestamp = self.timestamp.lock().clone();
        if timestamp.is_null() {
            return None;
        }
        serde_json::from_value(json!({ "cache_timestamp": timestamp })).ok()
    }

    async fn bulk_fetch(
        &self,
        _context: &str,
        org: Option<&str>,
    ) -> Option<HashMap<String, OrgMetadata>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let orgs: HashMap<String, OrgMetadata> =
            serde_json::from_value(self.orgs.lock().clone()?).ok()?;
        Some(
            orgs.into_iter()
                .filter(|(name, _)| org.is_none_or(|o| o == name))
                .collect(),
        )
    }
}
