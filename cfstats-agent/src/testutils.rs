use crate::store::{RelationalStore, Row, SqliteStore, StoreError};
use async_trait::async_trait;
use org_metadata::{FetchContext, MetadataCache, RemoteStatusClient};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SCHEMA: &str = "
CREATE TABLE organizations (
    guid TEXT PRIMARY KEY,
    name TEXT,
    quotaDefinitionGUID TEXT,
    defaultIsolationSegmentGUID TEXT
);
CREATE TABLE spaces (
    guid TEXT PRIMARY KEY,
    name TEXT,
    organizationGUID TEXT,
    allowSSH INTEGER,
    spaceQuotaDefinitionGUID TEXT
);
CREATE TABLE applications (
    guid TEXT PRIMARY KEY,
    name TEXT,
    spaceGUID TEXT,
    buildpack TEXT,
    diskQuota INTEGER,
    dockerImage TEXT,
    healthCheckTimeout INTEGER,
    healthCheckType TEXT,
    instances INTEGER,
    memory INTEGER,
    packageUpdatedAt TEXT,
    stackGUID TEXT,
    state TEXT
);
CREATE TABLE service_instances (
    guid TEXT PRIMARY KEY,
    name TEXT,
    spaceGUID TEXT,
    type TEXT,
    dashboardURL TEXT,
    lastOperation TEXT,
    servicePlanGUID TEXT,
    serviceGUID TEXT,
    servicePlanName TEXT
);
CREATE TABLE service_bindings (
    guid TEXT PRIMARY KEY,
    appGUID TEXT,
    serviceInstanceGUID TEXT
);
CREATE TABLE domains (guid TEXT PRIMARY KEY, name TEXT);
CREATE TABLE routes (guid TEXT PRIMARY KEY, host TEXT, domainGUID TEXT);
CREATE TABLE route_mappings (guid TEXT PRIMARY KEY, appGUID TEXT, routeGUID TEXT);
";

pub const FIXTURES: &str = r#"
INSERT INTO organizations VALUES
    ('org-1', 'ACME', 'quota-1', NULL),
    ('org-2', 'beta', 'quota-1', NULL),
    ('org-3', 'Gamma', 'quota-2', 'iso-1');
INSERT INTO spaces VALUES
    ('space-1', 'dev', 'org-1', 1, NULL),
    ('space-2', 'prod', 'org-2', 0, 'squota-1'),
    ('space-3', 'test', 'org-3', 1, NULL);
INSERT INTO applications VALUES
    ('app-1', 'web', 'space-1', 'ruby_buildpack', 1024, NULL, 60, 'port', 2, 512, '2024-01-01T00:00:00Z', 'stack-1', 'STARTED'),
    ('app-2', 'api', 'space-2', 'go_buildpack', 1024, NULL, 60, 'http', 1, 256, '2024-01-01T00:00:00Z', 'stack-1', 'STARTED'),
    ('app-3', 'worker', 'space-1', NULL, 2048, 'acme/worker:1', NULL, 'process', 1, 1024, NULL, 'stack-1', 'STOPPED'),
    ('app-4', 'orphan', NULL, NULL, 1024, NULL, NULL, 'port', 1, 128, NULL, 'stack-1', 'STOPPED');
INSERT INTO service_instances VALUES
    ('si-1', 'db', 'space-1', 'managed_service_instance', 'https://dash.example.com/si-1',
     '{"type": "create", "state": "succeeded", "description": "done", "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z"}',
     'plan-1', 'svc-1', 'small'),
    ('si-2', 'cache', 'space-2', 'user_provided_service_instance', NULL, NULL, NULL, NULL, NULL);
INSERT INTO service_bindings VALUES
    ('sb-1', 'app-1', 'si-1'),
    ('sb-2', 'app-3', 'si-1');
INSERT INTO domains VALUES ('dm-1', 'apps.example.com');
INSERT INTO routes VALUES ('rt-1', 'web', 'dm-1');
INSERT INTO route_mappings VALUES ('rm-1', 'app-1', 'rt-1');
"#;

pub fn fixture_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store.execute_batch(SCHEMA).unwrap();
    store.execute_batch(FIXTURES).unwrap();
    store
}

/// Org metadata service serving the PCF_NPE context with `orgs`. The status
/// and bulk download endpoints must each be hit exactly `refreshes` times.
pub async fn metadata_server(orgs: Value, refreshes: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contexts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["PCF_NPE", "PCF_PRD"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reader_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cache_timestamp": "T1"})))
        .expect(refreshes)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contexts/PCF_NPE/orgs_metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(orgs))
        .expect(refreshes)
        .mount(&server)
        .await;
    server
}

pub async fn metadata_cache(server: &MockServer) -> Arc<MetadataCache> {
    let client = RemoteStatusClient::new(&server.uri(), Duration::from_secs(2)).unwrap();
    let cache = MetadataCache::new(FetchContext::Remote("PCF_NPE".into()), Arc::new(client))
        .await
        .unwrap();
    Arc::new(cache)
}

/// Wraps a store and counts the queries sent to it.
pub struct CountingStore {
    inner: SqliteStore,
    queries: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: SqliteStore) -> Self {
        CountingStore {
            inner,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationalStore for CountingStore {
    async fn query(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(sql, params).await
    }
}

/// A store whose every query fails.
pub struct FailingStore;

#[async_trait]
impl RelationalStore for FailingStore {
    async fn query(&self, _sql: &str, _params: &[String]) -> Result<Vec<Row>, StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }
}
