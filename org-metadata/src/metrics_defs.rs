//! Metrics definitions for the org metadata cache.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "org_metadata.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of org lookups answered from the local cache",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "org_metadata.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of org lookups for orgs missing from the local cache",
};

pub const REFRESH_SKIPPED: MetricDef = MetricDef {
    name: "org_metadata.refresh.skipped",
    metric_type: MetricType::Counter,
    description: "Refreshes skipped, tagged with the reason",
};

pub const BULK_FETCH: MetricDef = MetricDef {
    name: "org_metadata.bulk_fetch",
    metric_type: MetricType::Counter,
    description: "Bulk metadata downloads, tagged with the outcome",
};

pub const SYNC_DURATION: MetricDef = MetricDef {
    name: "org_metadata.sync.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a metadata sync in seconds",
};

pub const SYNC_ROWS: MetricDef = MetricDef {
    name: "org_metadata.sync.rows",
    metric_type: MetricType::Histogram,
    description: "Number of org entries returned by a metadata sync",
};

pub const CACHED_ORGS: MetricDef = MetricDef {
    name: "org_metadata.cache.orgs",
    metric_type: MetricType::Gauge,
    description: "Number of orgs held in the local cache",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    REFRESH_SKIPPED,
    BULK_FETCH,
    SYNC_DURATION,
    SYNC_ROWS,
    CACHED_ORGS,
];
