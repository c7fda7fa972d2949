//! Metrics definitions for the aggregation layer.

use shared::metrics_defs::{MetricDef, MetricType};

pub const AGGREGATION_REQUESTS: MetricDef = MetricDef {
    name: "aggregation.requests",
    metric_type: MetricType::Counter,
    description: "Aggregation requests, tagged with the entity kind",
};

pub const AGGREGATED_ROWS: MetricDef = MetricDef {
    name: "aggregation.rows",
    metric_type: MetricType::Histogram,
    description: "Number of rows returned by an aggregation request",
};

pub const VALIDATION_REJECTED: MetricDef = MetricDef {
    name: "aggregation.validation_rejected",
    metric_type: MetricType::Counter,
    description: "Aggregation requests rejected because of conflicting filters",
};

pub const ROW_SHAPE_MISMATCH: MetricDef = MetricDef {
    name: "store.row_shape_mismatch",
    metric_type: MetricType::Counter,
    description: "Query rows whose width did not match the expected columns",
};

pub const ALL_METRICS: &[MetricDef] = &[
    AGGREGATION_REQUESTS,
    AGGREGATED_ROWS,
    VALIDATION_REJECTED,
    ROW_SHAPE_MISMATCH,
];
