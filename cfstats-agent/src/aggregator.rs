use crate::entities::{
    DIRECTOR_FIELD, EntityKind, EntitySpec, FOUNDATION_FIELD, IdentityFilter, METADATA_FIELD,
};
use crate::errors::{AgentError, Result};
use crate::filters::{QueryFilterSet, SHOW_FIELD, WITH_METADATA};
use crate::metrics_defs::{AGGREGATED_ROWS, AGGREGATION_REQUESTS, VALIDATION_REJECTED};
use crate::projection::ProjectionSpec;
use crate::store::{Record, RelationalStore, row_to_record};
use org_metadata::{MetadataCache, UNKNOWN_DIRECTOR};
use serde_json::Value;
use shared::{counter, histogram};
use std::sync::Arc;

/// One output row: query columns plus foundation, director and optionally
/// the org metadata.
pub type AggregatedRow = Record;

/// Allows a cache refresh for the first org lookup of a batch only, so one
/// aggregation request costs at most one refresh attempt.
struct RefreshBudget {
    available: bool,
}

impl RefreshBudget {
    fn new() -> Self {
        RefreshBudget { available: true }
    }

    fn take(&mut self) -> bool {
        std::mem::replace(&mut self.available, false)
    }
}

/// Joins relational rows with org metadata.
pub struct RowAggregator {
    store: Arc<dyn RelationalStore>,
    cache: Arc<MetadataCache>,
    foundation: String,
}

impl RowAggregator {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        cache: Arc<MetadataCache>,
        foundation: impl Into<String>,
    ) -> Self {
        RowAggregator {
            store,
            cache,
            foundation: foundation.into(),
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn foundation(&self) -> &str {
        &self.foundation
    }

    /// Rows of `kind` matching `filters`, enriched with org metadata.
    ///
    /// Conflicting identity filters fail with `AgentError::Validation`
    /// before any query runs.
    pub async fn list_entities(
        &self,
        kind: EntityKind,
        filters: &QueryFilterSet,
    ) -> Result<Vec<AggregatedRow>> {
        counter!(AGGREGATION_REQUESTS, "kind" => kind.as_str()).increment(1);
        let spec = kind.spec();

        let identity = identity_filter(spec, filters)?;
        let requested_fields = filters.values(SHOW_FIELD);
        let projection = (!requested_fields.is_empty())
            .then(|| ProjectionSpec::new(&requested_fields, &spec.known_fields()));
        if let Some(unavailable) = projection
            .as_ref()
            .map(ProjectionSpec::unavailable)
            .filter(|fields| !fields.is_empty())
        {
            tracing::info!(%kind, fields = ?unavailable, "Requested fields not available");
        }
        let with_metadata = filters.flag(WITH_METADATA);

        let (sql, params) = match identity {
            Some((filter, values)) => (spec.select_sql(Some((filter, values.len()))), values),
            None => (spec.select_sql(None), Vec::new()),
        };
        let rows = self.store.query(&sql, &params).await?;

        let columns = spec.columns();
        let mut budget = RefreshBudget::new();
        let mut aggregated = Vec::with_capacity(rows.len());

        for row in rows {
            let mut record = row_to_record(&row, &columns);
            if let Some(blob) = &spec.blob {
                blob.unpack(&mut record);
            }
            record.insert(
                FOUNDATION_FIELD.to_string(),
                Value::String(self.foundation.clone()),
            );

            let org = record
                .get(spec.org_name_field)
                .and_then(Value::as_str)
                .filter(|org| !org.is_empty())
                .map(str::to_string);

            let director = match &org {
                Some(org) => self.cache.get_director(org, budget.take()).await,
                None => UNKNOWN_DIRECTOR.to_string(),
            };
            record.insert(DIRECTOR_FIELD.to_string(), Value::String(director));

            if with_metadata {
                let metadata = match &org {
                    Some(org) => self.cache.get_metadata(org, budget.take()).await,
                    None => Default::default(),
                };
                record.insert(METADATA_FIELD.to_string(), Value::Object(metadata));
            }

            if let Some(projection) = &projection {
                projection.apply(&mut record);
            }
            aggregated.push(record);
        }

        histogram!(AGGREGATED_ROWS, "kind" => kind.as_str()).record(aggregated.len() as f64);
        tracing::debug!(%kind, rows = aggregated.len(), "Aggregated rows");
        Ok(aggregated)
    }

    /// guid/name pairs of every entity of `kind`, without enrichment.
    pub async fn list_summaries(&self, kind: EntityKind) -> Result<Vec<Record>> {
        let rows = self.store.query(&kind.spec().summary_sql(), &[]).await?;
        Ok(rows
            .iter()
            .map(|row| row_to_record(row, &["guid", "name"]))
            .collect())
    }
}

/// The single identity filter of the request and its values, if any.
fn identity_filter<'a>(
    spec: &'a EntitySpec,
    filters: &QueryFilterSet,
) -> Result<Option<(&'a IdentityFilter, Vec<String>)>> {
    let mut supplied: Vec<(&IdentityFilter, Vec<String>)> = spec
        .identity_filters
        .iter()
        .map(|filter| (filter, filters.values(filter.key).into_iter().collect::<Vec<_>>()))
        .filter(|(_, values)| !values.is_empty())
        .collect();

    if supplied.len() > 1 {
        let keys: Vec<&str> = spec.identity_filters.iter().map(|f| f.key).collect();
        let conflicting: Vec<&str> = supplied.iter().map(|(f, _)| f.key).collect();
        let message = format!(
            "Specify only {} (got {})",
            join_alternatives(&keys),
            conflicting.join(", ")
        );
        tracing::error!(%message, "Conflicting filters");
        counter!(VALIDATION_REJECTED).increment(1);
        return Err(AgentError::Validation { message });
    }

    Ok(supplied.pop())
}

/// ["a", "b", "c"] -> "a, b or c"
fn join_alternatives(items: &[&str]) -> String {
    match items.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {last}", rest.join(", ")),
        Some((last, _)) => last.to_string(),
        None => String::new(),
    }
}
