use std::collections::{BTreeMap, BTreeSet};

pub const SHOW_FIELD: &str = "showfield";
pub const WITH_METADATA: &str = "withmetadata";

const TRUTHY: &[&str] = &["true", "yes"];

/// Request filters: lower-cased key to the set of its non-empty values.
/// Repeated keys are merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryFilterSet {
    filters: BTreeMap<String, BTreeSet<String>>,
}

impl QueryFilterSet {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut filters = QueryFilterSet::default();
        for (key, value) in pairs {
            filters.insert(key.as_ref(), value);
        }
        filters
    }

    /// Empty values are dropped.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.filters
            .entry(key.to_lowercase())
            .or_default()
            .insert(value);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn values(&self, key: &str) -> BTreeSet<String> {
        self.filters
            .get(&key.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// True when any value of `key` is "true" or "yes", in any case.
    pub fn flag(&self, key: &str) -> bool {
        self.values(key)
            .iter()
            .any(|v| TRUTHY.contains(&v.to_lowercase().as_str()))
    }
}
