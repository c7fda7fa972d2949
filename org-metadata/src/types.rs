use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Metadata for one organization, as served by the remote service.
pub type OrgMetadata = Map<String, Value>;

pub const DIRECTOR_FIELD: &str = "director";
pub const UNKNOWN_DIRECTOR: &str = "Unknown";

/// Version token of the remote service's own cache. Only ever compared for
/// equality.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheTimestamp(Value);

impl CacheTimestamp {
    /// Returns None for the values the remote uses to signal that its cache
    /// is not ready yet.
    pub fn from_value(value: Value) -> Option<Self> {
        let present = match &value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        };
        present.then_some(CacheTimestamp(value))
    }
}

impl fmt::Display for CacheTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => write!(f, "{s}"),
            other => write!(f, "{other}"),
        }
    }
}

/// Body of `GET {base}/reader_status`.
#[derive(Clone, Debug, Deserialize)]
pub struct ReaderStatus {
    #[serde(default)]
    cache_timestamp: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReaderStatus {
    pub fn cache_timestamp(&self) -> Option<CacheTimestamp> {
        CacheTimestamp::from_value(self.cache_timestamp.clone())
    }
}

/// Renders the director field. Some orgs carry several directors as a list.
pub fn director_of(metadata: &OrgMetadata) -> String {
    match metadata.get(DIRECTOR_FIELD) {
        None | Some(Value::Null) => UNKNOWN_DIRECTOR.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}
