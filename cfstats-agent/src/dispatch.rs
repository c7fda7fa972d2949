//! Endpoint table and dispatch of named requests to the aggregator.
use crate::aggregator::RowAggregator;
use crate::entities::EntityKind;
use crate::errors::{AgentError, Result};
use crate::filters::QueryFilterSet;
use chrono::{DateTime, Local};
use serde_json::{Map, Value, json};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq)]
enum Action {
    State,
    ShowAll,
    Entities(EntityKind),
    Summaries(EntityKind),
}

#[derive(Debug)]
struct Endpoint {
    name: &'static str,
    description: &'static str,
    filters: &'static [&'static str],
    action: Action,
}

impl Endpoint {
    /// Built in endpoints are listed under "default" in the help output.
    fn is_builtin(&self) -> bool {
        matches!(self.action, Action::State | Action::ShowAll)
    }

    fn help_text(&self) -> String {
        if self.filters.is_empty() {
            self.description.to_string()
        } else {
            format!(
                "{} (filter(s): {})",
                self.description,
                self.filters.join(", ")
            )
        }
    }
}

const APP_FILTERS: &[&str] = &["appGuid", "spaceGuid", "appName", "showField", "withMetadata"];
const SERVICE_FILTERS: &[&str] = &["serviceGuid", "serviceName", "showField", "withMetadata"];
const ORG_FILTERS: &[&str] = &["orgGuid", "orgName", "showField", "withMetadata"];
const SPACE_FILTERS: &[&str] = &["spaceGuid", "spaceName", "showField", "withMetadata"];

const fn endpoint(
    name: &'static str,
    description: &'static str,
    filters: &'static [&'static str],
    action: Action,
) -> Endpoint {
    Endpoint {
        name,
        description,
        filters,
        action,
    }
}

static ENDPOINTS: &[Endpoint] = &[
    endpoint("state", "service state", &[], Action::State),
    endpoint("showall", "show registered commands", &[], Action::ShowAll),
    endpoint("help", "show registered commands", &[], Action::ShowAll),
    endpoint(
        "apps",
        "get app info (same as get_app)",
        APP_FILTERS,
        Action::Entities(EntityKind::Applications),
    ),
    endpoint(
        "get_app",
        "get app info for all or specific app(s)",
        APP_FILTERS,
        Action::Entities(EntityKind::Applications),
    ),
    endpoint(
        "services",
        "get service info (same as get_service)",
        SERVICE_FILTERS,
        Action::Entities(EntityKind::Services),
    ),
    endpoint(
        "get_service",
        "get service info for all or specific service(s)",
        SERVICE_FILTERS,
        Action::Entities(EntityKind::Services),
    ),
    endpoint(
        "get_org",
        "get org info for all or specific org(s)",
        ORG_FILTERS,
        Action::Entities(EntityKind::Organizations),
    ),
    endpoint(
        "get_space",
        "get space info for all or specific space(s)",
        SPACE_FILTERS,
        Action::Entities(EntityKind::Spaces),
    ),
    endpoint(
        "app_list",
        "get the list of all app guid/names",
        &[],
        Action::Summaries(EntityKind::Applications),
    ),
    endpoint(
        "service_list",
        "get the list of all service guid/names",
        &[],
        Action::Summaries(EntityKind::Services),
    ),
    endpoint(
        "org_list",
        "get the list of all org guid/names",
        &[],
        Action::Summaries(EntityKind::Organizations),
    ),
    endpoint(
        "space_list",
        "get the list of all space guid/names",
        &[],
        Action::Summaries(EntityKind::Spaces),
    ),
];

fn find_endpoint(name: &str) -> Option<&'static Endpoint> {
    // The empty path is the service state.
    let name = if name.is_empty() { "state" } else { name };
    ENDPOINTS.iter().find(|endpoint| endpoint.name == name)
}

/// Routes named requests to the aggregator and answers the built in
/// state and help endpoints.
pub struct Dispatcher {
    aggregator: RowAggregator,
    start_time: DateTime<Local>,
    version: String,
}

impl Dispatcher {
    pub fn new(aggregator: RowAggregator, version: impl Into<String>) -> Self {
        Dispatcher {
            aggregator,
            start_time: Local::now(),
            version: version.into(),
        }
    }

    pub async fn handle(&self, endpoint: &str, filters: &QueryFilterSet) -> Result<Value> {
        let Some(found) = find_endpoint(endpoint) else {
            tracing::info!(%endpoint, "Request for unknown endpoint");
            return Err(AgentError::UnknownEndpoint(endpoint.to_string()));
        };
        tracing::debug!(endpoint = found.name, ?filters, "Dispatch request");

        match found.action {
            Action::State => Ok(self.state()),
            Action::ShowAll => Ok(show_all()),
            Action::Entities(kind) => {
                let rows = self.aggregator.list_entities(kind, filters).await?;
                Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
            }
            Action::Summaries(kind) => {
                let rows = self.aggregator.list_summaries(kind).await?;
                Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
            }
        }
    }

    fn state(&self) -> Value {
        let cache = self.aggregator.cache();
        json!({
            "status": "up",
            "start_time": self.start_time.format(DATE_FORMAT).to_string(),
            "current_time": Local::now().format(DATE_FORMAT).to_string(),
            "version": self.version,
            "foundation": self.aggregator.foundation(),
            "context": cache.context().to_string(),
            "cached_orgs": cache.len(),
            "last_synced": cache.last_synced().map(|ts| ts.to_string()),
        })
    }
}

fn show_all() -> Value {
    let mut default = Map::new();
    let mut endpoints = Map::new();
    for endpoint in ENDPOINTS {
        let section = if endpoint.is_builtin() {
            &mut default
        } else {
            &mut endpoints
        };
        section.insert(endpoint.name.to_string(), Value::String(endpoint.help_text()));
    }
    json!({"default": default, "endpoints": endpoints})
}
