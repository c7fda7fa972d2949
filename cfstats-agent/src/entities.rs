//! Static description of each entity kind: which columns it selects, how it
//! reaches its organization and which filters identify it.
use crate::store::Record;
use serde_json::Value;
use std::fmt;

pub const FOUNDATION_FIELD: &str = "foundation";
pub const DIRECTOR_FIELD: &str = "director";
pub const METADATA_FIELD: &str = "metadata";

// Not SQL columns, but every kind can supply them.
const SYNTHETIC_FIELDS: &[&str] = &[DIRECTOR_FIELD, FOUNDATION_FIELD];

/// An output field and the SQL expression that produces it.
#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub source: &'static str,
}

const fn field(name: &'static str, source: &'static str) -> Field {
    Field { name, source }
}

/// A filter selecting entities by identity. At most one per request.
#[derive(Debug)]
pub struct IdentityFilter {
    /// Request parameter name, as shown to users.
    pub key: &'static str,
    pub column: &'static str,
    /// Names are matched case-insensitively (SQLite `lower()`), GUIDs exactly.
    pub case_insensitive: bool,
}

/// A column holding a JSON object whose members are flattened into the row.
#[derive(Debug)]
pub struct EmbeddedBlob {
    pub field: &'static str,
    /// Blob member to output field. Members not listed are dropped.
    pub renames: &'static [(&'static str, &'static str)],
}

impl EmbeddedBlob {
    pub fn unpack(&self, record: &mut Record) {
        let parsed = match record.remove(self.field) {
            None | Some(Value::Null) => return,
            Some(Value::String(raw)) => serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string()),
            Some(other) => Ok(other),
        };

        match parsed {
            Ok(Value::Object(members)) => {
                for (key, value) in members {
                    if let Some((_, renamed)) = self.renames.iter().find(|(from, _)| *from == key) {
                        record.insert(renamed.to_string(), value);
                    }
                }
            }
            Ok(other) => {
                tracing::warn!(field = self.field, value = %other, "Embedded field is not an object");
            }
            Err(err) => {
                tracing::warn!(field = self.field, error = %err, "Malformed embedded field");
            }
        }
    }
}

#[derive(Debug)]
pub struct EntitySpec {
    pub fields: &'static [Field],
    pub from: &'static str,
    pub group_by: Option<&'static str>,
    pub order_by: &'static str,
    pub identity_filters: &'static [IdentityFilter],
    /// Output field holding the organization name.
    pub org_name_field: &'static str,
    pub blob: Option<EmbeddedBlob>,
    /// Table behind the guid/name summary listing.
    pub table: &'static str,
}

impl EntitySpec {
    pub fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Every field a row of this kind can carry, including synthetic ones.
    pub fn known_fields(&self) -> Vec<&'static str> {
        let blob_field = self.blob.as_ref().map(|b| b.field);
        let mut known: Vec<&'static str> = self
            .fields
            .iter()
            .map(|f| f.name)
            .filter(|name| Some(*name) != blob_field)
            .collect();
        if let Some(blob) = &self.blob {
            known.extend(blob.renames.iter().map(|(_, renamed)| *renamed));
        }
        known.extend(SYNTHETIC_FIELDS);
        known.sort_unstable();
        known.dedup();
        known
    }

    /// The entity query, with `values` placeholders for the identity filter.
    pub fn select_sql(&self, filter: Option<(&IdentityFilter, usize)>) -> String {
        let columns = self
            .fields
            .iter()
            .map(|f| f.source)
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {columns} FROM {}", self.from);

        if let Some((filter, values)) = filter {
            // Both sides go through SQLite's lower() so they fold the same way.
            if filter.case_insensitive {
                let placeholders = vec!["lower(?)"; values].join(", ");
                sql.push_str(&format!(" WHERE lower({}) IN ({placeholders})", filter.column));
            } else {
                let placeholders = vec!["?"; values].join(", ");
                sql.push_str(&format!(" WHERE {} IN ({placeholders})", filter.column));
            }
        }
        if let Some(group_by) = self.group_by {
            sql.push_str(&format!(" GROUP BY {group_by}"));
        }
        sql.push_str(&format!(" ORDER BY {}", self.order_by));
        sql
    }

    pub fn summary_sql(&self) -> String {
        format!("SELECT guid, name FROM {} ORDER BY name", self.table)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Applications,
    Services,
    Organizations,
    Spaces,
}

impl EntityKind {
    pub fn spec(&self) -> &'static EntitySpec {
        match self {
            EntityKind::Applications => &APPLICATIONS,
            EntityKind::Services => &SERVICES,
            EntityKind::Organizations => &ORGANIZATIONS,
            EntityKind::Spaces => &SPACES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Applications => "applications",
            EntityKind::Services => "services",
            EntityKind::Organizations => "organizations",
            EntityKind::Spaces => "spaces",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static APPLICATIONS: EntitySpec = EntitySpec {
    fields: &[
        field("buildpack", "ap.buildpack"),
        field("disk_quota", "ap.diskQuota"),
        field("docker_image", "ap.dockerImage"),
        field("guid", "ap.guid"),
        field("health_check_timeout", "ap.healthCheckTimeout"),
        field("health_check_type", "ap.healthCheckType"),
        field("instances", "ap.instances"),
        field("memory", "ap.memory"),
        field("name", "ap.name"),
        field("org_guid", "og.guid"),
        field("org_name", "og.name"),
        field("package_updated_at", "ap.packageUpdatedAt"),
        field("space_guid", "sp.guid"),
        field("space_name", "sp.name"),
        field("stack_guid", "ap.stackGUID"),
        field("state", "ap.state"),
        field("service_names", "group_concat(DISTINCT si.name)"),
        field("urls", "group_concat(DISTINCT rt.host || '.' || dm.name)"),
    ],
    from: "applications AS ap \
        LEFT JOIN service_bindings AS sb ON sb.appGUID = ap.guid \
        LEFT JOIN service_instances AS si ON si.guid = sb.serviceInstanceGUID \
        LEFT JOIN spaces AS sp ON ap.spaceGUID = sp.guid \
        LEFT JOIN organizations AS og ON sp.organizationGUID = og.guid \
        LEFT JOIN route_mappings AS rm ON rm.appGUID = ap.guid \
        LEFT JOIN routes AS rt ON rt.guid = rm.routeGUID \
        LEFT JOIN domains AS dm ON dm.guid = rt.domainGUID",
    group_by: Some("ap.guid"),
    order_by: "ap.name, ap.guid",
    identity_filters: &[
        IdentityFilter {
            key: "appGuid",
            column: "ap.guid",
            case_insensitive: false,
        },
        IdentityFilter {
            key: "spaceGuid",
            column: "ap.spaceGUID",
            case_insensitive: false,
        },
        IdentityFilter {
            key: "appName",
            column: "ap.name",
            case_insensitive: true,
        },
    ],
    org_name_field: "org_name",
    blob: None,
    table: "applications",
};

static SERVICES: EntitySpec = EntitySpec {
    fields: &[
        field("bound_app_count", "COUNT(DISTINCT sb.appGUID)"),
        field("dashboard_url", "si.dashboardURL"),
        field("guid", "si.guid"),
        field("last_operation_blob", "si.lastOperation"),
        field("name", "si.name"),
        field("org_guid", "org.guid"),
        field("org_name", "org.name"),
        field("service", "si.type"),
        field("service_plan_guid", "si.servicePlanGUID"),
        field("service_guid", "si.serviceGUID"),
        field("service_plan", "si.servicePlanName"),
        field("space_guid", "si.spaceGUID"),
        field("space_name", "sp.name"),
    ],
    from: "service_instances AS si \
        LEFT JOIN spaces AS sp ON sp.guid = si.spaceGUID \
        LEFT JOIN organizations AS org ON org.guid = sp.organizationGUID \
        LEFT JOIN service_bindings AS sb ON sb.serviceInstanceGUID = si.guid",
    group_by: Some("si.guid"),
    order_by: "si.name, si.guid",
    identity_filters: &[
        IdentityFilter {
            key: "serviceGuid",
            column: "si.guid",
            case_insensitive: false,
        },
        IdentityFilter {
            key: "serviceName",
            column: "si.name",
            case_insensitive: true,
        },
    ],
    org_name_field: "org_name",
    blob: Some(EmbeddedBlob {
        field: "last_operation_blob",
        renames: &[
            ("type", "last_operation"),
            ("state", "last_operation_state"),
            ("created_at", "created_at"),
            ("updated_at", "updated_at"),
        ],
    }),
    table: "service_instances",
};

static ORGANIZATIONS: EntitySpec = EntitySpec {
    fields: &[
        field("guid", "og.guid"),
        field("name", "og.name"),
        field("quota_definition_guid", "og.quotaDefinitionGUID"),
        field("default_isolation_segment_guid", "og.defaultIsolationSegmentGUID"),
    ],
    from: "organizations AS og",
    group_by: None,
    order_by: "og.name, og.guid",
    identity_filters: &[
        IdentityFilter {
            key: "orgGuid",
            column: "og.guid",
            case_insensitive: false,
        },
        IdentityFilter {
            key: "orgName",
            column: "og.name",
            case_insensitive: true,
        },
    ],
    org_name_field: "name",
    blob: None,
    table: "organizations",
};

static SPACES: EntitySpec = EntitySpec {
    fields: &[
        field("guid", "sp.guid"),
        field("org_guid", "sp.organizationGUID"),
        field("name", "sp.name"),
        field("allow_ssh", "sp.allowSSH"),
        field("space_quota_definition_guid", "sp.spaceQuotaDefinitionGUID"),
        field("org_name", "og.name"),
    ],
    from: "spaces AS sp LEFT JOIN organizations AS og ON og.guid = sp.organizationGUID",
    group_by: None,
    order_by: "sp.name, sp.guid",
    identity_filters: &[
        IdentityFilter {
            key: "spaceGuid",
            column: "sp.guid",
            case_insensitive: false,
        },
        IdentityFilter {
            key: "spaceName",
            column: "sp.name",
            case_insensitive: true,
        },
    ],
    org_name_field: "org_name",
    blob: None,
    table: "spaces",
};
