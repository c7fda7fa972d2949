use crate::store::Record;
use std::collections::BTreeSet;

/// Field selection requested through `showField`.
///
/// Requested names are matched against the fields an entity kind can supply.
/// Unknown names are reported, not rejected. Known fields that were not
/// requested are stripped from every row.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionSpec {
    discard: BTreeSet<String>,
    unavailable: BTreeSet<String>,
}

impl ProjectionSpec {
    pub fn new(requested: &BTreeSet<String>, known: &[&str]) -> Self {
        let known: BTreeSet<String> = known.iter().map(|f| f.to_string()).collect();

        ProjectionSpec {
            discard: known.difference(requested).cloned().collect(),
            unavailable: requested.difference(&known).cloned().collect(),
        }
    }

    pub fn unavailable(&self) -> &BTreeSet<String> {
        &self.unavailable
    }

    pub fn apply(&self, row: &mut Record) {
        for field in &self.discard {
            row.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requested(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_projection() {
        let projection = ProjectionSpec::new(
            &requested(&["name", "director", "nonsense"]),
            &["guid", "name", "director", "foundation"],
        );
        assert_eq!(projection.unavailable(), &requested(&["nonsense"]));

        let mut row = json!({
            "guid": "g1",
            "name": "web",
            "director": "J. Doe",
            "foundation": "pcf-npe01",
            "metadata": {},
        })
        .as_object()
        .cloned()
        .unwrap();
        projection.apply(&mut row);

        // Fields outside the known set are never discarded
        assert_eq!(
            row.keys().cloned().collect::<BTreeSet<_>>(),
            requested(&["director", "metadata", "name"])
        );
    }

    #[test]
    fn test_only_unknown_fields_requested() {
        let projection = ProjectionSpec::new(&requested(&["bogus"]), &["guid", "name"]);
        let mut row = json!({"guid": "g1", "name": "web"}).as_object().cloned().unwrap();
        projection.apply(&mut row);
        assert!(row.is_empty());
    }
}
