use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Old and new value of one changed field. A side the record never had is
/// `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// A field-level change set, ordered by field name.
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// Shallow field-by-field comparison of two record states.
///
/// Fields present on only one side count as a change with `Null` standing in
/// for the missing side. Nested structures are compared by value equality as
/// a whole, not diffed recursively.
pub fn diff_states(before: &Map<String, Value>, after: &Map<String, Value>) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (field, old) in before {
        let new = after.get(field).cloned().unwrap_or(Value::Null);
        if *old != new {
            changes.insert(
                field.clone(),
                FieldChange {
                    old: old.clone(),
                    new,
                },
            );
        }
    }

    for (field, new) in after {
        if !before.contains_key(field) {
            changes.insert(
                field.clone(),
                FieldChange {
                    old: Value::Null,
                    new: new.clone(),
                },
            );
        }
    }

    changes
}

/// Serialize a change set into the JSON shape stored in `object_changes`.
pub fn changes_to_value(changes: &ChangeSet) -> Value {
    serde_json::to_value(changes).unwrap_or_else(|_| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn changed_field_reports_old_and_new() {
        let changes = diff_states(&map(json!({"name": "a"})), &map(json!({"name": "b"})));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes["name"].old, json!("a"));
        assert_eq!(changes["name"].new, json!("b"));
    }

    #[test]
    fn identical_states_diff_to_empty() {
        let state = map(json!({"name": "a", "tags": [1, 2]}));
        assert!(diff_states(&state, &state).is_empty());
    }

    #[test]
    fn one_sided_fields_use_null_for_the_missing_side() {
        let changes = diff_states(
            &map(json!({"removed": 1, "kept": "x"})),
            &map(json!({"added": 2, "kept": "x"})),
        );

        assert_eq!(changes.len(), 2);
        assert_eq!(changes["removed"].old, json!(1));
        assert_eq!(changes["removed"].new, Value::Null);
        assert_eq!(changes["added"].old, Value::Null);
        assert_eq!(changes["added"].new, json!(2));
    }

    #[test]
    fn nested_values_compare_as_wholes() {
        let changes = diff_states(
            &map(json!({"cfg": {"a": 1, "b": 2}})),
            &map(json!({"cfg": {"a": 1, "b": 3}})),
        );

        // one entry for the whole nested object, not one per inner field
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["cfg"].old, json!({"a": 1, "b": 2}));
        assert_eq!(changes["cfg"].new, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn explicit_null_equals_absent() {
        // a field that moves from explicit null to missing is not a change
        let changes = diff_states(&map(json!({"x": null})), &map(json!({})));
        assert!(changes.is_empty());
    }
}
