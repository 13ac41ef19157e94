//! Pure comparison of observed and desired state.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// How a field may change once the object exists.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    /// Part of the object's identity; a change forces replacement.
    Identity,
    /// Fixed at creation; a change forces replacement.
    ForceReplace,
    /// Mutable through the remote patch verb.
    InPlace,
    /// Owned by the remote; never compared or patched.
    Computed,
}

impl Mutability {
    /// Returns `true` when a change to the field needs delete-then-create.
    #[must_use]
    pub const fn forces_replace(self) -> bool {
        matches!(self, Self::Identity | Self::ForceReplace)
    }
}

/// Name and mutability class of one field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    /// Field name as it appears in serialised state.
    pub name: &'static str,
    /// Mutability class.
    pub mutability: Mutability,
}

impl FieldSpec {
    /// Declares a field.
    #[must_use]
    pub const fn new(name: &'static str, mutability: Mutability) -> Self {
        Self { name, mutability }
    }
}

/// Exposes a typed state record field by field for comparison.
pub trait FieldValues {
    /// Canonical JSON value of `field`, or `Value::Null` when unset.
    fn field_value(&self, field: &str) -> Value;
}

/// Old and new value of a changed field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldChange {
    /// Value currently observed on the remote.
    pub old: Value,
    /// Value requested by the desired state.
    pub new: Value,
}

/// Outcome of comparing observed and desired state.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// At least one field differs.
    pub has_changes: bool,
    /// A differing field cannot be patched.
    pub requires_replace: bool,
    /// Differing fields keyed by name.
    pub field_changes: BTreeMap<String, FieldChange>,
}

impl ChangeSet {
    /// Returns the names of changed fields in sorted order.
    pub fn changed_fields(&self) -> impl Iterator<Item = &str> {
        self.field_changes.keys().map(String::as_str)
    }
}

/// Compares `observed` with `desired` over `fields`.
///
/// The first differing replace-class field short-circuits the comparison and
/// is the only entry in the result. Otherwise every differing in-place field
/// is collected in a single pass.
#[must_use]
pub fn compute<D: FieldValues>(fields: &[FieldSpec], observed: &D, desired: &D) -> ChangeSet {
    let changed = |field: &FieldSpec| {
        let old = observed.field_value(field.name);
        let new = desired.field_value(field.name);
        (old != new).then_some(FieldChange { old, new })
    };

    for field in fields.iter().filter(|field| field.mutability.forces_replace()) {
        if let Some(change) = changed(field) {
            return ChangeSet {
                has_changes: true,
                requires_replace: true,
                field_changes: BTreeMap::from([(field.name.to_owned(), change)]),
            };
        }
    }

    let field_changes: BTreeMap<String, FieldChange> = fields
        .iter()
        .filter(|field| field.mutability == Mutability::InPlace)
        .filter_map(|field| changed(field).map(|change| (field.name.to_owned(), change)))
        .collect();

    ChangeSet {
        has_changes: !field_changes.is_empty(),
        requires_replace: false,
        field_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct Record {
        parent: &'static str,
        label: &'static str,
        size: u32,
        owner: &'static str,
    }

    impl FieldValues for Record {
        fn field_value(&self, field: &str) -> Value {
            match field {
                "parent" => json!(self.parent),
                "label" => json!(self.label),
                "size" => json!(self.size),
                "owner" => json!(self.owner),
                _ => Value::Null,
            }
        }
    }

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("parent", Mutability::Identity),
        FieldSpec::new("label", Mutability::InPlace),
        FieldSpec::new("size", Mutability::InPlace),
        FieldSpec::new("owner", Mutability::Computed),
    ];

    fn record() -> Record {
        Record {
            parent: "p1",
            label: "a",
            size: 1,
            owner: "remote",
        }
    }

    #[test]
    fn identical_state_has_no_changes() {
        let changes = compute(FIELDS, &record(), &record());
        assert_eq!(changes, ChangeSet::default());
    }

    #[test]
    fn every_in_place_change_is_reported() {
        let desired = Record {
            label: "b",
            size: 2,
            ..record()
        };
        let changes = compute(FIELDS, &record(), &desired);
        assert!(changes.has_changes);
        assert!(!changes.requires_replace);
        assert_eq!(changes.changed_fields().collect::<Vec<_>>(), ["label", "size"]);
        assert_eq!(
            changes.field_changes.get("size"),
            Some(&FieldChange {
                old: json!(1),
                new: json!(2)
            })
        );
    }

    #[test]
    fn identity_change_short_circuits() {
        let desired = Record {
            parent: "p2",
            label: "b",
            ..record()
        };
        let changes = compute(FIELDS, &record(), &desired);
        assert!(changes.requires_replace);
        assert_eq!(changes.changed_fields().collect::<Vec<_>>(), ["parent"]);
    }

    #[test]
    fn computed_fields_are_ignored() {
        let desired = Record {
            owner: "someone else",
            ..record()
        };
        assert!(!compute(FIELDS, &record(), &desired).has_changes);
    }
}
