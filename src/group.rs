//! Wildcard groups: ordered collections of uniquely labeled wildcards under
//! one group-level policy.
//!
//! Groups gate membership three ways: a variant every member must carry, an
//! optional closed label set, and label uniqueness. Insertion order is
//! load-bearing; it drives document layout and default-template derivation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::document::METADATA_KEY;
use crate::errors::ConfigError;
use crate::types::{GroupName, Label};
use crate::wildcard::{Wildcard, WildcardVariant, validate_label};

/// Policy applied to a whole group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPolicy {
    /// Help text surfaced by interactive front ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Whether the group itself may be removed from its model.
    #[serde(default)]
    pub required: bool,
    /// Closed set of labels members may use; unset leaves membership open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_labels: Option<Vec<Label>>,
    /// Variant every member must carry; `Generic` accepts all variants.
    #[serde(default)]
    pub accepts: WildcardVariant,
}

impl GroupPolicy {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if let Some(valid_labels) = &self.valid_labels {
            for label in valid_labels {
                validate_label(label).map_err(|_| ConfigError::Value {
                    label: label.clone(),
                    details: format!("'{name}' declares an invalid entry in valid_labels"),
                })?;
            }
        }
        Ok(())
    }
}

/// An ordered, policy-gated collection of wildcards.
#[derive(Clone, Debug, PartialEq)]
pub struct WildcardGroup {
    name: GroupName,
    wildcards: IndexMap<Label, Wildcard>,
    policy: GroupPolicy,
}

impl WildcardGroup {
    /// Create an empty group. Group names are strictly alphanumeric.
    pub fn new(name: impl Into<GroupName>, policy: GroupPolicy) -> Result<Self, ConfigError> {
        let name = name.into();
        validate_group_name(&name)?;
        policy.validate(&name)?;
        Ok(Self {
            name,
            wildcards: IndexMap::new(),
            policy,
        })
    }

    /// The group's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group-level policy.
    pub fn policy(&self) -> &GroupPolicy {
        &self.policy
    }

    /// Number of member wildcards.
    pub fn len(&self) -> usize {
        self.wildcards.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.wildcards.is_empty()
    }

    /// Member labels in insertion order.
    pub fn labels(&self) -> Vec<Label> {
        self.wildcards.keys().cloned().collect()
    }

    /// Member wildcards in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Wildcard> {
        self.wildcards.values()
    }

    /// Whether a member with this label exists.
    pub fn contains(&self, label: &str) -> bool {
        self.wildcards.contains_key(label)
    }

    /// Borrow a member by label.
    pub fn get(&self, label: &str) -> Result<&Wildcard, ConfigError> {
        self.wildcards
            .get(label)
            .ok_or_else(|| ConfigError::NotFound {
                name: label.to_string(),
            })
    }

    /// Mutably borrow a member by label.
    pub fn get_mut(&mut self, label: &str) -> Result<&mut Wildcard, ConfigError> {
        self.wildcards
            .get_mut(label)
            .ok_or_else(|| ConfigError::NotFound {
                name: label.to_string(),
            })
    }

    /// Add a wildcard; the group is unchanged when any gate rejects it.
    pub fn add(&mut self, wildcard: Wildcard) -> Result<(), ConfigError> {
        self.validate_member(&wildcard)?;
        self.wildcards.insert(wildcard.label().to_string(), wildcard);
        Ok(())
    }

    /// Add wildcards in order, stopping at the first failure.
    ///
    /// Earlier wildcards stay inserted when a later one is rejected; callers
    /// wanting all-or-nothing behavior should validate up front.
    pub fn add_many(&mut self, wildcards: Vec<Wildcard>) -> Result<(), ConfigError> {
        for wildcard in wildcards {
            self.add(wildcard)?;
        }
        Ok(())
    }

    /// Remove a member by label. Required members cannot be removed.
    pub fn remove(&mut self, label: &str) -> Result<Wildcard, ConfigError> {
        let required = self
            .wildcards
            .get(label)
            .ok_or_else(|| ConfigError::NotFound {
                name: label.to_string(),
            })?
            .policy()
            .required;
        if required {
            return Err(ConfigError::Required {
                label: label.to_string(),
            });
        }
        self.wildcards
            .shift_remove(label)
            .ok_or_else(|| ConfigError::NotFound {
                name: label.to_string(),
            })
    }

    /// Reset every member's value to its declared default.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        for wildcard in self.wildcards.values_mut() {
            wildcard.reset()?;
        }
        Ok(())
    }

    /// Strip the group back to its required members, resetting their values.
    ///
    /// With `force` set, every member goes and the group policy reverts to
    /// the permissive default. The group is unchanged if any reset fails.
    pub fn factory_reset(&mut self, force: bool) -> Result<(), ConfigError> {
        if force {
            self.wildcards.clear();
            self.policy = GroupPolicy::default();
            return Ok(());
        }
        let mut retained = IndexMap::new();
        for (label, wildcard) in &self.wildcards {
            if wildcard.policy().required {
                let mut kept = wildcard.clone();
                kept.reset()?;
                retained.insert(label.clone(), kept);
            }
        }
        self.wildcards = retained;
        Ok(())
    }

    /// Serialize to a document object: member values keyed by label, with an
    /// optional `__metadata__` sidecar carrying the group policy (keyed by
    /// the group's own name) and each member's policy.
    pub fn to_document(&self, with_policy: bool) -> Result<serde_json::Value, ConfigError> {
        let mut object = serde_json::Map::new();
        if with_policy {
            let mut sidecar = serde_json::Map::new();
            sidecar.insert(self.name.clone(), serde_json::to_value(&self.policy)?);
            for wildcard in self.wildcards.values() {
                sidecar.insert(wildcard.label().to_string(), wildcard.policy_sidecar()?);
            }
            object.insert(
                METADATA_KEY.to_string(),
                serde_json::Value::Object(sidecar),
            );
        }
        for wildcard in self.wildcards.values() {
            object.insert(wildcard.label().to_string(), wildcard.value_document()?);
        }
        Ok(serde_json::Value::Object(object))
    }

    /// Rebuild a group from a document object.
    ///
    /// Values and policies are revalidated as if entered live. A member whose
    /// variant contradicts the group policy is a document error; documents
    /// are the one place such a mismatch can be expressed.
    pub(crate) fn from_document(
        name: &str,
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let mut sidecars = match object.get(METADATA_KEY) {
            None => serde_json::Map::new(),
            Some(serde_json::Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ConfigError::Document(format!(
                    "'{METADATA_KEY}' in group '{name}' must be an object"
                )));
            }
        };
        let policy: GroupPolicy = match sidecars.remove(name) {
            Some(raw) => serde_json::from_value(raw)?,
            None => GroupPolicy::default(),
        };
        let mut group = WildcardGroup::new(name.to_string(), policy)?;
        for (label, raw_value) in object {
            if label == METADATA_KEY {
                continue;
            }
            let sidecar = sidecars.remove(label.as_str());
            let wildcard = Wildcard::from_document(label, raw_value, sidecar.as_ref())?;
            if group.policy.accepts != WildcardVariant::Generic
                && wildcard.variant() != group.policy.accepts
            {
                return Err(ConfigError::Document(format!(
                    "group '{name}' holds {} wildcards, but '{label}' is {}",
                    group.policy.accepts,
                    wildcard.variant()
                )));
            }
            group.add(wildcard)?;
        }
        Ok(group)
    }

    fn validate_member(&self, wildcard: &Wildcard) -> Result<(), ConfigError> {
        if self.policy.accepts != WildcardVariant::Generic
            && wildcard.variant() != self.policy.accepts
        {
            return Err(ConfigError::Kind {
                label: wildcard.label().to_string(),
                details: format!(
                    "group '{}' accepts {} wildcards, not {}",
                    self.name,
                    self.policy.accepts,
                    wildcard.variant()
                ),
            });
        }
        if let Some(valid_labels) = &self.policy.valid_labels
            && !valid_labels.iter().any(|label| label == wildcard.label())
        {
            return Err(ConfigError::Value {
                label: wildcard.label().to_string(),
                details: format!("not a valid label for group '{}'", self.name),
            });
        }
        if self.wildcards.contains_key(wildcard.label()) {
            return Err(ConfigError::Value {
                label: wildcard.label().to_string(),
                details: format!("already exists in group '{}'", self.name),
            });
        }
        Ok(())
    }
}

fn validate_group_name(name: &str) -> Result<(), ConfigError> {
    if !name.is_empty() && name.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ConfigError::Value {
            label: name.to_string(),
            details: "group names must be alphanumeric".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Scalar, Value};
    use crate::wildcard::WildcardPolicy;

    fn wildcard(label: &str) -> Wildcard {
        Wildcard::new(label, None, WildcardPolicy::default()).unwrap()
    }

    fn open_group() -> WildcardGroup {
        WildcardGroup::new("bids", GroupPolicy::default()).unwrap()
    }

    #[test]
    fn group_names_must_be_alphanumeric() {
        assert!(WildcardGroup::new("params2", GroupPolicy::default()).is_ok());
        for bad in ["pa_rams", "pa rams", ""] {
            let err = WildcardGroup::new(bad, GroupPolicy::default()).unwrap_err();
            assert!(matches!(err, ConfigError::Value { .. }), "{bad}");
        }
    }

    #[test]
    fn duplicate_labels_leave_the_group_unchanged() {
        let mut group = open_group();
        group.add(wildcard("task")).unwrap();
        let mut duplicate = wildcard("task");
        duplicate.set_value(Value::from("mid")).unwrap();
        let err = group.add(duplicate).unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
        assert_eq!(group.len(), 1);
        assert_eq!(group.get("task").unwrap().value(), None);
    }

    #[test]
    fn variant_gate_rejects_mismatched_members() {
        let mut group = WildcardGroup::new(
            "paths",
            GroupPolicy {
                accepts: WildcardVariant::Path,
                ..GroupPolicy::default()
            },
        )
        .unwrap();
        let err = group.add(wildcard("output")).unwrap_err();
        assert!(matches!(err, ConfigError::Kind { .. }));
        let path = Wildcard::path("output", None, WildcardPolicy::default()).unwrap();
        assert!(group.add(path).is_ok());
    }

    #[test]
    fn valid_labels_close_membership() {
        let mut group = WildcardGroup::new(
            "bids",
            GroupPolicy {
                valid_labels: Some(vec!["subject".to_string(), "func_task".to_string()]),
                ..GroupPolicy::default()
            },
        )
        .unwrap();
        assert!(group.add(wildcard("subject")).is_ok());
        let err = group.add(wildcard("intruder")).unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
    }

    #[test]
    fn invalid_valid_labels_entries_are_rejected_up_front() {
        let err = WildcardGroup::new(
            "bids",
            GroupPolicy {
                valid_labels: Some(vec!["func-task".to_string()]),
                ..GroupPolicy::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
    }

    #[test]
    fn bulk_add_keeps_earlier_elements_on_failure() {
        let mut group = open_group();
        let err = group
            .add_many(vec![wildcard("task"), wildcard("task"), wildcard("run")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
        assert_eq!(group.labels(), vec!["task"]);
    }

    #[test]
    fn required_members_cannot_be_removed() {
        let mut group = open_group();
        group
            .add(
                Wildcard::new(
                    "subject",
                    None,
                    WildcardPolicy {
                        required: true,
                        ..WildcardPolicy::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        let err = group.remove("subject").unwrap_err();
        assert!(matches!(err, ConfigError::Required { .. }));
        let err = group.remove("absent").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn factory_reset_keeps_required_members_in_order() {
        let mut group = open_group();
        group
            .add(
                Wildcard::new(
                    "subject",
                    Some(Value::from("zzz")),
                    WildcardPolicy {
                        required: true,
                        default: Some(Scalar::from("foo")),
                        ..WildcardPolicy::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        group.add(wildcard("scratch")).unwrap();
        group
            .add(
                Wildcard::new(
                    "session",
                    None,
                    WildcardPolicy {
                        required: true,
                        ..WildcardPolicy::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();

        group.factory_reset(false).unwrap();
        assert_eq!(group.labels(), vec!["subject", "session"]);
        assert_eq!(
            group.get("subject").unwrap().value(),
            Some(&Value::One(Scalar::from("foo")))
        );
    }

    #[test]
    fn forced_factory_reset_clears_members_and_policy() {
        let mut group = WildcardGroup::new(
            "bids",
            GroupPolicy {
                required: true,
                valid_labels: Some(vec!["subject".to_string()]),
                ..GroupPolicy::default()
            },
        )
        .unwrap();
        group.add(wildcard("subject")).unwrap();
        group.factory_reset(true).unwrap();
        assert!(group.is_empty());
        assert_eq!(group.policy(), &GroupPolicy::default());
    }

    #[test]
    fn document_round_trip_preserves_order_and_policy() {
        let mut group = WildcardGroup::new(
            "bids",
            GroupPolicy {
                help: Some("dataset entities".to_string()),
                required: true,
                ..GroupPolicy::default()
            },
        )
        .unwrap();
        group
            .add(
                Wildcard::new(
                    "subject",
                    Some(Value::Many(vec![Scalar::from("1"), Scalar::from("2")])),
                    WildcardPolicy {
                        required: true,
                        iterable: true,
                        ..WildcardPolicy::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        group.add(wildcard("func_task")).unwrap();

        let document = group.to_document(true).unwrap();
        let object = document.as_object().unwrap();
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["__metadata__", "subject", "func_task"]);
        assert_eq!(object["__metadata__"]["bids"]["required"], true);
        assert_eq!(object["__metadata__"]["subject"]["variant"], "Generic");
        assert_eq!(object["func_task"], serde_json::Value::Null);

        let rebuilt = WildcardGroup::from_document("bids", object).unwrap();
        assert_eq!(rebuilt, group);
    }

    #[test]
    fn stripped_documents_omit_the_sidecar() {
        let mut group = open_group();
        group.add(wildcard("task")).unwrap();
        let document = group.to_document(false).unwrap();
        assert!(document.get(METADATA_KEY).is_none());
    }

    #[test]
    fn variant_mismatch_in_a_document_is_a_document_error() {
        let mut group = WildcardGroup::new(
            "templates",
            GroupPolicy {
                accepts: WildcardVariant::Template,
                ..GroupPolicy::default()
            },
        )
        .unwrap();
        group
            .add(
                Wildcard::template(
                    "funcPrefix",
                    Some(Value::from("sub-{subject}")),
                    WildcardPolicy::default(),
                )
                .unwrap(),
            )
            .unwrap();
        let document = group.to_document(true).unwrap();
        let mut object = document.as_object().unwrap().clone();

        // Forge the variant tag so the sidecar contradicts the group policy.
        object[METADATA_KEY]["funcPrefix"]["variant"] = serde_json::json!("Generic");
        let err = WildcardGroup::from_document("templates", &object).unwrap_err();
        assert!(matches!(err, ConfigError::Document(_)));
    }
}
