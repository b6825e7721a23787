//! Wildcard variables: named, typed values with a validating policy.
//!
//! Every mutation validates before committing, so a wildcard observed at any
//! point satisfies its own policy. Policy changes revalidate the held value
//! under the merged policy and leave both untouched on failure.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::document::VARIANT_KEY;
use crate::constants::wildcard::ILLEGAL_TEMPLATE_CHARS;
use crate::errors::ConfigError;
use crate::template::template_fields;
use crate::types::Label;
use crate::value::{Scalar, Value, ValueKind};

/// Behavioral flavor of a wildcard.
///
/// The set is closed: a `Generic` wildcard is a plain value, `Path` values
/// must point at existing filesystem entries, and `Template` values must be
/// well-formed filename templates. Both specialized flavors hold `str`
/// elements only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WildcardVariant {
    /// Plain value with no variant-specific checks.
    #[default]
    Generic,
    /// Filesystem path; every element must exist when set.
    Path,
    /// Filename template; every element must carry at least one field.
    Template,
}

impl WildcardVariant {
    /// Serialized tag, as written to policy sidecars.
    pub fn as_str(&self) -> &'static str {
        match self {
            WildcardVariant::Generic => "Generic",
            WildcardVariant::Path => "Path",
            WildcardVariant::Template => "Template",
        }
    }
}

impl fmt::Display for WildcardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation policy attached to one wildcard.
///
/// Unset options impose nothing. Bounds are inclusive and apply to the
/// declared default as well as to values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WildcardPolicy {
    /// Help text surfaced by interactive front ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Whether the wildcard may be removed from its group.
    #[serde(default)]
    pub required: bool,
    /// Value installed by a reset; cleared resets leave the value empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Scalar>,
    /// Required kind of every element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValueKind>,
    /// Inclusive lower bound for numeric elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Closed set of acceptable elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Scalar>>,
    /// Whether the value may hold more than one element.
    #[serde(default)]
    pub iterable: bool,
}

impl WildcardPolicy {
    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if let Some(kind) = self.kind
            && !kind.is_numeric()
            && (self.min.is_some() || self.max.is_some())
        {
            return Err(ConfigError::Kind {
                label: label.to_string(),
                details: format!("min/max bounds require an int or float kind, not {kind}"),
            });
        }
        if let (Some(min), Some(max)) = (self.min, self.max)
            && min >= max
        {
            return Err(ConfigError::Value {
                label: label.to_string(),
                details: format!("min ({min}) must be smaller than max ({max})"),
            });
        }
        if self.allowed.is_some() && (self.min.is_some() || self.max.is_some()) {
            return Err(ConfigError::Value {
                label: label.to_string(),
                details: "allowed values cannot be combined with min/max bounds".to_string(),
            });
        }
        if let (Some(allowed), Some(kind)) = (&self.allowed, self.kind) {
            for element in allowed {
                if element.kind() != kind {
                    return Err(ConfigError::Kind {
                        label: label.to_string(),
                        details: format!(
                            "allowed value '{element}' is {}, expected {kind}",
                            element.kind()
                        ),
                    });
                }
            }
        }
        if let Some(default) = &self.default {
            self.check_element(default, label)?;
        }
        Ok(())
    }

    fn check_element(&self, element: &Scalar, label: &str) -> Result<(), ConfigError> {
        if let Some(kind) = self.kind
            && element.kind() != kind
        {
            return Err(ConfigError::Kind {
                label: label.to_string(),
                details: format!("'{element}' is {}, expected {kind}", element.kind()),
            });
        }
        if self.min.is_some() || self.max.is_some() {
            let Some(numeric) = element.as_f64() else {
                return Err(ConfigError::Kind {
                    label: label.to_string(),
                    details: format!("'{element}' cannot be compared against min/max bounds"),
                });
            };
            if let Some(min) = self.min
                && numeric < min
            {
                return Err(ConfigError::Value {
                    label: label.to_string(),
                    details: format!("'{element}' is lower than the minimum ({min})"),
                });
            }
            if let Some(max) = self.max
                && numeric > max
            {
                return Err(ConfigError::Value {
                    label: label.to_string(),
                    details: format!("'{element}' is higher than the maximum ({max})"),
                });
            }
        }
        if let Some(allowed) = &self.allowed
            && !allowed.contains(element)
        {
            return Err(ConfigError::Value {
                label: label.to_string(),
                details: format!("'{element}' is not one of the allowed values"),
            });
        }
        Ok(())
    }
}

/// One named wildcard: an optional value plus the policy governing it.
#[derive(Clone, Debug, PartialEq)]
pub struct Wildcard {
    label: Label,
    value: Option<Value>,
    variant: WildcardVariant,
    policy: WildcardPolicy,
}

impl Wildcard {
    /// Create a generic wildcard, validating the label, policy, and value.
    pub fn new(
        label: impl Into<Label>,
        value: Option<Value>,
        policy: WildcardPolicy,
    ) -> Result<Self, ConfigError> {
        Self::with_variant(label, value, WildcardVariant::Generic, policy)
    }

    /// Create a path wildcard; elements must name existing paths.
    pub fn path(
        label: impl Into<Label>,
        value: Option<Value>,
        policy: WildcardPolicy,
    ) -> Result<Self, ConfigError> {
        Self::with_variant(label, value, WildcardVariant::Path, policy)
    }

    /// Create a template wildcard; elements must be well-formed templates.
    pub fn template(
        label: impl Into<Label>,
        value: Option<Value>,
        policy: WildcardPolicy,
    ) -> Result<Self, ConfigError> {
        Self::with_variant(label, value, WildcardVariant::Template, policy)
    }

    /// Create a wildcard with an explicit variant tag.
    ///
    /// `Path` and `Template` wildcards hold `str` elements; an unset kind is
    /// filled in, any other declared kind is a kind error.
    pub fn with_variant(
        label: impl Into<Label>,
        value: Option<Value>,
        variant: WildcardVariant,
        mut policy: WildcardPolicy,
    ) -> Result<Self, ConfigError> {
        let label = label.into();
        validate_label(&label)?;
        enforce_variant_kind(&label, variant, &mut policy)?;
        policy.validate(&label)?;
        let mut wildcard = Self {
            label,
            value: None,
            variant,
            policy,
        };
        if let Some(value) = value {
            wildcard.set_value(value)?;
        }
        Ok(wildcard)
    }

    /// The wildcard's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The held value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The variant tag.
    pub fn variant(&self) -> WildcardVariant {
        self.variant
    }

    /// The governing policy.
    pub fn policy(&self) -> &WildcardPolicy {
        &self.policy
    }

    /// Replace the value; the wildcard is unchanged when validation fails.
    ///
    /// Scalar values set on an iterable wildcard are stored as a one-element
    /// list, so setting a value twice is indistinguishable from setting it
    /// once.
    pub fn set_value(&mut self, value: Value) -> Result<(), ConfigError> {
        validate_value(&self.policy, self.variant, &self.label, &value)?;
        self.value = Some(normalize(&self.policy, value));
        Ok(())
    }

    /// Drop the held value.
    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// Append one element; rejected on non-iterable wildcards.
    ///
    /// An empty value becomes a one-element list.
    pub fn append(&mut self, element: Scalar) -> Result<(), ConfigError> {
        if !self.policy.iterable {
            return Err(ConfigError::NotIterable {
                label: self.label.clone(),
            });
        }
        self.policy.check_element(&element, &self.label)?;
        validate_variant_element(self.variant, &self.label, &element)?;
        match self.value.take() {
            Some(Value::Many(mut items)) => {
                items.push(element);
                self.value = Some(Value::Many(items));
            }
            Some(Value::One(existing)) => {
                self.value = Some(Value::Many(vec![existing, element]));
            }
            None => {
                self.value = Some(Value::Many(vec![element]));
            }
        }
        Ok(())
    }

    /// Set the value back to the declared default, or clear it.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        match self.policy.default.clone() {
            Some(default) => self.set_value(Value::One(default)),
            None => {
                self.value = None;
                Ok(())
            }
        }
    }

    /// Apply a policy change atomically.
    ///
    /// The patch runs on a copy of the current policy; the merged policy must
    /// validate and the held value must satisfy it, otherwise nothing
    /// changes.
    pub fn update_policy(
        &mut self,
        patch: impl FnOnce(&mut WildcardPolicy),
    ) -> Result<(), ConfigError> {
        let mut merged = self.policy.clone();
        patch(&mut merged);
        enforce_variant_kind(&self.label, self.variant, &mut merged)?;
        merged.validate(&self.label)?;
        if let Some(value) = &self.value {
            validate_value(&merged, self.variant, &self.label, value)?;
        }
        let value = self.value.take();
        self.policy = merged;
        self.value = value.map(|value| normalize(&self.policy, value));
        Ok(())
    }

    /// The held value as a JSON document node (`null` when unset).
    pub fn value_document(&self) -> Result<serde_json::Value, ConfigError> {
        match &self.value {
            Some(value) => Ok(serde_json::to_value(value)?),
            None => Ok(serde_json::Value::Null),
        }
    }

    /// The policy sidecar object, always carrying the variant tag.
    pub fn policy_sidecar(&self) -> Result<serde_json::Value, ConfigError> {
        let mut sidecar = match serde_json::to_value(&self.policy)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ConfigError::Document(format!(
                    "policy for '{}' serialized to {other} instead of an object",
                    self.label
                )));
            }
        };
        sidecar.insert(
            VARIANT_KEY.to_string(),
            serde_json::Value::String(self.variant.as_str().to_string()),
        );
        Ok(serde_json::Value::Object(sidecar))
    }

    /// Rebuild a wildcard from a document value and its policy sidecar.
    ///
    /// A missing sidecar means a generic wildcard with the default policy.
    /// The value is validated exactly as a live mutation would be, so stale
    /// documents (a vanished path, say) fail here rather than later.
    pub(crate) fn from_document(
        label: &str,
        value: &serde_json::Value,
        sidecar: Option<&serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let (variant, policy) = match sidecar {
            None => (WildcardVariant::Generic, WildcardPolicy::default()),
            Some(serde_json::Value::Object(map)) => {
                let mut map = map.clone();
                let variant = match map.remove(VARIANT_KEY) {
                    None => WildcardVariant::Generic,
                    Some(tag) => serde_json::from_value(tag)?,
                };
                let policy: WildcardPolicy =
                    serde_json::from_value(serde_json::Value::Object(map))?;
                (variant, policy)
            }
            Some(_) => {
                return Err(ConfigError::Document(format!(
                    "policy sidecar for '{label}' must be an object"
                )));
            }
        };
        let value = match value {
            serde_json::Value::Null => None,
            other => Some(serde_json::from_value(other.clone())?),
        };
        Self::with_variant(label.to_string(), value, variant, policy)
    }
}

/// Check that a label is a bare identifier: word characters, no leading
/// digit.
pub(crate) fn validate_label(label: &str) -> Result<(), ConfigError> {
    let mut chars = label.chars();
    let valid = match chars.next() {
        None => false,
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Value {
            label: label.to_string(),
            details: "labels must be bare identifiers (word characters, no leading digit)"
                .to_string(),
        })
    }
}

fn enforce_variant_kind(
    label: &str,
    variant: WildcardVariant,
    policy: &mut WildcardPolicy,
) -> Result<(), ConfigError> {
    if variant == WildcardVariant::Generic {
        return Ok(());
    }
    match policy.kind {
        None => {
            policy.kind = Some(ValueKind::Str);
            Ok(())
        }
        Some(ValueKind::Str) => Ok(()),
        Some(other) => Err(ConfigError::Kind {
            label: label.to_string(),
            details: format!("{variant} wildcards hold str values, not {other}"),
        }),
    }
}

fn validate_value(
    policy: &WildcardPolicy,
    variant: WildcardVariant,
    label: &str,
    value: &Value,
) -> Result<(), ConfigError> {
    if !policy.iterable && value.len() > 1 {
        return Err(ConfigError::Value {
            label: label.to_string(),
            details: format!(
                "{} elements supplied to a non-iterable wildcard",
                value.len()
            ),
        });
    }
    for element in value.elements() {
        policy.check_element(element, label)?;
        validate_variant_element(variant, label, element)?;
    }
    Ok(())
}

fn validate_variant_element(
    variant: WildcardVariant,
    label: &str,
    element: &Scalar,
) -> Result<(), ConfigError> {
    match variant {
        WildcardVariant::Generic => Ok(()),
        WildcardVariant::Path => {
            let rendered = element.render();
            if Path::new(&rendered).exists() {
                Ok(())
            } else {
                Err(ConfigError::PathNotExist {
                    path: PathBuf::from(rendered),
                })
            }
        }
        WildcardVariant::Template => {
            let text = element.render();
            let fields = template_fields(&text)?;
            if fields.is_empty() {
                return Err(ConfigError::Value {
                    label: label.to_string(),
                    details: "templates must contain at least one substitution field".to_string(),
                });
            }
            if let Some(illegal) = text.chars().find(|ch| ILLEGAL_TEMPLATE_CHARS.contains(ch)) {
                return Err(ConfigError::Value {
                    label: label.to_string(),
                    details: format!("template contains the illegal character '{illegal}'"),
                });
            }
            Ok(())
        }
    }
}

fn normalize(policy: &WildcardPolicy, value: Value) -> Value {
    match value {
        Value::One(scalar) if policy.iterable => Value::Many(vec![scalar]),
        other => other,
    }
}
