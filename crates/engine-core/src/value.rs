//! [`PropertyValue`] — the tagged value type stored in resource property maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ordered-insensitive map from property key to [`PropertyValue`].
///
/// Backed by a [`BTreeMap`] so iteration (and therefore serialization) is
/// always in sorted-key order, giving deterministic output regardless of
/// insertion order.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A single property value.
///
/// `Secret` wraps a value that should be redacted in logs/diffs; `Computed`
/// marks a value that is not yet known because it depends on a resource not
/// yet created (only appears during preview).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PropertyValue {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number (always stored as `f64`, matching the wire format).
    Number(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    Array(Vec<PropertyValue>),
    /// A nested property map.
    Object(PropertyMap),
    /// A reference to an asset (file contents by path/URI/literal).
    Asset(String),
    /// A reference to an archive (bundle of assets).
    Archive(String),
    /// A value that must be treated as secret wherever it is displayed.
    Secret(Box<PropertyValue>),
    /// A value whose final contents are unknown until after apply (preview
    /// only). Never persisted in a snapshot's `outputs`.
    Computed,
}

impl PropertyValue {
    /// True for [`PropertyValue::Computed`], or a [`PropertyValue::Secret`]
    /// wrapping one.
    pub fn is_unknown(&self) -> bool {
        match self {
            PropertyValue::Computed => true,
            PropertyValue::Secret(inner) => inner.is_unknown(),
            _ => false,
        }
    }

    /// Unwraps nested `Secret` layers, returning the innermost value.
    pub fn peel_secret(&self) -> &PropertyValue {
        match self {
            PropertyValue::Secret(inner) => inner.peel_secret(),
            other => other,
        }
    }

    /// Deep-equality used by the registry's default unknown-collapsing diff
    /// (spec §4.3: "Unknown changes collapse to Some vs None by deep-equality
    /// of oldOutputs vs newInputs"). `Computed` values never compare equal to
    /// anything, including another `Computed` — an unresolved value can
    /// never be known to match.
    pub fn deep_eq(&self, other: &PropertyValue) -> bool {
        let (this, other) = (self.peel_secret(), other.peel_secret());
        match (this, other) {
            (PropertyValue::Computed, _) | (_, PropertyValue::Computed) => false,
            (PropertyValue::Array(a), PropertyValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y))
            }
            (PropertyValue::Object(a), PropertyValue::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.deep_eq(bv)))
            }
            (a, b) => a == b,
        }
    }
}

/// Deep-equality over two property maps, used by diffing logic that needs to
/// classify a whole-resource change as `None` vs `Some`.
pub fn maps_deep_eq(a: &PropertyMap, b: &PropertyMap) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|bv| v.deep_eq(bv)))
}
