//! Provider-assigned resource IDs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A provider-assigned opaque identifier for the physical representation of
/// a resource.
///
/// Two distinguished values exist: [`Id::unknown`], used during preview when
/// an ID is not yet known, and the internal `Unconfigured` marker produced
/// only by `engine-registry` — it is never constructed by application code
/// and never returned from a [`Provider`](crate::provider::Provider) call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

const UNKNOWN: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";
const UNCONFIGURED: &str = "unconfigured-1a5c6ce3-b3f2-4b7d-bd48-a96e02e4d7f4";

impl Id {
    /// Wraps a provider-assigned ID string.
    pub fn new(id: impl Into<String>) -> Self {
        Id(id.into())
    }

    /// The distinguished "not yet known" ID used during preview.
    pub fn unknown() -> Self {
        Id(UNKNOWN.to_string())
    }

    /// True if this is the [`Id::unknown`] sentinel.
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    /// The internal "loaded, configuration pending" marker. Restricted to
    /// `pub(crate)` scope in `engine-registry` via a re-export guard — see
    /// that crate's `ProviderLifecycle`; exposed here only so `Id` itself
    /// can recognize it when deserializing a persisted snapshot.
    #[doc(hidden)]
    pub fn unconfigured() -> Self {
        Id(UNCONFIGURED.to_string())
    }

    /// True if this is the internal unconfigured marker.
    pub fn is_unconfigured(&self) -> bool {
        self.0 == UNCONFIGURED
    }

    /// True if this ID is empty (used by `Read` to signal "deleted").
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for Id {
    fn default() -> Self {
        Id(String::new())
    }
}
