//! The [`Urn`] type — a total, deterministic resource identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{UrnError, UrnResult};

const SEP: &str = "::";
const PROVIDER_TYPE_PREFIX: &str = "pulumi:providers:";

/// A Uniform Resource Name: `urn:pulumi:<stack>::<project>::<parentTypePath>::<type>::<name>`.
///
/// URNs are compared as opaque strings for equality; [`Urn::type_`] and
/// [`Urn::name`] are projections obtained by splitting on `::`, not stored
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Builds a URN from its constituent parts.
    ///
    /// `parent_type_path` is the already-joined chain of ancestor types
    /// (empty string for a top-level resource).
    pub fn new(stack: &str, project: &str, parent_type_path: &str, type_: &str, name: &str) -> Self {
        let body = if parent_type_path.is_empty() {
            type_.to_string()
        } else {
            format!("{parent_type_path}${type_}")
        };
        Urn(format!("urn:pulumi:{stack}{SEP}{project}{SEP}{body}{SEP}{name}"))
    }

    /// Parses a raw URN string, validating it has the expected segment count.
    pub fn parse(raw: impl Into<String>) -> UrnResult<Self> {
        let raw = raw.into();
        let urn = Urn(raw);
        if urn.segments().count() < 4 {
            return Err(UrnError::InvalidUrn(urn.0));
        }
        Ok(urn)
    }

    /// Returns the raw URN string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> std::str::Split<'_, &'static str> {
        self.0.split(SEP)
    }

    /// The last `::`-delimited segment — the resource's logical name.
    pub fn name(&self) -> &str {
        self.0.rsplit(SEP).next().unwrap_or_default()
    }

    /// The full type token, i.e. the second-to-last segment (may itself
    /// contain `$`-joined parent types, e.g. `pkg:mod:Component$pkg:mod:Child`).
    pub fn type_(&self) -> &str {
        let segs: Vec<&str> = self.segments().collect();
        if segs.len() < 2 {
            return "";
        }
        segs[segs.len() - 2]
    }

    /// Just this resource's own type, i.e. the last `$`-segment of [`Urn::type_`].
    pub fn own_type(&self) -> &str {
        self.type_().rsplit('$').next().unwrap_or_default()
    }

    /// The package portion of the type (before the first `:`).
    pub fn package(&self) -> &str {
        self.own_type().split(':').next().unwrap_or_default()
    }

    /// True when [`Urn::own_type`] begins with `pulumi:providers:`.
    pub fn is_provider_type(&self) -> bool {
        self.own_type().starts_with(PROVIDER_TYPE_PREFIX)
    }

    /// True when this is a provider URN whose name begins with `default`.
    pub fn is_default_provider(&self) -> bool {
        self.is_provider_type() && self.name().starts_with("default")
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.0
    }
}
