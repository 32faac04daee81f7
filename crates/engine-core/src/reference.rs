//! Provider references: `(Urn, Id)` pairs serialized as `<urn>::<id>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ReferenceError, ReferenceResult};
use crate::id::Id;
use crate::urn::Urn;

/// A distinguished ID naming a provider request the caller has forbidden.
///
/// When the naming/registry layer resolves a default-provider request for a
/// package the caller denied, it returns a [`ProviderReference`] carrying
/// this ID instead of loading a provider. Using it is always an error.
pub const DENY_DEFAULT_ID: &str = "denydefaultprovider";

/// The pair `(URN, ID)` identifying a live provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ProviderReference {
    urn: Urn,
    id: Id,
}

impl ProviderReference {
    /// Builds a reference, failing if `urn` is not a provider type.
    pub fn new(urn: Urn, id: Id) -> ReferenceResult<Self> {
        if !urn.is_provider_type() {
            return Err(ReferenceError::NotAProviderType(urn));
        }
        Ok(ProviderReference { urn, id })
    }

    /// The deny-default sentinel reference for a given provider URN.
    pub fn deny_default(urn: Urn) -> ReferenceResult<Self> {
        ProviderReference::new(urn, Id::new(DENY_DEFAULT_ID))
    }

    /// Parses `"<urn>::<id>"`.
    pub fn parse(raw: &str) -> ReferenceResult<Self> {
        let Some(sep) = raw.rfind("::") else {
            return Err(ReferenceError::InvalidReference(raw.to_string()));
        };
        let (urn_part, id_part) = (&raw[..sep], &raw[sep + 2..]);
        let urn =
            Urn::parse(urn_part).map_err(|_| ReferenceError::InvalidReference(raw.to_string()))?;
        ProviderReference::new(urn, Id::new(id_part))
    }

    /// The provider's URN.
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// The provider's ID.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// True if this reference's URN name begins with `default`.
    pub fn is_default(&self) -> bool {
        self.urn.is_default_provider()
    }

    /// True if this is the [`DENY_DEFAULT_ID`] sentinel.
    pub fn is_deny_default(&self) -> bool {
        self.id.as_str() == DENY_DEFAULT_ID
    }
}

impl fmt::Display for ProviderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.urn, self.id)
    }
}

impl From<ProviderReference> for String {
    fn from(r: ProviderReference) -> Self {
        r.to_string()
    }
}

impl TryFrom<String> for ProviderReference {
    type Error = ReferenceError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        ProviderReference::parse(&raw)
    }
}
