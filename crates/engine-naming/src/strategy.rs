//! [`NamingStrategy`] and its raw, user-facing configuration shape.

use serde::Deserialize;

use crate::error::{NamingError, NamingResult};

/// How the engine proposes a physical name for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingStrategy {
    /// Propose nothing; the provider picks the physical name.
    Default,
    /// Propose the logical URN name literally, with `Enforce` mode.
    Verbatim,
    /// Instruct the provider not to generate a physical name.
    Disabled,
    /// Propose a string built from `pattern`.
    Pattern {
        /// The substitution pattern (spec §4.4 variable list).
        pattern: String,
        /// Whether the provider may override the proposed name.
        enforce: bool,
    },
}

impl NamingStrategy {
    /// Whether a change under this strategy requires delete-before-replace.
    ///
    /// `Default` never does (the provider names it); `Verbatim`/`Disabled`
    /// always do (the physical name is constrained); a `Pattern` only does
    /// when it contains no random token, since a deterministic pattern
    /// collides with itself on recreate.
    pub fn requires_delete_before_replace(&self) -> bool {
        match self {
            NamingStrategy::Default => false,
            NamingStrategy::Verbatim | NamingStrategy::Disabled => true,
            NamingStrategy::Pattern { pattern, .. } => !crate::pattern::has_random_token(pattern),
        }
    }
}

/// The raw, user-facing shape of a naming directive as it appears in engine
/// configuration — one of `mode` or `pattern`/`enforce`, never both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDirective {
    /// One of `default`, `verbatim`, `disabled`.
    #[serde(default)]
    pub mode: Option<String>,
    /// A substitution pattern.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Whether the provider may override the proposed name.
    #[serde(default)]
    pub enforce: Option<bool>,
}

impl RawDirective {
    /// True when no field was set — used to reject empty resource entries.
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.pattern.is_none() && self.enforce.is_none()
    }

    /// Validates and converts this raw directive into a [`NamingStrategy`].
    pub fn into_strategy(self) -> NamingResult<NamingStrategy> {
        let has_pattern_or_enforce = self.pattern.is_some() || self.enforce.is_some();

        if self.mode.is_some() && has_pattern_or_enforce {
            return Err(NamingError::ConflictingModeAndPattern);
        }
        if self.enforce.is_some() && self.pattern.is_none() {
            return Err(NamingError::EnforceRequiresPattern);
        }
        if self.mode.is_none() && !has_pattern_or_enforce {
            return Err(NamingError::EmptyDirective);
        }

        if let Some(mode) = self.mode {
            return match mode.as_str() {
                "default" => Ok(NamingStrategy::Default),
                "verbatim" => Ok(NamingStrategy::Verbatim),
                "disabled" => Ok(NamingStrategy::Disabled),
                other => Err(NamingError::InvalidMode(other.to_string())),
            };
        }

        Ok(NamingStrategy::Pattern {
            pattern: self.pattern.expect("checked above"),
            enforce: self.enforce.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_and_pattern_conflict() {
        let raw = RawDirective { mode: Some("verbatim".into()), pattern: Some("${name}".into()), enforce: None };
        assert_eq!(raw.into_strategy(), Err(NamingError::ConflictingModeAndPattern));
    }

    #[test]
    fn enforce_without_pattern_is_rejected() {
        let raw = RawDirective { enforce: Some(true), ..RawDirective::default() };
        assert_eq!(raw.into_strategy(), Err(NamingError::EnforceRequiresPattern));
    }

    #[test]
    fn empty_directive_is_rejected() {
        assert_eq!(RawDirective::default().into_strategy(), Err(NamingError::EmptyDirective));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let raw = RawDirective { mode: Some("sometimes".into()), ..RawDirective::default() };
        assert_eq!(raw.into_strategy(), Err(NamingError::InvalidMode("sometimes".into())));
    }

    #[test]
    fn pattern_without_random_token_requires_delete_before_replace() {
        let strategy = NamingStrategy::Pattern { pattern: "${name}-fixed".into(), enforce: false };
        assert!(strategy.requires_delete_before_replace());
    }

    #[test]
    fn pattern_with_random_token_does_not_require_delete_before_replace() {
        let strategy = NamingStrategy::Pattern { pattern: "${name}-${hex(4)}".into(), enforce: false };
        assert!(!strategy.requires_delete_before_replace());
    }

    #[test]
    fn default_and_verbatim_and_disabled_match_spec() {
        assert!(!NamingStrategy::Default.requires_delete_before_replace());
        assert!(NamingStrategy::Verbatim.requires_delete_before_replace());
        assert!(NamingStrategy::Disabled.requires_delete_before_replace());
    }
}
