//! Errors raised while validating a naming directive (spec §4.4).

use thiserror::Error;

/// Configuration invariants validated at load time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NamingError {
    /// Both `mode` and (`pattern` or `enforce`) were specified.
    #[error("cannot specify both mode and pattern/enforce")]
    ConflictingModeAndPattern,

    /// `enforce` was given without a `pattern`.
    #[error("enforce requires pattern")]
    EnforceRequiresPattern,

    /// Neither `mode` nor `pattern` was specified.
    #[error("mode or pattern must be specified")]
    EmptyDirective,

    /// `mode` did not name a recognized strategy.
    #[error("invalid naming mode: {0}")]
    InvalidMode(String),
}

/// Result type for naming directive validation.
pub type NamingResult<T> = Result<T, NamingError>;
