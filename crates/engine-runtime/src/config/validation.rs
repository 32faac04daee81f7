//! Configuration validation (spec §6 "ambient, added").

use super::error::{ConfigError, ConfigResult};
use super::schema::EngineConfig;

/// Validates the entire configuration.
///
/// Delegates the `pulumi:autonaming` section to
/// [`engine_naming::RawNamingConfig::into_config`], which enforces the four
/// load-time invariants of spec §4.4 (mode xor pattern, enforce requires
/// pattern, some directive required, unknown mode rejected). Stack context
/// is not yet known at config-load time, so placeholder values are used —
/// they do not affect whether the raw directives themselves are valid.
pub fn validate_config(config: &EngineConfig) -> ConfigResult<()> {
    validate_logging(config)?;
    config
        .naming
        .clone()
        .into_config("", "", "", Default::default(), 0)
        .map_err(|e| ConfigError::validation(e.to_string()))?;
    Ok(())
}

fn validate_logging(config: &EngineConfig) -> ConfigResult<()> {
    for target in config.logging.filters.keys() {
        if target.is_empty() {
            return Err(ConfigError::missing_field("logging.filters.<target>"));
        }
    }
    Ok(())
}
