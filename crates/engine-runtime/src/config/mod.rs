//! Configuration loading and validation for the engine's own config surface.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{EngineConfig, LogLevel, LoggingConfig, SpanEventConfig};
pub use validation::validate_config;
