//! Configuration schema for the engine's own config surface (spec §6).
//!
//! # Configuration Hierarchy
//!
//! ```text
//! EngineConfig
//! ├── logging: LoggingConfig               # Logging settings
//! ├── pulumi:autonaming: RawNamingConfig   # Delegated to engine-naming
//! ├── providers: Map<String, Value>        # Per-provider config sections
//! ├── disable_automatic_plugin_acquisition # Env-sourced, not YAML
//! └── lifecycle_test_fuzz_repro_dir        # Env-sourced, not YAML
//! ```
//!
//! # Example Configuration (YAML)
//!
//! ```yaml
//! logging:
//!   level: debug
//!
//! pulumi:autonaming:
//!   default:
//!     mode: default
//!   providers:
//!     aws:
//!       default:
//!         mode: verbatim
//!
//! providers:
//!   aws:
//!     region: ${AWS_REGION:-us-east-1}
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use engine_naming::RawNamingConfig;
use serde::Deserialize;

/// Root configuration structure read from the engine's own config file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Autonaming resolver configuration (spec §4.4), under the Pulumi
    /// config key `pulumi:autonaming`.
    #[serde(rename = "pulumi:autonaming")]
    pub naming: RawNamingConfig,

    /// Per-provider config sections, passed through to `Configure`/`CheckConfig`
    /// untouched — the engine does not interpret provider config.
    #[serde(default)]
    pub providers: HashMap<String, serde_json::Value>,

    /// Mirrors `DISABLE_AUTOMATIC_PLUGIN_ACQUISITION` (spec §6). Populated
    /// from the environment by [`crate::config::ConfigLoader`], never from
    /// the config file, so the registry's plugin-acquisition path reads it
    /// from here instead of the environment directly.
    #[serde(skip)]
    pub disable_automatic_plugin_acquisition: bool,

    /// Mirrors `LIFECYCLE_TEST_FUZZ_REPRO_DIR` (spec §6): a directory an
    /// external fuzz harness drops repro snapshots into. The engine only
    /// surfaces the path; it does not read the directory itself.
    #[serde(skip)]
    pub lifecycle_test_fuzz_repro_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level.
    pub level: LogLevel,

    /// Whether to include the target (module path) in output.
    pub with_target: bool,

    /// Whether to include thread IDs in output.
    pub with_thread_ids: bool,

    /// Span event visibility for per-step and per-RPC spans.
    pub span_events: SpanEventConfig,

    /// Module-specific log level overrides, e.g. `{"engine_registry": "debug"}`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_target: false,
            with_thread_ids: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
        }
    }
}

/// Log level enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Converts to `tracing::Level`.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Converts to a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Span event configuration, mirroring [`crate::logging::SpanEvents`] in a
/// form that can be deserialized from the config file.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct SpanEventConfig {
    /// Log when a span is created.
    pub new: bool,
    /// Log when a span is entered.
    pub enter: bool,
    /// Log when a span is exited.
    pub exit: bool,
    /// Log when a span is closed.
    pub close: bool,
}

impl SpanEventConfig {
    /// No span events.
    pub const NONE: Self = Self { new: false, enter: false, exit: false, close: false };

    /// Lifecycle events (new + close).
    pub const LIFECYCLE: Self = Self { new: true, enter: false, exit: false, close: true };

    /// All span events.
    pub const FULL: Self = Self { new: true, enter: true, exit: true, close: true };

    /// Converts to [`crate::logging::SpanEvents`].
    pub fn to_span_events(self) -> crate::logging::SpanEvents {
        crate::logging::SpanEvents { new: self.new, enter: self.enter, exit: self.exit, close: self.close }
    }
}
