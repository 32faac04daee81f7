//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! # Example
//!
//! ```rust,ignore
//! use engine_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! fn main() {
//!     LoggingBuilder::new().init();
//!
//!     LoggingBuilder::new()
//!         .directive("engine_planner=debug")
//!         .span_events(SpanEvents::LIFECYCLE)
//!         .init();
//! }
//! ```

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Span event configuration for logging.
///
/// Controls when span lifecycle events are logged, which is how the
/// step planner's per-step spans (spec §5 "ambient, added") become visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanEvents {
    /// Log when a span is created (entered for the first time).
    pub new: bool,
    /// Log when a span is entered.
    pub enter: bool,
    /// Log when a span is exited.
    pub exit: bool,
    /// Log when a span is closed (dropped).
    pub close: bool,
}

impl SpanEvents {
    /// No span events will be logged.
    pub const NONE: Self = Self { new: false, enter: false, exit: false, close: false };

    /// Log span creation and close events.
    pub const LIFECYCLE: Self = Self { new: true, enter: false, exit: false, close: true };

    /// Log all span events (new, enter, exit, close).
    pub const FULL: Self = Self { new: true, enter: true, exit: true, close: true };

    /// Log only enter and exit events.
    pub const ACTIVE: Self = Self { new: false, enter: true, exit: true, close: false };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

/// Initializes logging with default settings (`RUST_LOG`-driven, `info`
/// default directive).
///
/// # Panics
///
/// Panics if the subscriber has already been set.
pub fn init() {
    LoggingBuilder::new().init();
}

/// A builder for configuring logging.
#[derive(Default)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    span_events: SpanEvents,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    #[cfg(feature = "json-log")]
    json: bool,
}

impl LoggingBuilder {
    /// Creates a new logging builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a filter directive, e.g. `"engine_registry=debug"`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Configures span event visibility (spec §5 per-step spans, §3
    /// per-RPC spans).
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Includes the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Includes thread IDs in log output.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Includes file names in log output.
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    /// Includes line numbers in log output.
    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// Enables JSON output format (requires the `json-log` feature).
    #[cfg(feature = "json-log")]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base_filter = match self.level {
            Some(tracing::Level::TRACE) => "trace",
            Some(tracing::Level::DEBUG) => "debug",
            Some(tracing::Level::INFO) => "info",
            Some(tracing::Level::WARN) => "warn",
            Some(tracing::Level::ERROR) => "error",
            None => "info",
        };

        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_filter));
        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    fn build_fmt_layer<S>(&self) -> fmt::Layer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fmt::layer()
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
    }

    /// Initializes the logging system.
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been set.
    pub fn init(self) {
        let filter = self.build_filter();

        #[cfg(feature = "json-log")]
        if self.json {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_span_events(self.span_events.to_fmt_span()))
                .with(filter)
                .init();
            return;
        }

        tracing_subscriber::registry().with(self.build_fmt_layer()).with(filter).init();
    }

    /// Tries to initialize the logging system, returning an error instead
    /// of panicking if a subscriber is already set.
    pub fn try_init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = self.build_filter();

        #[cfg(feature = "json-log")]
        if self.json {
            return tracing_subscriber::registry()
                .with(fmt::layer().json().with_span_events(self.span_events.to_fmt_span()))
                .with(filter)
                .try_init()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
        }

        tracing_subscriber::registry()
            .with(self.build_fmt_layer())
            .with(filter)
            .try_init()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}
