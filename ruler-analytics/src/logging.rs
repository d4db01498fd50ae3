//! Logging configuration and subscriber setup.
//!
//! The library only emits `tracing` events; applications decide where they
//! go. [`LogConfig`] gates the noisier per-bin and per-batch events, and
//! [`setup::init_logging`] installs a ready-made subscriber for binaries and
//! tests.

use std::borrow::Cow;

use tracing::Level;

/// Controls how much the library logs.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Most verbose level the batch runner emits for its own progress
    pub base_level: Level,
    /// Log every bin of each finished histogram
    pub log_bin_details: bool,
    /// Log batch start and completion
    pub log_batch_operations: bool,
    /// Cell values longer than this are cut in log events
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_bin_details: false,
            log_batch_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Per-column and per-bin events, long cell values.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_bin_details: true,
            max_field_length: 1024,
            ..Self::default()
        }
    }

    /// Failures only.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_batch_operations: false,
            max_field_length: 128,
            ..Self::default()
        }
    }

    /// Shortens a raw cell value to `max_field_length` bytes for logging.
    pub fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        truncate_field(value, self.max_field_length)
    }
}

/// Debug event emitted only when `base_level` allows debug output.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Per-bin event, enabled by `LogConfig::log_bin_details`.
#[macro_export]
macro_rules! log_bin_detail {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_bin_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Batch lifecycle event, enabled by `LogConfig::log_batch_operations`.
#[macro_export]
macro_rules! log_batch_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_batch_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Cuts `value` to at most `max_length` bytes, on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> Cow<'_, str> {
    if value.len() <= max_length {
        return Cow::Borrowed(value);
    }

    let end = (0..=max_length)
        .rev()
        .find(|&i| value.is_char_boundary(i))
        .unwrap_or(0);
    Cow::Owned(format!("{}...(truncated)", &value[..end]))
}

/// Subscriber setup for applications embedding the library.
pub mod setup {
    use tracing::Level;
    use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

    /// Levels and output format of the installed subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Level for every other crate
        pub default_level: Level,
        /// Level for `ruler_analytics`
        pub crate_level: Level,
        /// JSON lines instead of human-readable output
        pub json: bool,
        /// Replaces the generated directive entirely
        pub filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                default_level: Level::INFO,
                crate_level: Level::DEBUG,
                json: false,
                filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Quiet dependencies, `info` for this crate, JSON output.
        pub fn production() -> Self {
            Self {
                default_level: Level::WARN,
                crate_level: Level::INFO,
                json: true,
                filter: None,
            }
        }

        pub fn json(mut self, enabled: bool) -> Self {
            self.json = enabled;
            self
        }

        pub fn filter(mut self, directive: impl Into<String>) -> Self {
            self.filter = Some(directive.into());
            self
        }

        /// Filter directive, e.g. `info,ruler_analytics=debug`.
        pub fn directive(&self) -> String {
            self.filter.clone().unwrap_or_else(|| {
                format!(
                    "{},ruler_analytics={}",
                    self.default_level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                )
            })
        }
    }

    /// Installs a global subscriber. `RUST_LOG` takes precedence over the
    /// configured directive.
    ///
    /// ```rust,no_run
    /// use ruler_analytics::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::default().json(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), TryInitError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.directive()));
        let registry = tracing_subscriber::registry().with(filter);

        if config.json {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer()).try_init()
        }
    }
}
