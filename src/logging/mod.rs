//! Structured logging setup
//!
//! All modules log through `tracing`; this module installs the subscriber.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub level: String,
    /// Module-specific log levels
    pub module_levels: BTreeMap<String, String>,
    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = BTreeMap::new();
        module_levels.insert("livewheel::animation".to_string(), "info".to_string());
        module_levels.insert("tokio_tungstenite".to_string(), "warn".to_string());
        module_levels.insert("tungstenite".to_string(), "warn".to_string());
        module_levels.insert("reqwest".to_string(), "warn".to_string());
        module_levels.insert("hyper".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            module_levels,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Filter directives: the global level followed by per-module overrides
    pub fn directives(&self) -> String {
        std::iter::once(self.level.clone())
            .chain(
                self.module_levels
                    .iter()
                    .map(|(module, level)| format!("{}={}", module, level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured directives. Returns
/// `false` if a subscriber was already installed.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json_format {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    result.is_ok()
}
