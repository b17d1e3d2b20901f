//! Shared state for the message system.

use crate::config::{Config, LogConfig, RoutingConfig};
use crate::log_store::LogStore;
use crate::resolver::{LevelSettings, SettingsStore};
use crate::telemetry::{new_shared_metrics, SharedMetrics};
use std::sync::Arc;

/// Shared state wrapper type.
pub type SharedState = Arc<DiagnosticsState>;

/// Create a new shared state instance from configuration.
pub fn new_shared_state(config: &Config) -> SharedState {
    Arc::new(DiagnosticsState::new(config))
}

/// Everything the message front-end and the tools operate on.
#[derive(Debug)]
pub struct DiagnosticsState {
    /// Active level settings.
    settings: SettingsStore,

    /// In-memory message and error logs.
    log: LogStore,

    /// Output routing thresholds.
    routing: RoutingConfig,

    /// Which logs are recorded.
    logging: LogConfig,

    /// Message system metrics.
    metrics: SharedMetrics,
}

impl DiagnosticsState {
    /// Create state from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            settings: SettingsStore::new(LevelSettings::with_decrement(
                config.levels.nesting_decrement,
            )),
            log: LogStore::new(config.log.max_message_count, config.log.max_error_count),
            routing: config.routing,
            logging: config.log.clone(),
            metrics: new_shared_metrics(),
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn log(&self) -> &LogStore {
        &self.log
    }

    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    pub fn logging(&self) -> &LogConfig {
        &self.logging
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}

impl Default for DiagnosticsState {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
