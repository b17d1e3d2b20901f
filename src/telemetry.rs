//! Message system metrics.
//!
//! Counters are plain atomics so the write path never blocks on them. They
//! can be retrieved through the `get_log_metrics` tool.

use crate::message::MessageRoute;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Message system metrics collection.
#[derive(Debug, Default)]
pub struct LogMetrics {
    /// Total number of level resolutions.
    pub resolutions_total: AtomicU64,

    /// Resolutions where at least one modifier applied.
    pub resolutions_modified: AtomicU64,

    /// Messages routed to information output.
    pub messages_information: AtomicU64,

    /// Messages routed to verbose output.
    pub messages_verbose: AtomicU64,

    /// Messages routed to debug output.
    pub messages_debug: AtomicU64,

    /// Messages outside every output range.
    pub messages_suppressed: AtomicU64,

    /// Warnings written.
    pub warnings_total: AtomicU64,

    /// Errors written.
    pub errors_total: AtomicU64,

    /// Messages evicted from the in-memory log.
    pub messages_evicted: AtomicU64,

    /// Errors evicted from the in-memory log.
    pub errors_evicted: AtomicU64,
}

impl LogMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a level resolution.
    pub fn record_resolution(&self, modified: bool) {
        self.resolutions_total.fetch_add(1, Ordering::Relaxed);
        if modified {
            self.resolutions_modified.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record where a message was routed.
    pub fn record_route(&self, route: MessageRoute) {
        let counter = match route {
            MessageRoute::Information => &self.messages_information,
            MessageRoute::Verbose => &self.messages_verbose,
            MessageRoute::Debug => &self.messages_debug,
            MessageRoute::Suppressed => &self.messages_suppressed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a warning.
    pub fn record_warning(&self) {
        self.warnings_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an error.
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record message evictions.
    pub fn record_messages_evicted(&self, count: usize) {
        if count > 0 {
            self.messages_evicted
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Record error evictions.
    pub fn record_errors_evicted(&self, count: usize) {
        if count > 0 {
            self.errors_evicted.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolutions_total: self.resolutions_total.load(Ordering::Relaxed),
            resolutions_modified: self.resolutions_modified.load(Ordering::Relaxed),
            messages_information: self.messages_information.load(Ordering::Relaxed),
            messages_verbose: self.messages_verbose.load(Ordering::Relaxed),
            messages_debug: self.messages_debug.load(Ordering::Relaxed),
            messages_suppressed: self.messages_suppressed.load(Ordering::Relaxed),
            warnings_total: self.warnings_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            messages_evicted: self.messages_evicted.load(Ordering::Relaxed),
            errors_evicted: self.errors_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub resolutions_total: u64,
    pub resolutions_modified: u64,
    pub messages_information: u64,
    pub messages_verbose: u64,
    pub messages_debug: u64,
    pub messages_suppressed: u64,
    pub warnings_total: u64,
    pub errors_total: u64,
    pub messages_evicted: u64,
    pub errors_evicted: u64,
}

impl MetricsSnapshot {
    /// Total messages written through the level-resolving path.
    pub fn messages_total(&self) -> u64 {
        self.messages_information + self.messages_verbose + self.messages_debug
            + self.messages_suppressed
    }

    /// Percentage of resolutions changed by at least one modifier.
    pub fn modified_rate(&self) -> f64 {
        if self.resolutions_total == 0 {
            return 0.0;
        }
        (self.resolutions_modified as f64 / self.resolutions_total as f64) * 100.0
    }

    /// Percentage of messages that reached no output.
    pub fn suppressed_rate(&self) -> f64 {
        let total = self.messages_total();
        if total == 0 {
            return 0.0;
        }
        (self.messages_suppressed as f64 / total as f64) * 100.0
    }
}

/// Shared metrics type for thread-safe access.
pub type SharedMetrics = Arc<LogMetrics>;

/// Create a new shared metrics collector.
pub fn new_shared_metrics() -> SharedMetrics {
    Arc::new(LogMetrics::new())
}
