//! Explicit nesting-depth tracking.
//!
//! Each execution context owns a [`NestingContext`]. Commands open a
//! [`NestingScope`] when they call into another command; the scope bumps the
//! depth for as long as it is alive. An error-guarding layer opens its own
//! scope, which the resolver compensates for on guarded calls.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Per-execution-context nesting counter.
///
/// Clones share the same counters and runspace id.
#[derive(Debug, Clone)]
pub struct NestingContext {
    runspace: Uuid,
    depth: Arc<AtomicI64>,
    guards: Arc<AtomicI64>,
}

impl NestingContext {
    /// Create a context at depth 0 with a fresh runspace id.
    pub fn new() -> Self {
        Self::with_runspace(Uuid::new_v4())
    }

    /// Create a context for an existing runspace id.
    pub fn with_runspace(runspace: Uuid) -> Self {
        Self {
            runspace,
            depth: Arc::new(AtomicI64::new(0)),
            guards: Arc::new(AtomicI64::new(0)),
        }
    }

    /// The owning execution context id.
    pub fn runspace(&self) -> Uuid {
        self.runspace
    }

    /// Current nesting depth.
    pub fn depth(&self) -> i64 {
        self.depth.load(Ordering::Relaxed)
    }

    /// Whether an error-guarding layer is open on this context.
    pub fn in_guard(&self) -> bool {
        self.guards.load(Ordering::Relaxed) > 0
    }

    /// Enter a nested command.
    #[must_use = "the depth drops back as soon as the scope is dropped"]
    pub fn enter(&self) -> NestingScope {
        self.open(None)
    }

    /// Enter an error-guarding layer.
    ///
    /// Messages written while the scope is alive are resolved as guarded calls.
    #[must_use = "the depth drops back as soon as the scope is dropped"]
    pub fn guarded(&self) -> NestingScope {
        self.guards.fetch_add(1, Ordering::Relaxed);
        self.open(Some(Arc::clone(&self.guards)))
    }

    fn open(&self, guards: Option<Arc<AtomicI64>>) -> NestingScope {
        self.depth.fetch_add(1, Ordering::Relaxed);
        NestingScope {
            depth: Arc::clone(&self.depth),
            guards,
        }
    }
}

impl Default for NestingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one nesting level.
#[derive(Debug)]
pub struct NestingScope {
    depth: Arc<AtomicI64>,
    guards: Option<Arc<AtomicI64>>,
}

impl Drop for NestingScope {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
        if let Some(guards) = &self.guards {
            guards.fetch_sub(1, Ordering::Relaxed);
        }
    }
}
