//! Global atomic counters for resolution observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    passes_run: AtomicU64,
    declarations_resolved: AtomicU64,
    declarations_unresolved: AtomicU64,
    directories_collected: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            passes_run: AtomicU64::new(0),
            declarations_resolved: AtomicU64::new(0),
            declarations_unresolved: AtomicU64::new(0),
            directories_collected: AtomicU64::new(0),
        }
    }

    /// Count one fixpoint pass.
    pub fn inc_passes(&self) {
        self.passes_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "passes_run", "counter incremented");
    }

    pub fn add_resolved(&self, n: u64) {
        self.declarations_resolved.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "declarations_resolved", n, "counter incremented");
    }

    pub fn add_unresolved(&self, n: u64) {
        self.declarations_unresolved.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "declarations_unresolved", n, "counter incremented");
    }

    pub fn inc_directories_collected(&self) {
        self.directories_collected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "directories_collected", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            passes_run = self.passes_run(),
            declarations_resolved = self.declarations_resolved(),
            declarations_unresolved = self.declarations_unresolved(),
            directories_collected = self.directories_collected(),
        );
    }

    pub fn passes_run(&self) -> u64 {
        self.passes_run.load(Ordering::Relaxed)
    }

    pub fn declarations_resolved(&self) -> u64 {
        self.declarations_resolved.load(Ordering::Relaxed)
    }

    pub fn declarations_unresolved(&self) -> u64 {
        self.declarations_unresolved.load(Ordering::Relaxed)
    }

    pub fn directories_collected(&self) -> u64 {
        self.directories_collected.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.passes_run.store(0, Ordering::Relaxed);
        self.declarations_resolved.store(0, Ordering::Relaxed);
        self.declarations_unresolved.store(0, Ordering::Relaxed);
        self.directories_collected.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_passes();
        m.inc_passes();
        assert_eq!(m.passes_run(), 2);

        m.add_resolved(5);
        m.add_unresolved(1);
        assert_eq!(m.declarations_resolved(), 5);
        assert_eq!(m.declarations_unresolved(), 1);

        m.inc_directories_collected();
        assert_eq!(m.directories_collected(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_passes();
        m.add_resolved(3);
        m.inc_directories_collected();
        m.reset();
        assert_eq!(m.passes_run(), 0);
        assert_eq!(m.declarations_resolved(), 0);
        assert_eq!(m.directories_collected(), 0);
    }
}
