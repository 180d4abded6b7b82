//! Lock-free per-stage counters. Observability only: nothing in the core
//! algorithm depends on these values, and the §8 testable properties don't
//! reference them.

// Layer 1: Standard library
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for one stage's lifetime.
///
/// # Examples
///
/// ```rust
/// use namestream::metrics::StageMetrics;
///
/// let metrics = StageMetrics::default();
/// metrics.record_received();
/// metrics.record_emitted();
/// assert_eq!(metrics.received(), 1);
/// assert_eq!(metrics.emitted(), 1);
/// ```
#[derive(Debug, Default)]
pub struct StageMetrics {
    received: AtomicU64,
    emitted: AtomicU64,
    skipped: AtomicU64,
    errored: AtomicU64,
}

impl StageMetrics {
    /// Records one packet arriving at the stage's ingestor.
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one packet successfully forwarded downstream.
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one packet dropped via `Skip` or layer-skip.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one transformer or source failure.
    pub fn record_errored(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Packets that entered the stage.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Packets the stage forwarded downstream.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Packets dropped by a skip of either kind.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Transformer or source failures observed by this stage.
    pub fn errored(&self) -> u64 {
        self.errored.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = StageMetrics::default();
        assert_eq!(metrics.received(), 0);
        assert_eq!(metrics.emitted(), 0);
        assert_eq!(metrics.skipped(), 0);
        assert_eq!(metrics.errored(), 0);
    }

    #[test]
    fn counters_increment_independently() {
        let metrics = StageMetrics::default();
        metrics.record_received();
        metrics.record_received();
        metrics.record_emitted();
        metrics.record_skipped();
        metrics.record_errored();
        assert_eq!(metrics.received(), 2);
        assert_eq!(metrics.emitted(), 1);
        assert_eq!(metrics.skipped(), 1);
        assert_eq!(metrics.errored(), 1);
    }
}
