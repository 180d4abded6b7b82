//! A minimal async wait-group: a counter that `wait` resolves against once
//! it reaches zero. `PacketBroadcaster` keeps two independent instances —
//! intake and consumption — per the design notes' deadlock-avoidance
//! rationale.

// Layer 1: Standard library
use std::sync::atomic::{AtomicI64, Ordering};

// Layer 2: Third-party
use tokio::sync::Notify;

/// An async-friendly wait-group, analogous to `sync.WaitGroup` but awaitable.
#[derive(Debug, Default)]
pub(crate) struct AsyncWaitGroup {
    count: AtomicI64,
    notify: Notify,
}

impl AsyncWaitGroup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `n` to the outstanding count. `n` may be negative.
    pub(crate) fn add(&self, n: i64) {
        let previous = self.count.fetch_add(n, Ordering::AcqRel);
        if previous + n <= 0 {
            self.notify.notify_waiters();
        }
    }

    /// Decrements the outstanding count by one.
    pub(crate) fn done(&self) {
        self.add(-1);
    }

    /// Resolves once the outstanding count is zero or below.
    pub(crate) async fn wait(&self) {
        loop {
            if self.count.load(Ordering::Acquire) <= 0 {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after subscribing to avoid missing a notification
            // that landed between the load above and the subscribe here.
            if self.count.load(Ordering::Acquire) <= 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_immediately_when_empty() {
        let wg = AsyncWaitGroup::new();
        tokio::time::timeout(Duration::from_millis(50), wg.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_blocks_until_done_matches_add() {
        let wg = Arc::new(AsyncWaitGroup::new());
        wg.add(2);

        let waiter = {
            let wg = Arc::clone(&wg);
            tokio::spawn(async move {
                wg.wait().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        wg.done();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        wg.done();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
