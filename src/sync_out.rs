//! `SyncOut` (C3): the barrier a *Uniform* stage uses to emit one whole
//! round's outputs only once every transformer slot has written or
//! advanced.

// Layer 1: Standard library
use std::collections::HashMap;

// Layer 2: Third-party
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

// Layer 3: Internal
use crate::packet::MessagePacket;

/// Outcome of a [`SyncOut::write`] or [`SyncOut::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    /// The round flushed (this call either triggered the flush or was
    /// released by it).
    Written,
    /// This transformer slot had already written this round; the call was
    /// a no-op.
    Voided,
    /// The barrier was closed; the call was a no-op.
    Closed,
}

struct RoundState {
    buf: Vec<MessagePacket>,
    arrived: usize,
    waiters: HashMap<i64, oneshot::Sender<()>>,
}

impl RoundState {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            arrived: 0,
            waiters: HashMap::new(),
        }
    }
}

/// The uniform-stage barrier for `n_writers` transformer slots.
///
/// State is guarded by a single async mutex so that only the task currently
/// "holding the round" mutates `buf`/`arrived`/`waiters` — the async
/// equivalent of the single-slot state channel described in the design
/// notes, chosen here because it reads more directly in async Rust while
/// preserving the same cancellation composability (every suspension point
/// is a `tokio::select!` against `closed`).
pub(crate) struct SyncOut {
    n_writers: usize,
    state: Mutex<RoundState>,
    closed: CancellationToken,
    out_tx: mpsc::Sender<MessagePacket>,
}

impl SyncOut {
    pub(crate) fn new(n_writers: usize, out_tx: mpsc::Sender<MessagePacket>) -> Self {
        Self {
            n_writers,
            state: Mutex::new(RoundState::new()),
            closed: CancellationToken::new(),
            out_tx,
        }
    }

    /// Writes `packet` for transformer `id` in the current round.
    pub(crate) async fn write(&self, id: i64, packet: MessagePacket) -> RoundOutcome {
        self.write_or_advance(id, Some(packet)).await
    }

    /// Marks transformer `id` as having arrived for the current round
    /// without contributing a packet (used for transformer-`Skip`).
    pub(crate) async fn advance(&self, id: i64) -> RoundOutcome {
        self.write_or_advance(id, None).await
    }

    async fn write_or_advance(&self, id: i64, packet: Option<MessagePacket>) -> RoundOutcome {
        if self.closed.is_cancelled() {
            return RoundOutcome::Closed;
        }

        let release_rx = {
            let mut state = self.state.lock().await;

            if state.waiters.contains_key(&id) {
                return RoundOutcome::Voided;
            }

            if let Some(packet) = packet {
                state.buf.push(packet);
            }
            state.arrived += 1;

            if state.arrived == self.n_writers {
                self.flush_and_release(&mut state).await;
                return RoundOutcome::Written;
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.insert(id, tx);
            rx
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => RoundOutcome::Closed,
            _ = release_rx => RoundOutcome::Written,
        }
    }

    /// Drains the round's buffer downstream and releases every waiter.
    /// Must be called with `state` already locked for the current round.
    async fn flush_and_release(&self, state: &mut RoundState) {
        for packet in state.buf.drain(..) {
            if self.closed.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                result = self.out_tx.send(packet) => { let _ = result; }
            }
        }
        state.arrived = 0;
        for (_, release) in state.waiters.drain() {
            let _ = release.send(());
        }
    }

    /// Closes the barrier: in-flight writers waiting on a release signal
    /// observe the close and return [`RoundOutcome::Closed`]; later calls
    /// return immediately with the same outcome. Does not itself drop the
    /// downstream sender — the owning stage drops its clones once this
    /// returns, which closes the channel by ordinary ownership rules.
    pub(crate) async fn close(&self) {
        self.closed.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn single_writer_round_flushes_immediately() {
        let (tx, mut rx) = mpsc::channel(4);
        let sync_out = SyncOut::new(1, tx);

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            sync_out.write(0, MessagePacket::new("val")),
        )
        .await
        .unwrap();

        assert_eq!(outcome, RoundOutcome::Written);
        assert_eq!(rx.recv().await.unwrap().message, "val");
    }

    #[tokio::test]
    async fn two_writer_round_waits_for_both_then_flushes_together() {
        let (tx, mut rx) = mpsc::channel(4);
        let sync_out = Arc::new(SyncOut::new(2, tx));

        let writer = {
            let sync_out = Arc::clone(&sync_out);
            tokio::spawn(async move { sync_out.write(0, MessagePacket::new("val1")).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        let outcome2 = sync_out.write(1, MessagePacket::new("val2")).await;
        assert_eq!(outcome2, RoundOutcome::Written);

        let outcome1 = tokio::time::timeout(Duration::from_millis(50), writer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome1, RoundOutcome::Written);

        let v1 = rx.recv().await.unwrap().message;
        let v2 = rx.recv().await.unwrap().message;
        assert_ne!(v1, v2);
    }

    #[tokio::test]
    async fn advance_participates_without_emitting() {
        let (tx, mut rx) = mpsc::channel(4);
        let sync_out = SyncOut::new(2, tx);

        let (r0, r1) = tokio::join!(
            sync_out.advance(0),
            sync_out.write(1, MessagePacket::new("only"))
        );
        assert_eq!(r0, RoundOutcome::Written);
        assert_eq!(r1, RoundOutcome::Written);

        let emitted = rx.recv().await.unwrap();
        assert_eq!(emitted.message, "only");
    }

    #[tokio::test]
    async fn second_write_from_same_slot_in_a_round_is_voided() {
        let (tx, _rx) = mpsc::channel(4);
        let sync_out = Arc::new(SyncOut::new(2, tx));

        let sync_out2 = Arc::clone(&sync_out);
        let first = tokio::spawn(async move { sync_out2.write(0, MessagePacket::new("a")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let outcome = sync_out.write(0, MessagePacket::new("b")).await;
        assert_eq!(outcome, RoundOutcome::Voided);

        first.abort();
    }

    #[tokio::test]
    async fn close_releases_pending_writer_and_future_writes_are_closed() {
        let (tx, _rx) = mpsc::channel(4);
        let sync_out = Arc::new(SyncOut::new(2, tx));

        let sync_out2 = Arc::clone(&sync_out);
        let pending = tokio::spawn(async move { sync_out2.write(0, MessagePacket::new("a")).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        sync_out.close().await;

        let outcome = tokio::time::timeout(Duration::from_millis(50), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, RoundOutcome::Closed);

        let outcome2 = sync_out.write(1, MessagePacket::new("b")).await;
        assert_eq!(outcome2, RoundOutcome::Closed);
    }
}
