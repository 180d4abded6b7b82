//! `PacketBroadcaster` (C2): fans each upstream packet out to every
//! transformer of a stage in parallel, while restoring per-transformer
//! input order before handing results to the stage's handlers.

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

// Layer 3: Internal
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::error_group::ErrorGroup;
use crate::metrics::StageMetrics;
use crate::packet::MessagePacket;
use crate::transformer::{Transformer, TransformOutcome};
use crate::wait_group::AsyncWaitGroup;

/// Identifies the layer-skip pass-through path: a packet forwarded because
/// its own `skip` counter was nonzero, never fanned out to a transformer.
pub(crate) const LAYER_SKIP_ID: i64 = -1;

enum WaiterOutcome {
    Value(MessagePacket),
    Skip(MessagePacket),
}

struct Waiter {
    transformer_id: i64,
    seq: u64,
    outcome: WaiterOutcome,
}

/// Stage-provided sink for the broadcaster's reassembled results. A *Free*
/// stage and a *Uniform* stage each implement this differently (§4.4).
#[async_trait]
pub(crate) trait BroadcastHandler: Send + Sync {
    /// A transformer (or the layer-skip path, when `transformer_id ==
    /// LAYER_SKIP_ID`) produced `packet`.
    async fn handle_value(&self, transformer_id: i64, packet: MessagePacket);

    /// A transformer returned `Skip` for this packet, or (when
    /// `transformer_id == LAYER_SKIP_ID`) this is a layer-skip forward with
    /// no transformer involved — implementations distinguish the two via
    /// `transformer_id`.
    async fn handle_skip(&self, transformer_id: i64, packet: MessagePacket);

    /// Called exactly once, after intake has drained, once the
    /// broadcaster is shutting down. `cancelled` is true if this is due to
    /// pipeline cancellation (in which case the consumption wait-group may
    /// still have outstanding work that is being dropped, not drained).
    async fn handle_exit(&self, consumption: &AsyncWaitGroup, cancelled: bool);
}

/// Spawns the ingestor and one reassembler per transformer into `group`.
/// Returns once every task has been spawned (it does not wait for them to
/// finish — that's `group.wait()`'s job).
pub(crate) fn spawn(
    stage_id: Arc<str>,
    ctx: PipelineContext,
    group: ErrorGroup,
    src: mpsc::Receiver<MessagePacket>,
    transformers: Vec<Arc<dyn Transformer>>,
    handler: Arc<dyn BroadcastHandler>,
    metrics: Arc<StageMetrics>,
) {
    let n = transformers.len();
    let intake = Arc::new(AsyncWaitGroup::new());
    let consumption = Arc::new(AsyncWaitGroup::new());

    let mut receive_txs = Vec::with_capacity(n);
    for idx in 0..n {
        // Capacity 1 mirrors the reference implementation's unbuffered
        // per-transformer handoff: a rendezvous, not a queue.
        let (tx, rx) = mpsc::channel::<Waiter>(1);
        receive_txs.push(tx);
        group.spawn(run_reassembler(
            stage_id.clone(),
            idx,
            rx,
            Arc::clone(&handler),
            Arc::clone(&consumption),
            ctx.clone(),
        ));
    }

    group.spawn(run_ingestor(
        stage_id,
        ctx,
        group.clone(),
        src,
        transformers,
        receive_txs,
        intake,
        consumption,
        handler,
        metrics,
    ));
}

#[allow(clippy::too_many_arguments)]
async fn run_ingestor(
    stage_id: Arc<str>,
    ctx: PipelineContext,
    group: ErrorGroup,
    mut src: mpsc::Receiver<MessagePacket>,
    transformers: Vec<Arc<dyn Transformer>>,
    receive_txs: Vec<mpsc::Sender<Waiter>>,
    intake: Arc<AsyncWaitGroup>,
    consumption: Arc<AsyncWaitGroup>,
    handler: Arc<dyn BroadcastHandler>,
    metrics: Arc<StageMetrics>,
) -> Result<(), PipelineError> {
    debug!(stage = %stage_id, "ingestor started");
    let cancellation = group.cancellation().clone();
    let mut seq: u64 = 0;

    let cancelled = loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break true,
            received = src.recv() => {
                match received {
                    None => break false,
                    Some(mut packet) => {
                        if packet.skip > 0 {
                            packet.skip -= 1;
                            handler.handle_skip(LAYER_SKIP_ID, packet).await;
                            continue;
                        }

                        let this_seq = seq;
                        seq += 1;
                        intake.add(transformers.len() as i64);

                        for (idx, transformer) in transformers.iter().enumerate() {
                            let transformer = Arc::clone(transformer);
                            let input_packet = packet.clone();
                            let tx = receive_txs[idx].clone();
                            let ctx = ctx.clone();
                            let intake = Arc::clone(&intake);
                            let consumption = Arc::clone(&consumption);
                            let cancellation = cancellation.clone();
                            let stage_id = stage_id.clone();
                            let metrics = Arc::clone(&metrics);

                            group.spawn(async move {
                                trace!(stage = %stage_id, transformer = idx, seq = this_seq, "dispatching");
                                let result = transformer.transform(&ctx, input_packet.clone()).await;

                                let outcome = match result {
                                    Ok(TransformOutcome::Produced(p)) => WaiterOutcome::Value(p),
                                    Ok(TransformOutcome::Skip) => {
                                        // The input packet carries forward unchanged as the
                                        // record of what was skipped; handlers that only care
                                        // about occupying the round (Uniform's `advance`) can
                                        // ignore its contents.
                                        WaiterOutcome::Skip(input_packet)
                                    }
                                    Ok(TransformOutcome::Quit) => {
                                        metrics.record_errored();
                                        intake.done();
                                        return Err(PipelineError::Quit);
                                    }
                                    Err(e) => {
                                        warn!(stage = %stage_id, transformer = idx, error = %e, "transformer failed");
                                        metrics.record_errored();
                                        intake.done();
                                        return Err(PipelineError::Transformer(e));
                                    }
                                };

                                consumption.add(1);
                                let waiter = Waiter { transformer_id: idx as i64, seq: this_seq, outcome };

                                tokio::select! {
                                    biased;
                                    _ = cancellation.cancelled() => {
                                        consumption.done();
                                        intake.done();
                                        Err(PipelineError::Cancelled)
                                    }
                                    send_result = tx.send(waiter) => {
                                        intake.done();
                                        if send_result.is_err() {
                                            consumption.done();
                                        }
                                        Ok(())
                                    }
                                }
                            });
                        }
                    }
                }
            }
        }
    };

    intake.wait().await;
    drop(receive_txs);
    handler.handle_exit(&consumption, cancelled).await;
    debug!(stage = %stage_id, cancelled, "ingestor stopped");

    if cancelled {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

async fn run_reassembler(
    stage_id: Arc<str>,
    transformer_id: usize,
    mut rx: mpsc::Receiver<Waiter>,
    handler: Arc<dyn BroadcastHandler>,
    consumption: Arc<AsyncWaitGroup>,
    ctx: PipelineContext,
) -> Result<(), PipelineError> {
    debug!(stage = %stage_id, transformer = transformer_id, "reassembler started");
    let mut next_seq: u64 = 0;
    let mut buffer: Vec<Waiter> = Vec::new();

    let cancelled = loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => break true,
            received = rx.recv() => {
                match received {
                    None => break false,
                    Some(waiter) => {
                        if waiter.seq < next_seq {
                            dispatch(&handler, waiter).await;
                            consumption.done();
                        } else if waiter.seq == next_seq {
                            dispatch(&handler, waiter).await;
                            consumption.done();
                            next_seq += 1;
                        } else {
                            buffer.push(waiter);
                        }

                        buffer.sort_by_key(|w| w.seq);
                        while let Some(front) = buffer.first() {
                            if front.seq > next_seq {
                                break;
                            }
                            let bump = front.seq == next_seq;
                            let ready = buffer.remove(0);
                            dispatch(&handler, ready).await;
                            consumption.done();
                            if bump {
                                next_seq += 1;
                            }
                        }
                    }
                }
            }
        }
    };

    if cancelled {
        // Drop whatever is buffered or still arriving without dispatching;
        // the packets were already counted into `consumption` by the
        // ingestor and must still be accounted for.
        for _ in buffer.drain(..) {
            consumption.done();
        }
        while let Ok(waiter) = rx.try_recv() {
            let _ = waiter;
            consumption.done();
        }
    } else {
        // The channel is closed and every waiter has already arrived (the
        // ingestor only drops its senders after intake has fully drained),
        // so any leftover buffered entries are dispatched in order as a
        // defensive final pass.
        buffer.sort_by_key(|w| w.seq);
        for waiter in buffer.drain(..) {
            dispatch(&handler, waiter).await;
            consumption.done();
        }
    }

    debug!(stage = %stage_id, transformer = transformer_id, cancelled, "reassembler stopped");
    Ok(())
}

async fn dispatch(handler: &Arc<dyn BroadcastHandler>, waiter: Waiter) {
    match waiter.outcome {
        WaiterOutcome::Value(packet) => handler.handle_value(waiter.transformer_id, packet).await,
        WaiterOutcome::Skip(packet) => handler.handle_skip(waiter.transformer_id, packet).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::TransformerError;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct FailOnce;

    #[async_trait]
    impl Transformer for FailOnce {
        async fn transform(
            &self,
            _ctx: &PipelineContext,
            _packet: MessagePacket,
        ) -> Result<TransformOutcome, TransformerError> {
            Err(TransformerError::from_err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "boom",
            )))
        }
    }

    struct RecordingHandler {
        values: Mutex<Vec<(i64, String)>>,
        skips: Mutex<Vec<(i64, String)>>,
        exited: Mutex<Option<bool>>,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                values: Mutex::new(Vec::new()),
                skips: Mutex::new(Vec::new()),
                exited: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl BroadcastHandler for RecordingHandler {
        async fn handle_value(&self, transformer_id: i64, packet: MessagePacket) {
            self.values.lock().push((transformer_id, packet.message));
        }

        async fn handle_skip(&self, transformer_id: i64, packet: MessagePacket) {
            self.skips.lock().push((transformer_id, packet.message));
        }

        async fn handle_exit(&self, consumption: &AsyncWaitGroup, cancelled: bool) {
            if !cancelled {
                consumption.wait().await;
            }
            *self.exited.lock() = Some(cancelled);
        }
    }

    struct VariableSleep {
        root: Duration,
    }

    #[async_trait]
    impl Transformer for VariableSleep {
        async fn transform(
            &self,
            ctx: &PipelineContext,
            packet: MessagePacket,
        ) -> Result<TransformOutcome, TransformerError> {
            let divisor: u32 = packet.message.parse().unwrap_or(1);
            let sleep = self.root / divisor;
            tokio::select! {
                _ = ctx.cancelled() => Ok(TransformOutcome::Produced(packet)),
                _ = tokio::time::sleep(sleep) => Ok(TransformOutcome::Produced(packet)),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn preserves_per_transformer_order_under_variable_latency() {
        let (src_tx, src_rx) = mpsc::channel(8);
        for v in ["1", "2", "3", "4", "5"] {
            src_tx.send(MessagePacket::new(v)).await.unwrap();
        }
        drop(src_tx);

        let handler = RecordingHandler::new();
        let group = ErrorGroup::new(tokio_util::sync::CancellationToken::new());
        let ctx = PipelineContext::root();
        let transformers: Vec<Arc<dyn Transformer>> = vec![Arc::new(VariableSleep {
            root: Duration::from_secs(5),
        })];

        spawn(
            Arc::from("test"),
            ctx,
            group.clone(),
            src_rx,
            transformers,
            handler.clone() as Arc<dyn BroadcastHandler>,
            Arc::new(StageMetrics::default()),
        );

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::time::timeout(Duration::from_secs(1), group.wait())
            .await
            .unwrap()
            .unwrap();

        let values = handler.values.lock();
        let observed: Vec<&str> = values.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(observed, vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn layer_skip_bypasses_transformers_and_decrements_counter() {
        let (src_tx, src_rx) = mpsc::channel(8);
        let mut packet = MessagePacket::new("seed");
        packet.skip = 1;
        src_tx.send(packet).await.unwrap();
        drop(src_tx);

        let handler = RecordingHandler::new();
        let group = ErrorGroup::new(tokio_util::sync::CancellationToken::new());
        let ctx = PipelineContext::root();
        let transformers: Vec<Arc<dyn Transformer>> = vec![Arc::new(VariableSleep {
            root: Duration::from_millis(0),
        })];

        spawn(
            Arc::from("test"),
            ctx,
            group.clone(),
            src_rx,
            transformers,
            handler.clone() as Arc<dyn BroadcastHandler>,
            Arc::new(StageMetrics::default()),
        );

        group.wait().await.unwrap();

        assert!(handler.values.lock().is_empty());
        let skips = handler.skips.lock();
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].0, LAYER_SKIP_ID);
        assert_eq!(skips[0].1, "seed");
    }

    #[tokio::test]
    async fn transformer_failure_increments_errored_metric() {
        let (src_tx, src_rx) = mpsc::channel(8);
        src_tx.send(MessagePacket::new("x")).await.unwrap();
        drop(src_tx);

        let handler = RecordingHandler::new();
        let group = ErrorGroup::new(tokio_util::sync::CancellationToken::new());
        let ctx = PipelineContext::root();
        let transformers: Vec<Arc<dyn Transformer>> = vec![Arc::new(FailOnce)];
        let metrics = Arc::new(StageMetrics::default());

        spawn(
            Arc::from("test"),
            ctx,
            group.clone(),
            src_rx,
            transformers,
            handler.clone() as Arc<dyn BroadcastHandler>,
            Arc::clone(&metrics),
        );

        let err = group.wait().await.unwrap_err();
        assert!(matches!(err, PipelineError::Transformer(_)));
        assert_eq!(metrics.errored(), 1);
    }
}
