//! `Stage` (C4): one link in a pipeline, built from a
//! set of transformer factories and run either *Free* (every transformer's
//! output flows downstream as soon as it's ready) or *Uniform* (outputs
//! only flow once every transformer has produced or advanced for the
//! current round).

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tracing::trace;

// Layer 3: Internal
use crate::broadcaster::{self, BroadcastHandler, LAYER_SKIP_ID};
use crate::config::Config;
use crate::context::PipelineContext;
use crate::error::StageError;
use crate::error_group::ErrorGroup;
use crate::metrics::StageMetrics;
use crate::packet::MessagePacket;
use crate::sync_out::SyncOut;
use crate::transformer::{Statefulness, Transformer, TransformerFactory};
use crate::wait_group::AsyncWaitGroup;

/// Whether a stage's transformers run independently (*Free*) or must agree
/// on a shared emission round (*Uniform*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageKind {
    Free,
    Uniform,
}

struct FactorySlot {
    factory: Arc<dyn TransformerFactory>,
    cached: SyncMutex<Option<Arc<dyn Transformer>>>,
}

impl FactorySlot {
    fn new(factory: Arc<dyn TransformerFactory>) -> Self {
        Self {
            factory,
            cached: SyncMutex::new(None),
        }
    }

    /// Resolves this slot's transformer instance for one pipeline run,
    /// building it fresh or returning the cached shared instance depending
    /// on the factory's reported [`Statefulness`].
    fn resolve(&self, config: &Config) -> Arc<dyn Transformer> {
        {
            let cached = self.cached.lock();
            if let Some(existing) = cached.as_ref() {
                return Arc::clone(existing);
            }
        }

        let (instance, statefulness) = self.factory.build(config);
        if statefulness == Statefulness::Shared {
            let mut cached = self.cached.lock();
            // Another concurrent run may have raced us; keep whichever
            // instance landed first so every caller sees the same one.
            let winner = Arc::clone(cached.get_or_insert(instance));
            winner
        } else {
            instance
        }
    }
}

/// One link in a pipeline: a named set of transformer slots, run either
/// Free or Uniform.
pub struct Stage {
    id: Arc<str>,
    kind: StageKind,
    slots: Vec<FactorySlot>,
    metrics: Arc<StageMetrics>,
}

impl Stage {
    /// Builds a *Free* stage: every transformer's outputs flow downstream
    /// independently and as soon as they're ready.
    pub fn new_free(id: impl Into<Arc<str>>, factories: Vec<Arc<dyn TransformerFactory>>) -> Self {
        Self::new(id, StageKind::Free, factories)
    }

    /// Builds a *Uniform* stage: outputs only flow downstream once every
    /// transformer slot has produced or advanced for the current round.
    pub fn new_uniform(id: impl Into<Arc<str>>, factories: Vec<Arc<dyn TransformerFactory>>) -> Self {
        Self::new(id, StageKind::Uniform, factories)
    }

    fn new(id: impl Into<Arc<str>>, kind: StageKind, factories: Vec<Arc<dyn TransformerFactory>>) -> Self {
        Self {
            id: id.into(),
            kind,
            slots: factories.into_iter().map(FactorySlot::new).collect(),
            metrics: Arc::new(StageMetrics::default()),
        }
    }

    /// This stage's identifier, used in logging.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// This stage's observability counters.
    pub fn metrics(&self) -> &Arc<StageMetrics> {
        &self.metrics
    }

    fn resolve_transformers(&self, config: &Config) -> Result<Vec<Arc<dyn Transformer>>, StageError> {
        if self.slots.is_empty() {
            return Err(StageError::EmptyStage(self.id.to_string()));
        }
        Ok(self.slots.iter().map(|slot| slot.resolve(config)).collect())
    }

    /// Resolves this stage's transformers, spawns its broadcaster, and
    /// returns the channel its results are delivered on.
    pub(crate) fn pump_out(
        &self,
        ctx: PipelineContext,
        group: ErrorGroup,
        input: mpsc::Receiver<MessagePacket>,
        config: &Config,
    ) -> Result<mpsc::Receiver<MessagePacket>, StageError> {
        let transformers = self.resolve_transformers(config)?;
        let (out_tx, out_rx) = mpsc::channel(config.channel_capacity);

        let handler: Arc<dyn BroadcastHandler> = match self.kind {
            StageKind::Free => Arc::new(FreeHandler {
                out_tx,
                metrics: Arc::clone(&self.metrics),
            }),
            StageKind::Uniform => Arc::new(UniformHandler {
                bypass_tx: out_tx.clone(),
                sync_out: SyncOut::new(transformers.len(), out_tx),
                metrics: Arc::clone(&self.metrics),
            }),
        };

        trace!(stage = %self.id, kind = ?self.kind, n = transformers.len(), "spawning stage");
        broadcaster::spawn(
            Arc::clone(&self.id),
            ctx,
            group,
            input,
            transformers,
            handler,
            Arc::clone(&self.metrics),
        );
        Ok(out_rx)
    }
}

struct FreeHandler {
    out_tx: mpsc::Sender<MessagePacket>,
    metrics: Arc<StageMetrics>,
}

#[async_trait]
impl BroadcastHandler for FreeHandler {
    async fn handle_value(&self, _transformer_id: i64, packet: MessagePacket) {
        self.metrics.record_received();
        if self.out_tx.send(packet).await.is_ok() {
            self.metrics.record_emitted();
        }
    }

    async fn handle_skip(&self, transformer_id: i64, packet: MessagePacket) {
        self.metrics.record_received();
        self.metrics.record_skipped();
        if transformer_id == LAYER_SKIP_ID {
            // Layer-skip packets still must flow through untouched.
            if self.out_tx.send(packet).await.is_ok() {
                self.metrics.record_emitted();
            }
        }
    }

    async fn handle_exit(&self, consumption: &AsyncWaitGroup, cancelled: bool) {
        if !cancelled {
            consumption.wait().await;
        }
        // Dropping `self` (and its `out_tx` clone) closes the downstream
        // channel once the broadcaster itself is dropped.
    }
}

struct UniformHandler {
    // A layer-skip packet never participates in a transformer round (no
    // transformer ran on it), so it bypasses `sync_out` entirely rather
    // than being counted as a round arrival.
    bypass_tx: mpsc::Sender<MessagePacket>,
    sync_out: SyncOut,
    metrics: Arc<StageMetrics>,
}

#[async_trait]
impl BroadcastHandler for UniformHandler {
    async fn handle_value(&self, transformer_id: i64, packet: MessagePacket) {
        self.metrics.record_received();
        if transformer_id == LAYER_SKIP_ID {
            if self.bypass_tx.send(packet).await.is_ok() {
                self.metrics.record_emitted();
            }
            return;
        }
        if self.sync_out.write(transformer_id, packet).await == crate::sync_out::RoundOutcome::Written {
            self.metrics.record_emitted();
        }
    }

    async fn handle_skip(&self, transformer_id: i64, packet: MessagePacket) {
        self.metrics.record_received();
        self.metrics.record_skipped();
        if transformer_id == LAYER_SKIP_ID {
            let _ = self.bypass_tx.send(packet).await;
            return;
        }
        self.sync_out.advance(transformer_id).await;
    }

    async fn handle_exit(&self, consumption: &AsyncWaitGroup, cancelled: bool) {
        if !cancelled {
            consumption.wait().await;
        }
        self.sync_out.close().await;
    }
}
