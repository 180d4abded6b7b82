//! `Pipeline` (C5, internal half): chains a sequence of [`Stage`]s behind a
//! shared cancellation scope and error group, and hands back the final
//! stage's output channel plus a [`Cleanup`] handle.

// Layer 1: Standard library

// Layer 2: Third-party
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, trace};

// Layer 3: Internal
use crate::config::Config;
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::error_group::ErrorGroup;
use crate::packet::MessagePacket;
use crate::stage::Stage;

/// Feeds `input` through `stages`, front to back, and returns the channel
/// the final stage's results arrive on, plus a [`Cleanup`] handle the
/// caller must run once it's done consuming. Takes a borrowed slice rather
/// than owning the stages so a [`Generator`](crate::Generator) can run the
/// same configured stages repeatedly.
pub(crate) fn run(
    stages: &[Stage],
    parent_ctx: &PipelineContext,
    config: &Config,
    input: String,
) -> (mpsc::Receiver<MessagePacket>, Cleanup) {
    let request_id = uuid::Uuid::new_v4();
    let _span = info_span!("pipeline.run", %request_id).entered();

    let ctx = parent_ctx.child();
    let group = ErrorGroup::new(ctx.cancellation_token().clone());

    let (seed_tx, seed_rx) = mpsc::channel(1);
    // Capacity 1, one send, then close: the pipeline entrance is a
    // single packet, never a stream.
    let _ = seed_tx.try_send(MessagePacket::new(input));
    drop(seed_tx);

    let mut current = seed_rx;

    for stage in stages {
        trace!(stage = stage.id(), request_id = %request_id, "wiring stage");
        match stage.pump_out(ctx.clone(), group.clone(), current, config) {
            Ok(next) => current = next,
            Err(err) => {
                group.fail(PipelineError::Stage(err));
                let (_, empty_rx) = mpsc::channel(1);
                return (
                    empty_rx,
                    Cleanup {
                        cancellation: ctx.cancellation_token().clone(),
                        group,
                    },
                );
            }
        }
    }

    (
        current,
        Cleanup {
            cancellation: ctx.cancellation_token().clone(),
            group,
        },
    )
}

/// Tears down a pipeline run: cancels its scope and waits for every spawned
/// task to finish, surfacing the first real error (benign stop sentinels
/// are the generator's job to normalize, not this type's).
pub(crate) struct Cleanup {
    cancellation: CancellationToken,
    group: ErrorGroup,
}

impl Cleanup {
    pub(crate) async fn run(self) -> Result<(), PipelineError> {
        self.cancellation.cancel();
        self.group.wait().await
    }
}
