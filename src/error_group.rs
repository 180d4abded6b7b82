//! A small `errgroup`-style abstraction: spawns tasks under a shared
//! cancellation scope, keeps the first error any of them returns, and
//! cancels the scope as soon as one does.

// Layer 1: Standard library
use std::future::Future;
use std::sync::Arc;

// Layer 2: Third-party
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal
use crate::error::PipelineError;

struct Inner {
    cancellation: CancellationToken,
    first_error: Mutex<Option<PipelineError>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared handle to a group of cooperating tasks. Cloning shares the same
/// underlying scope; every clone can spawn into it and observe the same
/// first error.
#[derive(Clone)]
pub(crate) struct ErrorGroup {
    inner: Arc<Inner>,
}

impl ErrorGroup {
    pub(crate) fn new(cancellation: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancellation,
                first_error: Mutex::new(None),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The cancellation token shared by every task in this group.
    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    /// Spawns `fut`. If it resolves to `Err`, the group's scope is
    /// cancelled and the error is retained (first one wins).
    pub(crate) fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = Result<(), PipelineError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            if let Err(err) = fut.await {
                let mut slot = inner.first_error.lock();
                if slot.is_none() {
                    *slot = Some(err);
                }
                inner.cancellation.cancel();
            }
        });
        self.inner.handles.lock().push(handle);
    }

    /// Records `err` directly (used for setup failures that occur before
    /// any task is spawned) and cancels the scope.
    pub(crate) fn fail(&self, err: PipelineError) {
        let mut slot = self.inner.first_error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
        drop(slot);
        self.inner.cancellation.cancel();
    }

    /// Cancels the scope and waits for every task spawned so far (and any
    /// spawned while waiting) to finish, returning the first error
    /// observed, if any.
    pub(crate) async fn wait(&self) -> Result<(), PipelineError> {
        self.inner.cancellation.cancel();
        loop {
            let batch: Vec<JoinHandle<()>> = {
                let mut handles = self.inner.handles.lock();
                if handles.is_empty() {
                    break;
                }
                std::mem::take(&mut *handles)
            };
            for handle in batch {
                let _ = handle.await;
            }
        }
        self.inner.first_error.lock().take().map_or(Ok(()), Err)
    }
}
