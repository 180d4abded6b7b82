//! The external uniqueness/validity oracle.

// Layer 2: Third-party
use async_trait::async_trait;

// Layer 3: Internal
use crate::context::PipelineContext;
use crate::error::SourceError;

/// A uniqueness or validity oracle consulted by transformers that need to
/// check a candidate before emitting it.
///
/// `valid` may be called concurrently by any number of transformers across
/// any number of in-flight packets; implementations must be safe for that.
///
/// This crate does not ship an implementation — it is a collaborator
/// supplied by the caller (e.g. backed by a database lookup or a remote
/// registry check).
#[async_trait]
pub trait Source: Send + Sync {
    /// Returns `Ok(true)` to accept `candidate`, `Ok(false)` to silently
    /// reject it, or `Err` if the check itself failed (fatal to the
    /// pipeline).
    async fn valid(&self, ctx: &PipelineContext, candidate: &str) -> Result<bool, SourceError>;
}

/// A [`Source`] that accepts every candidate without looking it up.
///
/// Useful as a default when no external oracle is configured, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSource;

#[async_trait]
impl Source for NoopSource {
    async fn valid(&self, _ctx: &PipelineContext, _candidate: &str) -> Result<bool, SourceError> {
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_source_always_accepts() {
        let ctx = PipelineContext::root();
        assert!(NoopSource.valid(&ctx, "anything").await.unwrap());
    }
}
