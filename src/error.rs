//! Error taxonomy for the pipeline, mirroring the propagation table in the
//! design notes: a user-extensibility boundary error (`TransformerError`,
//! `SourceError`) is wrapped by the pipeline-wide `PipelineError`, which in
//! turn is wrapped by the generator-facing `GeneratorError`.

// Layer 1: Standard library
use std::error::Error as StdError;

// Layer 2: Third-party
use thiserror::Error;

/// Error returned by a user-supplied [`Transformer`](crate::Transformer).
///
/// Transformers don't return this type directly for the `Skip`/`Quit`
/// outcomes — those are expressed via [`TransformOutcome`](crate::TransformOutcome).
/// This type only wraps genuine failures.
#[derive(Debug, Error)]
pub enum TransformerError {
    /// The transformer's own logic failed.
    #[error(transparent)]
    Failed(#[from] Box<dyn StdError + Send + Sync>),
}

impl TransformerError {
    /// Wraps any standard error as a transformer failure.
    pub fn from_err<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Failed(Box::new(err))
    }
}

/// Error returned by a [`Source`](crate::Source) uniqueness oracle.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The oracle's own lookup failed.
    #[error(transparent)]
    Failed(#[from] Box<dyn StdError + Send + Sync>),
}

impl SourceError {
    /// Wraps any standard error as a source-oracle failure.
    pub fn from_err<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Failed(Box::new(err))
    }
}

/// Error raised while wiring a [`Stage`](crate::Stage) into a pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    /// A stage was constructed with no transformers at all.
    #[error("stage '{0}' has no transformers configured")]
    EmptyStage(String),
}

/// The pipeline's error-group terminal error type.
///
/// `Cancelled` and `Quit` are internal sentinels: they cancel the shared
/// token like a real error would, but the pipeline's cleanup and
/// [`Generator::generate`](crate::Generator::generate) both normalize them
/// away when the stop condition was the caller's own doing.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage could not be wired up.
    #[error("stage setup failed: {0}")]
    Stage(#[from] StageError),

    /// A transformer returned a fatal error.
    #[error("transformer failed: {0}")]
    Transformer(#[from] TransformerError),

    /// The uniqueness oracle returned a fatal error.
    #[error("uniqueness oracle failed: {0}")]
    Source(#[from] SourceError),

    /// The pipeline's cancellation token was cancelled (caller-initiated or
    /// cleanup-initiated); not a user-visible failure by itself.
    #[error("pipeline cancelled")]
    Cancelled,

    /// A transformer returned `Quit`, requesting a clean, immediate stop.
    #[error("transformer requested pipeline quit")]
    Quit,
}

impl PipelineError {
    /// True for the two internal sentinels that the generator is allowed to
    /// normalize into a successful result.
    pub fn is_benign_stop(&self) -> bool {
        matches!(self, PipelineError::Cancelled | PipelineError::Quit)
    }

    /// True for failures that originated from user-supplied code
    /// (transformer or source), as opposed to pipeline wiring mistakes.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, PipelineError::Transformer(_) | PipelineError::Source(_))
    }
}

/// The top-level error returned by [`Generator::generate`](crate::Generator::generate).
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The input exceeded the configured `max_bytes` limit.
    #[error("input exceeds maximum length of {max} bytes (got {actual})")]
    InputTooLarge {
        /// The configured limit.
        max: usize,
        /// The input's actual byte length.
        actual: usize,
    },

    /// A failure originated from the pipeline itself, a stage, or a
    /// transformer/source collaborator.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl GeneratorError {
    /// Mirrors [`PipelineError::is_transient`]-style helpers seen elsewhere
    /// in this codebase's error types: true when retrying with a shorter
    /// input could plausibly succeed.
    pub fn is_input_error(&self) -> bool {
        matches!(self, GeneratorError::InputTooLarge { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn transformer_error_wraps_std_error() {
        let err = TransformerError::from_err(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn pipeline_error_benign_stop_classification() {
        assert!(PipelineError::Cancelled.is_benign_stop());
        assert!(PipelineError::Quit.is_benign_stop());
        assert!(!PipelineError::Stage(StageError::EmptyStage("s".into())).is_benign_stop());
    }

    #[test]
    fn generator_error_input_too_large_is_input_error() {
        let err = GeneratorError::InputTooLarge { max: 4, actual: 10 };
        assert!(err.is_input_error());
    }
}
