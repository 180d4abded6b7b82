//! The context threaded through every transformer call: a cancellation
//! scope plus two optional side-channel "hints".

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party
use tokio_util::sync::CancellationToken;

/// Carried into every [`Transformer::transform`](crate::Transformer::transform)
/// and [`Source::valid`](crate::Source::valid) call.
///
/// Cloning a `PipelineContext` is cheap: the cancellation token is itself
/// reference-counted, and the hints are `Arc`-backed.
///
/// # Examples
///
/// ```rust
/// use namestream::PipelineContext;
///
/// let ctx = PipelineContext::root().with_hint_number(3).with_hint_string("x");
/// assert_eq!(ctx.hint_number(), Some(3));
/// assert_eq!(ctx.hint_string(), Some("x"));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineContext {
    cancellation: CancellationToken,
    hint_number: Option<i64>,
    hint_string: Option<Arc<str>>,
}

impl PipelineContext {
    /// Builds a fresh root context with its own cancellation token. Callers
    /// that need to cancel generation from the outside should keep a clone
    /// of the [`CancellationToken`] obtained from [`Self::cancellation_token`].
    pub fn root() -> Self {
        Self::new(CancellationToken::new())
    }

    /// Builds a context over an existing cancellation token, e.g. one shared
    /// with other parts of an application.
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            hint_number: None,
            hint_string: None,
        }
    }

    /// Attaches an integer hint, retrievable by transformers via [`Self::hint_number`].
    pub fn with_hint_number(mut self, value: i64) -> Self {
        self.hint_number = Some(value);
        self
    }

    /// Attaches a string hint, retrievable by transformers via [`Self::hint_string`].
    pub fn with_hint_string(mut self, value: impl Into<Arc<str>>) -> Self {
        self.hint_string = Some(value.into());
        self
    }

    /// The integer hint, if one was attached.
    pub fn hint_number(&self) -> Option<i64> {
        self.hint_number
    }

    /// The string hint, if one was attached.
    pub fn hint_string(&self) -> Option<&str> {
        self.hint_string.as_deref()
    }

    /// The underlying cancellation token, for callers that want to cancel
    /// generation externally.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// True if this context (or an ancestor) has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once this context (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Derives a child context: a new cancellation scope that is cancelled
    /// whenever `self` is, but can also be cancelled independently without
    /// affecting `self`. Hints are carried over unchanged.
    pub(crate) fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            hint_number: self.hint_number,
            hint_string: self.hint_string.clone(),
        }
    }
}
