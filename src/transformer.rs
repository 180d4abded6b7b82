//! The `Transformer` boundary (C1): a pure functional contract the core
//! fans out to, plus the factory machinery that decides whether an
//! instance is shared across stage invocations or rebuilt fresh each time.

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party
use async_trait::async_trait;

// Layer 3: Internal
use crate::config::Config;
use crate::context::PipelineContext;
use crate::error::TransformerError;
use crate::packet::MessagePacket;

/// What a transformer produced for one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// A (possibly unchanged) packet to forward.
    Produced(MessagePacket),
    /// Drop this output; don't forward it.
    Skip,
    /// Abort the whole pipeline cleanly, as if the caller had cancelled.
    ///
    /// Supplemented from the reference implementation's proxy-layer
    /// concept: useful for predicate-style transformers that want to stop
    /// generation outright rather than merely drop one candidate.
    Quit,
}

/// The only abstract contract the core pipeline cares about. Individual
/// transformer algorithms (case conversion, affixes, permutations, …) are
/// collaborators implemented against this trait; none of them ship with
/// this crate.
///
/// Implementations must suspend cooperatively (select on the context's
/// cancellation rather than blocking indefinitely) and must honor
/// cancellation promptly.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transforms one packet, returning a new packet, a skip, a quit, or a
    /// fatal error.
    async fn transform(
        &self,
        ctx: &PipelineContext,
        packet: MessagePacket,
    ) -> Result<TransformOutcome, TransformerError>;
}

#[async_trait]
impl<T: Transformer + ?Sized> Transformer for Arc<T> {
    async fn transform(
        &self,
        ctx: &PipelineContext,
        packet: MessagePacket,
    ) -> Result<TransformOutcome, TransformerError> {
        (**self).transform(ctx, packet).await
    }
}

/// Whether a transformer instance built by a [`TransformerFactory`] carries
/// state that must not be shared across stage invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statefulness {
    /// The instance holds per-invocation state; a stage must build a new
    /// one every time it runs rather than reuse a cached instance.
    Fresh,
    /// The instance is stateless (or its state is safe to share); a stage
    /// may build it once and reuse it across every invocation.
    Shared,
}

/// Builds a [`Transformer`] from the pipeline's [`Config`], reporting
/// whether the resulting instance may be cached and reused.
pub trait TransformerFactory: Send + Sync {
    /// Builds one transformer instance.
    fn build(&self, config: &Config) -> (Arc<dyn Transformer>, Statefulness);
}

struct FnFactory<F> {
    build: F,
}

impl<F> TransformerFactory for FnFactory<F>
where
    F: Fn(&Config) -> (Arc<dyn Transformer>, Statefulness) + Send + Sync,
{
    fn build(&self, config: &Config) -> (Arc<dyn Transformer>, Statefulness) {
        (self.build)(config)
    }
}

/// Wraps a plain closure as a [`TransformerFactory`], for callers who don't
/// want to name a type.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use namestream::{transformer_factory, Statefulness, Transformer, TransformOutcome, PipelineContext, MessagePacket, TransformerError};
/// use async_trait::async_trait;
///
/// struct Upper;
///
/// #[async_trait]
/// impl Transformer for Upper {
///     async fn transform(&self, _ctx: &PipelineContext, mut packet: MessagePacket) -> Result<TransformOutcome, TransformerError> {
///         packet.set_and_increment(packet.message.to_uppercase());
///         Ok(TransformOutcome::Produced(packet))
///     }
/// }
///
/// let factory = transformer_factory(|_cfg| (Arc::new(Upper) as Arc<dyn Transformer>, Statefulness::Shared));
/// ```
pub fn transformer_factory<F>(build: F) -> Arc<dyn TransformerFactory>
where
    F: Fn(&Config) -> (Arc<dyn Transformer>, Statefulness) + Send + Sync + 'static,
{
    Arc::new(FnFactory { build })
}

/// Wraps an already-built, stateless transformer as a factory that always
/// returns the same shared instance.
pub fn shared_transformer<T: Transformer + 'static>(transformer: T) -> Arc<dyn TransformerFactory> {
    let instance: Arc<dyn Transformer> = Arc::new(transformer);
    transformer_factory(move |_cfg| (Arc::clone(&instance), Statefulness::Shared))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::source::NoopSource;

    struct Echo;

    #[async_trait]
    impl Transformer for Echo {
        async fn transform(
            &self,
            _ctx: &PipelineContext,
            packet: MessagePacket,
        ) -> Result<TransformOutcome, TransformerError> {
            Ok(TransformOutcome::Produced(packet))
        }
    }

    fn test_config() -> Config {
        ConfigBuilder::new(Arc::new(NoopSource)).build().unwrap()
    }

    #[tokio::test]
    async fn shared_factory_returns_same_instance_pointer() {
        let factory = shared_transformer(Echo);
        let config = test_config();
        let (a, stateful_a) = factory.build(&config);
        let (b, stateful_b) = factory.build(&config);
        assert_eq!(stateful_a, Statefulness::Shared);
        assert_eq!(stateful_b, Statefulness::Shared);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn closure_factory_builds_a_working_transformer() {
        let factory = transformer_factory(|_cfg| (Arc::new(Echo) as Arc<dyn Transformer>, Statefulness::Fresh));
        let config = test_config();
        let (transformer, statefulness) = factory.build(&config);
        assert_eq!(statefulness, Statefulness::Fresh);
        let ctx = PipelineContext::root();
        let out = transformer
            .transform(&ctx, MessagePacket::new("x"))
            .await
            .unwrap();
        assert_eq!(out, TransformOutcome::Produced(MessagePacket::new("x")));
    }
}
