//! `Generator` (C5, public half): the crate's single public entry point.
//! Drives one end-to-end
//! generation, applying the collection-level policies (`max_values`,
//! `prevent_default`, `prevent_duplicates`, the uniqueness oracle) that no
//! individual stage is aware of.

// Layer 1: Standard library
use std::collections::HashSet;
use std::sync::Arc;

// Layer 2: Third-party
use tracing::{debug, warn};

// Layer 3: Internal
use crate::config::Config;
use crate::context::PipelineContext;
use crate::error::{GeneratorError, PipelineError};
use crate::pipeline;
use crate::source::Source as _;
use crate::stage::Stage;
use crate::transformer::TransformerFactory;

/// Drives a configured pipeline end to end, turning one input string into a
/// bounded multiset of candidate names.
///
/// # Examples
///
/// ```rust
/// # tokio_test::block_on(async {
/// use std::sync::Arc;
/// use namestream::{Config, Generator, NoopSource, PipelineContext, shared_transformer, Transformer, TransformOutcome, TransformerError, MessagePacket};
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
/// let config = Config::builder(Arc::new(NoopSource)).with_max_values(1).build().unwrap();
/// let generator = Generator::new(config).with_transformers("case", vec![shared_transformer(Upper)]);
/// let names = generator.generate(PipelineContext::root(), "gopher").await.unwrap();
/// assert_eq!(names, vec!["GOPHER".to_string()]);
/// # });
/// ```
pub struct Generator {
    config: Config,
    stages: Vec<Stage>,
}

impl Generator {
    /// Starts a generator with no stages; callers add stages with
    /// [`Self::with_transformers`] / [`Self::with_uniform_transformers`] /
    /// [`Self::with_stages`] before calling [`Self::generate`].
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stages: Vec::new(),
        }
    }

    /// Appends a *Free* stage built from `factories`.
    pub fn with_transformers(
        mut self,
        stage_id: impl Into<Arc<str>>,
        factories: Vec<Arc<dyn TransformerFactory>>,
    ) -> Self {
        self.stages.push(Stage::new_free(stage_id, factories));
        self
    }

    /// Appends a *Uniform* stage built from `factories`.
    pub fn with_uniform_transformers(
        mut self,
        stage_id: impl Into<Arc<str>>,
        factories: Vec<Arc<dyn TransformerFactory>>,
    ) -> Self {
        self.stages.push(Stage::new_uniform(stage_id, factories));
        self
    }

    /// Appends already-built stages, for callers who need finer control
    /// than the `with_*_transformers` helpers provide.
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// This generator's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Per-stage observability counters, keyed by stage id, for callers that
    /// want to wire them into their own exporter.
    pub fn stage_metrics(&self) -> impl Iterator<Item = (&str, &Arc<crate::metrics::StageMetrics>)> {
        self.stages.iter().map(|stage| (stage.id(), stage.metrics()))
    }

    /// Runs `input` through the configured pipeline and collects candidate
    /// names, applying `max_values`, `prevent_default`, `prevent_duplicates`
    /// and the uniqueness oracle along the way.
    pub async fn generate(
        &self,
        ctx: PipelineContext,
        input: &str,
    ) -> Result<Vec<String>, GeneratorError> {
        if input.len() > self.config.max_bytes {
            return Err(GeneratorError::InputTooLarge {
                max: self.config.max_bytes,
                actual: input.len(),
            });
        }

        let (mut results, cleanup) = pipeline::run(&self.stages, &ctx, &self.config, input.to_string());

        let mut collected = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stopped_by_max = false;

        while let Some(packet) = results.recv().await {
            if self.config.prevent_default && packet.message == input {
                continue;
            }
            if self.config.prevent_duplicates && !seen.insert(packet.message.clone()) {
                continue;
            }

            match self.config.source.valid(&ctx, &packet.message).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(error = %err, "uniqueness oracle failed");
                    drop(results);
                    let _ = cleanup.run().await;
                    return Err(GeneratorError::Pipeline(PipelineError::Source(err)));
                }
            }

            collected.push(packet.message);

            if collected.len() >= self.config.max_values {
                stopped_by_max = true;
                break;
            }
        }

        drop(results);
        let cleanup_result = cleanup.run().await;

        match cleanup_result {
            Ok(()) => {}
            Err(err) if stopped_by_max && err.is_benign_stop() => {
                debug!("pipeline stopped early by max_values, ignoring benign cancellation");
            }
            Err(err) if err.is_benign_stop() => {}
            Err(err) => return Err(GeneratorError::Pipeline(err)),
        }

        Ok(collected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::{NoopSource, Source};
    use crate::transformer::{shared_transformer, TransformOutcome, Transformer};
    use crate::error::{SourceError, TransformerError};
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl Transformer for Upper {
        async fn transform(
            &self,
            _ctx: &PipelineContext,
            mut packet: crate::packet::MessagePacket,
        ) -> Result<TransformOutcome, TransformerError> {
            packet.set_and_increment(packet.message.to_uppercase());
            Ok(TransformOutcome::Produced(packet))
        }
    }

    struct RejectEverything;

    #[async_trait]
    impl Source for RejectEverything {
        async fn valid(&self, _ctx: &PipelineContext, _candidate: &str) -> Result<bool, SourceError> {
            Ok(false)
        }
    }

    fn base_config() -> Config {
        Config::builder(Arc::new(NoopSource)).build().unwrap()
    }

    #[tokio::test]
    async fn generate_runs_configured_stage_and_returns_result() {
        let config = base_config();
        let generator = Generator::new(config).with_transformers("case", vec![shared_transformer(Upper)]);
        let names = generator.generate(PipelineContext::root(), "abc").await.unwrap();
        assert_eq!(names, vec!["ABC".to_string()]);
    }

    #[tokio::test]
    async fn generate_rejects_input_over_max_bytes() {
        let config = Config::builder(Arc::new(NoopSource)).with_max_bytes(2).build().unwrap();
        let generator = Generator::new(config);
        let err = generator.generate(PipelineContext::root(), "abc").await.unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn generate_honors_source_rejection() {
        let config = Config::builder(Arc::new(RejectEverything)).build().unwrap();
        let generator = Generator::new(config).with_transformers("case", vec![shared_transformer(Upper)]);
        let names = generator.generate(PipelineContext::root(), "abc").await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn generate_stops_at_max_values() {
        let config = Config::builder(Arc::new(NoopSource)).with_max_values(1).build().unwrap();
        let generator = Generator::new(config).with_uniform_transformers(
            "case",
            vec![shared_transformer(Upper), shared_transformer(Upper)],
        );
        let names = generator.generate(PipelineContext::root(), "abc").await.unwrap();
        assert_eq!(names.len(), 1);
    }
}
