//! Runs a two-stage pipeline: a *Free* stage that fans each candidate
//! through two independent affix transformers, then a *Uniform* stage that
//! normalizes case in lock-step across both lineages before printing.

use std::sync::Arc;

use async_trait::async_trait;
use namestream::{
    shared_transformer, Config, Generator, MessagePacket, NoopSource, PipelineContext, Source,
    TransformOutcome, Transformer, TransformerError,
};

struct AdjectivePrefix {
    adjectives: Vec<String>,
}

#[async_trait]
impl Transformer for AdjectivePrefix {
    async fn transform(
        &self,
        ctx: &PipelineContext,
        mut packet: MessagePacket,
    ) -> Result<TransformOutcome, TransformerError> {
        let adjective = ctx
            .hint_number()
            .and_then(|n| self.adjectives.get(n as usize % self.adjectives.len().max(1)))
            .cloned()
            .unwrap_or_else(|| "quiet".to_string());
        let message = format!("{adjective}-{}", packet.message);
        packet.set_and_increment(message);
        Ok(TransformOutcome::Produced(packet))
    }
}

struct NumericSuffix;

#[async_trait]
impl Transformer for NumericSuffix {
    async fn transform(
        &self,
        _ctx: &PipelineContext,
        mut packet: MessagePacket,
    ) -> Result<TransformOutcome, TransformerError> {
        let message = format!("{}-7", packet.message);
        packet.set_and_increment(message);
        Ok(TransformOutcome::Produced(packet))
    }
}

struct LowercaseNormalize;

#[async_trait]
impl Transformer for LowercaseNormalize {
    async fn transform(
        &self,
        _ctx: &PipelineContext,
        mut packet: MessagePacket,
    ) -> Result<TransformOutcome, TransformerError> {
        let message = packet.message.to_lowercase();
        packet.set_and_increment(message);
        Ok(TransformOutcome::Produced(packet))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let adjectives = vec!["brave".to_string(), "quiet".to_string(), "amber".to_string()];

    let config = Config::builder(Arc::new(NoopSource) as Arc<dyn Source>)
        .with_max_values(6)
        .with_adjectives(adjectives.clone())
        .build()?;

    let generator = Generator::new(config)
        .with_transformers(
            "affix",
            vec![
                shared_transformer(AdjectivePrefix { adjectives }),
                shared_transformer(NumericSuffix),
            ],
        )
        .with_uniform_transformers("case", vec![shared_transformer(LowercaseNormalize)]);

    let names = generator.generate(PipelineContext::root(), "gopher").await?;

    for name in names {
        println!("{name}");
    }

    Ok(())
}
