//! namestream: a concurrent fan-out/fan-in pipeline that turns one input
//! string into a bounded multiset of candidate names.
//!
//! A [`Generator`] is built from a [`Config`] and one or more [`Stage`]s.
//! Each stage fans an incoming packet out to a set of [`Transformer`]
//! collaborators running in parallel, then reassembles their outputs in
//! the order the stage received the packet, before handing them to the
//! next stage. *Free* stages forward each transformer's output downstream
//! independently; *Uniform* stages hold every transformer's output for a
//! round until all of them have produced or advanced, then release the
//! round together.
//!
//! This crate supplies the pipeline machinery only. Concrete transformer
//! algorithms (case folding, affixes, permutations, …) and the uniqueness
//! [`Source`] oracle are collaborators the caller provides.
//!
//! # Quick Start
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::sync::Arc;
//! use namestream::{
//!     Config, Generator, NoopSource, PipelineContext, TransformOutcome, Transformer,
//!     TransformerError, MessagePacket, shared_transformer,
//! };
//! use async_trait::async_trait;
//!
//! struct Upper;
//!
//! #[async_trait]
//! impl Transformer for Upper {
//!     async fn transform(
//!         &self,
//!         _ctx: &PipelineContext,
//!         mut packet: MessagePacket,
//!     ) -> Result<TransformOutcome, TransformerError> {
//!         packet.set_and_increment(packet.message.to_uppercase());
//!         Ok(TransformOutcome::Produced(packet))
//!     }
//! }
//!
//! let config = Config::builder(Arc::new(NoopSource))
//!     .with_max_values(1)
//!     .build()
//!     .unwrap();
//!
//! let generator = Generator::new(config)
//!     .with_transformers("case", vec![shared_transformer(Upper)]);
//!
//! let names = generator.generate(PipelineContext::root(), "gopher").await.unwrap();
//! assert_eq!(names, vec!["GOPHER".to_string()]);
//! # });
//! ```

mod broadcaster;
mod config;
mod context;
mod error;
mod error_group;
mod generator;
pub mod helpers;
pub mod metrics;
mod packet;
mod pipeline;
mod source;
mod stage;
mod sync_out;
mod transformer;
mod wait_group;

pub use config::{Config, ConfigBuilder, ConfigError, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_BYTES, DEFAULT_MAX_VALUES};
pub use context::PipelineContext;
pub use error::{GeneratorError, PipelineError, SourceError, StageError, TransformerError};
pub use generator::Generator;
pub use packet::MessagePacket;
pub use source::{NoopSource, Source};
pub use stage::Stage;
pub use transformer::{
    shared_transformer, transformer_factory, Statefulness, TransformOutcome, Transformer,
    TransformerFactory,
};
