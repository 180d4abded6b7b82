//! Immutable pipeline configuration and its builder.

// Layer 1: Standard library
use std::sync::Arc;

// Layer 2: Third-party
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;

// Layer 3: Internal
use crate::source::Source;

/// Default inter-stage channel capacity (a backpressure knob, not part of
/// the core algorithm's semantics).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Default maximum input length, in bytes.
pub const DEFAULT_MAX_BYTES: usize = 256;

/// Default maximum number of candidate names returned by `generate`.
pub const DEFAULT_MAX_VALUES: usize = 10;

/// Immutable, shareable configuration for a [`Generator`](crate::Generator).
///
/// Built exclusively through [`ConfigBuilder`]; everything here is
/// read-only from the pipeline's perspective and safe to share across
/// concurrently-running stages.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use namestream::{Config, NoopSource};
///
/// let config = Config::builder(Arc::new(NoopSource))
///     .with_max_values(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_values, 5);
/// ```
pub struct Config {
    /// Inputs longer than this (in bytes) are rejected before the pipeline
    /// starts.
    pub max_bytes: usize,
    /// `generate` stops once it has collected this many candidates.
    pub max_values: usize,
    /// If set, no candidate equal to the original input is returned.
    pub prevent_default: bool,
    /// If set, no candidate is returned more than once.
    pub prevent_duplicates: bool,
    /// Capacity of the bounded channel connecting consecutive stages.
    pub channel_capacity: usize,
    /// The external uniqueness/validity oracle.
    pub source: Arc<dyn Source>,
    /// Separator strings used by the tokenizer helper.
    pub split_on: Vec<String>,
    /// Adjective corpus available to collaborator transformers.
    pub adjectives: Vec<String>,
    /// Shared RNG available to collaborator transformers.
    pub rng: Arc<Mutex<SmallRng>>,
}

impl Config {
    /// Starts building a [`Config`]. `source` is the only field without a
    /// sensible default.
    pub fn builder(source: Arc<dyn Source>) -> ConfigBuilder {
        ConfigBuilder::new(source)
    }
}

/// Error returned by [`ConfigBuilder::build`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `max_bytes` was zero.
    #[error("max_bytes must be > 0")]
    ZeroMaxBytes,
    /// `max_values` was zero.
    #[error("max_values must be > 0")]
    ZeroMaxValues,
    /// `channel_capacity` was zero.
    #[error("channel_capacity must be > 0")]
    ZeroChannelCapacity,
}

/// Fluent builder for [`Config`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use namestream::{ConfigBuilder, NoopSource};
///
/// let config = ConfigBuilder::new(Arc::new(NoopSource))
///     .with_max_bytes(64)
///     .with_prevent_default(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_bytes, 64);
/// assert!(config.prevent_default);
/// ```
pub struct ConfigBuilder {
    max_bytes: usize,
    max_values: usize,
    prevent_default: bool,
    prevent_duplicates: bool,
    channel_capacity: usize,
    source: Arc<dyn Source>,
    split_on: Vec<String>,
    adjectives: Vec<String>,
}

impl ConfigBuilder {
    /// Starts a new builder with documented defaults and the given
    /// uniqueness oracle.
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_values: DEFAULT_MAX_VALUES,
            prevent_default: false,
            prevent_duplicates: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            source,
            split_on: Vec::new(),
            adjectives: Vec::new(),
        }
    }

    /// Sets the maximum accepted input length, in bytes.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Sets how many candidates `generate` collects before stopping.
    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    /// Enables or disables suppression of the original input from results.
    pub fn with_prevent_default(mut self, prevent_default: bool) -> Self {
        self.prevent_default = prevent_default;
        self
    }

    /// Enables or disables duplicate suppression.
    pub fn with_prevent_duplicates(mut self, prevent_duplicates: bool) -> Self {
        self.prevent_duplicates = prevent_duplicates;
        self
    }

    /// Sets the bounded capacity of the channel connecting consecutive
    /// stages.
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Sets the tokenizer's separator strings.
    pub fn with_split_on(mut self, split_on: Vec<String>) -> Self {
        self.split_on = split_on;
        self
    }

    /// Sets the adjective corpus made available to collaborator
    /// transformers.
    pub fn with_adjectives(mut self, adjectives: Vec<String>) -> Self {
        self.adjectives = adjectives;
        self
    }

    /// Validates the accumulated settings and builds the immutable
    /// [`Config`].
    pub fn build(self) -> Result<Config, ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::ZeroMaxBytes);
        }
        if self.max_values == 0 {
            return Err(ConfigError::ZeroMaxValues);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }

        Ok(Config {
            max_bytes: self.max_bytes,
            max_values: self.max_values,
            prevent_default: self.prevent_default,
            prevent_duplicates: self.prevent_duplicates,
            channel_capacity: self.channel_capacity,
            source: self.source,
            split_on: self.split_on,
            adjectives: self.adjectives,
            rng: Arc::new(Mutex::new(SmallRng::from_entropy())),
        })
    }
}
