//! Configuration management for the aggregation engine

use crate::error::AggregationError;
use crate::graph::DEFAULT_BANDS;
use serde::Deserialize;

/// Louvain knobs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LouvainConfig {
    /// Scales the edge-weight term of the modularity gain
    pub resolution: f64,

    /// Seed for the node visiting order
    pub seed: u64,

    /// Upper bound on local-moving sweeps per level
    pub max_sweeps: usize,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            seed: 1,
            max_sweeps: 1000,
        }
    }
}

/// Markov clustering knobs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarkovConfig {
    /// Residual energy below which the iteration stops
    pub convergence_threshold: f64,

    /// Element-wise exponent applied during inflation
    pub inflation: f64,

    /// Weight of the self loop added to every node
    pub loop_gain: f64,

    /// Entries below this value are pruned to zero after inflation
    pub zero_threshold: f64,

    /// Upper bound on expand/inflate iterations
    pub max_iterations: usize,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            convergence_threshold: 0.001,
            inflation: 2.0,
            loop_gain: 1.0,
            zero_threshold: 0.001,
            max_iterations: 100,
        }
    }
}

/// KSnap knobs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KSnapConfig {
    /// Number of split iterations
    pub resolution: usize,
}

impl Default for KSnapConfig {
    fn default() -> Self {
        Self { resolution: 10 }
    }
}

/// Modularity-matching knobs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Size of the scoring worker pool
    pub workers: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { workers: 10 }
    }
}

/// Cluster converter knobs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Use fresh random ids for aggregate nodes instead of joined member ids
    pub anonymize_ids: bool,

    /// Band count for new per-type weight ranges
    pub bands: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            anonymize_ids: false,
            bands: DEFAULT_BANDS,
        }
    }
}

/// Default configuration for the aggregation engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub louvain: LouvainConfig,
    pub markov: MarkovConfig,
    pub ksnap: KSnapConfig,
    pub matching: MatchingConfig,
    pub converter: ConverterConfig,

    /// Cluster each connected component on its own
    pub split_components: bool,
}

impl AggregationConfig {
    /// Create a new configuration with custom values
    pub fn new(
        louvain: LouvainConfig,
        markov: MarkovConfig,
        ksnap: KSnapConfig,
        matching: MatchingConfig,
        converter: ConverterConfig,
        split_components: bool,
    ) -> Self {
        Self {
            louvain,
            markov,
            ksnap,
            matching,
            converter,
            split_components,
        }
    }

    /// Check every knob is in range
    pub fn validate(&self) -> Result<(), AggregationError> {
        let resolution = self.louvain.resolution;
        if !resolution.is_finite() || resolution < 0.0 {
            return Err(AggregationError::invalid(
                "louvain.resolution",
                format!("must be a finite non-negative number, got {}", resolution),
            ));
        }
        if self.louvain.max_sweeps == 0 {
            return Err(AggregationError::invalid("louvain.max_sweeps", "must be at least 1"));
        }

        let markov = &self.markov;
        if !(markov.inflation.is_finite() && markov.inflation > 1.0) {
            return Err(AggregationError::invalid(
                "markov.inflation",
                format!("must be greater than 1, got {}", markov.inflation),
            ));
        }
        for (name, value) in [
            ("markov.convergence_threshold", markov.convergence_threshold),
            ("markov.zero_threshold", markov.zero_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AggregationError::invalid(
                    name,
                    format!("must be positive, got {}", value),
                ));
            }
        }
        if !(markov.loop_gain.is_finite() && markov.loop_gain >= 0.0) {
            return Err(AggregationError::invalid(
                "markov.loop_gain",
                format!("must be non-negative, got {}", markov.loop_gain),
            ));
        }
        if markov.max_iterations == 0 {
            return Err(AggregationError::invalid("markov.max_iterations", "must be at least 1"));
        }

        if self.matching.workers == 0 {
            return Err(AggregationError::invalid("matching.workers", "must be at least 1"));
        }
        if self.converter.bands == 0 {
            return Err(AggregationError::invalid("converter.bands", "must be at least 1"));
        }

        Ok(())
    }
}
