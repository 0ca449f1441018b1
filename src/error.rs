//! Error types for aggregation jobs

use thiserror::Error;

/// Errors raised while configuring or starting an aggregation job.
///
/// Graph content never produces an error: dangling links are skipped.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// `run` was called before `set_graph`
    #[error("no graph has been set on the aggregator")]
    NoGraph,

    /// The job is already running or has already run
    #[error("aggregation job has already been started")]
    AlreadyStarted,

    /// A configuration value is out of range
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    /// The scoring worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AggregationError {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        AggregationError::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
