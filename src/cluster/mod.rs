//! Cluster analysis module: the aggregation job and the partitioning algorithms

pub mod disjoint;
pub mod job;
pub mod utils;
pub mod louvain;
pub mod markov;
pub mod ksnap;
pub mod matching;

pub use job::{AggregationJob, JobHandle, JobState, JobStatus, RunContext, RunOutcome};
pub use louvain::Louvain;
pub use markov::Markov;
pub use ksnap::KSnap;
pub use matching::ModularityMatching;

use crate::graph::Graph;
use serde::{Serialize, Deserialize};

/// A group of nodes found by an aggregator.
///
/// The clusters of one run cover every input node exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Position of this cluster in the partition
    pub id: u32,

    /// Member node ids
    pub members: Vec<String>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// A partitioning algorithm driven by an [`AggregationJob`]
pub trait ClusterAlgorithm {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Partition the graph's nodes into groups of node indices.
    ///
    /// Returns `None` when cancellation was observed at a checkpoint.
    fn find_clusters(&self, graph: &Graph, context: &RunContext<'_>) -> Option<Vec<Vec<usize>>>;
}

pub type LouvainAggregator = AggregationJob<Louvain>;
pub type MarkovAggregator = AggregationJob<Markov>;
pub type KSnapAggregator = AggregationJob<KSnap>;
pub type ModularityMatchingAggregator = AggregationJob<ModularityMatching>;
