//! Graph aggregation engine.
//!
//! Partitions a node-link graph with one of several community-detection algorithms
//! (Louvain, Markov clustering, KSnap, parallel modularity matching) and converts the
//! partition into a summary graph of aggregate nodes and links.

pub mod config;
pub mod error;
pub mod data;
pub mod graph;
pub mod cluster;
pub mod summary;

pub use anyhow::{Result, anyhow};
pub use cluster::{AggregationJob, Cluster, ClusterAlgorithm, JobHandle, JobStatus, RunOutcome};
pub use config::AggregationConfig;
pub use error::AggregationError;
pub use graph::{Graph, GraphBuilder, Link, Node, NodeData};
pub use summary::{AggregationResult, ClusterConverter};
