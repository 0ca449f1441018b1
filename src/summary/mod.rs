//! Summary graphs built from a partition

pub mod converter;

pub use converter::ClusterConverter;

use crate::graph::{Node, SummaryLink, WeightRanges};
use serde::Serialize;
use std::collections::BTreeMap;

/// Summary graph produced by converting a cluster set
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationResult {
    /// Aggregate or passed-through nodes by id
    pub nodes: BTreeMap<String, Node>,

    /// Aggregate or passed-through links by id
    pub links: BTreeMap<String, SummaryLink>,

    /// Per-type weight ranges, expanded to cover every node in this result
    pub weight_ranges: WeightRanges,

    /// Largest member count among the result nodes
    pub max_members: u32,
}

impl AggregationResult {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}
