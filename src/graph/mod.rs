//! Node-link graph representation

pub mod node;
pub mod link;
pub mod range;
pub mod builder;

pub use node::{Node, NodeData, AggregateNode};
pub use link::{Link, AggregateLink, SummaryLink};
pub use range::{QuantizedRange, WeightRanges, DEFAULT_BANDS};
pub use builder::GraphBuilder;

use std::collections::HashMap;

/// Immutable node-link graph handed to the aggregators.
///
/// Nodes and links keep their insertion order; every algorithm works on node indices into
/// that order. Links may name endpoints that are not in the node set; those are skipped
/// wherever endpoints are resolved.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    links: Vec<Link>,
    id_to_index: HashMap<String, usize>,
    /// Link id to position; the first link carrying an id wins
    link_index: HashMap<String, usize>,
}

impl Graph {
    pub(crate) fn from_parts(nodes: Vec<Node>, links: Vec<Link>) -> Self {
        let id_to_index = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id().to_string(), index))
            .collect();

        let mut link_index = HashMap::with_capacity(links.len());
        for (index, link) in links.iter().enumerate() {
            link_index.entry(link.id.clone()).or_insert(index);
        }

        Self {
            nodes,
            links,
            id_to_index,
            link_index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    pub fn link_by_id(&self, id: &str) -> Option<&Link> {
        self.link_index.get(id).map(|&index| &self.links[index])
    }

    /// Resolve both endpoints of a link, or `None` if either is dangling
    pub fn endpoints(&self, link: &Link) -> Option<(usize, usize)> {
        Some((self.index_of(&link.source)?, self.index_of(&link.target)?))
    }

    /// Resolved links as `(source, target, weight)` index triples
    pub fn resolved_links(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.links.iter().filter_map(move |link| {
            self.endpoints(link).map(|(source, target)| (source, target, link.weight))
        })
    }
}
