//! Graph construction module

use crate::graph::{Graph, Link, Node, NodeData};
use std::collections::HashMap;

/// Builder for incrementally constructing a Graph
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Mapping from string IDs to node positions
    id_to_index: HashMap<String, usize>,

    /// Nodes in insertion order
    nodes: Vec<Node>,

    /// Links in insertion order, dangling ones included
    links: Vec<Link>,
}

impl GraphBuilder {
    /// Create a new graph builder with the given node capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id_to_index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            links: Vec::new(),
        }
    }

    /// Add a node. A node with an id already present replaces the earlier one in place.
    pub fn add_node(&mut self, node: impl Into<Node>) -> usize {
        let mut node = node.into();
        {
            let data = node.data_mut();
            if data.label.is_empty() {
                data.label = data.id.clone();
            }
            data.num_members = data.num_members.max(1);
        }

        if let Some(&idx) = self.id_to_index.get(node.id()) {
            // links already recorded on the earlier node stay incident
            let mut links = std::mem::take(&mut self.nodes[idx].data_mut().links);
            let data = node.data_mut();
            for id in data.links.drain(..) {
                if !links.contains(&id) {
                    links.push(id);
                }
            }
            data.links = links;
            self.nodes[idx] = node;
            return idx;
        }

        let idx = self.nodes.len();
        self.id_to_index.insert(node.id().to_string(), idx);
        self.nodes.push(node);
        idx
    }

    /// Add a link, recording it as incident on whichever endpoints exist.
    ///
    /// Links are kept even when an endpoint is missing; consumers skip them.
    pub fn add_link(&mut self, mut link: Link) {
        if link.id.is_empty() {
            link.id = format!("{}_{}", link.source, link.target);
        }

        if let Some(&src_idx) = self.id_to_index.get(&link.source) {
            self.nodes[src_idx].data_mut().links.push(link.id.clone());
        }
        if link.target != link.source {
            if let Some(&dst_idx) = self.id_to_index.get(&link.target) {
                self.nodes[dst_idx].data_mut().links.push(link.id.clone());
            }
        }

        self.links.push(link);
    }

    /// Convenience for `add_node(NodeData::new(id, node_type).with_weight(weight))`
    pub fn node(&mut self, id: &str, node_type: &str, weight: f64) -> &mut Self {
        self.add_node(NodeData::new(id, node_type).with_weight(weight));
        self
    }

    /// Convenience for adding a unit-weight link with a derived id
    pub fn link(&mut self, source: &str, target: &str) -> &mut Self {
        self.add_link(Link::new(format!("{}_{}", source, target), source, target));
        self
    }

    /// Build the graph
    pub fn build(self) -> Graph {
        Graph::from_parts(self.nodes, self.links)
    }
}
