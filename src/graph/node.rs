//! Plain and aggregate graph nodes

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};

fn default_weight() -> f64 {
    1.0
}

fn default_members() -> u32 {
    1
}

/// Fields shared by every node, plain or aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Unique identifier
    pub id: String,

    /// Type tag; only nodes of the same type may be merged
    #[serde(rename = "type", default)]
    pub node_type: String,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Relative importance
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Number of original entities represented (at least 1)
    #[serde(default = "default_members")]
    pub num_members: u32,

    /// Ids of the links incident to this node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

impl NodeData {
    /// Create a node with unit weight and a single member
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            node_type: node_type.into(),
            weight: 1.0,
            num_members: 1,
            links: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_members(mut self, num_members: u32) -> Self {
        self.num_members = num_members.max(1);
        self
    }
}

/// A node standing in for a merged group of same-typed nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateNode {
    #[serde(flatten)]
    pub data: NodeData,

    /// Ids of every leaf node folded into this aggregate
    pub member_ids: BTreeSet<String>,

    /// Leaf id to leaf weight
    pub member_weights: BTreeMap<String, f64>,

    /// Leaf id to leaf label
    pub member_labels: BTreeMap<String, String>,

    /// Highest-weight leaf among all members
    pub top_member: NodeData,

    /// Count of member weights per quantized band of the type's range
    pub distribution: Vec<u32>,
}

/// Closed node representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Plain(NodeData),
    Aggregate(AggregateNode),
}

impl Node {
    pub fn data(&self) -> &NodeData {
        match self {
            Node::Plain(data) => data,
            Node::Aggregate(aggregate) => &aggregate.data,
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut NodeData {
        match self {
            Node::Plain(data) => data,
            Node::Aggregate(aggregate) => &mut aggregate.data,
        }
    }

    pub fn id(&self) -> &str {
        &self.data().id
    }

    pub fn node_type(&self) -> &str {
        &self.data().node_type
    }

    pub fn weight(&self) -> f64 {
        self.data().weight
    }

    pub fn num_members(&self) -> u32 {
        self.data().num_members
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Node::Aggregate(_))
    }

    /// Leaf ids represented by this node
    pub fn member_ids(&self) -> BTreeSet<String> {
        match self {
            Node::Plain(data) => BTreeSet::from([data.id.clone()]),
            Node::Aggregate(aggregate) => aggregate.member_ids.clone(),
        }
    }

    /// The highest-weight leaf this node resolves to
    pub fn top_member(&self) -> &NodeData {
        match self {
            Node::Plain(data) => data,
            Node::Aggregate(aggregate) => &aggregate.top_member,
        }
    }

    /// Fold this node's per-leaf weights and labels into the given maps
    pub(crate) fn collect_members(
        &self,
        weights: &mut BTreeMap<String, f64>,
        labels: &mut BTreeMap<String, String>,
    ) {
        match self {
            Node::Plain(data) => {
                weights.insert(data.id.clone(), data.weight);
                labels.insert(data.id.clone(), data.label.clone());
            }
            Node::Aggregate(aggregate) => {
                weights.extend(aggregate.member_weights.iter().map(|(k, v)| (k.clone(), *v)));
                labels.extend(aggregate.member_labels.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
    }
}

impl From<NodeData> for Node {
    fn from(data: NodeData) -> Self {
        Node::Plain(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_node_resolves_to_itself() {
        let node = Node::from(NodeData::new("a", "person").with_weight(2.5));
        assert_eq!(node.top_member().id, "a");
        assert_eq!(node.member_ids().len(), 1);
        assert!(!node.is_aggregate());
    }

    #[test]
    fn test_node_json_defaults() {
        let data: NodeData = serde_json::from_str(r#"{"id": "x", "type": "t"}"#).unwrap();
        assert_eq!(data.weight, 1.0);
        assert_eq!(data.num_members, 1);
        assert!(data.links.is_empty());
    }
}
