//! Conversion of a cluster set into a summary graph

use crate::cluster::Cluster;
use crate::config::ConverterConfig;
use crate::graph::{
    AggregateLink, AggregateNode, Graph, Link, Node, NodeData, QuantizedRange, SummaryLink,
    WeightRanges, DEFAULT_BANDS,
};
use crate::summary::AggregationResult;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Turns a partition of a graph into a summary graph of aggregate nodes and links.
///
/// Within each cluster only nodes of the same type are merged. The converter holds no
/// per-call state and can convert any number of partitions of the same graph.
#[derive(Debug, Clone)]
pub struct ClusterConverter {
    graph: Arc<Graph>,
    ranges: WeightRanges,
    anonymize_ids: bool,
    bands: usize,
}

/// Links folded onto one pair of summary endpoints
struct LinkBucket<'a> {
    aggregate: AggregateLink,
    first: &'a Link,
}

impl ClusterConverter {
    pub fn new(graph: Arc<Graph>, ranges: WeightRanges) -> Self {
        Self {
            graph,
            ranges,
            anonymize_ids: false,
            bands: DEFAULT_BANDS,
        }
    }

    pub fn from_config(graph: Arc<Graph>, ranges: WeightRanges, config: &ConverterConfig) -> Self {
        Self::new(graph, ranges)
            .with_anonymize_ids(config.anonymize_ids)
            .with_bands(config.bands)
    }

    /// Give aggregate nodes fresh random ids instead of their joined member ids
    pub fn with_anonymize_ids(mut self, anonymize_ids: bool) -> Self {
        self.anonymize_ids = anonymize_ids;
        self
    }

    /// Band count for types that have no weight range yet
    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = bands.max(1);
        self
    }

    pub fn weight_ranges(&self) -> &WeightRanges {
        &self.ranges
    }

    /// Build the summary graph for `clusters`.
    ///
    /// # Panics
    ///
    /// If a cluster names a node id that is not in the converter's graph.
    pub fn convert_cluster_set(&self, clusters: &[Cluster]) -> AggregationResult {
        let resolved: Vec<Vec<&Node>> = clusters
            .iter()
            .map(|cluster| cluster.members.iter().map(|id| self.lookup(cluster, id)).collect())
            .collect();

        let mut ranges = self.ranges.clone();
        for node in resolved.iter().flatten() {
            let range = self.range_for(&mut ranges, node.node_type());
            for weight in leaf_weights(node) {
                range.expand(weight);
            }
        }

        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
        let mut id_map: HashMap<&str, String> = HashMap::new();

        for members in &resolved {
            let by_type = members
                .iter()
                .copied()
                .into_group_map_by(|&node| node.node_type())
                .into_iter()
                .sorted_by(|a, b| a.0.cmp(b.0));

            for (node_type, same_type) in by_type {
                if same_type.len() == 1 {
                    let single: &Node = same_type[0];
                    id_map.insert(single.id(), single.id().to_string());
                    nodes.insert(single.id().to_string(), single.clone());
                    continue;
                }

                let mut aggregate = self.aggregate(&same_type, &ranges[node_type]);
                let taken = self.graph.index_of(&aggregate.data.id).is_some()
                    || nodes.contains_key(&aggregate.data.id);
                if taken {
                    let fresh = Uuid::new_v4().to_string();
                    log::warn!(
                        "Aggregate id '{}' is already taken by another node, using '{}'",
                        aggregate.data.id,
                        fresh
                    );
                    aggregate.data.id = fresh;
                }
                let id = aggregate.data.id.clone();
                for &member in &same_type {
                    id_map.insert(member.id(), id.clone());
                }
                nodes.insert(id, Node::Aggregate(aggregate));
            }
        }

        for node in nodes.values() {
            self.range_for(&mut ranges, node.node_type()).expand(node.weight());
        }
        let max_members = nodes.values().map(Node::num_members).max().unwrap_or(0);

        let links = self.remap_links(&id_map);

        log::info!(
            "Converted {} clusters into {} nodes and {} links",
            clusters.len(),
            nodes.len(),
            links.len()
        );

        AggregationResult {
            nodes,
            links,
            weight_ranges: ranges,
            max_members,
        }
    }

    fn lookup(&self, cluster: &Cluster, id: &str) -> &Node {
        match self.graph.node_by_id(id) {
            Some(node) => node,
            None => panic!("cluster {} names node '{}' which is not in the graph", cluster.id, id),
        }
    }

    fn range_for<'r>(&self, ranges: &'r mut WeightRanges, node_type: &str) -> &'r mut QuantizedRange {
        ranges
            .entry(node_type.to_string())
            .or_insert_with(|| QuantizedRange::new(self.bands))
    }

    /// Merge same-typed nodes into one aggregate, unwrapping nested aggregates
    fn aggregate(&self, members: &[&Node], range: &QuantizedRange) -> AggregateNode {
        let mut member_ids = BTreeSet::new();
        let mut member_weights = BTreeMap::new();
        let mut member_labels = BTreeMap::new();
        let mut num_members = 0u32;
        let mut top = members[0].top_member();

        for member in members {
            member_ids.extend(member.member_ids());
            member.collect_members(&mut member_weights, &mut member_labels);
            num_members += member.num_members();

            let leaf = member.top_member();
            if leaf.weight > top.weight {
                top = leaf;
            }
        }

        let id = if self.anonymize_ids {
            Uuid::new_v4().to_string()
        } else {
            member_ids.iter().join(",")
        };

        let mut top_member = top.clone();
        top_member.links.clear();

        AggregateNode {
            data: NodeData {
                id,
                node_type: members[0].node_type().to_string(),
                label: format!("{} +{}", top.label, num_members.saturating_sub(1)),
                weight: member_weights.values().sum(),
                num_members,
                links: Vec::new(),
            },
            distribution: range.histogram(member_weights.values().copied()),
            member_ids,
            member_weights,
            member_labels,
            top_member,
        }
    }

    /// Re-point every link at the summary node ids and fold links landing on the same
    /// ordered endpoint pair together
    fn remap_links(&self, id_map: &HashMap<&str, String>) -> BTreeMap<String, SummaryLink> {
        let mut buckets: BTreeMap<String, LinkBucket<'_>> = BTreeMap::new();
        let mut dropped = 0usize;

        for link in self.graph.links() {
            let (Some(source), Some(target)) = (
                id_map.get(link.source.as_str()),
                id_map.get(link.target.as_str()),
            ) else {
                dropped += 1;
                continue;
            };
            if source == target {
                continue;
            }

            let key = format!("{}_{}", source, target);
            buckets
                .entry(key.clone())
                .or_insert_with(|| LinkBucket {
                    aggregate: AggregateLink::new(key, source.clone(), target.clone()),
                    first: link,
                })
                .aggregate
                .absorb(link);
        }

        if dropped > 0 {
            log::debug!("Dropped {} links with an unmapped endpoint", dropped);
        }

        buckets
            .into_values()
            .map(|bucket| {
                let untouched = bucket.aggregate.member_links.len() == 1
                    && bucket.first.source == bucket.aggregate.source
                    && bucket.first.target == bucket.aggregate.target;
                if untouched {
                    (bucket.first.id.clone(), SummaryLink::Original(bucket.first.clone()))
                } else {
                    (bucket.aggregate.id.clone(), SummaryLink::Aggregate(bucket.aggregate))
                }
            })
            .collect()
    }
}

/// Weights of the leaves a node stands for
fn leaf_weights(node: &Node) -> Vec<f64> {
    match node {
        Node::Plain(data) => vec![data.weight],
        Node::Aggregate(aggregate) => aggregate.member_weights.values().copied().collect(),
    }
}
