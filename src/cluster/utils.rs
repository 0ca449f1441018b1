//! Pre- and post-processing helpers shared by the aggregators

use crate::cluster::disjoint::DisjointSets;
use crate::graph::{Graph, GraphBuilder, QuantizedRange, WeightRanges};
use std::collections::HashSet;

/// Distinct neighbor indices of `node`, found through its incident links.
///
/// Incident link ids that do not resolve, or whose far end is missing, are skipped.
pub fn neighbors(graph: &Graph, node: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for id in &graph.node(node).data().links {
        let Some((source, target)) = graph.link_by_id(id).and_then(|link| graph.endpoints(link)) else {
            continue;
        };
        let other = if source == node { target } else { source };
        if other != node && seen.insert(other) {
            result.push(other);
        }
    }
    result
}

/// Symmetric neighbor lists for every node. Dangling and self links are skipped;
/// parallel links collapse to one entry.
pub fn adjacency(graph: &Graph) -> Vec<Vec<usize>> {
    adjacency_until(graph, || false).unwrap_or_default()
}

/// Like [`adjacency`], polling `should_stop` every few thousand links and giving up with
/// `None` once it returns true
pub fn adjacency_until<F: Fn() -> bool>(graph: &Graph, should_stop: F) -> Option<Vec<Vec<usize>>> {
    const POLL_EVERY: usize = 4096;

    let mut lists: Vec<Vec<usize>> = vec![Vec::new(); graph.node_count()];
    let mut seen: HashSet<(usize, usize)> = HashSet::new();

    for (position, (source, target, _)) in graph.resolved_links().enumerate() {
        if position % POLL_EVERY == 0 && should_stop() {
            return None;
        }
        if source == target {
            continue;
        }
        let key = (source.min(target), source.max(target));
        if seen.insert(key) {
            lists[source].push(target);
            lists[target].push(source);
        }
    }
    Some(lists)
}

/// Node indices grouped by connected component, ordered by smallest member
pub fn connected_components(graph: &Graph) -> Vec<Vec<usize>> {
    let mut sets = DisjointSets::new(graph.node_count());
    for (source, target, _) in graph.resolved_links() {
        sets.union(source, target);
    }
    sets.groups()
}

/// One subgraph per connected component, keeping the links whose endpoints both fall inside it
pub fn split_components(graph: &Graph) -> Vec<Graph> {
    let components = connected_components(graph);

    let mut component_of = vec![0; graph.node_count()];
    for (component, members) in components.iter().enumerate() {
        for &node in members {
            component_of[node] = component;
        }
    }

    let mut builders: Vec<GraphBuilder> = components
        .iter()
        .map(|members| {
            let mut builder = GraphBuilder::with_capacity(members.len());
            for &node in members {
                let mut node = graph.node(node).clone();
                // incident lists are rebuilt from the kept links
                node.data_mut().links.clear();
                builder.add_node(node);
            }
            builder
        })
        .collect();

    for link in graph.links() {
        if let Some((source, _)) = graph.endpoints(link) {
            builders[component_of[source]].add_link(link.clone());
        }
    }

    log::debug!("Split graph into {} connected components", builders.len());
    builders.into_iter().map(GraphBuilder::build).collect()
}

/// Per-type weight ranges spanning every node weight in the graph
pub fn compute_weight_ranges(graph: &Graph, bands: usize) -> WeightRanges {
    let mut ranges = WeightRanges::new();
    for node in graph.nodes() {
        ranges
            .entry(node.node_type().to_string())
            .or_insert_with(|| QuantizedRange::new(bands))
            .expand(node.weight());
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Link, NodeData};

    fn sample() -> Graph {
        let mut builder = GraphBuilder::default();
        builder
            .node("a", "x", 1.0)
            .node("b", "x", 4.0)
            .node("c", "y", 2.0)
            .node("d", "y", 3.0)
            .node("e", "x", 0.5);
        builder.link("a", "b").link("b", "a").link("c", "d").link("d", "d");
        builder.add_link(Link::new("dangling", "e", "missing"));
        builder.build()
    }

    #[test]
    fn test_neighbors_dedupes_and_skips_dangling() {
        let graph = sample();
        assert_eq!(neighbors(&graph, 0), vec![1]);
        assert_eq!(neighbors(&graph, 3), vec![2]);
        assert!(neighbors(&graph, 4).is_empty());
    }

    #[test]
    fn test_neighbors_ignore_unknown_incident_ids() {
        let mut builder = GraphBuilder::default();
        builder.add_node(NodeData {
            links: vec!["nowhere".to_string()],
            ..NodeData::new("a", "t")
        });
        builder.node("b", "t", 1.0).node("c", "t", 1.0);
        builder.link("a", "b").link("c", "a");
        let graph = builder.build();

        assert_eq!(neighbors(&graph, 0), vec![1, 2]);
        assert_eq!(neighbors(&graph, 2), vec![0]);
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let graph = sample();
        let lists = adjacency(&graph);
        assert_eq!(lists[0], vec![1]);
        assert_eq!(lists[1], vec![0]);
        assert_eq!(lists[3], vec![2]);
        assert!(lists[4].is_empty());
    }

    #[test]
    fn test_split_components() {
        let graph = sample();
        let parts = split_components(&graph);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].node_count(), 2);
        assert_eq!(parts[0].link_count(), 2);
        assert_eq!(parts[1].node_count(), 2);
        // the self link stays with its component
        assert_eq!(parts[1].link_count(), 2);
        assert_eq!(parts[2].node_count(), 1);
        // the dangling link has no resolvable component
        assert_eq!(parts[2].link_count(), 0);
    }

    #[test]
    fn test_weight_ranges_per_type() {
        let graph = sample();
        let ranges = compute_weight_ranges(&graph, 4);

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges["x"].min(), Some(0.5));
        assert_eq!(ranges["x"].max(), Some(4.0));
        assert_eq!(ranges["y"].min(), Some(2.0));
        assert_eq!(ranges["y"].bands(), 4);
    }
}
