//! Parallel greedy modularity matching.
//!
//! Every round scores all remaining links by the modularity gain of merging their two
//! endpoints, builds a maximal matching greedily from the best-scoring positive links and
//! merges every matched pair. Scoring runs on an owned worker pool; matching and merging
//! are sequential.
//!
//! Edge counts and volumes are normalized by the total number of links `m`, so the score
//! `e_ab − vol_a·vol_b / 2` is the usual modularity delta `2(e_ab/2 − a_a·a_b)`.

use crate::cluster::{ClusterAlgorithm, RunContext};
use crate::config::MatchingConfig;
use crate::error::AggregationError;
use crate::graph::Graph;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{HashMap, HashSet};

/// A merged group of nodes
#[derive(Debug, Clone, Default)]
struct SuperNode {
    members: Vec<usize>,
    /// Normalized incident link count
    volume: f64,
    /// Neighbor super-node to normalized link count
    neighbors: HashMap<usize, f64>,
}

/// Modularity-matching aggregator.
///
/// Owns its scoring worker pool; the pool's threads are joined when the aggregator is
/// dropped.
pub struct ModularityMatching {
    workers: usize,
    pool: ThreadPool,
}

impl ModularityMatching {
    pub fn new(workers: usize) -> Result<Self, AggregationError> {
        if workers == 0 {
            return Err(AggregationError::invalid("matching.workers", "must be at least 1"));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("matching-worker-{}", index))
            .build()?;

        Ok(Self { workers, pool })
    }

    pub fn from_config(config: &MatchingConfig) -> Result<Self, AggregationError> {
        Self::new(config.workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Score every link on the pool, one task per worker over an even split of the list
    fn score(&self, nodes: &[SuperNode], links: &[(usize, usize)]) -> Vec<f64> {
        let mut scores = vec![0.0; links.len()];
        if links.is_empty() {
            return scores;
        }
        let chunk = links.len().div_ceil(self.workers).max(1);

        self.pool.scope(|scope| {
            for (link_chunk, score_chunk) in links.chunks(chunk).zip(scores.chunks_mut(chunk)) {
                scope.spawn(move |_| {
                    for (&(a, b), slot) in link_chunk.iter().zip(score_chunk.iter_mut()) {
                        *slot = modularity_gain(&nodes[a], &nodes[b], b);
                    }
                });
            }
        });

        scores
    }
}

impl std::fmt::Debug for ModularityMatching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModularityMatching")
            .field("workers", &self.workers)
            .finish()
    }
}

impl ClusterAlgorithm for ModularityMatching {
    fn name(&self) -> &'static str {
        "modularity-matching"
    }

    fn find_clusters(&self, graph: &Graph, context: &RunContext<'_>) -> Option<Vec<Vec<usize>>> {
        let n = graph.node_count();
        let (mut nodes, mut links) = initial_state(graph);
        let mut alive = n;

        let mut round = 0;
        loop {
            if context.is_cancelled() {
                return None;
            }
            if links.len() < 2 {
                break;
            }

            let scores = self.score(&nodes, &links);
            let mut ranked: Vec<usize> = (0..links.len()).filter(|&i| scores[i] > 0.0).collect();
            if ranked.is_empty() {
                break;
            }
            // stable: equal scores keep link order
            ranked.sort_by(|&x, &y| scores[y].total_cmp(&scores[x]));

            let mut used = vec![false; n];
            let mut matched: Vec<(usize, usize)> = Vec::new();
            for index in ranked {
                let (a, b) = links[index];
                if used[a] || used[b] {
                    continue;
                }
                used[a] = true;
                used[b] = true;
                matched.push((a, b));
            }

            let mut absorbed_into: HashMap<usize, usize> = HashMap::with_capacity(matched.len());
            for &(keep, gone) in &matched {
                merge(&mut nodes, keep, gone);
                absorbed_into.insert(gone, keep);
            }
            alive -= matched.len();
            links = redirect(&links, &absorbed_into);

            round += 1;
            log::debug!(
                "Matching round {} merged {} pairs, {} super-nodes and {} links remain",
                round,
                matched.len(),
                alive,
                links.len()
            );
            context.progress(1.0 - alive as f64 / n.max(1) as f64);
        }

        Some(
            nodes
                .into_iter()
                .map(|node| node.members)
                .filter(|members| !members.is_empty())
                .collect(),
        )
    }
}

/// One super-node per node and one working link per distinct linked pair
fn initial_state(graph: &Graph) -> (Vec<SuperNode>, Vec<(usize, usize)>) {
    let mut nodes: Vec<SuperNode> = (0..graph.node_count())
        .map(|index| SuperNode {
            members: vec![index],
            ..SuperNode::default()
        })
        .collect();

    let mut links = Vec::new();
    let mut seen = HashSet::new();
    let mut total = 0usize;
    for (source, target, _) in graph.resolved_links() {
        if source == target {
            continue;
        }
        total += 1;
        nodes[source].volume += 1.0;
        nodes[target].volume += 1.0;
        *nodes[source].neighbors.entry(target).or_insert(0.0) += 1.0;
        *nodes[target].neighbors.entry(source).or_insert(0.0) += 1.0;

        let pair = (source.min(target), source.max(target));
        if seen.insert(pair) {
            links.push(pair);
        }
    }

    if total > 0 {
        let m = total as f64;
        for node in nodes.iter_mut() {
            node.volume /= m;
            for count in node.neighbors.values_mut() {
                *count /= m;
            }
        }
    }

    (nodes, links)
}

/// `q(link) = neighborEdgeCount − (volumeA·volumeB)/2`
fn modularity_gain(a: &SuperNode, b: &SuperNode, b_index: usize) -> f64 {
    let shared = a.neighbors.get(&b_index).copied().unwrap_or(0.0);
    shared - a.volume * b.volume / 2.0
}

/// Absorb `gone` into `keep`
fn merge(nodes: &mut [SuperNode], keep: usize, gone: usize) {
    let absorbed = std::mem::take(&mut nodes[gone]);

    nodes[keep].members.extend(absorbed.members);
    nodes[keep].volume += absorbed.volume;
    nodes[keep].neighbors.remove(&gone);

    for (neighbor, count) in absorbed.neighbors {
        if neighbor == keep {
            continue;
        }
        *nodes[keep].neighbors.entry(neighbor).or_insert(0.0) += count;

        let back = &mut nodes[neighbor].neighbors;
        back.remove(&gone);
        *back.entry(keep).or_insert(0.0) += count;
    }
}

/// Re-point links at surviving super-nodes, dropping internal and duplicate ones
fn redirect(links: &[(usize, usize)], absorbed_into: &HashMap<usize, usize>) -> Vec<(usize, usize)> {
    let resolve = |node: usize| absorbed_into.get(&node).copied().unwrap_or(node);

    let mut seen = HashSet::with_capacity(links.len());
    links
        .iter()
        .filter_map(|&(a, b)| {
            let (a, b) = (resolve(a), resolve(b));
            if a == b {
                return None;
            }
            let pair = (a.min(b), a.max(b));
            seen.insert(pair).then_some(pair)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::JobState;
    use crate::graph::GraphBuilder;

    fn detect(matching: &ModularityMatching, graph: &Graph) -> Vec<Vec<usize>> {
        let state = JobState::new();
        matching.find_clusters(graph, &RunContext::new(&state)).unwrap()
    }

    fn two_triangles() -> Graph {
        let mut builder = GraphBuilder::default();
        for id in ["a0", "a1", "a2", "b0", "b1", "b2"] {
            builder.node(id, "t", 1.0);
        }
        builder.link("a0", "a1").link("a1", "a2").link("a0", "a2");
        builder.link("b0", "b1").link("b1", "b2").link("b0", "b2");
        builder.build()
    }

    #[test]
    fn test_two_triangles() {
        let matching = ModularityMatching::new(3).unwrap();
        assert_eq!(detect(&matching, &two_triangles()), vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let graph = two_triangles();
        let single = detect(&ModularityMatching::new(1).unwrap(), &graph);
        let many = detect(&ModularityMatching::new(10).unwrap(), &graph);
        assert_eq!(single, many);
    }

    #[test]
    fn test_single_remaining_link_is_not_merged() {
        let mut builder = GraphBuilder::default();
        builder.node("a", "t", 1.0).node("b", "t", 1.0);
        builder.link("a", "b");
        let groups = detect(&ModularityMatching::new(2).unwrap(), &builder.build());
        assert_eq!(groups, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert!(matches!(
            ModularityMatching::new(0),
            Err(AggregationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_merge_moves_neighbor_counts() {
        let mut builder = GraphBuilder::default();
        builder.node("a", "t", 1.0).node("b", "t", 1.0).node("c", "t", 1.0);
        builder.link("a", "b").link("b", "c");
        let (mut nodes, links) = initial_state(&builder.build());
        assert_eq!(links, vec![(0, 1), (1, 2)]);
        assert_eq!(nodes[1].volume, 1.0);

        merge(&mut nodes, 0, 1);
        assert_eq!(nodes[0].members, vec![0, 1]);
        assert_eq!(nodes[0].neighbors.get(&2), Some(&0.5));
        assert!(!nodes[0].neighbors.contains_key(&1));
        assert_eq!(nodes[2].neighbors.get(&0), Some(&0.5));
        assert!(!nodes[2].neighbors.contains_key(&1));
        assert!(nodes[1].members.is_empty());

        let mut absorbed = HashMap::new();
        absorbed.insert(1, 0);
        assert_eq!(redirect(&links, &absorbed), vec![(0, 2)]);
    }

    #[test]
    fn test_members_cover_every_node() {
        let mut builder = GraphBuilder::default();
        let ids: Vec<String> = (0..12).map(|i| format!("n{}", i)).collect();
        for id in &ids {
            builder.node(id, "t", 1.0);
        }
        for i in 0..12 {
            builder.link(&ids[i], &ids[(i + 1) % 12]);
            builder.link(&ids[i], &ids[(i + 5) % 12]);
        }
        let groups = detect(&ModularityMatching::new(4).unwrap(), &builder.build());

        let mut seen: Vec<usize> = groups.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancelled_run_returns_none() {
        let state = JobState::new();
        assert!(state.begin());
        assert!(state.cancel());
        let context = RunContext::new(&state);
        let matching = ModularityMatching::new(2).unwrap();
        assert!(matching.find_clusters(&two_triangles(), &context).is_none());
    }
}
