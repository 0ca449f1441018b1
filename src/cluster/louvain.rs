//! Louvain method for community detection.
//!
//! Multi-level modularity optimization:
//!
//! 1. **Local moving**: every node starts in its own community. Nodes are visited in a
//!    seeded random order and moved to the neighboring community with the strictly largest
//!    gain, sweep after sweep, until a sweep moves nothing.
//! 2. **Coarsening**: each community becomes a single node. Edges inside a community become
//!    a self loop, edges between communities are summed.
//! 3. Repeat on the coarse graph while the previous local-moving phase moved anything, then
//!    unroll the recorded node-to-community maps back down to the original nodes.
//!
//! The gain of putting node `i` into community `c` is
//! `γ·k_i,in(c) − k_i·(Σ_tot(c) − k_i·[i ∈ c]) / 2m`, where `k_i,in(c)` is the weight of
//! edges from `i` into `c`, `Σ_tot(c)` the summed weighted degree of `c` and `m` the total
//! edge weight. Leaving a singleton in place scores zero.
//!
//! Blondel et al. (2008). "Fast unfolding of communities in large networks."

use crate::cluster::{ClusterAlgorithm, RunContext};
use crate::config::LouvainConfig;
use crate::graph::Graph;
use rand::prelude::*;
use std::collections::HashMap;

/// Louvain community detection
#[derive(Debug, Clone)]
pub struct Louvain {
    /// Resolution parameter (gamma), scales the edge-weight term of the gain
    resolution: f64,
    /// Seed for the node visiting order
    seed: u64,
    /// Upper bound on sweeps per local-moving phase
    max_sweeps: usize,
}

impl Louvain {
    pub fn new() -> Self {
        Self::from_config(&LouvainConfig::default())
    }

    pub fn from_config(config: &LouvainConfig) -> Self {
        Self {
            resolution: config.resolution,
            seed: config.seed,
            max_sweeps: config.max_sweeps.max(1),
        }
    }

    /// Set resolution parameter.
    ///
    /// Higher values favor merging, lower values keep communities apart.
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Phase 1: move nodes between communities until a sweep makes no move.
    /// Returns (community per node, whether anything moved), or `None` on cancellation.
    fn local_moving(
        &self,
        level: &Level,
        rng: &mut StdRng,
        context: &RunContext<'_>,
    ) -> Option<(Vec<usize>, bool)> {
        let n = level.node_count();
        let mut community: Vec<usize> = (0..n).collect();
        let m = level.total_weight;
        if m <= 0.0 {
            return Some((community, false));
        }

        let mut totals = level.degrees.clone();
        let mut sizes = vec![1usize; n];

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        // scratch space: edge weight from the current node into each community
        let mut weight_to = vec![0.0; n];
        let mut touched: Vec<usize> = Vec::new();

        let mut moved_any = false;
        for sweep in 0..self.max_sweeps {
            if context.is_cancelled() {
                return None;
            }

            let mut moves = 0;
            for &node in &order {
                let current = community[node];
                let k = level.degrees[node];

                for &(neighbor, weight) in &level.adjacency[node] {
                    let target = community[neighbor];
                    if weight_to[target] == 0.0 {
                        touched.push(target);
                    }
                    weight_to[target] += weight;
                }

                let mut best = current;
                let mut best_gain = if sizes[current] == 1 {
                    0.0
                } else {
                    self.resolution * weight_to[current] - k * (totals[current] - k) / (2.0 * m)
                };

                for &target in &touched {
                    if target == current || weight_to[target] == 0.0 {
                        continue;
                    }
                    let gain = self.resolution * weight_to[target] - k * totals[target] / (2.0 * m);
                    if gain > best_gain {
                        best = target;
                        best_gain = gain;
                    }
                }

                for &target in &touched {
                    weight_to[target] = 0.0;
                }
                touched.clear();

                if best != current {
                    totals[current] -= k;
                    sizes[current] -= 1;
                    totals[best] += k;
                    sizes[best] += 1;
                    community[node] = best;
                    moves += 1;
                }
            }

            log::trace!("Louvain sweep {} moved {} nodes", sweep, moves);
            if moves == 0 {
                break;
            }
            moved_any = true;
        }

        Some((community, moved_any))
    }
}

impl Default for Louvain {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterAlgorithm for Louvain {
    fn name(&self) -> &'static str {
        "louvain"
    }

    fn find_clusters(&self, graph: &Graph, context: &RunContext<'_>) -> Option<Vec<Vec<usize>>> {
        let n = graph.node_count();
        if n == 0 {
            return Some(Vec::new());
        }

        let mut level = Level::from_graph(graph);
        if context.is_cancelled() {
            return None;
        }
        if level.total_weight <= 0.0 {
            log::debug!("Graph has no edge weight, every node is its own community");
            return Some((0..n).map(|node| vec![node]).collect());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut layers: Vec<Vec<usize>> = Vec::new();

        loop {
            let (communities, moved) = self.local_moving(&level, &mut rng, context)?;
            if !moved {
                break;
            }

            let (communities, count) = renumber(&communities);
            if count == level.node_count() {
                break;
            }

            if context.is_cancelled() {
                return None;
            }
            level = level.coarsen(&communities, count);
            layers.push(communities);

            log::debug!("Louvain level {} coarsened to {} communities", layers.len(), count);
            context.progress(1.0 - 0.5f64.powi(layers.len() as i32));
        }

        // unroll every recorded layer down to the original nodes
        let mut assignment: Vec<usize> = (0..n).collect();
        for layer in &layers {
            for slot in assignment.iter_mut() {
                *slot = layer[*slot];
            }
        }

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); level.node_count()];
        for (node, &community) in assignment.iter().enumerate() {
            groups[community].push(node);
        }
        context.progress(1.0);
        Some(groups)
    }
}

/// Relabel communities as `0..count` in order of first appearance
fn renumber(communities: &[usize]) -> (Vec<usize>, usize) {
    let mut labels: HashMap<usize, usize> = HashMap::new();
    let renumbered = communities
        .iter()
        .map(|&community| {
            let next = labels.len();
            *labels.entry(community).or_insert(next)
        })
        .collect();
    (renumbered, labels.len())
}

/// Weighted graph at one level of the hierarchy
#[derive(Debug, Clone)]
struct Level {
    /// Neighbor and summed edge weight, self excluded, in first-seen order
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    /// Weighted degree; self loops count twice
    degrees: Vec<f64>,
    /// Total edge weight `m`
    total_weight: f64,
}

impl Level {
    fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    fn from_graph(graph: &Graph) -> Self {
        let n = graph.node_count();
        let mut accumulator = AdjacencyAccumulator::new(n);
        let mut self_loops = vec![0.0; n];
        let mut total_weight = 0.0;

        for (source, target, weight) in graph.resolved_links() {
            total_weight += weight;
            if source == target {
                self_loops[source] += weight;
            } else {
                accumulator.add(source, target, weight);
                accumulator.add(target, source, weight);
            }
        }

        let adjacency = accumulator.finish();
        let degrees = adjacency
            .iter()
            .zip(&self_loops)
            .map(|(edges, &self_loop)| edges.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * self_loop)
            .collect();

        Self {
            adjacency,
            self_loops,
            degrees,
            total_weight,
        }
    }

    /// Phase 2: collapse each community into one node
    fn coarsen(&self, communities: &[usize], count: usize) -> Self {
        let mut accumulator = AdjacencyAccumulator::new(count);
        let mut self_loops = vec![0.0; count];
        let mut degrees = vec![0.0; count];

        for (node, edges) in self.adjacency.iter().enumerate() {
            let from = communities[node];
            self_loops[from] += self.self_loops[node];
            degrees[from] += self.degrees[node];

            for &(neighbor, weight) in edges {
                let to = communities[neighbor];
                if from == to {
                    // each internal edge is seen from both ends
                    self_loops[from] += weight / 2.0;
                } else {
                    accumulator.add(from, to, weight);
                }
            }
        }

        Self {
            adjacency: accumulator.finish(),
            self_loops,
            degrees,
            total_weight: self.total_weight,
        }
    }
}

/// Sums parallel edges while keeping first-seen neighbor order
struct AdjacencyAccumulator {
    lists: Vec<Vec<(usize, f64)>>,
    slots: Vec<HashMap<usize, usize>>,
}

impl AdjacencyAccumulator {
    fn new(n: usize) -> Self {
        Self {
            lists: vec![Vec::new(); n],
            slots: vec![HashMap::new(); n],
        }
    }

    fn add(&mut self, from: usize, to: usize, weight: f64) {
        let list = &mut self.lists[from];
        match self.slots[from].get(&to) {
            Some(&slot) => list[slot].1 += weight,
            None => {
                self.slots[from].insert(to, list.len());
                list.push((to, weight));
            }
        }
    }

    fn finish(self) -> Vec<Vec<(usize, f64)>> {
        self.lists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::JobState;
    use crate::graph::GraphBuilder;

    fn detect(louvain: &Louvain, graph: &Graph) -> Vec<Vec<usize>> {
        let state = JobState::new();
        louvain.find_clusters(graph, &RunContext::new(&state)).unwrap()
    }

    fn triangles(bridge: bool) -> Graph {
        let mut builder = GraphBuilder::default();
        for id in ["a0", "a1", "a2", "b0", "b1", "b2"] {
            builder.node(id, "t", 1.0);
        }
        builder.link("a0", "a1").link("a1", "a2").link("a0", "a2");
        builder.link("b0", "b1").link("b1", "b2").link("b0", "b2");
        if bridge {
            builder.link("a2", "b0");
        }
        builder.build()
    }

    fn sorted(mut groups: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        for group in groups.iter_mut() {
            group.sort_unstable();
        }
        groups.sort();
        groups
    }

    #[test]
    fn test_louvain_triangle() {
        let mut builder = GraphBuilder::default();
        builder.node("a", "t", 1.0).node("b", "t", 1.0).node("c", "t", 1.0);
        builder.link("a", "b").link("b", "c").link("a", "c");
        let groups = detect(&Louvain::new(), &builder.build());

        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_louvain_disjoint_triangles() {
        let groups = sorted(detect(&Louvain::new(), &triangles(false)));
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_louvain_bridged_triangles() {
        let groups = sorted(detect(&Louvain::new(), &triangles(true)));
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_louvain_no_edges_gives_singletons() {
        let mut builder = GraphBuilder::default();
        builder.node("a", "t", 1.0).node("b", "t", 1.0);
        let groups = detect(&Louvain::new(), &builder.build());
        assert_eq!(groups, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_louvain_empty_graph() {
        let groups = detect(&Louvain::new(), &Graph::default());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_zero_resolution_never_moves() {
        let groups = detect(&Louvain::new().with_resolution(0.0), &triangles(true));
        assert_eq!(groups.len(), 6);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let graph = triangles(true);
        let first = detect(&Louvain::new().with_seed(7), &graph);
        let second = detect(&Louvain::new().with_seed(7), &graph);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cancelled_run_returns_none() {
        let state = JobState::new();
        assert!(state.begin());
        assert!(state.cancel());

        let context = RunContext::new(&state);
        assert!(Louvain::new().find_clusters(&triangles(false), &context).is_none());
    }

    #[test]
    fn test_coarsen_keeps_total_degree() {
        let level = Level::from_graph(&triangles(true));
        let total: f64 = level.degrees.iter().sum();
        assert_eq!(total, 2.0 * level.total_weight);

        let coarse = level.coarsen(&[0, 0, 0, 1, 1, 1], 2);
        assert_eq!(coarse.self_loops, vec![3.0, 3.0]);
        assert_eq!(coarse.adjacency[0], vec![(1, 1.0)]);
        let coarse_total: f64 = coarse.degrees.iter().sum();
        assert_eq!(coarse_total, total);
    }
}
