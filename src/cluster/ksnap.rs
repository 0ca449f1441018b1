//! KSnap attribute-driven summarization.
//!
//! Nodes are first grouped by their type. Each iteration then looks at every pair of
//! groups joined by at least one link and splits one group along its heaviest cross-group
//! tie, so that groups drift toward all-or-nothing connectivity with their neighbors.
//!
//! Tian et al. (2008). "Efficient aggregation for graph summarization."

use crate::cluster::{utils, ClusterAlgorithm, RunContext};
use crate::config::KSnapConfig;
use crate::graph::Graph;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Participation ratio below which a group pair counts as a strong relationship
const PARTICIPATION_THRESHOLD: f64 = 0.5;

/// Summary quality measures computed each iteration; reported, never used to stop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interestingness {
    /// Share of touching group pairs that are strong
    pub diversity: f64,
    /// Share of nodes taking part in a strong relationship
    pub coverage: f64,
    /// 1 / (groups + strong relationships)
    pub conciseness: f64,
}

/// KSnap aggregator
#[derive(Debug, Clone)]
pub struct KSnap {
    /// Number of split iterations
    resolution: usize,
}

impl KSnap {
    pub fn new(resolution: usize) -> Self {
        Self { resolution }
    }

    pub fn from_config(config: &KSnapConfig) -> Self {
        Self::new(config.resolution)
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }
}

impl Default for KSnap {
    fn default() -> Self {
        Self::from_config(&KSnapConfig::default())
    }
}

impl ClusterAlgorithm for KSnap {
    fn name(&self) -> &'static str {
        "ksnap"
    }

    fn find_clusters(&self, graph: &Graph, context: &RunContext<'_>) -> Option<Vec<Vec<usize>>> {
        let mut groups = Groups::by_type(graph);
        log::debug!("KSnap seeded {} type groups", groups.members.len());
        if self.resolution == 0 {
            return Some(groups.members);
        }

        let adjacency = utils::adjacency_until(graph, || context.is_cancelled())?;

        for iteration in 0..self.resolution {
            if context.is_cancelled() {
                return None;
            }

            let relations = Relations::measure(&groups, &adjacency);
            let score = relations.interestingness(&groups, graph.node_count());
            log::debug!(
                "KSnap iteration {}: {} groups, diversity {:.3}, coverage {:.3}, conciseness {:.4}",
                iteration,
                groups.members.len(),
                score.diversity,
                score.coverage,
                score.conciseness
            );

            match relations.best_split(&groups) {
                Some((group, split)) => {
                    log::trace!("KSnap splitting {} nodes off group {}", split.len(), group);
                    groups.split(group, split);
                }
                None => {
                    log::debug!("KSnap has no splittable group after {} iterations", iteration);
                    break;
                }
            }
            context.progress((iteration + 1) as f64 / self.resolution as f64);
        }

        Some(groups.members)
    }
}

/// Current group membership
#[derive(Debug, Clone)]
struct Groups {
    members: Vec<Vec<usize>>,
    group_of: Vec<usize>,
}

impl Groups {
    /// One group per distinct node type, in order of first appearance
    fn by_type(graph: &Graph) -> Self {
        let mut slot_of_type: HashMap<&str, usize> = HashMap::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        let mut group_of = Vec::with_capacity(graph.node_count());

        for (index, node) in graph.nodes().iter().enumerate() {
            let slot = *slot_of_type.entry(node.node_type()).or_insert_with(|| {
                members.push(Vec::new());
                members.len() - 1
            });
            members[slot].push(index);
            group_of.push(slot);
        }

        Self { members, group_of }
    }

    /// Move `split` out of `group` into a brand-new group
    fn split(&mut self, group: usize, split: Vec<usize>) {
        let new_group = self.members.len();
        for &node in &split {
            self.group_of[node] = new_group;
        }
        let group_of = &self.group_of;
        self.members[group].retain(|&node| group_of[node] == group);
        self.members.push(split);
    }
}

/// Cross-group participation: for each ordered pair (g, h), the nodes of g with a link into h
struct Relations {
    participants: BTreeMap<(usize, usize), Vec<usize>>,
}

impl Relations {
    fn measure(groups: &Groups, adjacency: &[Vec<usize>]) -> Self {
        let mut participants: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (node, neighbors) in adjacency.iter().enumerate() {
            let own = groups.group_of[node];
            for &neighbor in neighbors {
                let other = groups.group_of[neighbor];
                if other == own {
                    continue;
                }
                let nodes = participants.entry((own, other)).or_default();
                if nodes.last() != Some(&node) {
                    nodes.push(node);
                }
            }
        }
        Self { participants }
    }

    fn participating(&self, from: usize, to: usize) -> usize {
        self.participants.get(&(from, to)).map_or(0, Vec::len)
    }

    /// Strong when few of the pair's nodes take part in the relationship
    fn is_strong(&self, groups: &Groups, g: usize, h: usize) -> bool {
        let combined = groups.members[g].len() + groups.members[h].len();
        if combined == 0 {
            return false;
        }
        let ratio = (self.participating(g, h) + self.participating(h, g)) as f64 / combined as f64;
        ratio < PARTICIPATION_THRESHOLD
    }

    /// Pick the highest-scoring group whose split leaves a residual.
    ///
    /// Each group is scored against its best-connected neighbor group, strong relationships
    /// first, then by the number of participating nodes; ties favor the lower group id.
    fn best_split(&self, groups: &Groups) -> Option<(usize, Vec<usize>)> {
        let mut best_per_group: BTreeMap<usize, ((bool, usize), usize)> = BTreeMap::new();
        for (&(g, h), nodes) in &self.participants {
            if groups.members[g].len() < 2 {
                continue;
            }
            let score = (self.is_strong(groups, g, h), nodes.len());
            match best_per_group.get(&g) {
                Some(&(best, _)) if best >= score => {}
                _ => {
                    best_per_group.insert(g, (score, h));
                }
            }
        }

        let mut queue: BinaryHeap<((bool, usize), Reverse<usize>, usize)> = best_per_group
            .into_iter()
            .map(|(g, (score, h))| (score, Reverse(g), h))
            .collect();

        while let Some((_, Reverse(g), h)) = queue.pop() {
            let split = &self.participants[&(g, h)];
            if split.len() < groups.members[g].len() {
                return Some((g, split.clone()));
            }
        }
        None
    }

    fn interestingness(&self, groups: &Groups, node_count: usize) -> Interestingness {
        let mut touching = 0usize;
        let mut strong = 0usize;
        let mut covered = vec![false; node_count];

        for &(g, h) in self.participants.keys() {
            // count each unordered pair once, from whichever side lists it first
            if g > h && self.participants.contains_key(&(h, g)) {
                continue;
            }
            touching += 1;
            if self.is_strong(groups, g, h) {
                strong += 1;
                for key in [(g, h), (h, g)] {
                    for &node in self.participants.get(&key).into_iter().flatten() {
                        covered[node] = true;
                    }
                }
            }
        }

        let covered = covered.iter().filter(|&&flag| flag).count();
        Interestingness {
            diversity: if touching == 0 { 0.0 } else { strong as f64 / touching as f64 },
            coverage: if node_count == 0 { 0.0 } else { covered as f64 / node_count as f64 },
            conciseness: 1.0 / (groups.members.len() + strong).max(1) as f64,
        }
    }
}
