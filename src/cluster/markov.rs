//! Markov cluster algorithm (MCL).
//!
//! Simulates random walks on the graph: the row-stochastic adjacency matrix is repeatedly
//! squared (expansion) and raised element-wise to a power, pruned and re-normalized
//! (inflation) until each row has concentrated its mass. Nodes linked by any surviving
//! off-diagonal entry end up in the same cluster.

use crate::cluster::disjoint::DisjointSets;
use crate::cluster::{ClusterAlgorithm, RunContext};
use crate::config::MarkovConfig;
use crate::graph::Graph;
use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};
use std::collections::HashSet;

/// Markov clustering
#[derive(Debug, Clone)]
pub struct Markov {
    config: MarkovConfig,
}

impl Markov {
    pub fn new() -> Self {
        Self::from_config(&MarkovConfig::default())
    }

    pub fn from_config(config: &MarkovConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn with_inflation(mut self, inflation: f64) -> Self {
        self.config.inflation = inflation;
        self
    }

    pub fn with_loop_gain(mut self, loop_gain: f64) -> Self {
        self.config.loop_gain = loop_gain;
        self
    }

    /// Symmetric unit-weight adjacency with self loops, row-normalized
    fn initial_matrix(&self, graph: &Graph) -> CsrMatrix<f64> {
        let n = graph.node_count();
        let mut coo = CooMatrix::new(n, n);

        // parallel links must not add up, the conversion sums duplicate triplets
        let mut seen = HashSet::new();
        for (source, target, _) in graph.resolved_links() {
            if source != target && seen.insert((source.min(target), source.max(target))) {
                coo.push(source, target, 1.0);
                coo.push(target, source, 1.0);
            }
        }
        if self.config.loop_gain > 0.0 {
            for node in 0..n {
                coo.push(node, node, self.config.loop_gain);
            }
        }

        let mut matrix = CsrMatrix::from(&coo);
        normalize_rows(&mut matrix);
        matrix
    }
}

impl Default for Markov {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterAlgorithm for Markov {
    fn name(&self) -> &'static str {
        "markov"
    }

    fn find_clusters(&self, graph: &Graph, context: &RunContext<'_>) -> Option<Vec<Vec<usize>>> {
        let mut matrix = self.initial_matrix(graph);
        let max_iterations = self.config.max_iterations.max(1);

        for iteration in 0..max_iterations {
            if context.is_cancelled() {
                return None;
            }

            let expanded = &matrix * &matrix;
            matrix = inflate(expanded, self.config.inflation, self.config.zero_threshold);

            let energy = residual_energy(&matrix);
            log::debug!("MCL iteration {} residual energy {:.6}", iteration, energy);
            context.progress((iteration + 1) as f64 / max_iterations as f64);

            if energy < self.config.convergence_threshold {
                break;
            }
            if iteration + 1 == max_iterations {
                log::warn!(
                    "MCL stopped after {} iterations with residual energy {:.6}",
                    max_iterations,
                    energy
                );
            }
        }

        Some(clusters(&matrix))
    }
}

/// Scale every nonempty row to sum to 1
fn normalize_rows(matrix: &mut CsrMatrix<f64>) {
    for mut row in matrix.row_iter_mut() {
        let sum: f64 = row.values().iter().sum();
        if sum > 0.0 {
            for value in row.values_mut() {
                *value /= sum;
            }
        }
    }
}

/// Raise entries to `power`, drop those below `zero_threshold`, re-normalize rows
fn inflate(mut matrix: CsrMatrix<f64>, power: f64, zero_threshold: f64) -> CsrMatrix<f64> {
    for value in matrix.values_mut() {
        *value = value.powf(power);
    }
    let mut pruned = matrix.filter(|_, _, value| *value >= zero_threshold);
    normalize_rows(&mut pruned);
    pruned
}

/// Maximum over rows of (row max − row sum of squares)
fn residual_energy(matrix: &CsrMatrix<f64>) -> f64 {
    matrix
        .row_iter()
        .map(|row| {
            let max = row.values().iter().copied().fold(0.0, f64::max);
            let squares: f64 = row.values().iter().map(|value| value * value).sum();
            max - squares
        })
        .fold(0.0, f64::max)
}

/// Group rows connected through any nonzero off-diagonal entry
fn clusters(matrix: &CsrMatrix<f64>) -> Vec<Vec<usize>> {
    let mut sets = DisjointSets::new(matrix.nrows());
    for (row, column, value) in matrix.triplet_iter() {
        if row != column && *value > 0.0 {
            sets.union(row, column);
        }
    }
    sets.groups()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::JobState;
    use crate::graph::{GraphBuilder, Link};

    fn two_triangles() -> Graph {
        let mut builder = GraphBuilder::default();
        for id in ["a0", "a1", "a2", "b0", "b1", "b2"] {
            builder.node(id, "t", 1.0);
        }
        builder.link("a0", "a1").link("a1", "a2").link("a0", "a2");
        builder.link("b0", "b1").link("b1", "b2").link("b0", "b2");
        builder.build()
    }

    fn path(n: usize) -> Graph {
        let mut builder = GraphBuilder::default();
        let ids: Vec<String> = (0..n).map(|i| format!("n{}", i)).collect();
        for id in &ids {
            builder.node(id, "t", 1.0);
        }
        for pair in ids.windows(2) {
            builder.link(&pair[0], &pair[1]);
        }
        builder.build()
    }

    fn matrix(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(row, column, value) in entries {
            coo.push(row, column, value);
        }
        CsrMatrix::from(&coo)
    }

    fn entry(matrix: &CsrMatrix<f64>, row: usize, column: usize) -> Option<f64> {
        matrix
            .triplet_iter()
            .find(|&(r, c, _)| r == row && c == column)
            .map(|(_, _, value)| *value)
    }

    #[test]
    fn test_two_triangles() {
        let state = JobState::new();
        let groups = Markov::new()
            .find_clusters(&two_triangles(), &RunContext::new(&state))
            .unwrap();
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_initial_matrix_ignores_link_weight() {
        let mut builder = GraphBuilder::default();
        builder.node("a", "t", 1.0).node("b", "t", 1.0);
        builder.add_link(Link::new("ab", "a", "b").with_weight(9.0));
        builder.add_link(Link::new("ab2", "a", "b"));
        let matrix = Markov::new().initial_matrix(&builder.build());

        assert_eq!(entry(&matrix, 0, 1), Some(0.5));
        assert_eq!(entry(&matrix, 0, 0), Some(0.5));
    }

    #[test]
    fn test_rows_stay_stochastic_after_inflation() {
        let mut matrix = Markov::new().initial_matrix(&path(8));

        for _ in 0..5 {
            matrix = inflate(&matrix * &matrix, 2.0, 0.001);
            for row in matrix.row_iter() {
                if row.nnz() > 0 {
                    let sum: f64 = row.values().iter().sum();
                    assert!((sum - 1.0).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_pruning_zeroes_small_entries() {
        let pruned = inflate(matrix(2, &[(0, 0, 0.98), (0, 1, 0.02), (1, 1, 1.0)]), 2.0, 0.001);

        // 0.02^2 falls below the threshold before re-normalization
        assert_eq!(pruned.row(0).nnz(), 1);
        assert_eq!(entry(&pruned, 0, 0), Some(1.0));
        assert_eq!(entry(&pruned, 0, 1), None);
    }

    #[test]
    fn test_residual_energy_of_converged_rows() {
        let converged = matrix(2, &[(0, 0, 1.0), (1, 0, 0.5), (1, 1, 0.5)]);
        assert_eq!(residual_energy(&converged), 0.0);

        let mixing = matrix(2, &[(0, 0, 1.0), (1, 0, 0.75), (1, 1, 0.25)]);
        assert!((residual_energy(&mixing) - (0.75 - 0.625)).abs() < 1e-12);
    }

    #[test]
    fn test_isolated_nodes_stay_alone() {
        let mut builder = GraphBuilder::default();
        builder.node("a", "t", 1.0).node("b", "t", 1.0);
        let state = JobState::new();
        let groups = Markov::new()
            .with_loop_gain(0.0)
            .find_clusters(&builder.build(), &RunContext::new(&state))
            .unwrap();
        assert_eq!(groups, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_cancelled_run_returns_none() {
        let state = JobState::new();
        assert!(state.begin());
        assert!(state.cancel());
        let context = RunContext::new(&state);
        assert!(Markov::new().find_clusters(&two_triangles(), &context).is_none());
    }
}
