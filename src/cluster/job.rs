//! Aggregation job lifecycle: state machine, cancellation and result publication

use crate::cluster::{utils, Cluster, ClusterAlgorithm};
use crate::error::AggregationError;
use crate::graph::Graph;
use crate::summary::{AggregationResult, ClusterConverter};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Share of the progress bar given to clustering when a converter follows it
const CLUSTERING_SHARE: f64 = 0.9;

/// Lifecycle state of an aggregation job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobStatus {
    Waiting = 0,
    Aggregating = 1,
    Cancelling = 2,
}

impl JobStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => JobStatus::Aggregating,
            2 => JobStatus::Cancelling,
            _ => JobStatus::Waiting,
        }
    }
}

/// How a call to `run` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Atomic status and progress shared between the running job and its handles
#[derive(Debug)]
pub struct JobState {
    status: AtomicU8,
    percent: AtomicU8,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(JobStatus::Waiting as u8),
            percent: AtomicU8::new(0),
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn percent_complete(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Request cancellation of a running job. Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        self.transition(JobStatus::Aggregating, JobStatus::Cancelling)
    }

    pub fn is_cancelling(&self) -> bool {
        self.status() == JobStatus::Cancelling
    }

    pub(crate) fn begin(&self) -> bool {
        self.transition(JobStatus::Waiting, JobStatus::Aggregating)
    }

    fn reset(&self) {
        self.status.store(JobStatus::Waiting as u8, Ordering::Release);
    }

    fn set_percent(&self, percent: u8) {
        self.percent.store(percent.min(100), Ordering::Relaxed);
    }

    fn transition(&self, from: JobStatus, to: JobStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for observing or cancelling a job from another thread
#[derive(Debug, Clone)]
pub struct JobHandle {
    state: Arc<JobState>,
}

impl JobHandle {
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn percent_complete(&self) -> u8 {
        self.state.percent_complete()
    }
}

/// Cancellation token and progress sink handed to a running algorithm.
///
/// Progress is reported as a fraction of the algorithm's own work and mapped onto the
/// slice of the job's progress bar this context covers.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    state: &'a JobState,
    offset: f64,
    span: f64,
}

impl<'a> RunContext<'a> {
    pub fn new(state: &'a JobState) -> Self {
        Self {
            state,
            offset: 0.0,
            span: 100.0,
        }
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelling()
    }

    /// Report `fraction` (0..=1) of this context's work as done
    pub fn progress(&self, fraction: f64) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let percent = (self.offset + self.span * fraction).round();
        self.state.set_percent(percent as u8);
    }

    /// The `index`-th of `count` equal slices of this context
    pub fn slice(&self, index: usize, count: usize) -> RunContext<'a> {
        self.part(index as f64 / count.max(1) as f64, 1.0 / count.max(1) as f64)
    }

    /// The slice of this context starting at `start` and covering `share` of it
    pub fn part(&self, start: f64, share: f64) -> RunContext<'a> {
        RunContext {
            state: self.state,
            offset: self.offset + self.span * start,
            span: self.span * share,
        }
    }
}

/// A single aggregation run: configure once with `set_graph`, `run` once, read results.
pub struct AggregationJob<A: ClusterAlgorithm> {
    algorithm: A,
    graph: Option<Arc<Graph>>,
    converter: Option<ClusterConverter>,
    split_components: bool,
    state: Arc<JobState>,
    started: bool,
    clusters: Option<Vec<Cluster>>,
    result: Option<AggregationResult>,
}

impl<A: ClusterAlgorithm> AggregationJob<A> {
    pub fn new(algorithm: A) -> Self {
        Self {
            algorithm,
            graph: None,
            converter: None,
            split_components: false,
            state: Arc::new(JobState::new()),
            started: false,
            clusters: None,
            result: None,
        }
    }

    /// Cluster each connected component separately and concatenate the partitions
    pub fn with_split_components(mut self, split_components: bool) -> Self {
        self.split_components = split_components;
        self
    }

    pub fn set_graph(&mut self, graph: Arc<Graph>) {
        self.graph = Some(graph);
    }

    /// Attach a converter; after a completed run its summary graph is available from
    /// `aggregation_result`
    pub fn set_converter(&mut self, converter: ClusterConverter) {
        self.converter = Some(converter);
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn percent_complete(&self) -> u8 {
        self.state.percent_complete()
    }

    /// The partition found by a completed run; `None` before or after a cancelled run
    pub fn cluster_set(&self) -> Option<&[Cluster]> {
        self.clusters.as_deref()
    }

    /// The converted summary graph; `None` without a converter or after a cancelled run
    pub fn aggregation_result(&self) -> Option<&AggregationResult> {
        self.result.as_ref()
    }

    /// Run the algorithm to completion or cancellation, blocking the calling thread
    pub fn run(&mut self) -> Result<RunOutcome, AggregationError> {
        let graph = self.graph.clone().ok_or(AggregationError::NoGraph)?;
        if self.started || !self.state.begin() {
            return Err(AggregationError::AlreadyStarted);
        }
        self.started = true;
        self.state.set_percent(0);

        log::info!(
            "Running {} on {} nodes and {} links",
            self.algorithm.name(),
            graph.node_count(),
            graph.link_count()
        );

        let context = RunContext::new(&self.state);
        let clustering = if self.converter.is_some() {
            context.part(0.0, CLUSTERING_SHARE)
        } else {
            context
        };

        let clusters = if self.split_components {
            self.cluster_by_component(&graph, &clustering)
        } else {
            self.algorithm
                .find_clusters(&graph, &clustering)
                .map(|groups| to_clusters(&graph, groups, 0))
        };

        let clusters = match clusters {
            Some(clusters) if !context.is_cancelled() => clusters,
            _ => return Ok(self.cancelled()),
        };
        log::info!("{} found {} clusters", self.algorithm.name(), clusters.len());

        let result = match &self.converter {
            Some(converter) => {
                let result = converter.convert_cluster_set(&clusters);
                if context.is_cancelled() {
                    return Ok(self.cancelled());
                }
                Some(result)
            }
            None => None,
        };

        Ok(self.publish(clusters, result))
    }

    /// Leave Aggregating and publish, unless a cancel won the race to the status
    fn publish(&mut self, clusters: Vec<Cluster>, result: Option<AggregationResult>) -> RunOutcome {
        if !self.state.transition(JobStatus::Aggregating, JobStatus::Waiting) {
            return self.cancelled();
        }
        self.clusters = Some(clusters);
        self.result = result;
        self.state.set_percent(100);
        RunOutcome::Completed
    }

    fn cluster_by_component(&self, graph: &Graph, context: &RunContext<'_>) -> Option<Vec<Cluster>> {
        let components = utils::split_components(graph);
        let count = components.len();

        let mut clusters = Vec::new();
        for (index, component) in components.iter().enumerate() {
            if context.is_cancelled() {
                return None;
            }
            let groups = self.algorithm.find_clusters(component, &context.slice(index, count))?;
            let next_id = clusters.len() as u32;
            clusters.extend(to_clusters(component, groups, next_id));
        }
        Some(clusters)
    }

    fn cancelled(&mut self) -> RunOutcome {
        log::info!("{} cancelled", self.algorithm.name());
        self.clusters = None;
        self.result = None;
        self.state.reset();
        RunOutcome::Cancelled
    }
}

/// Turn index groups into id-based clusters, dropping empty groups
fn to_clusters(graph: &Graph, groups: Vec<Vec<usize>>, first_id: u32) -> Vec<Cluster> {
    groups
        .into_iter()
        .filter(|members| !members.is_empty())
        .enumerate()
        .map(|(offset, members)| Cluster {
            id: first_id + offset as u32,
            members: members
                .into_iter()
                .map(|index| graph.node(index).id().to_string())
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    /// Puts every node in one cluster, or reports cancellation if asked to
    struct Everything {
        cancel_midway: bool,
    }

    impl ClusterAlgorithm for Everything {
        fn name(&self) -> &'static str {
            "everything"
        }

        fn find_clusters(&self, graph: &Graph, context: &RunContext<'_>) -> Option<Vec<Vec<usize>>> {
            if self.cancel_midway {
                context.state.cancel();
            }
            if context.is_cancelled() {
                return None;
            }
            context.progress(1.0);
            Some(vec![(0..graph.node_count()).collect()])
        }
    }

    fn graph() -> Arc<Graph> {
        let mut builder = GraphBuilder::default();
        builder.node("a", "t", 1.0).node("b", "t", 1.0).node("c", "t", 1.0);
        builder.link("a", "b");
        Arc::new(builder.build())
    }

    #[test]
    fn test_run_requires_graph() {
        let mut job = AggregationJob::new(Everything { cancel_midway: false });
        assert!(matches!(job.run(), Err(AggregationError::NoGraph)));
    }

    #[test]
    fn test_run_publishes_clusters_once() {
        let mut job = AggregationJob::new(Everything { cancel_midway: false });
        job.set_graph(graph());

        assert_eq!(job.run().unwrap(), RunOutcome::Completed);
        assert_eq!(job.status(), JobStatus::Waiting);
        assert_eq!(job.percent_complete(), 100);
        assert_eq!(job.cluster_set().unwrap()[0].members, vec!["a", "b", "c"]);
        assert!(job.aggregation_result().is_none());

        assert!(matches!(job.run(), Err(AggregationError::AlreadyStarted)));
    }

    #[test]
    fn test_cancelled_run_publishes_nothing() {
        let mut job = AggregationJob::new(Everything { cancel_midway: true });
        job.set_graph(graph());

        assert_eq!(job.run().unwrap(), RunOutcome::Cancelled);
        assert_eq!(job.status(), JobStatus::Waiting);
        assert!(job.cluster_set().is_none());
    }

    #[test]
    fn test_cancel_outside_run_is_rejected() {
        let job = AggregationJob::new(Everything { cancel_midway: false });
        assert!(!job.handle().cancel());
        assert_eq!(job.handle().status(), JobStatus::Waiting);
    }

    #[test]
    fn test_cancel_after_last_checkpoint_is_honored() {
        let mut job = AggregationJob::new(Everything { cancel_midway: false });
        job.set_graph(graph());
        assert!(job.state.begin());
        assert!(job.handle().cancel());

        let clusters = vec![Cluster {
            id: 0,
            members: vec!["a".to_string()],
        }];
        assert_eq!(job.publish(clusters, None), RunOutcome::Cancelled);
        assert!(job.cluster_set().is_none());
        assert_eq!(job.status(), JobStatus::Waiting);
    }

    #[test]
    fn test_acknowledged_cancel_never_completes() {
        for _ in 0..500 {
            let mut job = AggregationJob::new(Everything { cancel_midway: false });
            job.set_graph(graph());
            let handle = job.handle();

            let canceller = std::thread::spawn(move || loop {
                if handle.cancel() {
                    return true;
                }
                if handle.percent_complete() == 100 {
                    return false;
                }
                std::hint::spin_loop();
            });

            let outcome = job.run().unwrap();
            let acknowledged = canceller.join().unwrap();
            if acknowledged {
                assert_eq!(outcome, RunOutcome::Cancelled);
                assert!(job.cluster_set().is_none());
            } else {
                assert_eq!(outcome, RunOutcome::Completed);
            }
        }
    }

    #[test]
    fn test_split_components_numbers_clusters() {
        let mut job =
            AggregationJob::new(Everything { cancel_midway: false }).with_split_components(true);
        job.set_graph(graph());
        job.run().unwrap();

        let clusters = job.cluster_set().unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec!["a", "b"]);
        assert_eq!(clusters[1].id, 1);
        assert_eq!(clusters[1].members, vec!["c"]);
    }

    #[test]
    fn test_context_slices_progress() {
        let state = JobState::new();
        let context = RunContext::new(&state);
        context.slice(1, 4).progress(0.5);
        assert_eq!(state.percent_complete(), 38);
        context.part(0.0, 0.9).progress(1.0);
        assert_eq!(state.percent_complete(), 90);
    }
}
