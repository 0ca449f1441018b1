use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use graph_aggregator::cluster::{utils, ClusterAlgorithm, KSnap, Louvain, Markov, ModularityMatching};
use graph_aggregator::{AggregationConfig, AggregationJob, ClusterConverter, Graph, RunOutcome};
use serde::Serialize;
use std::sync::Arc;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Algorithm {
    Louvain,
    Markov,
    Ksnap,
    Matching,
}

#[derive(Parser, Debug)]
#[clap(
    name = "graph-aggregator",
    about = "Cluster a node-link graph and print its aggregated summary graph"
)]
struct Cli {
    /// Path to input graph JSON file
    #[clap(long)]
    input: String,

    /// Aggregation algorithm
    #[clap(long, value_enum, default_value = "louvain")]
    algorithm: Algorithm,

    /// Optional JSON configuration file
    #[clap(long)]
    config: Option<String>,

    /// Louvain resolution
    #[clap(long)]
    resolution: Option<f64>,

    /// KSnap split iterations, or the Markov iteration cap
    #[clap(long)]
    iterations: Option<usize>,

    /// Matching worker threads (0 = use all available cores)
    #[clap(long)]
    workers: Option<usize>,

    /// Give aggregate nodes random ids
    #[clap(long)]
    anonymize: bool,

    /// Cluster each connected component separately
    #[clap(long)]
    split_components: bool,

    /// Print the cluster set instead of the summary graph
    #[clap(long)]
    clusters_only: bool,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let config = load_config(&args)?;
    config.validate()?;

    log::info!("Starting {:?} aggregation", args.algorithm);
    log::info!("Input: {}", args.input);

    let graph = Arc::new(graph_aggregator::data::load_graph(&args.input)?);

    let output = match args.algorithm {
        Algorithm::Louvain => run_job(Louvain::from_config(&config.louvain), &graph, &config, &args)?,
        Algorithm::Markov => run_job(Markov::from_config(&config.markov), &graph, &config, &args)?,
        Algorithm::Ksnap => run_job(KSnap::from_config(&config.ksnap), &graph, &config, &args)?,
        Algorithm::Matching => {
            log::info!("Using {} matching workers", config.matching.workers);
            run_job(ModularityMatching::from_config(&config.matching)?, &graph, &config, &args)?
        }
    };

    println!("{}", output);
    Ok(())
}

/// Config file (if any) with command-line overrides applied
fn load_config(args: &Cli) -> Result<AggregationConfig> {
    let mut config: AggregationConfig = match &args.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path))?;
            serde_json::from_str(&contents).with_context(|| format!("Malformed config {}", path))?
        }
        None => AggregationConfig::default(),
    };

    if let Some(resolution) = args.resolution {
        config.louvain.resolution = resolution;
    }
    if let Some(iterations) = args.iterations {
        config.ksnap.resolution = iterations;
        config.markov.max_iterations = iterations;
    }
    if let Some(workers) = args.workers {
        config.matching.workers = if workers > 0 { workers } else { num_cpus::get() };
    }
    config.converter.anonymize_ids |= args.anonymize;
    config.split_components |= args.split_components;

    Ok(config)
}

fn run_job<A: ClusterAlgorithm>(
    algorithm: A,
    graph: &Arc<Graph>,
    config: &AggregationConfig,
    args: &Cli,
) -> Result<String> {
    let mut job = AggregationJob::new(algorithm).with_split_components(config.split_components);
    job.set_graph(Arc::clone(graph));

    if !args.clusters_only {
        let ranges = utils::compute_weight_ranges(graph, config.converter.bands);
        job.set_converter(ClusterConverter::from_config(Arc::clone(graph), ranges, &config.converter));
    }

    if job.run()? == RunOutcome::Cancelled {
        return Err(anyhow::anyhow!("Aggregation was cancelled"));
    }

    if args.clusters_only {
        to_json(&job.cluster_set().unwrap_or_default())
    } else {
        let result = job
            .aggregation_result()
            .ok_or_else(|| anyhow::anyhow!("No aggregation result was produced"))?;
        log::info!(
            "Summary graph has {} nodes and {} links",
            result.node_count(),
            result.link_count()
        );
        to_json(result)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
