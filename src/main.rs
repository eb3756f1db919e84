use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use log::{info, LevelFilter};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use phylorder::condense::CondensationMap;
use phylorder::config::{DEFAULT_MAX_PASSES, DEFAULT_MEDIAN_BUDGET};
use phylorder::dataset::{read_dataset, write_genomes};
use phylorder::distance::oracle_for;
use phylorder::labeling::LabelingOptimizer;
use phylorder::newick::{parse_newick, write_newick};
use phylorder::nj::{neighbor_joining, DistanceMatrix};
use phylorder::tree::Tree;
use phylorder::{ChromosomeMode, EngineConfig, Genome, MedianStrategy, Metric, PenaltyPolicy};

/// phylorder - ancestral gene orders on a fixed phylogeny
///
/// Labels the internal nodes of a tree with genomes minimising the total
/// rearrangement distance (inversion or DCJ) along its edges.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Genome dataset: ">name" lines followed by markers, chromosomes ending in $ or @
    #[clap(short = 'f', long = "dataset")]
    dataset: PathBuf,

    /// Newick topology; neighbor joining builds one when omitted
    #[clap(short = 'k', long = "tree")]
    topology: Option<PathBuf>,

    /// Distance: "rev" (inversion) or "dcj"
    #[clap(short = 'd', long = "distance", default_value = "rev")]
    distance: Metric,

    /// Allow several chromosomes per genome (DCJ only)
    #[clap(short = 'm', long = "multichromosomal")]
    multichromosomal: bool,

    /// Chromosome penalty for DCJ: 0 extra chromosomes, 1 extra circular,
    /// 2 linear and extra circular, 3 mixed linear and circular
    #[clap(short = 'z', long = "penalty", default_value = "none", allow_hyphen_values = true)]
    penalty: PenaltyPolicy,

    /// Seed for tie-breaking (defaults to the current time)
    #[clap(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Median strategy: bnb, greedy, consensus or kovac (default depends on the distance)
    #[clap(long = "median")]
    median: Option<MedianStrategy>,

    /// Maximum number of labeling passes
    #[clap(long = "max-passes", default_value_t = DEFAULT_MAX_PASSES)]
    max_passes: usize,

    /// Work budget of a single median search
    #[clap(long = "median-budget", default_value_t = DEFAULT_MEDIAN_BUDGET)]
    median_budget: usize,

    /// Leaf whose neighbour is the starting node of the tree
    #[clap(long = "outgroup")]
    outgroup: Option<String>,

    /// Report genomes in the original gene IDs instead of condensed blocks
    #[clap(long = "original-ids")]
    original_ids: bool,

    /// Write every node's genome to this file in the dataset format
    #[clap(long = "genomes")]
    genomes: Option<PathBuf>,

    /// Print only the score and elapsed seconds
    #[clap(long = "score-only")]
    score_only: bool,

    /// Number of threads for parallel processing
    #[clap(short = 't', long = "threads", default_value = "8")]
    threads: usize,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[clap(short = 'q', long = "quiet")]
    quiet: bool,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let mode = if self.multichromosomal {
            ChromosomeMode::Multichromosomal
        } else {
            ChromosomeMode::Unichromosomal
        };
        let seed = self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });
        let mut config = EngineConfig::new(self.distance, mode)
            .with_penalty(self.penalty)
            .with_seed(seed);
        if let Some(strategy) = self.median {
            config = config.with_strategy(strategy);
        }
        config.max_passes = self.max_passes;
        config.median_budget = self.median_budget;
        config
    }

    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .format_timestamp(None)
        .init();

    // Reject unsupported combinations before touching any file
    let config = args.engine_config();
    config.validate()?;
    info!(
        "Distance {}, {:?}, median {}, seed {}",
        config.metric, config.mode, config.strategy, config.seed
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    let start = Instant::now();

    let raw = read_dataset(&args.dataset, config.mode)
        .with_context(|| format!("Failed to read dataset {}", args.dataset.display()))?;
    let raw_genomes: Vec<Genome> = raw.values().cloned().collect();
    let map = CondensationMap::build(&raw_genomes)?;
    let mut genomes = IndexMap::with_capacity(raw.len());
    for (name, genome) in &raw {
        genomes.insert(name.clone(), map.condense(genome)?);
    }

    let topology = match &args.topology {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read topology {}", path.display()))?;
            parse_newick(&text)?
        }
        None => {
            info!("No topology given, building one by neighbor joining");
            let oracle = oracle_for(&config);
            neighbor_joining(DistanceMatrix::from_genomes(&genomes, oracle.as_ref())?)?
        }
    };
    let mut tree = Tree::from_topology(&topology, &genomes, args.outgroup.as_deref())?;

    let mut optimizer = LabelingOptimizer::new(&config);
    let report = optimizer.run(&mut tree)?;
    let seconds = start.elapsed().as_secs_f64();
    info!(
        "Score {} after {} pass(es) and {} accepted update(s)",
        report.score, report.passes, report.accepted
    );

    if let Some(path) = &args.genomes {
        let mut out = BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        );
        let mut labeled = Vec::with_capacity(tree.len());
        for (id, node) in tree.nodes() {
            let genome = match raw.get(node.name()) {
                // Leaves are reported exactly as they were read
                Some(leaf) if args.original_ids && node.is_leaf() => leaf.clone(),
                _ if args.original_ids => map.expand(tree.genome(id)?)?,
                _ => tree.genome(id)?.clone(),
            };
            labeled.push((node.name().to_string(), genome));
        }
        write_genomes(&mut out, labeled.iter().map(|(n, g)| (n.as_str(), g)))?;
        out.flush()?;
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.score_only {
        writeln!(out, "{} {:.2}", report.score, seconds)?;
    } else {
        writeln!(out, "{}", write_newick(&tree, true))?;
        writeln!(out, "score: {}", report.score)?;
        writeln!(out, "time: {seconds:.2}s")?;
    }
    Ok(())
}
