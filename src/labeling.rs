//! Labeling optimizer for the small phylogeny problem
//!
//! Seeds every internal node with a copy of one of its children, then
//! sweeps the internal nodes in post-order replacing each genome by the
//! median of its three neighbours whenever that strictly lowers the cost
//! of the incident edges. Updates are applied in place, so later nodes in a
//! pass already see earlier replacements. Stops when a whole pass changes
//! nothing or the pass cap is reached.

use crate::config::EngineConfig;
use crate::distance::{oracle_for, DistanceOracle};
use crate::error::{PhyloError, Result};
use crate::genome::Genome;
use crate::median::{choose_min, solver_for, validate_labeling, MedianSolver};
use crate::tree::{NodeId, Tree};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelingState {
    /// Every internal node holds a seed genome
    Initialized,
    /// The last pass accepted at least one update
    Improving,
    /// The last pass accepted nothing
    Converged,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelingReport {
    pub score: u32,
    pub initial_score: u32,
    pub passes: usize,
    pub accepted: usize,
    pub converged: bool,
}

pub struct LabelingOptimizer {
    config: EngineConfig,
    oracle: Box<dyn DistanceOracle>,
    solver: Box<dyn MedianSolver>,
    rng: StdRng,
    state: Option<LabelingState>,
}

impl LabelingOptimizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_solver(config, solver_for(config))
    }

    /// Optimizer driven by an explicit median solver instead of the one the
    /// configuration selects
    pub(crate) fn with_solver(config: &EngineConfig, solver: Box<dyn MedianSolver>) -> Self {
        LabelingOptimizer {
            config: config.clone(),
            oracle: oracle_for(config),
            solver,
            rng: StdRng::seed_from_u64(config.seed),
            state: None,
        }
    }

    pub fn state(&self) -> Option<LabelingState> {
        self.state
    }

    pub fn oracle(&self) -> &dyn DistanceOracle {
        self.oracle.as_ref()
    }

    /// Give every internal node a copy of the labeled neighbour genome that
    /// is cheapest against all labeled neighbours
    pub fn initialize(&mut self, tree: &mut Tree) -> Result<()> {
        for (node, _) in tree.post_order() {
            let labeled: Vec<&Genome> = tree
                .neighbors(node)
                .iter()
                .filter_map(|&n| tree.node(n).genome())
                .collect();
            if labeled.is_empty() {
                return Err(PhyloError::InvariantViolation(format!(
                    "internal node {} has no labeled neighbour",
                    tree.node(node).name()
                )));
            }
            let mut scores = Vec::with_capacity(labeled.len());
            for candidate in &labeled {
                let mut total = 0;
                for other in &labeled {
                    total += self.oracle.cost(candidate, other)?;
                }
                scores.push(total);
            }
            let pick = choose_min(&scores, &mut self.rng).unwrap_or(0);
            let seed = labeled[pick].clone();
            tree.set_genome(node, seed)?;
        }
        self.state = Some(LabelingState::Initialized);
        Ok(())
    }

    /// One sweep over the internal nodes; returns the number of accepted updates
    pub fn pass(&mut self, tree: &mut Tree) -> Result<usize> {
        let gene_count = gene_count(tree)?;
        let mut accepted = 0;
        for (node, _) in tree.post_order() {
            let &[a, b, c] = tree.neighbors(node) else {
                return Err(PhyloError::InvariantViolation(format!(
                    "internal node {} does not have three neighbours",
                    tree.node(node).name()
                )));
            };
            let inputs = [tree.genome(a)?, tree.genome(b)?, tree.genome(c)?];
            let outcome = self.solver.median(inputs, &mut self.rng)?;
            if let Some(limit) = outcome.status.as_error() {
                warn!(
                    "Median at {}: {limit}; using the best candidate found",
                    tree.node(node).name()
                );
            }
            validate_labeling(&outcome.genome, gene_count, self.config.mode)?;

            let current = tree.local_cost(node, tree.genome(node)?, self.oracle.as_ref())?;
            let proposed = tree.local_cost(node, &outcome.genome, self.oracle.as_ref())?;
            if proposed < current {
                debug!(
                    "Updated {}: local cost {current} -> {proposed}",
                    tree.node(node).name()
                );
                tree.set_genome(node, outcome.genome)?;
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Initialize and iterate passes until convergence or the pass cap
    pub fn run(&mut self, tree: &mut Tree) -> Result<LabelingReport> {
        self.initialize(tree)?;
        let initial_score = tree.score(self.oracle.as_ref())?;
        info!(
            "Initial labeling of {} internal node(s), score {initial_score}",
            tree.internal_nodes().count()
        );

        let mut score = initial_score;
        let mut passes = 0;
        let mut accepted = 0;
        while passes < self.config.max_passes {
            let changed = self.pass(tree)?;
            passes += 1;
            accepted += changed;

            let next = tree.score(self.oracle.as_ref())?;
            if next > score {
                return Err(PhyloError::InvariantViolation(format!(
                    "tree score rose from {score} to {next} in pass {passes}"
                )));
            }
            score = next;
            info!("Pass {passes}: {changed} update(s), score {score}");

            if changed == 0 {
                self.state = Some(LabelingState::Converged);
                break;
            }
            self.state = Some(LabelingState::Improving);
        }

        let converged = self.state == Some(LabelingState::Converged);
        if !converged {
            warn!(
                "Stopped after {passes} pass(es) without converging (--max-passes {})",
                self.config.max_passes
            );
        }
        self.state = Some(LabelingState::Done);
        Ok(LabelingReport {
            score,
            initial_score,
            passes,
            accepted,
            converged,
        })
    }
}

fn gene_count(tree: &Tree) -> Result<usize> {
    tree.nodes()
        .find_map(|(_, node)| node.genome().filter(|_| node.is_leaf()))
        .map(Genome::gene_count)
        .ok_or_else(|| PhyloError::InvariantViolation("tree has no labeled leaf".into()))
}

/// Internal nodes with the genome currently assigned to them
pub fn ancestors(tree: &Tree) -> Result<Vec<(NodeId, &Genome)>> {
    tree.internal_nodes()
        .map(|id| Ok((id, tree.genome(id)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChromosomeMode, MedianStrategy, Metric};
    use crate::median::MedianOutcome;
    use crate::newick::parse_newick;
    use indexmap::IndexMap;
    use rand::Rng;

    fn dataset(genomes: &[(&str, Vec<i32>)]) -> IndexMap<String, Genome> {
        genomes
            .iter()
            .map(|(name, markers)| (name.to_string(), Genome::linear(markers.clone()).with_name(*name)))
            .collect()
    }

    fn shuffled(n: i32, inversions: usize, rng: &mut StdRng) -> Vec<i32> {
        let mut markers: Vec<i32> = (1..=n).collect();
        for _ in 0..inversions {
            let i = rng.gen_range(0..n as usize);
            let j = rng.gen_range(i..n as usize);
            markers[i..=j].reverse();
            for m in &mut markers[i..=j] {
                *m = -*m;
            }
        }
        markers
    }

    #[test]
    fn test_two_pairs_converge_in_one_pass() {
        let genomes = dataset(&[
            ("A", vec![1, 2, 3, 4, 5]),
            ("B", vec![1, 2, 3, 4, 5]),
            ("C", vec![1, -3, -2, 4, 5]),
            ("D", vec![1, -3, -2, 4, 5]),
        ]);
        let topology = parse_newick("((A,B),(C,D));").unwrap();
        let mut tree = Tree::from_topology(&topology, &genomes, None).unwrap();
        let config = EngineConfig::new(Metric::Dcj, ChromosomeMode::Unichromosomal).with_seed(1);
        let mut optimizer = LabelingOptimizer::new(&config);
        let report = optimizer.run(&mut tree).unwrap();

        assert_eq!(report.passes, 1);
        assert_eq!(report.accepted, 0);
        assert!(report.converged);
        assert_eq!(report.score, 1);
        assert_eq!(optimizer.state(), Some(LabelingState::Done));
        let a = tree.genome(tree.leaf("A").unwrap()).unwrap();
        let b = tree.genome(tree.leaf("B").unwrap()).unwrap();
        assert_eq!(optimizer.oracle().distance(a, b).unwrap(), 0);
    }

    #[test]
    fn test_score_never_rises_and_run_converges() {
        let mut rng = StdRng::seed_from_u64(42);
        let names = ["A", "B", "C", "D", "E", "F"];
        let genomes: Vec<(&str, Vec<i32>)> = names.iter().map(|&n| (n, shuffled(8, 3, &mut rng))).collect();
        let genomes = dataset(&genomes);
        let topology = parse_newick("(A,(B,(C,D)),(E,F));").unwrap();

        for strategy in [MedianStrategy::Greedy, MedianStrategy::Consensus] {
            let config = EngineConfig::new(Metric::Dcj, ChromosomeMode::Unichromosomal)
                .with_strategy(strategy)
                .with_seed(3);
            let mut tree = Tree::from_topology(&topology, &genomes, Some("A")).unwrap();
            let report = LabelingOptimizer::new(&config).run(&mut tree).unwrap();
            assert!(report.converged, "{strategy} did not converge");
            assert!(report.score <= report.initial_score);
            for (_, genome) in ancestors(&tree).unwrap() {
                validate_labeling(genome, 8, config.mode).unwrap();
            }
        }
    }

    #[test]
    fn test_same_seed_same_labeling() {
        let mut rng = StdRng::seed_from_u64(8);
        let names = ["A", "B", "C", "D", "E"];
        let genomes: Vec<(&str, Vec<i32>)> = names.iter().map(|&n| (n, shuffled(7, 2, &mut rng))).collect();
        let genomes = dataset(&genomes);
        let topology = parse_newick("((A,B),C,(D,E));").unwrap();
        let config = EngineConfig::new(Metric::Reversal, ChromosomeMode::Unichromosomal).with_seed(99);

        let run = || {
            let mut tree = Tree::from_topology(&topology, &genomes, None).unwrap();
            let report = LabelingOptimizer::new(&config).run(&mut tree).unwrap();
            let labels: Vec<String> = ancestors(&tree)
                .unwrap()
                .into_iter()
                .map(|(_, g)| g.to_string())
                .collect();
            (report, labels)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_pass_cap_stops_the_run() {
        let genomes = dataset(&[
            ("A", vec![1, 2, 3, 4, 5, 6]),
            ("B", vec![-2, -1, 3, 4, 5, 6]),
            ("C", vec![1, 2, -4, -3, 5, 6]),
            ("D", vec![1, 2, 3, 4, -6, -5]),
        ]);
        let topology = parse_newick("((A,B),(C,D));").unwrap();
        let mut tree = Tree::from_topology(&topology, &genomes, None).unwrap();
        let mut config = EngineConfig::new(Metric::Dcj, ChromosomeMode::Unichromosomal);
        config.max_passes = 1;
        let report = LabelingOptimizer::new(&config).run(&mut tree).unwrap();
        assert_eq!(report.passes, 1);
        assert!(report.score <= report.initial_score);
    }

    /// Returns a genome that lost its last gene
    struct DroppingMedian;

    impl MedianSolver for DroppingMedian {
        fn strategy(&self) -> MedianStrategy {
            MedianStrategy::Greedy
        }

        fn median(&self, inputs: [&Genome; 3], _rng: &mut StdRng) -> Result<MedianOutcome> {
            let mut markers: Vec<i32> = inputs[0].markers().collect();
            let last = markers.len();
            markers.retain(|m| m.unsigned_abs() as usize != last);
            Ok(MedianOutcome::completed(Genome::linear(markers)))
        }
    }

    #[test]
    fn test_invalid_median_aborts_the_run() {
        let genomes = dataset(&[
            ("A", vec![1, 2, 3, 4, 5]),
            ("B", vec![1, -2, 3, 4, 5]),
            ("C", vec![1, -3, -2, 4, 5]),
            ("D", vec![5, 4, 3, 2, 1]),
        ]);
        let topology = parse_newick("((A,B),(C,D));").unwrap();
        let mut tree = Tree::from_topology(&topology, &genomes, None).unwrap();
        let config = EngineConfig::new(Metric::Dcj, ChromosomeMode::Unichromosomal).with_seed(2);
        let mut optimizer = LabelingOptimizer::with_solver(&config, Box::new(DroppingMedian));

        let result = optimizer.run(&mut tree);
        assert!(matches!(result, Err(PhyloError::InvariantViolation(_))));
        assert_eq!(optimizer.state(), Some(LabelingState::Initialized));
        for (_, genome) in ancestors(&tree).unwrap() {
            validate_labeling(genome, 5, config.mode).unwrap();
        }
    }
}
