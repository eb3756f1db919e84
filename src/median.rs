//! Median oracle: given the three neighbours of an internal node, propose a
//! genome approximately minimising the summed cost to all three.
//!
//! Every strategy starts from the best of the three inputs and only returns
//! something else when it is strictly better, so a median is never worse
//! than copying one of its neighbours.

use crate::config::{ChromosomeMode, EngineConfig, MedianStrategy};
use crate::distance::{oracle_for, DistanceOracle};
use crate::error::{PhyloError, Result};
use crate::genome::Genome;
use crate::median_bnb::BranchAndBoundMedian;
use crate::median_consensus::ConsensusMedian;
use crate::median_greedy::GreedyMedian;
use crate::median_local::LocalSearchMedian;
use rand::rngs::StdRng;
use rand::Rng;

/// Whether a median search finished within its work budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    Completed,
    Exhausted { explored: usize, budget: usize },
}

impl BudgetStatus {
    /// The recoverable error describing an exhausted budget
    pub fn as_error(&self) -> Option<PhyloError> {
        match *self {
            BudgetStatus::Completed => None,
            BudgetStatus::Exhausted { explored, budget } => {
                Some(PhyloError::ResourceLimit { explored, budget })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MedianOutcome {
    pub genome: Genome,
    pub status: BudgetStatus,
}

impl MedianOutcome {
    pub fn completed(genome: Genome) -> Self {
        MedianOutcome {
            genome,
            status: BudgetStatus::Completed,
        }
    }
}

pub trait MedianSolver {
    fn strategy(&self) -> MedianStrategy;

    /// Median of three genomes; tie-breaks draw from `rng`
    fn median(&self, inputs: [&Genome; 3], rng: &mut StdRng) -> Result<MedianOutcome>;
}

/// Build the solver selected by the configuration
pub fn solver_for(config: &EngineConfig) -> Box<dyn MedianSolver> {
    match config.strategy {
        MedianStrategy::BranchAndBound => Box::new(BranchAndBoundMedian::new(config.median_budget)),
        MedianStrategy::Greedy => Box::new(GreedyMedian::new(
            config.penalty,
            config.mode,
            config.median_budget,
        )),
        MedianStrategy::Consensus => Box::new(ConsensusMedian::new(oracle_for(config), config.mode)),
        MedianStrategy::Alternative => Box::new(LocalSearchMedian::new(
            oracle_for(config),
            config.mode,
            config.median_budget,
        )),
    }
}

/// Summed cost from `candidate` to every input
pub fn total_cost(candidate: &Genome, inputs: &[&Genome], oracle: &dyn DistanceOracle) -> Result<u32> {
    let mut total = 0;
    for input in inputs {
        total += oracle.cost(candidate, input)?;
    }
    Ok(total)
}

/// Index of the smallest score; ties are broken with the run generator
pub fn choose_min(scores: &[u32], rng: &mut StdRng) -> Option<usize> {
    let min = *scores.iter().min()?;
    let ties: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, &s)| s == min)
        .map(|(i, _)| i)
        .collect();
    if ties.len() == 1 {
        Some(ties[0])
    } else {
        Some(ties[rng.gen_range(0..ties.len())])
    }
}

/// Best of the three inputs as a median, with its summed cost
pub fn best_input(
    inputs: [&Genome; 3],
    oracle: &dyn DistanceOracle,
    rng: &mut StdRng,
) -> Result<(usize, u32)> {
    let scores = inputs
        .iter()
        .map(|g| total_cost(g, &inputs, oracle))
        .collect::<Result<Vec<u32>>>()?;
    let best = choose_min(&scores, rng).unwrap_or(0);
    Ok((best, scores[best]))
}

/// Check that a produced genome is a legal internal-node label
pub fn validate_labeling(genome: &Genome, gene_count: usize, mode: ChromosomeMode) -> Result<()> {
    genome
        .validate_content(gene_count)
        .map_err(|e| PhyloError::InvariantViolation(e.to_string()))?;
    if !mode.admits(genome.chromosome_kinds()) {
        return Err(PhyloError::InvariantViolation(format!(
            "median with {} chromosome(s) is not allowed in {:?} mode",
            genome.chromosome_count(),
            mode
        )));
    }
    Ok(())
}
