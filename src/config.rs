//! Engine configuration
//!
//! Built once from the command line, validated before any input is read and
//! then passed by reference to the oracles and the optimizer.

use crate::error::{PhyloError, Result};
use std::fmt;
use std::str::FromStr;

/// Default cap on labeling passes
pub const DEFAULT_MAX_PASSES: usize = 1000;

/// Default work budget for a single median search
pub const DEFAULT_MEDIAN_BUDGET: usize = 100_000;

/// Rearrangement distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Inversion (reversal) distance, unichromosomal linear genomes only
    Reversal,
    /// Double-cut-and-join distance
    Dcj,
}

impl FromStr for Metric {
    type Err = PhyloError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rev" | "reversal" | "inversion" => Ok(Metric::Reversal),
            "dcj" => Ok(Metric::Dcj),
            _ => Err(PhyloError::UnsupportedConfiguration(format!(
                "unknown distance '{s}'. Use rev or dcj"
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Reversal => write!(f, "rev"),
            Metric::Dcj => write!(f, "dcj"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromosomeMode {
    Unichromosomal,
    Multichromosomal,
}

impl ChromosomeMode {
    /// Whether a genome with the given (linear, circular) chromosome counts
    /// is a legal labeling in this mode
    pub fn admits(self, (linear, circular): (usize, usize)) -> bool {
        match self {
            ChromosomeMode::Unichromosomal => linear + circular == 1,
            ChromosomeMode::Multichromosomal => linear + circular >= 1,
        }
    }
}

/// Structural penalty on chromosome organisation, DCJ only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyPolicy {
    None,
    /// Every chromosome beyond the first
    MultipleChromosomes,
    /// Every circular chromosome beyond the first
    MultipleCircular,
    /// Every linear chromosome, plus every circular chromosome beyond the first
    LinearAndMultipleCircular,
    /// Genomes mixing linear and circular chromosomes
    MixedLinearCircular,
}

impl FromStr for PenaltyPolicy {
    type Err = PhyloError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" | "-1" => Ok(PenaltyPolicy::None),
            "0" => Ok(PenaltyPolicy::MultipleChromosomes),
            "1" => Ok(PenaltyPolicy::MultipleCircular),
            "2" => Ok(PenaltyPolicy::LinearAndMultipleCircular),
            "3" => Ok(PenaltyPolicy::MixedLinearCircular),
            _ => Err(PhyloError::UnsupportedConfiguration(format!(
                "unknown penalty type '{s}'. Use 0, 1, 2 or 3"
            ))),
        }
    }
}

/// Median construction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedianStrategy {
    BranchAndBound,
    Greedy,
    Consensus,
    Alternative,
}

impl MedianStrategy {
    pub fn default_for(metric: Metric) -> Self {
        match metric {
            Metric::Reversal => MedianStrategy::BranchAndBound,
            Metric::Dcj => MedianStrategy::Greedy,
        }
    }
}

impl FromStr for MedianStrategy {
    type Err = PhyloError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bnb" | "branch-and-bound" | "caprara" => Ok(MedianStrategy::BranchAndBound),
            "greedy" | "greedy-candidates" => Ok(MedianStrategy::Greedy),
            "consensus" | "blanchette" => Ok(MedianStrategy::Consensus),
            "alternative" | "kovac" => Ok(MedianStrategy::Alternative),
            _ => Err(PhyloError::UnsupportedConfiguration(format!(
                "unknown median strategy '{s}'. Use bnb, greedy, consensus or kovac"
            ))),
        }
    }
}

impl fmt::Display for MedianStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MedianStrategy::BranchAndBound => write!(f, "bnb"),
            MedianStrategy::Greedy => write!(f, "greedy"),
            MedianStrategy::Consensus => write!(f, "consensus"),
            MedianStrategy::Alternative => write!(f, "kovac"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub metric: Metric,
    pub mode: ChromosomeMode,
    pub penalty: PenaltyPolicy,
    pub strategy: MedianStrategy,
    pub seed: u64,
    pub max_passes: usize,
    pub median_budget: usize,
}

impl EngineConfig {
    pub fn new(metric: Metric, mode: ChromosomeMode) -> Self {
        EngineConfig {
            metric,
            mode,
            penalty: PenaltyPolicy::None,
            strategy: MedianStrategy::default_for(metric),
            seed: 0,
            max_passes: DEFAULT_MAX_PASSES,
            median_budget: DEFAULT_MEDIAN_BUDGET,
        }
    }

    pub fn with_penalty(mut self, penalty: PenaltyPolicy) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_strategy(mut self, strategy: MedianStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject unsupported combinations before any input is touched
    pub fn validate(&self) -> Result<()> {
        if self.metric == Metric::Reversal && self.mode == ChromosomeMode::Multichromosomal {
            return Err(PhyloError::UnsupportedConfiguration(
                "the reversal distance does not support multiple-chromosome genomes".into(),
            ));
        }
        if self.metric == Metric::Reversal && self.penalty != PenaltyPolicy::None {
            return Err(PhyloError::UnsupportedConfiguration(
                "the reversal distance does not support chromosome penalties".into(),
            ));
        }
        match (self.strategy, self.metric) {
            (MedianStrategy::BranchAndBound, Metric::Dcj) => {
                return Err(PhyloError::UnsupportedConfiguration(
                    "branch-and-bound medians require the reversal distance".into(),
                ))
            }
            (MedianStrategy::Greedy, Metric::Reversal) => {
                return Err(PhyloError::UnsupportedConfiguration(
                    "greedy candidate medians require the DCJ distance".into(),
                ))
            }
            _ => {}
        }
        if self.max_passes == 0 {
            return Err(PhyloError::UnsupportedConfiguration(
                "max passes must be at least 1".into(),
            ));
        }
        if self.median_budget == 0 {
            return Err(PhyloError::UnsupportedConfiguration(
                "median budget must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
