//! Distance oracles
//!
//! `distance` is the pure rearrangement distance and satisfies
//! `distance(X, X) == 0`. `cost` adds the structural penalty of each
//! endpoint and is what tree scores and medians minimise.

use crate::config::{EngineConfig, Metric, PenaltyPolicy};
use crate::error::Result;
use crate::genome::{AdjacencySet, Genome};
use crate::inversion;

/// Weight of one structural violation
pub const PENALTY_WEIGHT: u32 = 1;

pub trait DistanceOracle: Send + Sync {
    fn metric(&self) -> Metric;

    fn distance(&self, a: &Genome, b: &Genome) -> Result<u32>;

    /// Structural penalty of a single genome
    fn penalty(&self, _genome: &Genome) -> u32 {
        0
    }

    /// Edge cost: distance plus the penalty of both endpoints
    fn cost(&self, a: &Genome, b: &Genome) -> Result<u32> {
        Ok(self.distance(a, b)? + self.penalty(a) + self.penalty(b))
    }
}

/// Build the oracle selected by the configuration
pub fn oracle_for(config: &EngineConfig) -> Box<dyn DistanceOracle> {
    match config.metric {
        Metric::Dcj => Box::new(DcjDistance::new(config.penalty)),
        Metric::Reversal => Box::new(InversionDistance),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DcjDistance {
    pub penalty: PenaltyPolicy,
}

impl DcjDistance {
    pub fn new(penalty: PenaltyPolicy) -> Self {
        DcjDistance { penalty }
    }
}

impl DistanceOracle for DcjDistance {
    fn metric(&self) -> Metric {
        Metric::Dcj
    }

    fn distance(&self, a: &Genome, b: &Genome) -> Result<u32> {
        let a = AdjacencySet::from_genome(a);
        let b = AdjacencySet::from_genome(b);
        Ok(dcj_distance(&a, &b))
    }

    fn penalty(&self, genome: &Genome) -> u32 {
        structural_penalty(self.penalty, genome.chromosome_kinds())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InversionDistance;

impl DistanceOracle for InversionDistance {
    fn metric(&self) -> Metric {
        Metric::Reversal
    }

    fn distance(&self, a: &Genome, b: &Genome) -> Result<u32> {
        inversion::inversion_distance(a, b)
    }
}

/// Violations counted by `policy` for a genome with (linear, circular) chromosomes
pub fn structural_penalty(policy: PenaltyPolicy, (linear, circular): (usize, usize)) -> u32 {
    let violations = match policy {
        PenaltyPolicy::None => 0,
        PenaltyPolicy::MultipleChromosomes => (linear + circular).saturating_sub(1),
        PenaltyPolicy::MultipleCircular => circular.saturating_sub(1),
        PenaltyPolicy::LinearAndMultipleCircular => linear + circular.saturating_sub(1),
        PenaltyPolicy::MixedLinearCircular => {
            if linear > 0 && circular > 0 {
                linear.min(circular)
            } else {
                0
            }
        }
    };
    violations as u32 * PENALTY_WEIGHT
}

/// DCJ distance `N - (C + I/2)` over the adjacency graph of two genomes
/// with the same gene content
pub fn dcj_distance(a: &AdjacencySet, b: &AdjacencySet) -> u32 {
    let size = a.partner.len();
    let mut visited = vec![false; size];
    let mut cycles = 0usize;
    let mut odd_paths = 0usize;

    // Paths with at least one telomere of A: AA paths are even, AB paths odd
    for start in 0..size {
        if visited[start] || a.partner[start].is_some() {
            continue;
        }
        let mut x = start;
        loop {
            visited[x] = true;
            match b.partner[x] {
                None => {
                    odd_paths += 1;
                    break;
                }
                Some(y) => {
                    visited[y] = true;
                    match a.partner[y] {
                        None => break,
                        Some(z) => x = z,
                    }
                }
            }
        }
    }

    // BB paths contribute nothing, only mark them
    for start in 0..size {
        if visited[start] || b.partner[start].is_some() {
            continue;
        }
        let mut x = start;
        loop {
            visited[x] = true;
            let Some(y) = a.partner[x] else { break };
            visited[y] = true;
            match b.partner[y] {
                Some(z) if !visited[z] => x = z,
                _ => break,
            }
        }
    }

    for start in 0..size {
        if visited[start] {
            continue;
        }
        cycles += 1;
        let mut x = start;
        while !visited[x] {
            visited[x] = true;
            let Some(y) = a.partner[x] else { break };
            visited[y] = true;
            match b.partner[y] {
                Some(z) => x = z,
                None => break,
            }
        }
    }

    (a.gene_count() - cycles - odd_paths / 2) as u32
}
