//! Local-search median
//!
//! Steepest descent from each input over the full one-operation
//! neighbourhood: every reversal for the reversal distance, every DCJ for
//! the DCJ distance. Slower than the dedicated strategies but works for
//! both metrics. `budget` caps the number of accepted moves per descent.

use crate::config::{ChromosomeMode, MedianStrategy, Metric};
use crate::distance::DistanceOracle;
use crate::error::Result;
use crate::genome::{AdjacencySet, Chromosome, Genome};
use crate::median::{choose_min, total_cost, BudgetStatus, MedianOutcome, MedianSolver};
use rand::rngs::StdRng;

pub struct LocalSearchMedian {
    oracle: Box<dyn DistanceOracle>,
    mode: ChromosomeMode,
    budget: usize,
}

/// Every genome one reversal away from a single-chromosome genome
fn reversal_neighbours(genome: &Genome) -> Vec<Genome> {
    let Some(chromosome) = genome.chromosomes.first() else {
        return Vec::new();
    };
    let n = chromosome.len();
    let mut neighbours = Vec::with_capacity(n * (n + 1) / 2);
    for i in 0..n {
        for j in i..n {
            let mut markers = chromosome.markers.clone();
            markers[i..=j].reverse();
            for m in &mut markers[i..=j] {
                *m = -*m;
            }
            neighbours.push(Genome::new(vec![Chromosome::new(chromosome.kind, markers)]));
        }
    }
    neighbours
}

/// Every genome one DCJ away: all joins and all cuts
fn dcj_neighbours(genome: &Genome) -> Vec<Genome> {
    let set = AdjacencySet::from_genome(genome);
    let size = set.partner.len();
    let mut neighbours = Vec::new();
    for x in 0..size {
        for y in x + 1..size {
            let mut next = set.clone();
            if next.apply_join(x, y) {
                neighbours.push(Genome::from_adjacencies(&next));
            }
        }
    }
    for (x, _) in set.adjacencies() {
        let mut next = set.clone();
        if next.apply_cut(x) {
            neighbours.push(Genome::from_adjacencies(&next));
        }
    }
    neighbours
}

impl LocalSearchMedian {
    pub fn new(oracle: Box<dyn DistanceOracle>, mode: ChromosomeMode, budget: usize) -> Self {
        LocalSearchMedian {
            oracle,
            mode,
            budget,
        }
    }

    fn neighbours(&self, genome: &Genome) -> Vec<Genome> {
        match self.oracle.metric() {
            Metric::Reversal => reversal_neighbours(genome),
            Metric::Dcj => dcj_neighbours(genome),
        }
    }

    /// Descend from `start` until no neighbour improves
    fn descend(
        &self,
        start: &Genome,
        inputs: [&Genome; 3],
        rng: &mut StdRng,
    ) -> Result<(Genome, u32, BudgetStatus)> {
        let mut current = start.clone();
        let mut current_score = total_cost(&current, &inputs, self.oracle.as_ref())?;
        let mut steps = 0;
        loop {
            let mut improving = Vec::new();
            let mut scores = Vec::new();
            for neighbour in self.neighbours(&current) {
                if !self.mode.admits(neighbour.chromosome_kinds()) {
                    continue;
                }
                let score = total_cost(&neighbour, &inputs, self.oracle.as_ref())?;
                if score < current_score {
                    improving.push(neighbour);
                    scores.push(score);
                }
            }
            if improving.is_empty() {
                return Ok((current, current_score, BudgetStatus::Completed));
            }
            if steps >= self.budget {
                let status = BudgetStatus::Exhausted {
                    explored: steps,
                    budget: self.budget,
                };
                return Ok((current, current_score, status));
            }
            let Some(best) = choose_min(&scores, rng) else {
                return Ok((current, current_score, BudgetStatus::Completed));
            };
            current_score = scores[best];
            current = improving.swap_remove(best);
            steps += 1;
        }
    }
}

impl MedianSolver for LocalSearchMedian {
    fn strategy(&self) -> MedianStrategy {
        MedianStrategy::Alternative
    }

    fn median(&self, inputs: [&Genome; 3], rng: &mut StdRng) -> Result<MedianOutcome> {
        let mut results = Vec::with_capacity(3);
        for start in inputs {
            results.push(self.descend(start, inputs, rng)?);
        }
        let scores: Vec<u32> = results.iter().map(|(_, score, _)| *score).collect();
        let best = choose_min(&scores, rng).unwrap_or(0);
        let (genome, score, status) = results.swap_remove(best);
        log::trace!("local-search median: score {score}");
        Ok(MedianOutcome { genome, status })
    }
}
