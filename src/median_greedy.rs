//! Greedy candidate median for the DCJ distance
//!
//! Starts from the best input and repeatedly applies the single DCJ that
//! creates an adjacency (or telomere) of one of the inputs and lowers the
//! summed cost the most. Stops at a local optimum or when the step budget
//! runs out.

use crate::config::{ChromosomeMode, MedianStrategy, PenaltyPolicy};
use crate::distance::{dcj_distance, structural_penalty};
use crate::error::Result;
use crate::genome::{AdjacencySet, Extremity, Genome};
use crate::median::{choose_min, BudgetStatus, MedianOutcome, MedianSolver};
use rand::rngs::StdRng;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy)]
enum Move {
    Join(Extremity, Extremity),
    Cut(Extremity),
}

impl Move {
    fn apply(self, set: &mut AdjacencySet) -> bool {
        match self {
            Move::Join(x, y) => set.apply_join(x, y),
            Move::Cut(x) => set.apply_cut(x),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GreedyMedian {
    penalty: PenaltyPolicy,
    mode: ChromosomeMode,
    budget: usize,
}

impl GreedyMedian {
    pub fn new(penalty: PenaltyPolicy, mode: ChromosomeMode, budget: usize) -> Self {
        GreedyMedian {
            penalty,
            mode,
            budget,
        }
    }

    /// Summed cost to the targets, without the constant target penalties
    fn objective(&self, candidate: &AdjacencySet, targets: &[AdjacencySet]) -> u32 {
        let distance: u32 = targets.iter().map(|t| dcj_distance(candidate, t)).sum();
        distance + targets.len() as u32 * structural_penalty(self.penalty, candidate.chromosome_kinds())
    }

    /// Moves towards any target: missing adjacencies and missing telomeres
    fn candidate_moves(current: &AdjacencySet, targets: &[AdjacencySet]) -> Vec<Move> {
        let mut joins = BTreeSet::new();
        let mut cuts = BTreeSet::new();
        for target in targets {
            for (x, y) in target.adjacencies() {
                if !current.contains(x, y) {
                    joins.insert((x, y));
                }
            }
            for (x, partner) in target.partner.iter().enumerate() {
                if partner.is_none() && current.partner[x].is_some() {
                    cuts.insert(x.min(current.partner[x].unwrap_or(x)));
                }
            }
        }
        joins
            .into_iter()
            .map(|(x, y)| Move::Join(x, y))
            .chain(cuts.into_iter().map(Move::Cut))
            .collect()
    }
}

impl MedianSolver for GreedyMedian {
    fn strategy(&self) -> MedianStrategy {
        MedianStrategy::Greedy
    }

    fn median(&self, inputs: [&Genome; 3], rng: &mut StdRng) -> Result<MedianOutcome> {
        let targets: Vec<AdjacencySet> = inputs.iter().map(|g| AdjacencySet::from_genome(g)).collect();
        let scores: Vec<u32> = targets.iter().map(|t| self.objective(t, &targets)).collect();
        let start = choose_min(&scores, rng).unwrap_or(0);
        let mut current = targets[start].clone();
        let mut current_score = scores[start];

        let mut steps = 0;
        let mut status = BudgetStatus::Completed;
        loop {
            let mut improving = Vec::new();
            let mut improving_scores = Vec::new();
            for step in Self::candidate_moves(&current, &targets) {
                let mut next = current.clone();
                if !step.apply(&mut next) || !self.mode.admits(next.chromosome_kinds()) {
                    continue;
                }
                let score = self.objective(&next, &targets);
                if score < current_score {
                    improving.push(next);
                    improving_scores.push(score);
                }
            }
            if improving.is_empty() {
                break;
            }
            // Only a search that could still improve has run out of budget
            if steps >= self.budget {
                status = BudgetStatus::Exhausted {
                    explored: steps,
                    budget: self.budget,
                };
                break;
            }
            let Some(best) = choose_min(&improving_scores, rng) else {
                break;
            };
            current_score = improving_scores[best];
            current = improving.swap_remove(best);
            steps += 1;
        }

        log::trace!("greedy median: {steps} step(s), objective {current_score}");
        Ok(MedianOutcome {
            genome: Genome::from_adjacencies(&current),
            status,
        })
    }
}
