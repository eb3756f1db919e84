//! Branch-and-bound median for the reversal distance
//!
//! Builds the median chromosome left to right. Each step prefers genes
//! that follow the current one in some input, most supported first, and
//! falls back to every unused signed gene when no input suggests one. A
//! partial median is pruned when half its breakpoints against each input
//! already reach the best score found. The search stops early at the
//! triangle lower bound and gives up after `budget` search nodes.

use crate::config::MedianStrategy;
use crate::error::Result;
use crate::genome::{Genome, Marker};
use crate::inversion::{inversion_distance_markers, single_linear};
use crate::median::{choose_min, BudgetStatus, MedianOutcome, MedianSolver};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone)]
pub struct BranchAndBoundMedian {
    budget: usize,
}

impl BranchAndBoundMedian {
    pub fn new(budget: usize) -> Self {
        BranchAndBoundMedian { budget }
    }
}

/// Successor of every signed marker in one input, read in both directions.
/// Markers 0 and n+1 frame the chromosome.
struct Successors {
    n: i32,
    next: Vec<Marker>,
}

impl Successors {
    fn new(markers: &[Marker]) -> Self {
        let n = markers.len() as i32;
        let mut framed = Vec::with_capacity(markers.len() + 2);
        framed.push(0);
        framed.extend_from_slice(markers);
        framed.push(n + 1);

        let mut next = vec![0; 2 * markers.len() + 3];
        let mut successors = Successors { n, next: Vec::new() };
        for pair in framed.windows(2) {
            next[successors.index(pair[0])] = pair[1];
            next[successors.index(-pair[1])] = -pair[0];
        }
        successors.next = next;
        successors
    }

    fn index(&self, marker: Marker) -> usize {
        (marker + self.n + 1) as usize
    }

    fn after(&self, marker: Marker) -> Marker {
        self.next[self.index(marker)]
    }

    /// Whether `a` followed by `b` breaks an adjacency of this input
    fn breakpoint(&self, a: Marker, b: Marker) -> bool {
        self.after(a) != b
    }
}

struct Search<'a> {
    targets: [&'a [Marker]; 3],
    successors: [Successors; 3],
    budget: usize,
    lower_bound: u32,
    best: Vec<Marker>,
    best_score: u32,
    explored: usize,
    prefix: Vec<Marker>,
    used: Vec<bool>,
    rng: &'a mut StdRng,
}

impl Search<'_> {
    fn done(&self) -> bool {
        self.best_score <= self.lower_bound || self.explored >= self.budget
    }

    fn score(&self, markers: &[Marker]) -> Result<u32> {
        let mut total = 0;
        for target in self.targets {
            total += inversion_distance_markers(markers, target)?;
        }
        Ok(total)
    }

    /// Next genes suggested by the inputs, most supported first
    fn supported_children(&mut self, last: Marker) -> Vec<Marker> {
        let mut suggested: Vec<(Marker, usize)> = Vec::new();
        let mut push = |marker: Marker, used: &[bool]| {
            let gene = marker.unsigned_abs() as usize;
            if gene == 0 || gene >= used.len() || used[gene] {
                return;
            }
            match suggested.iter_mut().find(|(m, _)| *m == marker) {
                Some((_, support)) => *support += 1,
                None => suggested.push((marker, 1)),
            }
        };
        for successors in &self.successors {
            push(successors.after(last), &self.used);
            if last == 0 {
                // A chromosome may also be entered from its right end
                push(successors.after(-(successors.n + 1)), &self.used);
            }
        }
        suggested.shuffle(&mut *self.rng);
        suggested.sort_by(|a, b| b.1.cmp(&a.1));
        suggested.into_iter().map(|(m, _)| m).collect()
    }

    fn all_children(&mut self) -> Vec<Marker> {
        let mut children: Vec<Marker> = (1..self.used.len())
            .filter(|&g| !self.used[g])
            .flat_map(|g| [g as Marker, -(g as Marker)])
            .collect();
        children.shuffle(&mut *self.rng);
        children
    }

    /// Internal breakpoints only: frame adjacencies change with the
    /// reading direction and would overcount.
    fn explore(&mut self, breakpoints: [u32; 3]) -> Result<()> {
        self.explored += 1;
        if self.prefix.len() == self.used.len() - 1 {
            let score = self.score(&self.prefix)?;
            if score < self.best_score {
                self.best_score = score;
                self.best = self.prefix.clone();
            }
            return Ok(());
        }

        let last = self.prefix.last().copied().unwrap_or(0);
        let mut children = self.supported_children(last);
        if children.is_empty() {
            children = self.all_children();
        }

        for child in children {
            if self.done() {
                break;
            }
            let mut next = breakpoints;
            if last != 0 {
                for (count, successors) in next.iter_mut().zip(&self.successors) {
                    *count += u32::from(successors.breakpoint(last, child));
                }
            }
            let bound: u32 = next.iter().map(|b| b.div_ceil(2)).sum();
            if bound >= self.best_score {
                continue;
            }
            self.used[child.unsigned_abs() as usize] = true;
            self.prefix.push(child);
            self.explore(next)?;
            self.prefix.pop();
            self.used[child.unsigned_abs() as usize] = false;
        }
        Ok(())
    }
}

impl MedianSolver for BranchAndBoundMedian {
    fn strategy(&self) -> MedianStrategy {
        MedianStrategy::BranchAndBound
    }

    fn median(&self, inputs: [&Genome; 3], rng: &mut StdRng) -> Result<MedianOutcome> {
        let targets = [
            single_linear(inputs[0])?,
            single_linear(inputs[1])?,
            single_linear(inputs[2])?,
        ];
        let d01 = inversion_distance_markers(targets[0], targets[1])?;
        let d02 = inversion_distance_markers(targets[0], targets[2])?;
        let d12 = inversion_distance_markers(targets[1], targets[2])?;
        let scores = [d01 + d02, d01 + d12, d02 + d12];
        let start = choose_min(&scores, rng).unwrap_or(0);

        let mut search = Search {
            targets,
            successors: targets.map(Successors::new),
            budget: self.budget,
            lower_bound: (d01 + d02 + d12).div_ceil(2),
            best: targets[start].to_vec(),
            best_score: scores[start],
            explored: 0,
            prefix: Vec::with_capacity(targets[0].len()),
            used: vec![false; targets[0].len() + 1],
            rng,
        };
        if !search.done() {
            search.explore([0; 3])?;
        }

        let status = if search.explored >= self.budget && search.best_score > search.lower_bound {
            BudgetStatus::Exhausted {
                explored: search.explored,
                budget: self.budget,
            }
        } else {
            BudgetStatus::Completed
        };
        log::trace!(
            "branch-and-bound median: {} node(s), score {} (lower bound {})",
            search.explored,
            search.best_score,
            search.lower_bound
        );
        Ok(MedianOutcome {
            genome: Genome::linear(search.best),
            status,
        })
    }
}
