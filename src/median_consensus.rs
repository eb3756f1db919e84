//! Consensus median from majority adjacencies
//!
//! Adjacencies present in at least two inputs are kept; such a set is
//! always consistent because every extremity has one partner per input.
//! Remaining free extremities are filled from the inputs in turn, once per
//! choice of leading input. In unichromosomal mode the fragments are then
//! stitched back into one chromosome following the leading input. The best
//! of these candidates and the inputs themselves is returned.

use crate::config::{ChromosomeMode, MedianStrategy};
use crate::distance::DistanceOracle;
use crate::error::Result;
use crate::genome::{AdjacencySet, Chromosome, ChromosomeKind, Genome, Marker};
use crate::median::{choose_min, total_cost, MedianOutcome, MedianSolver};
use rand::rngs::StdRng;

pub struct ConsensusMedian {
    oracle: Box<dyn DistanceOracle>,
    mode: ChromosomeMode,
}

impl ConsensusMedian {
    pub fn new(oracle: Box<dyn DistanceOracle>, mode: ChromosomeMode) -> Self {
        ConsensusMedian { oracle, mode }
    }
}

fn support(sets: &[AdjacencySet], x: usize, y: usize) -> usize {
    sets.iter().filter(|s| s.contains(x, y)).count()
}

fn majority(sets: &[AdjacencySet]) -> AdjacencySet {
    let mut consensus = AdjacencySet::new(sets[0].gene_count());
    for set in sets {
        for (x, y) in set.adjacencies() {
            if support(sets, x, y) * 2 > sets.len() {
                consensus.join(x, y);
            }
        }
    }
    consensus
}

/// Complete `base` with every compatible adjacency of the inputs in `order`
fn fill(base: &AdjacencySet, sets: &[AdjacencySet], order: &[usize]) -> AdjacencySet {
    let mut filled = base.clone();
    for &i in order {
        for (x, y) in sets[i].adjacencies() {
            if filled.partner[x].is_none() && filled.partner[y].is_none() {
                filled.join(x, y);
            }
        }
    }
    filled
}

/// Open a circular fragment at its least supported adjacency
fn linearize(markers: &[Marker], sets: &[AdjacencySet]) -> Vec<Marker> {
    use crate::genome::{left_extremity, right_extremity};
    let k = markers.len();
    let weakest = (0..k)
        .min_by_key(|&i| {
            let next = markers[(i + 1) % k];
            support(sets, right_extremity(markers[i]), left_extremity(next))
        })
        .unwrap_or(k - 1);
    markers[weakest + 1..]
        .iter()
        .chain(&markers[..=weakest])
        .copied()
        .collect()
}

/// Join fragments into a single chromosome laid out like `reference`
fn stitch(fragments: Vec<Chromosome>, reference: &Genome, sets: &[AdjacencySet]) -> Genome {
    let n = reference.gene_count();
    let mut position = vec![(0usize, 0i32); n + 1];
    for (i, marker) in reference.markers().enumerate() {
        position[marker.unsigned_abs() as usize] = (i, marker.signum());
    }

    let mut pieces: Vec<(usize, Vec<Marker>)> = fragments
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(|c| {
            let mut markers = if c.is_circular() {
                linearize(&c.markers, sets)
            } else {
                c.markers
            };
            let agreeing = markers
                .iter()
                .filter(|&&m| m.signum() == position[m.unsigned_abs() as usize].1)
                .count();
            if agreeing * 2 < markers.len() {
                markers.reverse();
                for m in &mut markers {
                    *m = -*m;
                }
            }
            let first = markers
                .iter()
                .map(|m| position[m.unsigned_abs() as usize].0)
                .min()
                .unwrap_or(0);
            (first, markers)
        })
        .collect();
    pieces.sort_by_key(|(first, _)| *first);

    let markers: Vec<Marker> = pieces.into_iter().flat_map(|(_, m)| m).collect();
    let kind = reference
        .chromosomes
        .first()
        .map(|c| c.kind)
        .unwrap_or(ChromosomeKind::Linear);
    Genome::new(vec![Chromosome::new(kind, markers)])
}

impl MedianSolver for ConsensusMedian {
    fn strategy(&self) -> MedianStrategy {
        MedianStrategy::Consensus
    }

    fn median(&self, inputs: [&Genome; 3], rng: &mut StdRng) -> Result<MedianOutcome> {
        let sets: Vec<AdjacencySet> = inputs.iter().map(|g| AdjacencySet::from_genome(g)).collect();
        let base = majority(&sets);

        let mut candidates: Vec<Genome> = inputs.iter().map(|g| (*g).clone()).collect();
        for lead in 0..3 {
            let order = [lead, (lead + 1) % 3, (lead + 2) % 3];
            let filled = Genome::from_adjacencies(&fill(&base, &sets, &order));
            let candidate = match self.mode {
                ChromosomeMode::Multichromosomal => filled,
                ChromosomeMode::Unichromosomal => stitch(filled.chromosomes, inputs[lead], &sets),
            };
            candidates.push(candidate);
        }

        let scores = candidates
            .iter()
            .map(|c| total_cost(c, &inputs, self.oracle.as_ref()))
            .collect::<Result<Vec<u32>>>()?;
        let best = choose_min(&scores, rng).unwrap_or(0);
        log::trace!("consensus median: candidate {best} of {}, score {}", candidates.len(), scores[best]);
        Ok(MedianOutcome::completed(candidates.swap_remove(best)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PenaltyPolicy;
    use crate::distance::{DcjDistance, InversionDistance};
    use rand::SeedableRng;

    #[test]
    fn test_majority_adjacencies_are_consistent() {
        let a = AdjacencySet::from_genome(&Genome::linear(vec![1, 2, 3, 4]));
        let b = AdjacencySet::from_genome(&Genome::linear(vec![1, -2, 3, 4]));
        let c = AdjacencySet::from_genome(&Genome::linear(vec![2, 1, 3, 4]));
        let consensus = majority(&[a, b, c]);
        for (x, partner) in consensus.partner.iter().enumerate() {
            if let Some(y) = partner {
                assert_eq!(consensus.partner[*y], Some(x));
            }
        }
        // 3-4 is shared by all three inputs
        assert!(consensus.contains(5, 6));
    }

    #[test]
    fn test_linearize_breaks_weakest_adjacency() {
        let sets = vec![AdjacencySet::from_genome(&Genome::linear(vec![1, 2, 3]))];
        // In the cycle 1 2 3, only 3->1 is unsupported
        assert_eq!(linearize(&[2, 3, 1], &sets), vec![1, 2, 3]);
    }

    #[test]
    fn test_reversal_consensus_is_unichromosomal() {
        let a = Genome::linear(vec![1, 2, 3, 4, 5, 6]);
        let b = Genome::linear(vec![4, 5, 6, 1, 2, 3]);
        let c = Genome::linear(vec![-3, -2, -1, 4, 5, 6]);
        let solver = ConsensusMedian::new(Box::new(InversionDistance), ChromosomeMode::Unichromosomal);
        let outcome = solver
            .median([&a, &b, &c], &mut StdRng::seed_from_u64(5))
            .unwrap();
        outcome.genome.validate_content(6).unwrap();
        assert_eq!(outcome.genome.chromosome_count(), 1);
        let best_input = [&a, &b, &c]
            .iter()
            .map(|g| total_cost(g, &[&a, &b, &c], &InversionDistance).unwrap())
            .min()
            .unwrap();
        let got = total_cost(&outcome.genome, &[&a, &b, &c], &InversionDistance).unwrap();
        assert!(got <= best_input);
    }

    #[test]
    fn test_multichromosomal_consensus_keeps_shared_split() {
        let split = Genome::new(vec![Chromosome::linear(vec![1, 2]), Chromosome::linear(vec![3, 4])]);
        let other = Genome::new(vec![Chromosome::linear(vec![1, 2]), Chromosome::linear(vec![-4, -3])]);
        let whole = Genome::linear(vec![1, 2, 3, 4]);
        let oracle = DcjDistance::new(PenaltyPolicy::None);
        let solver = ConsensusMedian::new(Box::new(oracle), ChromosomeMode::Multichromosomal);
        let outcome = solver
            .median([&split, &other, &whole], &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(outcome.genome.chromosome_count(), 2);
        let got = total_cost(&outcome.genome, &[&split, &other, &whole], &oracle).unwrap();
        assert_eq!(got, 1);
    }
}
