//! Inversion (reversal) distance between unichromosomal linear genomes
//!
//! Hannenhalli-Pevzner: `d = n + 1 - c + h + f` over the framed breakpoint
//! graph, where `c` counts cycles, `h` hurdles and `f` is 1 for a fortress.
//! A linear chromosome may be read in either direction, so the distance is
//! the minimum over both readings of the first genome.

use crate::error::{PhyloError, Result};
use crate::genome::{Genome, Marker};
use crate::union_find::UnionFind;

pub fn inversion_distance(a: &Genome, b: &Genome) -> Result<u32> {
    inversion_distance_markers(single_linear(a)?, single_linear(b)?)
}

/// Inversion distance between two signed marker sequences over the same genes
pub fn inversion_distance_markers(a: &[Marker], b: &[Marker]) -> Result<u32> {
    let forward = reversal_distance(&relabel(a, b)?);
    let flipped: Vec<Marker> = a.iter().rev().map(|m| -m).collect();
    let backward = reversal_distance(&relabel(&flipped, b)?);
    Ok(forward.min(backward))
}

/// Markers of a genome holding exactly one linear chromosome
pub fn single_linear(genome: &Genome) -> Result<&[Marker]> {
    match genome.chromosomes.as_slice() {
        [chromosome] if !chromosome.is_circular() => Ok(&chromosome.markers),
        _ => Err(PhyloError::UnsupportedConfiguration(format!(
            "the reversal distance needs one linear chromosome, genome {} has {} chromosome(s)",
            genome.display_name(),
            genome.chromosome_count()
        ))),
    }
}

/// Express `a` in the coordinates of `b`, so that `b` becomes the identity
fn relabel(a: &[Marker], b: &[Marker]) -> Result<Vec<i32>> {
    if a.len() != b.len() {
        return Err(PhyloError::Format(format!(
            "genomes have {} and {} genes",
            a.len(),
            b.len()
        )));
    }
    let n = b.len();
    let mut rank = vec![0i32; n + 1];
    for (i, &marker) in b.iter().enumerate() {
        let gene = marker.unsigned_abs() as usize;
        if gene == 0 || gene > n {
            return Err(PhyloError::Format(format!("marker {marker} outside 1..={n}")));
        }
        rank[gene] = (i as i32 + 1) * marker.signum();
    }
    a.iter()
        .map(|&marker| {
            let gene = marker.unsigned_abs() as usize;
            match rank.get(gene) {
                Some(&r) if gene > 0 && r != 0 => Ok(marker.signum() * r),
                _ => Err(PhyloError::Format(format!(
                    "marker {marker} is missing from the other genome"
                ))),
            }
        })
        .collect()
}

struct GrayEdge {
    lo: usize,
    hi: usize,
    cycle: usize,
}

/// Framed breakpoint graph of a signed permutation: gray edges as position
/// intervals, the cycle of every position, and the cycle count
fn breakpoint_graph(pi: &[i32]) -> (Vec<GrayEdge>, Vec<usize>, usize) {
    let n = pi.len();

    // Unsigned image framed by 0 and 2n+1
    let len = 2 * n + 2;
    let mut p = vec![0usize; len];
    for (i, &v) in pi.iter().enumerate() {
        let g = v.unsigned_abs() as usize;
        if v > 0 {
            p[2 * i + 1] = 2 * g - 1;
            p[2 * i + 2] = 2 * g;
        } else {
            p[2 * i + 1] = 2 * g;
            p[2 * i + 2] = 2 * g - 1;
        }
    }
    p[len - 1] = len - 1;
    let mut inv = vec![0usize; len];
    for (pos, &v) in p.iter().enumerate() {
        inv[v] = pos;
    }

    // Black edges join positions (2i, 2i+1); gray edges join values (2k, 2k+1)
    let mut cycle_of = vec![usize::MAX; len];
    let mut cycles = 0;
    for start in 0..len {
        if cycle_of[start] != usize::MAX {
            continue;
        }
        let mut x = start;
        while cycle_of[x] == usize::MAX {
            cycle_of[x] = cycles;
            cycle_of[x ^ 1] = cycles;
            x = inv[p[x ^ 1] ^ 1];
        }
        cycles += 1;
    }

    let edges = (0..=n)
        .map(|k| {
            let (i, j) = (inv[2 * k], inv[2 * k + 1]);
            GrayEdge {
                lo: i.min(j),
                hi: i.max(j),
                cycle: cycle_of[i],
            }
        })
        .collect();
    (edges, cycle_of, cycles)
}

/// Cycles connected through interleaving gray edges, in one left-to-right
/// sweep over the positions.
///
/// Ranges spanned by distinct overlap components are nested or disjoint, so
/// the open components form a stack ordered by start. Closing an edge merges
/// every open component that started inside it; a component whose furthest
/// end is reached is complete and leaves the stack.
fn interleaving_components(edges: &[GrayEdge], cycles: usize) -> UnionFind {
    let len = 2 * edges.len();
    let mut opens = vec![None; len];
    let mut closes = vec![None; len];
    for (k, edge) in edges.iter().enumerate() {
        opens[edge.lo] = Some(k);
        closes[edge.hi] = Some(k);
    }

    let mut components = UnionFind::new(cycles);
    // (start, furthest end, cycle) of every open component
    let mut open: Vec<(usize, usize, usize)> = Vec::new();
    for position in 0..len {
        if let Some(k) = opens[position] {
            let edge = &edges[k];
            open.push((edge.lo, edge.hi, edge.cycle));
            continue;
        }
        let Some(k) = closes[position] else {
            continue;
        };
        let edge = &edges[k];
        let mut end = position;
        while let Some(&(start, furthest, cycle)) = open.last() {
            if start <= edge.lo {
                break;
            }
            open.pop();
            end = end.max(furthest);
            components.union(cycle, edge.cycle);
        }
        if let Some(top) = open.last_mut() {
            top.1 = top.1.max(end);
            if top.1 == position {
                open.pop();
            }
        }
    }
    components
}

/// Reversal distance of a signed permutation of `1..=n` to the identity.
///
/// Linear in `n` apart from the near-constant union-find factor, so the
/// branch-and-bound median can afford it at every leaf of its search.
pub fn reversal_distance(pi: &[i32]) -> u32 {
    let n = pi.len();
    if n == 0 {
        return 0;
    }

    let (edges, cycle_of, cycles) = breakpoint_graph(pi);
    let mut cycle_size = vec![0usize; cycles];
    for edge in &edges {
        cycle_size[edge.cycle] += 1;
    }
    let mut components = interleaving_components(&edges, cycles);

    let mut oriented = vec![false; cycles];
    let mut nontrivial = vec![false; cycles];
    for edge in &edges {
        let root = components.find(edge.cycle);
        if (edge.lo + edge.hi) % 2 == 0 {
            oriented[root] = true;
        }
        if cycle_size[edge.cycle] > 1 {
            nontrivial[root] = true;
        }
    }

    // Unoriented components in circular position order, runs collapsed
    let mut order: Vec<usize> = Vec::new();
    for &cycle in &cycle_of {
        let root = components.find(cycle);
        if nontrivial[root] && !oriented[root] && order.last() != Some(&root) {
            order.push(root);
        }
    }
    while order.len() > 1 && order.first() == order.last() {
        order.pop();
    }

    let mut blocks = vec![0usize; cycles];
    for &component in &order {
        blocks[component] += 1;
    }
    let hurdles: Vec<usize> = (0..order.len()).filter(|&i| blocks[order[i]] == 1).collect();

    // A hurdle is super when removing it would turn its neighbour into a hurdle
    let is_super = |i: usize| {
        let m = order.len();
        if m < 3 {
            return false;
        }
        let left = order[(i + m - 1) % m];
        let right = order[(i + 1) % m];
        left == right && blocks[left] == 2
    };
    let h = hurdles.len();
    let fortress = h >= 3 && h % 2 == 1 && hurdles.iter().all(|&i| is_super(i));

    (n + 1 - cycles + h + usize::from(fortress)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Chromosome;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::{HashMap, VecDeque};

    /// Three nested unoriented gadgets, each a super hurdle
    const FORTRESS: [i32; 21] = [
        6, 1, 2, 4, 3, 5, 7, 15, 13, 8, 9, 11, 10, 12, 14, 16, 21, 17, 19, 18, 20,
    ];

    fn reversed(pi: &[i32], i: usize, j: usize) -> Vec<i32> {
        let mut next = pi.to_vec();
        next[i..=j].reverse();
        for v in &mut next[i..=j] {
            *v = -*v;
        }
        next
    }

    fn random_permutation(n: usize, rng: &mut StdRng) -> Vec<i32> {
        let mut pi: Vec<i32> = (1..=n as i32).collect();
        pi.shuffle(rng);
        for v in &mut pi {
            if rng.gen_bool(0.5) {
                *v = -*v;
            }
        }
        pi
    }

    /// Exact distances from the identity by breadth-first search
    fn brute_force(n: usize) -> HashMap<Vec<i32>, u32> {
        let identity: Vec<i32> = (1..=n as i32).collect();
        let mut dist = HashMap::new();
        dist.insert(identity.clone(), 0);
        let mut queue = VecDeque::from([identity]);
        while let Some(current) = queue.pop_front() {
            let d = dist[&current];
            for i in 0..n {
                for j in i..n {
                    let mut next = current.clone();
                    next[i..=j].reverse();
                    for v in &mut next[i..=j] {
                        *v = -*v;
                    }
                    if !dist.contains_key(&next) {
                        dist.insert(next.clone(), d + 1);
                        queue.push_back(next);
                    }
                }
            }
        }
        dist
    }

    #[test]
    fn test_small_permutations() {
        assert_eq!(reversal_distance(&[]), 0);
        assert_eq!(reversal_distance(&[1, 2, 3]), 0);
        assert_eq!(reversal_distance(&[-1]), 1);
        assert_eq!(reversal_distance(&[1, -3, -2, 4]), 1);
        assert_eq!(reversal_distance(&[2, 1]), 3);
        assert_eq!(reversal_distance(&[3, 2, 1]), 3);
    }

    #[test]
    fn test_matches_breadth_first_search() {
        for n in 1..=5 {
            for (perm, expected) in brute_force(n) {
                assert_eq!(
                    reversal_distance(&perm),
                    expected,
                    "wrong distance for {perm:?}"
                );
            }
        }
    }

    #[test]
    fn test_fortress_costs_one_extra_reversal() {
        // One reversal above the hurdle count alone
        assert_eq!(reversal_distance(&FORTRESS), 18);

        let second = [7, 2, 1, 3, 5, 4, 6, 8, 15, 9, 11, 10, 13, 12, 14, 16, 17, 22, 18, 20, 19, 21];
        assert_eq!(reversal_distance(&second), 20);
    }

    #[test]
    fn test_single_reversal_moves_distance_by_at_most_one() {
        let d = reversal_distance(&FORTRESS);
        let mut closer = 0;
        for i in 0..FORTRESS.len() {
            for j in i..FORTRESS.len() {
                let next = reversal_distance(&reversed(&FORTRESS, i, j));
                assert!(next.abs_diff(d) <= 1, "reversal {i}..={j} moved {d} to {next}");
                if next + 1 == d {
                    closer += 1;
                }
            }
        }
        assert!(closer > 0, "no reversal sorts the fortress further");
    }

    #[test]
    fn test_component_sweep_matches_pairwise_interleaving() {
        let mut rng = StdRng::seed_from_u64(31);
        for _ in 0..300 {
            let n = rng.gen_range(1..40);
            let pi = random_permutation(n, &mut rng);
            let (edges, _, cycles) = breakpoint_graph(&pi);

            let mut pairwise = UnionFind::new(cycles);
            for e in &edges {
                for f in &edges {
                    if e.lo < f.lo && f.lo < e.hi && e.hi < f.hi {
                        pairwise.union(e.cycle, f.cycle);
                    }
                }
            }
            let mut sweep = interleaving_components(&edges, cycles);
            for x in 0..cycles {
                for y in 0..x {
                    assert_eq!(
                        sweep.find(x) == sweep.find(y),
                        pairwise.find(x) == pairwise.find(y),
                        "cycles {x} and {y} of {pi:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_large_permutation_matches_its_inverse() {
        let mut rng = StdRng::seed_from_u64(5);
        let pi = random_permutation(20_000, &mut rng);
        let mut inverse = vec![0i32; pi.len()];
        for (i, &v) in pi.iter().enumerate() {
            inverse[v.unsigned_abs() as usize - 1] = v.signum() * (i as i32 + 1);
        }
        assert_eq!(reversal_distance(&pi), reversal_distance(&inverse));
    }

    #[test]
    fn test_distance_is_symmetric_and_direction_free() {
        let a = Genome::linear(vec![3, -1, 4, 2, -5]);
        let b = Genome::linear(vec![1, 2, -4, 3, 5]);
        let ab = inversion_distance(&a, &b).unwrap();
        assert_eq!(ab, inversion_distance(&b, &a).unwrap());

        let flipped = Genome::linear(vec![5, -2, -4, 1, -3]);
        assert_eq!(inversion_distance(&a, &flipped).unwrap(), 0);
        assert_eq!(inversion_distance(&flipped, &b).unwrap(), ab);
    }

    #[test]
    fn test_rejects_circular_and_multichromosomal() {
        let circular = Genome::new(vec![Chromosome::circular(vec![1, 2])]);
        let linear = Genome::linear(vec![1, 2]);
        assert!(matches!(
            inversion_distance(&circular, &linear),
            Err(PhyloError::UnsupportedConfiguration(_))
        ));
        let split = Genome::new(vec![Chromosome::linear(vec![1]), Chromosome::linear(vec![2])]);
        assert!(inversion_distance(&linear, &split).is_err());
    }
}
