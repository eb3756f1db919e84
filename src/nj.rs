//! Neighbor-joining starting topology
//!
//! Used when no Newick topology is supplied: pairwise distances between the
//! condensed leaf genomes are joined into an unrooted binary tree whose
//! last three clusters hang off a common root.

use crate::distance::DistanceOracle;
use crate::error::{PhyloError, Result};
use crate::genome::Genome;
use crate::newick::Topology;
use indexmap::IndexMap;
use rayon::prelude::*;

/// Lower-triangular matrix of pairwise distances, diagonal implied zero
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    names: Vec<String>,
    data: Vec<f64>,
}

impl DistanceMatrix {
    pub fn with_names(names: Vec<String>) -> Self {
        let n = names.len();
        DistanceMatrix {
            data: vec![0.0; n * n.saturating_sub(1) / 2],
            names,
        }
    }

    /// Pairwise distances between genomes, computed in parallel
    pub fn from_genomes(genomes: &IndexMap<String, Genome>, oracle: &dyn DistanceOracle) -> Result<Self> {
        let mut matrix = DistanceMatrix::with_names(genomes.keys().cloned().collect());
        let pairs: Vec<(usize, usize)> = (0..genomes.len())
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .collect();
        let values = pairs
            .par_iter()
            .map(|&(i, j)| oracle.distance(&genomes[i], &genomes[j]))
            .collect::<Result<Vec<u32>>>()?;
        for (&(i, j), value) in pairs.iter().zip(values) {
            matrix.set(i, j, value as f64);
        }
        Ok(matrix)
    }

    pub fn dim(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn idx(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i > j { (i, j) } else { (j, i) };
        i * (i - 1) / 2 + j
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            self.data[self.idx(i, j)]
        }
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        if i != j {
            let index = self.idx(i, j);
            self.data[index] = value;
        }
    }
}

/// Pair of active clusters minimising the Q criterion, lowest indices on ties
fn select_pair(matrix: &DistanceMatrix, active: &[usize], row_sums: &[f64]) -> Option<(usize, usize)> {
    let r = active.len() as f64;
    active
        .iter()
        .enumerate()
        .flat_map(|(a, &i)| active[..a].iter().map(move |&j| (j, i)))
        .map(|(i, j)| {
            let q = (r - 2.0) * matrix.get(i, j) - row_sums[i] - row_sums[j];
            (i, j, q)
        })
        .min_by(|x, y| x.2.total_cmp(&y.2).then((x.0, x.1).cmp(&(y.0, y.1))))
        .map(|(i, j, _)| (i, j))
}

/// Join clusters until three remain, then root the tree at their junction
pub fn neighbor_joining(mut matrix: DistanceMatrix) -> Result<Topology> {
    let n = matrix.dim();
    if n < 3 {
        return Err(PhyloError::Format(format!(
            "neighbor joining needs at least three genomes, got {n}"
        )));
    }

    let mut clusters: Vec<Option<Topology>> = matrix
        .names()
        .iter()
        .map(|name| Some(Topology::Leaf(name.clone())))
        .collect();
    let mut active: Vec<usize> = (0..n).collect();

    while active.len() > 3 {
        let row_sums: Vec<f64> = (0..n)
            .map(|i| active.iter().map(|&k| matrix.get(i, k)).sum())
            .collect();
        let (i, j) = select_pair(&matrix, &active, &row_sums)
            .ok_or_else(|| PhyloError::InvariantViolation("no pair left to join".into()))?;

        let d_ij = matrix.get(i, j);
        for &k in &active {
            if k != i && k != j {
                let d = 0.5 * (matrix.get(i, k) + matrix.get(j, k) - d_ij);
                matrix.set(i, k, d);
            }
        }

        let left = clusters[i].take();
        let right = clusters[j].take();
        clusters[i] = Some(Topology::Internal {
            label: None,
            children: left.into_iter().chain(right).collect(),
        });
        active.retain(|&k| k != j);
    }

    let children: Vec<Topology> = active.iter().filter_map(|&k| clusters[k].take()).collect();
    log::debug!("Neighbor joining built a topology over {n} genomes");
    Ok(Topology::Internal {
        label: None,
        children,
    })
}
