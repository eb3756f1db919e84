//! Genome model: signed markers grouped into linear and circular chromosomes
//!
//! Markers are non-zero signed integers in `1..=n`; the sign is the strand.
//! Distance and median computations work on the adjacency view
//! (`AdjacencySet`), which is identical for every rotation or reading
//! direction of a chromosome.
//!
//! ```
//! use phylorder::genome::{AdjacencySet, Chromosome, Genome};
//!
//! let forward = Genome::linear(vec![1, -2, 3]);
//! let backward = Genome::linear(vec![-3, 2, -1]);
//! assert_eq!(AdjacencySet::from_genome(&forward), AdjacencySet::from_genome(&backward));
//!
//! let circle = Genome::new(vec![Chromosome::circular(vec![1, 2, 3])]);
//! let rotated = Genome::new(vec![Chromosome::circular(vec![3, 1, 2])]);
//! assert_eq!(AdjacencySet::from_genome(&circle), AdjacencySet::from_genome(&rotated));
//! ```

use crate::error::{PhyloError, Result};
use std::fmt;

/// Signed gene marker
pub type Marker = i32;

/// Extremity index used by the adjacency view.
///
/// Gene `g` owns tail `2(g-1)` and head `2(g-1)+1`.
pub type Extremity = usize;

/// Chromosome topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromosomeKind {
    Linear,
    Circular,
}

impl ChromosomeKind {
    /// Terminator symbol used by the flat dataset format
    pub fn terminator(self) -> char {
        match self {
            ChromosomeKind::Linear => '$',
            ChromosomeKind::Circular => '@',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub kind: ChromosomeKind,
    pub markers: Vec<Marker>,
}

impl Chromosome {
    pub fn new(kind: ChromosomeKind, markers: Vec<Marker>) -> Self {
        Chromosome { kind, markers }
    }

    pub fn linear(markers: Vec<Marker>) -> Self {
        Self::new(ChromosomeKind::Linear, markers)
    }

    pub fn circular(markers: Vec<Marker>) -> Self {
        Self::new(ChromosomeKind::Circular, markers)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn is_circular(&self) -> bool {
        self.kind == ChromosomeKind::Circular
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Genome {
    pub name: Option<String>,
    pub chromosomes: Vec<Chromosome>,
}

impl Genome {
    pub fn new(chromosomes: Vec<Chromosome>) -> Self {
        Genome {
            name: None,
            chromosomes,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Unichromosomal linear genome, the shape the inversion metric expects
    pub fn linear(markers: Vec<Marker>) -> Self {
        Self::new(vec![Chromosome::linear(markers)])
    }

    pub fn gene_count(&self) -> usize {
        self.chromosomes.iter().map(Chromosome::len).sum()
    }

    pub fn chromosome_count(&self) -> usize {
        self.chromosomes.len()
    }

    /// Number of (linear, circular) chromosomes
    pub fn chromosome_kinds(&self) -> (usize, usize) {
        let circular = self.chromosomes.iter().filter(|c| c.is_circular()).count();
        (self.chromosomes.len() - circular, circular)
    }

    /// Markers in traversal order, chromosome after chromosome
    pub fn markers(&self) -> impl Iterator<Item = Marker> + '_ {
        self.chromosomes.iter().flat_map(|c| c.markers.iter().copied())
    }

    /// Check that the genome is a signed permutation of `1..=n`
    pub fn validate_content(&self, n: usize) -> Result<()> {
        if self.gene_count() != n {
            return Err(PhyloError::Format(format!(
                "genome {} has {} genes, expected {}",
                self.display_name(),
                self.gene_count(),
                n
            )));
        }
        let mut seen = vec![false; n + 1];
        for marker in self.markers() {
            let gene = marker.unsigned_abs() as usize;
            if marker == 0 || gene > n {
                return Err(PhyloError::Format(format!(
                    "genome {} contains marker {} outside 1..={}",
                    self.display_name(),
                    marker,
                    n
                )));
            }
            if seen[gene] {
                return Err(PhyloError::Format(format!(
                    "genome {} repeats marker {}",
                    self.display_name(),
                    gene
                )));
            }
            seen[gene] = true;
        }
        if self.chromosomes.iter().any(Chromosome::is_empty) {
            return Err(PhyloError::Format(format!(
                "genome {} has an empty chromosome",
                self.display_name()
            )));
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Rebuild a canonical genome from its adjacency view
    pub fn from_adjacencies(adjacencies: &AdjacencySet) -> Genome {
        let size = adjacencies.partner.len();
        let mut visited = vec![false; size];
        let mut chromosomes = Vec::new();

        // Linear chromosomes start at their smallest free telomere
        for start in 0..size {
            if visited[start] || adjacencies.partner[start].is_some() {
                continue;
            }
            let mut markers = Vec::new();
            let mut left = start;
            loop {
                let right = left ^ 1;
                visited[left] = true;
                visited[right] = true;
                markers.push(marker_entered_at(left));
                match adjacencies.partner[right] {
                    Some(next) => left = next,
                    None => break,
                }
            }
            chromosomes.push(Chromosome::linear(markers));
        }

        // Remaining extremities belong to circular chromosomes
        for gene_tail in (0..size).step_by(2) {
            if visited[gene_tail] {
                continue;
            }
            let mut markers = Vec::new();
            let mut left = gene_tail;
            while !visited[left] {
                let right = left ^ 1;
                visited[left] = true;
                visited[right] = true;
                markers.push(marker_entered_at(left));
                left = match adjacencies.partner[right] {
                    Some(next) => next,
                    None => break,
                };
            }
            chromosomes.push(Chromosome::circular(markers));
        }

        Genome::new(chromosomes)
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chromosome) in self.chromosomes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            for marker in &chromosome.markers {
                write!(f, "{marker} ")?;
            }
            write!(f, "{}", chromosome.kind.terminator())?;
        }
        Ok(())
    }
}

pub fn tail(gene: usize) -> Extremity {
    2 * (gene - 1)
}

pub fn head(gene: usize) -> Extremity {
    2 * (gene - 1) + 1
}

/// Extremity read first when traversing `marker`
pub fn left_extremity(marker: Marker) -> Extremity {
    let gene = marker.unsigned_abs() as usize;
    if marker > 0 {
        tail(gene)
    } else {
        head(gene)
    }
}

/// Extremity read last when traversing `marker`
pub fn right_extremity(marker: Marker) -> Extremity {
    left_extremity(marker) ^ 1
}

/// Signed marker whose traversal starts at extremity `x`
pub fn marker_entered_at(x: Extremity) -> Marker {
    let gene = (x / 2 + 1) as Marker;
    if x % 2 == 0 {
        gene
    } else {
        -gene
    }
}

/// Adjacency view of a genome: partner of every extremity, `None` for telomeres
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdjacencySet {
    pub partner: Vec<Option<Extremity>>,
}

impl AdjacencySet {
    pub fn new(gene_count: usize) -> Self {
        AdjacencySet {
            partner: vec![None; 2 * gene_count],
        }
    }

    pub fn from_genome(genome: &Genome) -> Self {
        let mut set = AdjacencySet::new(genome.gene_count());
        for chromosome in &genome.chromosomes {
            let markers = &chromosome.markers;
            for pair in markers.windows(2) {
                set.join(right_extremity(pair[0]), left_extremity(pair[1]));
            }
            if chromosome.is_circular() {
                if let (Some(&first), Some(&last)) = (markers.first(), markers.last()) {
                    set.join(right_extremity(last), left_extremity(first));
                }
            }
        }
        set
    }

    pub fn gene_count(&self) -> usize {
        self.partner.len() / 2
    }

    pub fn join(&mut self, x: Extremity, y: Extremity) {
        self.partner[x] = Some(y);
        self.partner[y] = Some(x);
    }

    pub fn contains(&self, x: Extremity, y: Extremity) -> bool {
        self.partner[x] == Some(y)
    }

    /// Adjacencies as ordered pairs `(x, y)` with `x < y`
    pub fn adjacencies(&self) -> impl Iterator<Item = (Extremity, Extremity)> + '_ {
        self.partner
            .iter()
            .enumerate()
            .filter_map(|(x, p)| p.filter(|&y| x < y).map(|y| (x, y)))
    }

    /// DCJ that creates adjacency `x`-`y`, joining the former partners of
    /// `x` and `y` together (or leaving them as telomeres).
    ///
    /// Returns false when the adjacency already exists.
    pub fn apply_join(&mut self, x: Extremity, y: Extremity) -> bool {
        if x == y || self.partner[x] == Some(y) {
            return false;
        }
        let former_x = self.partner[x];
        let former_y = self.partner[y];
        self.join(x, y);
        match (former_x, former_y) {
            (Some(a), Some(b)) => self.join(a, b),
            (Some(a), None) => self.partner[a] = None,
            (None, Some(b)) => self.partner[b] = None,
            (None, None) => {}
        }
        true
    }

    /// DCJ fission: cut adjacency at `x` into two telomeres
    pub fn apply_cut(&mut self, x: Extremity) -> bool {
        match self.partner[x].take() {
            Some(y) => {
                self.partner[y] = None;
                true
            }
            None => false,
        }
    }

    /// Number of (linear, circular) chromosomes
    pub fn chromosome_kinds(&self) -> (usize, usize) {
        let telomeres = self.partner.iter().filter(|p| p.is_none()).count();
        let linear = telomeres / 2;

        let mut visited = vec![false; self.partner.len()];
        for start in 0..self.partner.len() {
            if self.partner[start].is_none() && !visited[start] {
                self.walk(start, &mut visited);
            }
        }
        let mut circular = 0;
        for start in 0..self.partner.len() {
            if !visited[start] {
                circular += 1;
                self.walk(start, &mut visited);
            }
        }
        (linear, circular)
    }

    fn walk(&self, start: Extremity, visited: &mut [bool]) {
        let mut x = start;
        while !visited[x] {
            visited[x] = true;
            visited[x ^ 1] = true;
            match self.partner[x ^ 1] {
                Some(next) => x = next,
                None => break,
            }
        }
    }
}
