//! Genome condensation
//!
//! An adjacency is common when every genome of the dataset contains it.
//! Maximal runs of markers joined by common adjacencies become synteny
//! blocks, each renamed to a single condensed marker. Every common adjacency
//! is a trivial cycle in any pairwise comparison, so collapsing them leaves
//! all DCJ and inversion distances unchanged.

use crate::error::{PhyloError, Result};
use crate::genome::{left_extremity, right_extremity, AdjacencySet, Chromosome, Genome, Marker};
use log::info;

/// A synteny block in raw markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Raw markers in the block's forward reading
    pub markers: Vec<Marker>,
    /// The block closes into a circular chromosome in every genome
    pub cyclic: bool,
}

/// Bijection between synteny blocks and condensed markers
#[derive(Debug, Clone)]
pub struct CondensationMap {
    raw_gene_count: usize,
    blocks: Vec<Block>,
    /// Raw gene -> (block index, offset in block); index 0 unused
    membership: Vec<(usize, usize)>,
}

impl CondensationMap {
    /// Build the map from the full raw dataset
    pub fn build(genomes: &[Genome]) -> Result<Self> {
        let first = genomes
            .first()
            .ok_or_else(|| PhyloError::Format("empty dataset".into()))?;
        let n = first.gene_count();
        for genome in genomes {
            if genome.gene_count() != n {
                return Err(PhyloError::Format(format!(
                    "number of genes differs: {} has {}, {} has {}",
                    first.display_name(),
                    n,
                    genome.display_name(),
                    genome.gene_count()
                )));
            }
            genome.validate_content(n)?;
        }

        let adjacencies: Vec<AdjacencySet> = genomes.iter().map(AdjacencySet::from_genome).collect();
        let common = |left: Marker, right: Marker| {
            let (x, y) = (right_extremity(left), left_extremity(right));
            adjacencies.iter().all(|set| set.contains(x, y))
        };

        let mut blocks = Vec::new();
        for chromosome in &first.chromosomes {
            let markers = &chromosome.markers;
            let k = markers.len();
            if chromosome.is_circular() {
                let start = (0..k).find(|&i| !common(markers[(i + k - 1) % k], markers[i]));
                match start {
                    None => blocks.push(Block {
                        markers: markers.clone(),
                        cyclic: true,
                    }),
                    Some(start) => {
                        let rotated: Vec<Marker> =
                            markers[start..].iter().chain(&markers[..start]).copied().collect();
                        split_runs(&rotated, &common, &mut blocks);
                    }
                }
            } else {
                split_runs(markers, &common, &mut blocks);
            }
        }

        for block in &mut blocks {
            normalize(block);
        }
        blocks.sort_by_key(|b| b.markers.iter().map(|m| m.unsigned_abs()).min());

        let mut membership = vec![(0, 0); n + 1];
        for (index, block) in blocks.iter().enumerate() {
            for (offset, &marker) in block.markers.iter().enumerate() {
                membership[marker.unsigned_abs() as usize] = (index, offset);
            }
        }

        info!(
            "Condensed {} genes into {} synteny blocks across {} genomes",
            n,
            blocks.len(),
            genomes.len()
        );

        Ok(CondensationMap {
            raw_gene_count: n,
            blocks,
            membership,
        })
    }

    pub fn raw_gene_count(&self) -> usize {
        self.raw_gene_count
    }

    pub fn condensed_gene_count(&self) -> usize {
        self.blocks.len()
    }

    /// Raw block behind condensed marker `id` (1-based)
    pub fn block(&self, id: usize) -> Option<&Block> {
        id.checked_sub(1).and_then(|i| self.blocks.get(i))
    }

    /// Rewrite a raw genome into condensed markers
    pub fn condense(&self, raw: &Genome) -> Result<Genome> {
        raw.validate_content(self.raw_gene_count)?;
        let mut chromosomes = Vec::with_capacity(raw.chromosomes.len());
        for chromosome in &raw.chromosomes {
            let markers = if chromosome.is_circular() {
                self.rotate_to_block_start(&chromosome.markers)
            } else {
                chromosome.markers.clone()
            };
            let condensed = self.condense_run(&markers, raw)?;
            chromosomes.push(Chromosome::new(chromosome.kind, condensed));
        }
        Ok(Genome {
            name: raw.name.clone(),
            chromosomes,
        })
    }

    /// Rewrite a condensed genome back into raw markers
    pub fn expand(&self, condensed: &Genome) -> Result<Genome> {
        condensed.validate_content(self.blocks.len())?;
        let chromosomes = condensed
            .chromosomes
            .iter()
            .map(|chromosome| {
                let markers = chromosome
                    .markers
                    .iter()
                    .flat_map(|&marker| {
                        let block = &self.blocks[marker.unsigned_abs() as usize - 1];
                        oriented(&block.markers, marker > 0)
                    })
                    .collect();
                Chromosome::new(chromosome.kind, markers)
            })
            .collect();
        Ok(Genome {
            name: condensed.name.clone(),
            chromosomes,
        })
    }

    /// Orientation of `marker` relative to its block's forward reading
    fn orientation(&self, marker: Marker) -> (usize, usize, bool) {
        let (index, offset) = self.membership[marker.unsigned_abs() as usize];
        let forward = marker.signum() == self.blocks[index].markers[offset].signum();
        (index, offset, forward)
    }

    fn starts_block(&self, marker: Marker) -> bool {
        let (index, offset, forward) = self.orientation(marker);
        let block = &self.blocks[index];
        block.cyclic || (forward && offset == 0) || (!forward && offset == block.markers.len() - 1)
    }

    fn rotate_to_block_start(&self, markers: &[Marker]) -> Vec<Marker> {
        let start = markers
            .iter()
            .position(|&m| self.starts_block(m))
            .unwrap_or(0);
        markers[start..].iter().chain(&markers[..start]).copied().collect()
    }

    fn condense_run(&self, markers: &[Marker], genome: &Genome) -> Result<Vec<Marker>> {
        let mut condensed = Vec::new();
        let mut i = 0;
        while i < markers.len() {
            let (index, offset, forward) = self.orientation(markers[i]);
            let block = &self.blocks[index];
            let id = (index + 1) as Marker;
            let len = block.markers.len();

            if block.cyclic {
                // The whole chromosome is this block, in either direction
                let expected: Vec<Marker> = if forward {
                    block.markers[offset..].iter().chain(&block.markers[..offset]).copied().collect()
                } else {
                    let reversed = oriented(&block.markers, false);
                    let at = len - 1 - offset;
                    reversed[at..].iter().chain(&reversed[..at]).copied().collect()
                };
                if markers != expected.as_slice() {
                    return Err(not_covered(genome, markers[i]));
                }
                condensed.push(if forward { id } else { -id });
                break;
            }

            let expected = oriented(&block.markers, forward);
            if markers.get(i..i + len) != Some(expected.as_slice()) {
                return Err(not_covered(genome, markers[i]));
            }
            condensed.push(if forward { id } else { -id });
            i += len;
        }
        Ok(condensed)
    }
}

fn not_covered(genome: &Genome, marker: Marker) -> PhyloError {
    PhyloError::Format(format!(
        "genome {} breaks the synteny block of marker {}",
        genome.display_name(),
        marker
    ))
}

/// Block markers read forward, or reversed with flipped signs
fn oriented(markers: &[Marker], forward: bool) -> Vec<Marker> {
    if forward {
        markers.to_vec()
    } else {
        markers.iter().rev().map(|m| -m).collect()
    }
}

fn split_runs(markers: &[Marker], common: &impl Fn(Marker, Marker) -> bool, blocks: &mut Vec<Block>) {
    let mut run: Vec<Marker> = Vec::new();
    for &marker in markers {
        if let Some(&last) = run.last() {
            if !common(last, marker) {
                blocks.push(Block {
                    markers: std::mem::take(&mut run),
                    cyclic: false,
                });
            }
        }
        run.push(marker);
    }
    if !run.is_empty() {
        blocks.push(Block {
            markers: run,
            cyclic: false,
        });
    }
}

/// Orient a block so that its smallest gene reads forward; cyclic blocks
/// also start at that gene
fn normalize(block: &mut Block) {
    let Some(smallest) = block.markers.iter().map(|m| m.unsigned_abs()).min() else {
        return;
    };
    if block.markers.iter().any(|&m| m < 0 && m.unsigned_abs() == smallest) {
        block.markers = oriented(&block.markers, false);
    }
    if block.cyclic {
        if let Some(pivot) = block.markers.iter().position(|m| m.unsigned_abs() == smallest) {
            block.markers.rotate_left(pivot);
        }
    }
}
