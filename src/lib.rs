// Library exports for phylorder
pub mod condense;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod genome;
pub mod inversion;
pub mod labeling;
pub mod median;
pub mod median_bnb;
pub mod median_consensus;
pub mod median_greedy;
pub mod median_local;
pub mod newick;
pub mod nj;
pub mod tree;
pub mod union_find;

pub use crate::config::{ChromosomeMode, EngineConfig, MedianStrategy, Metric, PenaltyPolicy};
pub use crate::error::{PhyloError, Result};
pub use crate::genome::{Chromosome, ChromosomeKind, Genome, Marker};
