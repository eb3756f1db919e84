use thiserror::Error;

/// Errors raised by the reconstruction engine
#[derive(Debug, Error)]
pub enum PhyloError {
    /// Malformed or inconsistent input dataset or topology
    #[error("format error: {0}")]
    Format(String),

    /// Metric, chromosome mode, penalty or median strategy combination not supported
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// A median search ran out of its work budget. Recoverable: the best
    /// candidate found so far is used instead.
    #[error("median search exhausted its budget after {explored} of {budget} nodes")]
    ResourceLimit { explored: usize, budget: usize },

    /// A produced genome broke the gene-content or chromosome invariant
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PhyloError>;
