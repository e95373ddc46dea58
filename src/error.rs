//! Error types for gene set testing and clustering

use thiserror::Error;

/// Main error type for enrichment operations
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("All {n_sets} gene sets were removed by the size filter (need 2 <= set size < number of non-missing genes in every contrast)")]
    AllSetsDropped { n_sets: usize },

    #[error("Sparse matrix construction failed: {0}")]
    SparseFormat(String),

    #[error(transparent)]
    Adjustment(#[from] anyhow::Error),
}

// SparseFormatError boxes a non-Send error; keep only its message so results
// can cross rayon worker threads.
impl From<nalgebra_sparse::SparseFormatError> for EnrichmentError {
    fn from(err: nalgebra_sparse::SparseFormatError) -> Self {
        EnrichmentError::SparseFormat(err.to_string())
    }
}

impl EnrichmentError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        EnrichmentError::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Result type alias for enrichment operations
pub type Result<T> = std::result::Result<T, EnrichmentError>;
