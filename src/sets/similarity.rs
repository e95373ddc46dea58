//! Pairwise gene set similarity coefficients.
//!
//! All three coefficients divide the size of the intersection `k` of two sets
//! of sizes `a` and `b` by a different normaliser:
//!
//! - **Jaccard**: `k / (a + b - k)` (size of the union)
//! - **Overlap**: `k / min(a, b)`
//! - **Otsuka**: `k / sqrt(a * b)`

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::Array2;

use crate::error::{EnrichmentError, Result};
use crate::sets::SetCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SimilarityKind {
    #[default]
    Jaccard,
    Overlap,
    Otsuka,
}

impl SimilarityKind {
    /// Similarity of two sets from their sizes and intersection size.
    pub fn coefficient(&self, size_a: f64, size_b: f64, intersection: f64) -> f64 {
        let denominator = match self {
            SimilarityKind::Jaccard => size_a + size_b - intersection,
            SimilarityKind::Overlap => size_a.min(size_b),
            SimilarityKind::Otsuka => (size_a * size_b).sqrt(),
        };
        if denominator > 0.0 {
            intersection / denominator
        } else {
            0.0
        }
    }
}

impl FromStr for SimilarityKind {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jaccard" => Ok(SimilarityKind::Jaccard),
            "overlap" => Ok(SimilarityKind::Overlap),
            "otsuka" => Ok(SimilarityKind::Otsuka),
            other => Err(EnrichmentError::invalid(format!(
                "unknown similarity type '{}' (expected jaccard, overlap or otsuka)",
                other
            ))),
        }
    }
}

impl fmt::Display for SimilarityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimilarityKind::Jaccard => "jaccard",
            SimilarityKind::Overlap => "overlap",
            SimilarityKind::Otsuka => "otsuka",
        };
        f.write_str(name)
    }
}

/// Dense symmetric similarity matrix over all sets of `sets`, in collection
/// order. The diagonal holds each set's self-similarity (1).
///
/// Intersection sizes come from a single sparse product of the set × element
/// incidence matrix with its transpose.
pub fn pairwise_similarity(sets: &SetCollection, kind: SimilarityKind) -> Result<Array2<f64>> {
    let relation = sets.relation();
    let mut element_index: HashMap<&str, usize> = HashMap::new();
    let mut row_indices = Vec::with_capacity(relation.pairs().len());
    let mut col_indices = Vec::with_capacity(relation.pairs().len());

    for (set_idx, element) in relation.pairs() {
        let next = element_index.len();
        let col = *element_index.entry(element.as_str()).or_insert(next);
        row_indices.push(*set_idx);
        col_indices.push(col);
    }

    let n_sets = sets.len();
    let values = vec![1.0; row_indices.len()];
    let coo = CooMatrix::try_from_triplets(
        n_sets,
        element_index.len(),
        row_indices,
        col_indices,
        values,
    )?;
    let incidence = CsrMatrix::from(&coo);
    let intersections = &incidence * &incidence.transpose();

    let sizes: Vec<f64> = sets.sizes().into_iter().map(|s| s as f64).collect();
    let mut similarity = Array2::zeros((n_sets, n_sets));
    for (i, j, &k) in intersections.triplet_iter() {
        similarity[[i, j]] = kind.coefficient(sizes[i], sizes[j], k);
    }

    Ok(similarity)
}

/// Smallest set size and overlap two *distinct* sets need to reach a cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeThreshold {
    pub min_set_size: usize,
    pub min_overlap: usize,
}

/// Closed-form size thresholds for clustering at `cutoff`.
///
/// Sets smaller than `min_set_size` can only reach the cutoff with an exact
/// duplicate, or with a superset under the overlap coefficient. Returns `None`
/// for a cutoff of 1 (only those cases remain) and for cutoffs outside [0, 1].
pub fn min_cluster_size(kind: SimilarityKind, cutoff: f64) -> Option<SizeThreshold> {
    if !(0.0..1.0).contains(&cutoff) {
        return None;
    }

    // guard against 0.8 / 0.2 evaluating to 4.000000000000001
    let ceil = |x: f64| ((x - 1e-9).ceil().max(1.0)) as usize;

    let threshold = match kind {
        SimilarityKind::Jaccard => {
            let k = ceil(cutoff / (1.0 - cutoff));
            SizeThreshold {
                min_set_size: k,
                min_overlap: k,
            }
        }
        SimilarityKind::Overlap => {
            let k = ceil(cutoff / (1.0 - cutoff));
            SizeThreshold {
                min_set_size: k + 1,
                min_overlap: k,
            }
        }
        SimilarityKind::Otsuka => {
            let c2 = cutoff * cutoff;
            let k = ceil(c2 / (1.0 - c2));
            SizeThreshold {
                min_set_size: k,
                min_overlap: k,
            }
        }
    };
    Some(threshold)
}
