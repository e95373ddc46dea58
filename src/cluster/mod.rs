//! Clustering of redundant gene sets by pairwise similarity.
//!
//! Similarities below the cutoff are set to zero. Sets with no remaining
//! similarity to any other set become singleton clusters without entering the
//! hierarchical clustering, so raising the cutoff shrinks the clustering
//! problem.

pub mod hclust;

use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::error::{EnrichmentError, Result};
use crate::sets::{SetCollection, SimilarityKind, min_cluster_size, pairwise_similarity};

pub use hclust::{Dendrogram, Linkage, MergeStep, hclust};

/// Configuration for [`cluster_sets`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterConfig {
    pub similarity: SimilarityKind,
    /// Similarities strictly below this value are treated as 0
    pub cutoff: f64,
    pub linkage: Linkage,
    /// Dendrogram cut height on the `1 - similarity` scale
    pub height: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            similarity: SimilarityKind::Jaccard,
            cutoff: 0.85,
            linkage: Linkage::Complete,
            height: 0.9,
        }
    }
}

impl ClusterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_similarity(mut self, similarity: SimilarityKind) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.cutoff.is_finite() || !(0.0..=1.0).contains(&self.cutoff) {
            return Err(EnrichmentError::invalid(format!(
                "similarity cutoff must lie in [0, 1], got {}",
                self.cutoff
            )));
        }
        if !self.height.is_finite() {
            return Err(EnrichmentError::invalid(format!(
                "cut height must be finite, got {}",
                self.height
            )));
        }
        Ok(())
    }
}

/// Cluster assignment of one gene set.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetCluster {
    pub set: String,
    /// 1-based cluster id
    pub cluster: usize,
    pub set_size: usize,
}

/// Group gene sets into clusters of similar sets.
///
/// Returns one entry per set, sorted by cluster id, then by decreasing set
/// size, then by set name.
///
/// # Arguments
/// * `sets` - Gene sets to cluster
/// * `config` - Similarity coefficient, cutoff, linkage and cut height
///
/// # Returns
/// * `Result<Vec<SetCluster>>` - 1-based cluster id and size of every set
///
/// # Errors
/// * `InvalidInput` - cutoff outside [0, 1], non-finite height, or a height cut on a non-monotone tree
///
/// # Example
/// ```
/// use single_enrichment::cluster::{ClusterConfig, cluster_sets};
/// use single_enrichment::sets::SetCollection;
///
/// let sets = SetCollection::new(vec![
///     ("A", vec!["g1", "g2", "g3", "g4", "g5"]),
///     ("B", vec!["g1", "g2", "g3", "g4"]),
///     ("C", vec!["g7", "g8"]),
/// ]).unwrap();
///
/// let clusters = cluster_sets(&sets, &ClusterConfig::new().with_cutoff(0.5)).unwrap();
/// assert_eq!(clusters[0].cluster, clusters[1].cluster);
/// assert_eq!(clusters[2].set, "C");
/// ```
#[instrument(skip_all, fields(n_sets = sets.len(), similarity = %config.similarity, cutoff = config.cutoff))]
pub fn cluster_sets(sets: &SetCollection, config: &ClusterConfig) -> Result<Vec<SetCluster>> {
    config.validate()?;

    let sizes = sets.sizes();
    if let Some(threshold) = min_cluster_size(config.similarity, config.cutoff) {
        let n_small = sizes.iter().filter(|&&s| s < threshold.min_set_size).count();
        debug!(
            n_small,
            min_set_size = threshold.min_set_size,
            min_overlap = threshold.min_overlap,
            "sets too small to cluster except with duplicates"
        );
    }

    let mut similarity = pairwise_similarity(sets, config.similarity)?;
    similarity.diag_mut().fill(0.0);
    similarity.mapv_inplace(|s| if s < config.cutoff { 0.0 } else { s });

    let (connected, isolated): (Vec<usize>, Vec<usize>) = (0..sets.len())
        .partition(|&i| similarity.row(i).iter().any(|&s| s > 0.0));

    let mut ids = vec![0usize; sets.len()];
    let mut next_id = 1;

    if connected.is_empty() {
        info!(
            cutoff = config.cutoff,
            "no pair of gene sets reaches the similarity cutoff; every set is its own cluster"
        );
    } else {
        let n = connected.len();
        let dissimilarity = Array2::from_shape_fn((n, n), |(a, b)| {
            if a == b {
                0.0
            } else {
                1.0 - similarity[[connected[a], connected[b]]]
            }
        });
        let labels = hclust(&dissimilarity, config.linkage)?.cut_height(config.height)?;
        for (&set_idx, &label) in connected.iter().zip(&labels) {
            ids[set_idx] = label;
        }
        next_id = labels.iter().copied().max().unwrap_or(0) + 1;
        debug!(
            n_connected = n,
            n_clusters = next_id - 1,
            linkage = %config.linkage,
            "clustered connected sets"
        );
    }

    for set_idx in isolated {
        ids[set_idx] = next_id;
        next_id += 1;
    }

    let mut clusters: Vec<SetCluster> = sets
        .names()
        .iter()
        .zip(ids)
        .zip(sizes)
        .map(|((name, cluster), set_size)| SetCluster {
            set: name.clone(),
            cluster,
            set_size,
        })
        .collect();

    clusters.sort_by(|a, b| {
        a.cluster
            .cmp(&b.cluster)
            .then_with(|| b.set_size.cmp(&a.set_size))
            .then_with(|| a.set.cmp(&b.set))
    });

    Ok(clusters)
}
