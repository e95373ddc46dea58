use std::fmt;
use std::str::FromStr;

use ndarray::Array2;

use crate::error::{EnrichmentError, Result};

/// Linkage criterion for hierarchical clustering.
///
/// Cluster distances are updated with the Lance-Williams recurrence.
/// `Median` and `Centroid` expect squared Euclidean-like dissimilarities and
/// may produce non-monotone merge heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Linkage {
    Single,
    #[default]
    Complete,
    Average,
    McQuitty,
    Median,
    Centroid,
    WardD,
    WardD2,
}

impl FromStr for Linkage {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" | "UPGMA" => Ok(Linkage::Average),
            "mcquitty" | "WPGMA" => Ok(Linkage::McQuitty),
            "median" | "WPGMC" => Ok(Linkage::Median),
            "centroid" | "UPGMC" => Ok(Linkage::Centroid),
            "ward.D" => Ok(Linkage::WardD),
            "ward.D2" => Ok(Linkage::WardD2),
            other => Err(EnrichmentError::invalid(format!(
                "unknown linkage method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::McQuitty => "mcquitty",
            Linkage::Median => "median",
            Linkage::Centroid => "centroid",
            Linkage::WardD => "ward.D",
            Linkage::WardD2 => "ward.D2",
        };
        f.write_str(name)
    }
}

impl Linkage {
    /// Distance from the merge of clusters `i` and `j` to cluster `k`.
    fn update(&self, d_ik: f64, d_jk: f64, d_ij: f64, n_i: f64, n_j: f64, n_k: f64) -> f64 {
        match self {
            Linkage::Single => d_ik.min(d_jk),
            Linkage::Complete => d_ik.max(d_jk),
            Linkage::Average => (n_i * d_ik + n_j * d_jk) / (n_i + n_j),
            Linkage::McQuitty => 0.5 * (d_ik + d_jk),
            Linkage::Median => 0.5 * d_ik + 0.5 * d_jk - 0.25 * d_ij,
            Linkage::Centroid => {
                let n = n_i + n_j;
                (n_i * d_ik + n_j * d_jk) / n - n_i * n_j * d_ij / (n * n)
            }
            Linkage::WardD | Linkage::WardD2 => {
                ((n_i + n_k) * d_ik + (n_j + n_k) * d_jk - n_k * d_ij) / (n_i + n_j + n_k)
            }
        }
    }
}

/// A single merge step in the dendrogram.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeStep {
    /// Representative observation of the first merged cluster
    pub cluster_a: usize,
    /// Representative observation of the second merged cluster
    pub cluster_b: usize,
    pub height: f64,
    pub size: usize,
}

/// Result of agglomerative clustering: `n - 1` merges in order.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    n: usize,
    merges: Vec<MergeStep>,
}

/// Agglomerative hierarchical clustering of a symmetric dissimilarity matrix.
///
/// At each step the closest pair of active clusters is merged; ties are
/// broken by the first pair in row-major order.
///
/// # Arguments
/// * `dissimilarity` - Square matrix of finite pairwise dissimilarities; the diagonal is ignored
/// * `linkage` - Lance-Williams update rule
///
/// # Returns
/// * `Result<Dendrogram>` - The `n - 1` merges in order
///
/// # Example
/// ```
/// use ndarray::array;
/// use single_enrichment::cluster::{Linkage, hclust};
///
/// let d = array![[0.0, 0.1, 0.9], [0.1, 0.0, 0.8], [0.9, 0.8, 0.0]];
/// let tree = hclust(&d, Linkage::Average).unwrap();
/// assert_eq!(tree.merges().len(), 2);
/// assert_eq!(tree.cut_height(0.5).unwrap(), vec![1, 1, 2]);
/// ```
pub fn hclust(dissimilarity: &Array2<f64>, linkage: Linkage) -> Result<Dendrogram> {
    let (n, n_cols) = dissimilarity.dim();
    if n != n_cols {
        return Err(EnrichmentError::invalid(format!(
            "dissimilarity matrix must be square, got {} x {}",
            n, n_cols
        )));
    }
    if let Some(v) = dissimilarity.iter().find(|v| !v.is_finite()) {
        return Err(EnrichmentError::invalid(format!(
            "dissimilarities must be finite, found {}",
            v
        )));
    }

    let squared = linkage == Linkage::WardD2;
    let mut dist = if squared {
        dissimilarity.mapv(|d| d * d)
    } else {
        dissimilarity.clone()
    };

    let mut sizes = vec![1usize; n];
    let mut active: Vec<usize> = (0..n).collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    while active.len() > 1 {
        let mut best = (f64::INFINITY, 0, 0);
        for (ai, &a) in active.iter().enumerate() {
            for &b in &active[ai + 1..] {
                if dist[[a, b]] < best.0 {
                    best = (dist[[a, b]], a, b);
                }
            }
        }
        let (d_ab, a, b) = best;

        let (n_a, n_b) = (sizes[a] as f64, sizes[b] as f64);
        for &k in &active {
            if k == a || k == b {
                continue;
            }
            let updated = linkage.update(dist[[a, k]], dist[[b, k]], d_ab, n_a, n_b, sizes[k] as f64);
            dist[[a, k]] = updated;
            dist[[k, a]] = updated;
        }

        sizes[a] += sizes[b];
        active.retain(|&c| c != b);
        merges.push(MergeStep {
            cluster_a: a,
            cluster_b: b,
            height: if squared { d_ab.sqrt() } else { d_ab },
            size: sizes[a],
        });
    }

    Ok(Dendrogram { n, merges })
}

impl Dendrogram {
    pub fn n_observations(&self) -> usize {
        self.n
    }

    pub fn merges(&self) -> &[MergeStep] {
        &self.merges
    }

    /// Cut the tree at `height`: apply every merge up to the first one above
    /// `height`. Cluster ids start at 1 and are numbered in order of first
    /// appearance among the observations.
    pub fn cut_height(&self, height: f64) -> Result<Vec<usize>> {
        if self.merges.windows(2).any(|w| w[1].height < w[0].height) {
            return Err(EnrichmentError::invalid(
                "cannot cut a dendrogram with non-monotone merge heights by height",
            ));
        }

        let mut parent: Vec<usize> = (0..self.n).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for merge in self.merges.iter().take_while(|m| m.height <= height) {
            let ra = find(&mut parent, merge.cluster_a);
            let rb = find(&mut parent, merge.cluster_b);
            parent[rb] = ra;
        }

        let mut ids = vec![0usize; self.n];
        let mut root_ids = vec![0usize; self.n];
        let mut next_id = 0;
        for obs in 0..self.n {
            let root = find(&mut parent, obs);
            if root_ids[root] == 0 {
                next_id += 1;
                root_ids[root] = next_id;
            }
            ids[obs] = root_ids[root];
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Pairwise |x_i - x_j| for points on a line
    fn line_distances(points: &[f64]) -> Array2<f64> {
        Array2::from_shape_fn((points.len(), points.len()), |(i, j)| (points[i] - points[j]).abs())
    }

    #[test]
    fn test_single_linkage_chains() {
        let d = line_distances(&[0.0, 1.0, 2.0, 10.0]);
        let tree = hclust(&d, Linkage::Single).unwrap();
        assert_eq!(tree.merges().len(), 3);
        assert_eq!(tree.cut_height(1.5).unwrap(), vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_complete_linkage_heights() {
        let d = line_distances(&[0.0, 1.0, 2.0, 10.0]);
        let tree = hclust(&d, Linkage::Complete).unwrap();
        let heights: Vec<f64> = tree.merges().iter().map(|m| m.height).collect();
        assert_relative_eq!(heights[0], 1.0);
        assert_relative_eq!(heights[1], 2.0);
        assert_relative_eq!(heights[2], 10.0);

        // complete linkage needs height 2 to join the first three points
        assert_eq!(tree.cut_height(1.5).unwrap(), vec![1, 1, 2, 3]);
        assert_eq!(tree.cut_height(2.0).unwrap(), vec![1, 1, 1, 2]);
        assert_eq!(tree.cut_height(10.0).unwrap(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_average_and_ward() {
        let d = line_distances(&[0.0, 1.0, 10.0, 11.0]);
        for linkage in [Linkage::Average, Linkage::McQuitty, Linkage::WardD, Linkage::WardD2] {
            let tree = hclust(&d, linkage).unwrap();
            let labels = tree.cut_height(5.0).unwrap();
            assert_eq!(labels, vec![1, 1, 2, 2], "linkage {}", linkage);
        }
    }

    #[test]
    fn test_cut_numbering_follows_first_appearance() {
        let d = line_distances(&[10.0, 0.0, 11.0, 1.0]);
        let tree = hclust(&d, Linkage::Complete).unwrap();
        assert_eq!(tree.cut_height(1.0).unwrap(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_parse_linkage() {
        assert_eq!("ward.D2".parse::<Linkage>().unwrap(), Linkage::WardD2);
        assert_eq!("complete".parse::<Linkage>().unwrap(), Linkage::Complete);
        assert!("ward".parse::<Linkage>().is_err());
    }

    #[test]
    fn test_invalid_matrix() {
        assert!(hclust(&Array2::zeros((2, 3)), Linkage::Single).is_err());
        let mut d = line_distances(&[0.0, 1.0]);
        d[[0, 1]] = f64::NAN;
        assert!(hclust(&d, Linkage::Single).is_err());
    }
}
