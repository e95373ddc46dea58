use std::collections::HashMap;

use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{EnrichmentError, Result};
use crate::sets::ElementRelation;

/// Sparse gene set membership matrix (sets × genes).
///
/// Columns follow the gene order of the matrix the incidence was built
/// against. Genes that belong to no set are listed in `background`: they have
/// an empty column but still count as "not in set" for every set.
#[derive(Debug, Clone)]
pub struct IncidenceMatrix {
    matrix: CsrMatrix<f64>,
    set_names: Vec<String>,
    background: Vec<usize>,
}

/// Build the incidence matrix of `relation` over `genes`.
///
/// Elements that are not in `genes` are ignored. Sets without any gene in
/// `genes` keep an empty row.
pub fn build_incidence(relation: &ElementRelation, genes: &[String]) -> Result<IncidenceMatrix> {
    let gene_index: HashMap<&str, usize> = genes
        .iter()
        .enumerate()
        .map(|(i, g)| (g.as_str(), i))
        .collect();

    let mut row_indices = Vec::with_capacity(relation.pairs().len());
    let mut col_indices = Vec::with_capacity(relation.pairs().len());
    let mut assigned = vec![false; genes.len()];

    for (set_idx, element) in relation.pairs() {
        if let Some(&col) = gene_index.get(element.as_str()) {
            row_indices.push(*set_idx);
            col_indices.push(col);
            assigned[col] = true;
        }
    }

    let values = vec![1.0; row_indices.len()];
    let coo = CooMatrix::try_from_triplets(
        relation.set_names().len(),
        genes.len(),
        row_indices,
        col_indices,
        values,
    )?;

    let background = assigned
        .iter()
        .enumerate()
        .filter_map(|(i, &a)| (!a).then_some(i))
        .collect();

    Ok(IncidenceMatrix {
        matrix: CsrMatrix::from(&coo),
        set_names: relation.set_names().to_vec(),
        background,
    })
}

impl IncidenceMatrix {
    pub fn n_sets(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_genes(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn set_names(&self) -> &[String] {
        &self.set_names
    }

    /// Gene columns that belong to no set
    pub fn background(&self) -> &[usize] {
        &self.background
    }

    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    /// Column indices of the genes in set `set_idx`
    pub fn members(&self, set_idx: usize) -> &[usize] {
        let offsets = self.matrix.row_offsets();
        &self.matrix.col_indices()[offsets[set_idx]..offsets[set_idx + 1]]
    }

    /// Number of genes per set
    pub fn row_sums(&self) -> Vec<f64> {
        self.matrix
            .row_iter()
            .map(|row| row.values().iter().sum())
            .collect()
    }

    /// Sparse × dense product: `self (sets × genes) · dense (genes × k)`.
    pub fn mul_dense(&self, dense: &Array2<f64>) -> Result<Array2<f64>> {
        if dense.nrows() != self.n_genes() {
            return Err(EnrichmentError::invalid(format!(
                "cannot multiply incidence with {} genes by a matrix with {} rows",
                self.n_genes(),
                dense.nrows()
            )));
        }

        let n_cols = dense.ncols();
        let rows: Vec<Vec<f64>> = (0..self.n_sets())
            .into_par_iter()
            .map(|set_idx| {
                let row = self.matrix.row(set_idx);
                let mut acc = vec![0.0; n_cols];
                for (&gene, &weight) in row.col_indices().iter().zip(row.values()) {
                    for (a, &v) in acc.iter_mut().zip(dense.row(gene).iter()) {
                        *a += weight * v;
                    }
                }
                acc
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((self.n_sets(), n_cols), flat)
            .map_err(|e| EnrichmentError::invalid(format!("incidence product shape: {}", e)))
    }

    /// Keep the sets flagged in `keep`, in their current order.
    pub fn retain_sets(&self, keep: &[bool]) -> Result<IncidenceMatrix> {
        if keep.len() != self.n_sets() {
            return Err(EnrichmentError::invalid(format!(
                "set mask has {} entries for {} sets",
                keep.len(),
                self.n_sets()
            )));
        }

        let mut row_indices = Vec::new();
        let mut col_indices = Vec::new();
        let mut set_names = Vec::new();
        for (old_idx, _) in keep.iter().enumerate().filter(|(_, k)| **k) {
            let new_idx = set_names.len();
            for &col in self.members(old_idx) {
                row_indices.push(new_idx);
                col_indices.push(col);
            }
            set_names.push(self.set_names[old_idx].clone());
        }

        let values = vec![1.0; row_indices.len()];
        let coo = CooMatrix::try_from_triplets(
            set_names.len(),
            self.n_genes(),
            row_indices,
            col_indices,
            values,
        )?;

        Ok(IncidenceMatrix {
            matrix: CsrMatrix::from(&coo),
            set_names,
            background: self.background.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sets::SetCollection;
    use ndarray::array;

    fn genes(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("g{}", i)).collect()
    }

    #[test]
    fn test_background_genes_tracked_separately() {
        let sets = SetCollection::new(vec![
            ("A", vec!["g1", "g2", "x"]),
            ("B", vec!["g2", "g3"]),
        ])
        .unwrap();
        let incidence = build_incidence(&sets.relation(), &genes(5)).unwrap();

        assert_eq!(incidence.n_sets(), 2);
        assert_eq!(incidence.n_genes(), 5);
        assert_eq!(incidence.row_sums(), vec![2.0, 2.0]);
        assert_eq!(incidence.background(), &[3, 4]);
        assert_eq!(incidence.members(0), &[0, 1]);
    }

    #[test]
    fn test_mul_dense() {
        let sets = SetCollection::new(vec![("A", vec!["g1", "g3"]), ("B", vec!["g2"])]).unwrap();
        let incidence = build_incidence(&sets.relation(), &genes(3)).unwrap();
        let dense = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];

        let product = incidence.mul_dense(&dense).unwrap();
        assert_eq!(product, array![[4.0, 40.0], [2.0, 20.0]]);

        assert!(incidence.mul_dense(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_retain_sets() {
        let sets = SetCollection::new(vec![
            ("A", vec!["g1"]),
            ("B", vec!["g2", "g3"]),
            ("C", vec!["g1", "g3"]),
        ])
        .unwrap();
        let incidence = build_incidence(&sets.relation(), &genes(4)).unwrap();
        let kept = incidence.retain_sets(&[false, true, true]).unwrap();

        assert_eq!(kept.set_names(), &["B".to_string(), "C".to_string()]);
        assert_eq!(kept.members(1), &[0, 2]);
        assert_eq!(kept.background(), &[3]);
    }

    #[test]
    fn test_members_follow_row_offsets() {
        let sets = SetCollection::new(vec![
            ("A", vec!["g2", "g4"]),
            ("outside", vec!["x1"]),
            ("C", vec!["g1", "g3", "g4"]),
        ])
        .unwrap();
        let incidence = build_incidence(&sets.relation(), &genes(4)).unwrap();

        assert_eq!(incidence.members(0), &[1, 3]);
        assert!(incidence.members(1).is_empty());
        assert_eq!(incidence.members(2), &[0, 2, 3]);
    }
}
