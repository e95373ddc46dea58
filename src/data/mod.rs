//! Per-gene statistic matrix consumed by the gene set tests.
//!
//! Rows are genes, columns are contrasts. Missing values are stored as `NaN`
//! and are excluded from every per-contrast computation.

use std::collections::HashSet;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use single_utilities::traits::FloatOps;

use crate::error::{EnrichmentError, Result};

fn validate_labels(labels: &[String], kind: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        if label.trim().is_empty() {
            return Err(EnrichmentError::invalid(format!(
                "{} name at position {} is empty",
                kind, i
            )));
        }
        if !seen.insert(label.as_str()) {
            return Err(EnrichmentError::invalid(format!(
                "duplicate {} name '{}'",
                kind, label
            )));
        }
    }
    Ok(())
}

/// A dense matrix of per-gene statistics (e.g. moderated t-statistics).
#[derive(Debug, Clone)]
pub struct StatisticMatrix {
    values: Array2<f64>,
    genes: Vec<String>,
    contrasts: Vec<String>,
}

impl StatisticMatrix {
    /// Create a statistic matrix; `NaN` entries are treated as missing.
    pub fn new(values: Array2<f64>, genes: Vec<String>, contrasts: Vec<String>) -> Result<Self> {
        let (n_genes, n_contrasts) = values.dim();

        if genes.len() != n_genes {
            return Err(EnrichmentError::invalid(format!(
                "statistic matrix has {} rows but {} gene names",
                n_genes,
                genes.len()
            )));
        }
        if contrasts.len() != n_contrasts {
            return Err(EnrichmentError::invalid(format!(
                "statistic matrix has {} columns but {} contrast names",
                n_contrasts,
                contrasts.len()
            )));
        }
        if n_genes == 0 || n_contrasts == 0 {
            return Err(EnrichmentError::invalid("statistic matrix is empty"));
        }

        validate_labels(&genes, "gene")?;
        validate_labels(&contrasts, "contrast")?;

        if let Some(((row, col), _)) = values.indexed_iter().find(|(_, v)| v.is_infinite()) {
            return Err(EnrichmentError::invalid(format!(
                "statistic matrix must be numeric and finite; found infinite value for gene '{}' in contrast '{}'",
                genes[row], contrasts[col]
            )));
        }

        Ok(Self {
            values,
            genes,
            contrasts,
        })
    }

    /// Create from optional values, `None` marking a missing statistic.
    pub fn from_options(
        values: Array2<Option<f64>>,
        genes: Vec<String>,
        contrasts: Vec<String>,
    ) -> Result<Self> {
        Self::new(values.mapv(|v| v.unwrap_or(f64::NAN)), genes, contrasts)
    }

    /// Create from any float type of the single-rust ecosystem.
    pub fn from_array<T>(values: &Array2<T>, genes: Vec<String>, contrasts: Vec<String>) -> Result<Self>
    where
        T: FloatOps,
    {
        let converted = values.mapv(|v| {
            if num_traits::Float::is_nan(v) {
                f64::NAN
            } else {
                v.to_f64().unwrap_or(f64::NAN)
            }
        });
        Self::new(converted, genes, contrasts)
    }

    /// Get the number of genes
    pub fn n_genes(&self) -> usize {
        self.values.nrows()
    }

    /// Get the number of contrasts
    pub fn n_contrasts(&self) -> usize {
        self.values.ncols()
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn contrasts(&self) -> &[String] {
        &self.contrasts
    }

    /// Raw values, `NaN` where missing
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn column(&self, contrast: usize) -> ArrayView1<'_, f64> {
        self.values.column(contrast)
    }

    /// Number of non-missing statistics per contrast (`G`)
    pub fn non_missing_counts(&self) -> Array1<usize> {
        self.values
            .axis_iter(Axis(1))
            .map(|col| col.iter().filter(|v| !v.is_nan()).count())
            .collect()
    }

    /// 1.0 where a statistic is present, 0.0 where missing
    pub fn non_missing_indicator(&self) -> Array2<f64> {
        self.values.mapv(|v| if v.is_nan() { 0.0 } else { 1.0 })
    }
}
