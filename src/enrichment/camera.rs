//! Correlation-adjusted competitive gene set test on pre-ranked statistics
//! (CAMERA-PR).
//!
//! For every contrast (column) of a statistic matrix, each gene set is
//! compared with all remaining genes, either with a two-sample t-test on the
//! statistics or with a rank-sum test on their ranks. Both tests inflate the
//! variance of the set with an assumed inter-gene correlation.
//!
//! Per-set aggregates (non-missing counts, sums of statistics or ranks) are
//! computed for all sets and contrasts at once with sparse × dense products
//! against the set incidence matrix.

use std::collections::HashMap;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::data::StatisticMatrix;
use crate::error::{EnrichmentError, Result};
use crate::sets::{IncidenceMatrix, SetCollection, build_incidence};
use crate::testing::Direction;
use crate::testing::correction::{AdjustMethod, adjust_p_values};
use crate::testing::inference::{ParametricTest, RankSumTest, SetTest};

/// Which set test to run on each contrast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SetTestMethod {
    /// t-test on the set's mean statistic
    #[default]
    Parametric,
    /// Wilcoxon-Mann-Whitney test on the ranks of the statistics
    RankSum,
}

/// Assumed correlation between the statistics of genes in the same set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterGeneCorrelation {
    /// One value for every set
    Fixed(f64),
    /// One value per set name; every tested set needs an entry
    PerSet(HashMap<String, f64>),
}

impl Default for InterGeneCorrelation {
    fn default() -> Self {
        InterGeneCorrelation::Fixed(0.01)
    }
}

impl InterGeneCorrelation {
    fn validate(&self) -> Result<()> {
        let check = |value: f64, set: Option<&str>| -> Result<()> {
            let location = set.map(|s| format!(" for set '{}'", s)).unwrap_or_default();
            if value.is_nan() {
                return Err(EnrichmentError::invalid(format!(
                    "inter_gene_cor must not contain missing values{}",
                    location
                )));
            }
            if value <= -1.0 || value >= 1.0 {
                return Err(EnrichmentError::invalid(format!(
                    "inter_gene_cor must lie strictly between -1 and 1; found {}{}",
                    value, location
                )));
            }
            Ok(())
        };

        match self {
            InterGeneCorrelation::Fixed(value) => check(*value, None),
            InterGeneCorrelation::PerSet(values) => {
                if values.is_empty() {
                    return Err(EnrichmentError::invalid("inter_gene_cor mapping is empty"));
                }
                values.iter().try_for_each(|(set, &v)| check(v, Some(set.as_str())))
            }
        }
    }

    /// One correlation per set of `set_names`.
    fn resolve(&self, set_names: &[String]) -> Result<Vec<f64>> {
        match self {
            InterGeneCorrelation::Fixed(value) => Ok(vec![*value; set_names.len()]),
            InterGeneCorrelation::PerSet(values) => {
                let missing: Vec<&str> = set_names
                    .iter()
                    .filter(|name| !values.contains_key(name.as_str()))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return Err(EnrichmentError::invalid(format!(
                        "inter_gene_cor has {} entries but {} gene sets remain after filtering; missing: {}",
                        values.len(),
                        set_names.len(),
                        missing.join(", ")
                    )));
                }
                Ok(set_names.iter().map(|name| values[name.as_str()]).collect())
            }
        }
    }

    fn is_per_set(&self) -> bool {
        matches!(self, InterGeneCorrelation::PerSet(_))
    }
}

/// Options of [`camera_pr`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraConfig {
    pub method: SetTestMethod,
    pub inter_gene_cor: InterGeneCorrelation,
    /// Order records by contrast, then by p-value
    pub sort: bool,
    /// Adjust p-values across all contrasts instead of within each contrast
    pub adjust_globally: bool,
    pub adjust_method: AdjustMethod,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            method: SetTestMethod::Parametric,
            inter_gene_cor: InterGeneCorrelation::default(),
            sort: true,
            adjust_globally: false,
            adjust_method: AdjustMethod::BenjaminiHochberg,
        }
    }
}

impl CameraConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: SetTestMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_use_ranks(self, use_ranks: bool) -> Self {
        self.with_method(if use_ranks {
            SetTestMethod::RankSum
        } else {
            SetTestMethod::Parametric
        })
    }

    pub fn with_inter_gene_cor(mut self, correlation: f64) -> Self {
        self.inter_gene_cor = InterGeneCorrelation::Fixed(correlation);
        self
    }

    pub fn with_per_set_cor(mut self, correlations: HashMap<String, f64>) -> Self {
        self.inter_gene_cor = InterGeneCorrelation::PerSet(correlations);
        self
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_adjust_globally(mut self, adjust_globally: bool) -> Self {
        self.adjust_globally = adjust_globally;
        self
    }

    pub fn with_adjust_method(mut self, method: AdjustMethod) -> Self {
        self.adjust_method = method;
        self
    }
}

/// Test result of one gene set in one contrast.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraRecord {
    pub contrast: String,
    pub gene_set: String,
    /// Genes of the set with a statistic in this contrast
    pub n_genes: usize,
    /// Present only when correlations were given per set
    pub correlation: Option<f64>,
    pub direction: Direction,
    /// t statistic (parametric, positive when the set ranks above the
    /// background) or the continuity-corrected z score of the winning tail
    /// (rank-sum: `z_upper` for `Up`, `z_lower` for `Down`)
    pub statistic: f64,
    /// Degrees of freedom, parametric test only
    pub df: Option<f64>,
    /// Two-sided p-value
    pub p_value: f64,
    /// Adjusted p-value, absent when only one test was run per adjustment group
    pub fdr: Option<f64>,
}

/// Output of [`camera_pr`].
#[derive(Debug, Clone, Default)]
pub struct CameraResult {
    pub records: Vec<CameraRecord>,
    /// Sets removed by the size filter, in collection order
    pub dropped_sets: Vec<String>,
}

impl CameraResult {
    /// Records of one contrast, in result order
    pub fn contrast<'a>(&'a self, contrast: &'a str) -> impl Iterator<Item = &'a CameraRecord> + 'a {
        self.records.iter().filter(move |r| r.contrast == contrast)
    }
}

/// Run CAMERA-PR on every contrast of `statistic` for every set of `sets`.
///
/// Sets are restricted to the genes of `statistic`. Genes that are in no set
/// stay in the background of every set. Sets with fewer than 2 genes, or with
/// every non-missing gene of a contrast, are dropped with a warning.
///
/// # Arguments
/// * `statistic` - Per-gene statistics, one column per contrast, `NaN` where missing
/// * `sets` - Gene sets to test
/// * `config` - Test method, inter-gene correlation, adjustment and sort options
///
/// # Returns
/// * `Result<CameraResult>` - One record per (contrast, surviving set) and the names of dropped sets
///
/// # Errors
/// * `InvalidInput` - a contrast with fewer than 3 values, an invalid correlation, or no set gene in `statistic`
/// * `AllSetsDropped` - no set passes the size filter
///
/// # Example
/// ```
/// use ndarray::array;
/// use single_enrichment::{CameraConfig, SetCollection, StatisticMatrix, camera_pr};
/// use single_enrichment::testing::Direction;
///
/// let genes: Vec<String> = (1..=6).map(|i| format!("g{}", i)).collect();
/// let statistic = StatisticMatrix::new(
///     array![[-1.2, 0.4], [0.3, -0.8], [0.1, 0.2], [-0.5, 1.9], [2.4, 2.2], [2.9, 1.6]],
///     genes,
///     vec!["day1".to_string(), "day7".to_string()],
/// ).unwrap();
/// let sets = SetCollection::new(vec![("late", vec!["g4", "g5", "g6"]), ("early", vec!["g1", "g2"])]).unwrap();
///
/// let config = CameraConfig::new().with_use_ranks(true);
/// let result = camera_pr(&statistic, &sets, &config).unwrap();
/// assert_eq!(result.records.len(), 4);
/// assert_eq!(result.contrast("day7").next().unwrap().direction, Direction::Up);
/// ```
#[instrument(skip_all, fields(genes = statistic.n_genes(), contrasts = statistic.n_contrasts(), sets = sets.len()))]
pub fn camera_pr(
    statistic: &StatisticMatrix,
    sets: &SetCollection,
    config: &CameraConfig,
) -> Result<CameraResult> {
    config.inter_gene_cor.validate()?;

    let g = statistic.non_missing_counts();
    if let Some((c, n)) = g.iter().enumerate().find(|(_, n)| **n < 3) {
        return Err(EnrichmentError::invalid(format!(
            "contrast '{}' has {} non-missing statistics; at least 3 are required",
            statistic.contrasts()[c],
            n
        )));
    }

    let gene_index: HashMap<&str, usize> = statistic
        .genes()
        .iter()
        .enumerate()
        .map(|(i, gene)| (gene.as_str(), i))
        .collect();
    let relation = sets.relation().restrict_to(&gene_index);
    if relation.is_empty() {
        return Err(EnrichmentError::invalid(
            "no element of any gene set is a gene of the statistic matrix",
        ));
    }

    let incidence = build_incidence(&relation, statistic.genes())?;
    debug!(
        n_sets = incidence.n_sets(),
        n_background = incidence.background().len(),
        "built set incidence matrix"
    );

    let set_sizes = incidence.mul_dense(&statistic.non_missing_indicator())?;
    let (incidence, set_sizes, dropped_sets) = filter_sets(incidence, set_sizes, &g)?;

    let correlations = config.inter_gene_cor.resolve(incidence.set_names())?;
    let per_set_cor = config.inter_gene_cor.is_per_set();

    let mut records = match config.method {
        SetTestMethod::Parametric => score_sets(
            &ParametricTest,
            statistic,
            &incidence,
            &set_sizes,
            &correlations,
            per_set_cor,
        )?,
        SetTestMethod::RankSum => score_sets(
            &RankSumTest,
            statistic,
            &incidence,
            &set_sizes,
            &correlations,
            per_set_cor,
        )?,
    };

    adjust_records(&mut records, incidence.n_sets(), config)?;

    if config.sort {
        let order: HashMap<&str, usize> = statistic
            .contrasts()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        records.sort_by(|a, b| {
            order[a.contrast.as_str()]
                .cmp(&order[b.contrast.as_str()])
                .then(a.p_value.total_cmp(&b.p_value))
        });
    }

    Ok(CameraResult {
        records,
        dropped_sets,
    })
}

/// Drop sets with `m < 2` or `m == G` in any contrast.
fn filter_sets(
    incidence: IncidenceMatrix,
    set_sizes: Array2<f64>,
    g: &Array1<usize>,
) -> Result<(IncidenceMatrix, Array2<f64>, Vec<String>)> {
    let keep: Vec<bool> = set_sizes
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .zip(g.iter())
                .all(|(&m, &n)| m >= 2.0 && m < n as f64)
        })
        .collect();

    let kept: Vec<usize> = (0..keep.len()).filter(|&i| keep[i]).collect();
    if kept.is_empty() {
        return Err(EnrichmentError::AllSetsDropped {
            n_sets: incidence.n_sets(),
        });
    }
    if kept.len() == keep.len() {
        return Ok((incidence, set_sizes, Vec::new()));
    }

    let dropped: Vec<String> = incidence
        .set_names()
        .iter()
        .zip(&keep)
        .filter(|(_, k)| !**k)
        .map(|(name, _)| name.clone())
        .collect();
    warn!(
        n_dropped = dropped.len(),
        n_kept = kept.len(),
        "dropping gene sets with fewer than 2 genes or containing every non-missing gene of a contrast"
    );

    let incidence = incidence.retain_sets(&keep)?;
    let set_sizes = set_sizes.select(Axis(0), &kept);
    Ok((incidence, set_sizes, dropped))
}

/// Score every set in every contrast with `test`. Records are returned
/// contrast by contrast in column order, sets in incidence order.
fn score_sets<T: SetTest>(
    test: &T,
    statistic: &StatisticMatrix,
    incidence: &IncidenceMatrix,
    set_sizes: &Array2<f64>,
    correlations: &[f64],
    per_set_cor: bool,
) -> Result<Vec<CameraRecord>> {
    let n_contrasts = statistic.n_contrasts();
    debug!(test = test.name(), n_contrasts, n_sets = incidence.n_sets(), "scoring gene sets");

    let prepared: Vec<(Array1<f64>, T::Summary)> = (0..n_contrasts)
        .into_par_iter()
        .map(|c| test.summarize(statistic.column(c)))
        .collect::<Result<Vec<_>>>()?;

    let mut summed = Array2::zeros((statistic.n_genes(), n_contrasts));
    let mut summaries = Vec::with_capacity(n_contrasts);
    for (c, (values, summary)) in prepared.into_iter().enumerate() {
        summed.column_mut(c).assign(&values);
        summaries.push(summary);
    }
    let set_sums = incidence.mul_dense(&summed)?;

    let records: Vec<Vec<CameraRecord>> = (0..n_contrasts)
        .into_par_iter()
        .map(|c| {
            let contrast = &statistic.contrasts()[c];
            incidence
                .set_names()
                .iter()
                .enumerate()
                .map(|(s, set_name)| {
                    let m = set_sizes[[s, c]];
                    let score = test.score(&summaries[c], m, set_sums[[s, c]], correlations[s]);
                    CameraRecord {
                        contrast: contrast.clone(),
                        gene_set: set_name.clone(),
                        n_genes: m as usize,
                        correlation: per_set_cor.then_some(correlations[s]),
                        direction: score.p_values.direction(),
                        statistic: score.statistic,
                        df: score.degrees_of_freedom,
                        p_value: score.p_values.two_sided(),
                        fdr: None,
                    }
                })
                .collect()
        })
        .collect();

    Ok(records.into_iter().flatten().collect())
}

/// Fill `fdr` globally or per contrast. `records` must still be grouped by
/// contrast in chunks of `n_sets`.
fn adjust_records(records: &mut [CameraRecord], n_sets: usize, config: &CameraConfig) -> Result<()> {
    if records.len() < 2 {
        return Ok(());
    }

    let n_records = records.len();
    let groups: Vec<&mut [CameraRecord]> = if config.adjust_globally {
        vec![&mut *records]
    } else if n_sets > 1 {
        records.chunks_mut(n_sets).collect()
    } else {
        return Ok(());
    };

    for group in groups {
        let p_values: Vec<f64> = group.iter().map(|r| r.p_value).collect();
        let adjusted = adjust_p_values(&p_values, config.adjust_method)?;
        for (record, q) in group.iter_mut().zip(adjusted) {
            record.fdr = Some(q);
        }
    }

    debug!(n_records, globally = config.adjust_globally, "adjusted p-values");
    Ok(())
}
