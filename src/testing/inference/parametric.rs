//! Parametric competitive set test with a variance inflation factor.
//!
//! The statistics of the genes in a set are compared against those of all
//! other genes with a pooled two-sample t-test. The pooled variance is backed
//! out of the global variance of the contrast, so per-set work is reduced to
//! the in-set mean. The standard error of the in-set mean is inflated by
//! `vif = 1 + (m - 1)·rho` to account for correlation between set members.

use ndarray::{Array1, ArrayView1};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{EnrichmentError, Result};
use crate::testing::OneSidedPValues;
use crate::testing::inference::{SetScore, SetTest};

/// Mean and sample variance of the non-missing values of one contrast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnMoments {
    pub n: f64,
    pub mean: f64,
    pub variance: f64,
}

impl ColumnMoments {
    pub fn from_column(values: ArrayView1<f64>) -> Self {
        let mut n = 0.0;
        let mut sum = 0.0;
        for &v in values.iter().filter(|v| !v.is_nan()) {
            n += 1.0;
            sum += v;
        }
        let mean = sum / n;
        let sum_sq_dev: f64 = values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|&v| (v - mean) * (v - mean))
            .sum();

        ColumnMoments {
            n,
            mean,
            variance: sum_sq_dev / (n - 1.0),
        }
    }

    /// Degrees of freedom of the set test, `G - 2`
    pub fn df(&self) -> f64 {
        self.n - 2.0
    }
}

/// Correlation-adjusted two-sample t statistic for a set of `m` genes with
/// in-set mean `mean_in_set`.
pub fn camera_t_statistic(moments: &ColumnMoments, m: f64, mean_in_set: f64, correlation: f64) -> f64 {
    let g = moments.n;
    let m2 = g - m;
    let df = moments.df();

    let vif = 1.0 + (m - 1.0) * correlation;
    let delta = g / m2 * (mean_in_set - moments.mean);
    let var_pooled = ((g - 1.0) * moments.variance - delta * delta * m * m2 / g) / df;

    delta / (var_pooled * (vif / m + 1.0 / m2)).sqrt()
}

/// One-sided p-values of `t` under a Student t distribution with `dist`'s df.
///
/// Non-finite statistics (constant contrasts) give `NaN` p-values, while
/// infinite ones map to 0/1.
pub fn t_p_values(t: f64, dist: &StudentsT) -> OneSidedPValues {
    if t.is_nan() {
        return OneSidedPValues::new(f64::NAN, f64::NAN);
    }
    if t.is_infinite() {
        return if t > 0.0 {
            OneSidedPValues::new(0.0, 1.0)
        } else {
            OneSidedPValues::new(1.0, 0.0)
        };
    }
    OneSidedPValues::new(dist.sf(t), dist.cdf(t))
}

/// Parametric set test on the mean statistic of the set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParametricTest;

/// Per-contrast quantities of the parametric test.
#[derive(Debug, Clone)]
pub struct ParametricSummary {
    moments: ColumnMoments,
    dist: StudentsT,
}

impl SetTest for ParametricTest {
    type Summary = ParametricSummary;

    fn name(&self) -> &'static str {
        "parametric"
    }

    fn summarize(&self, column: ArrayView1<f64>) -> Result<(Array1<f64>, ParametricSummary)> {
        let moments = ColumnMoments::from_column(column);
        let dist = StudentsT::new(0.0, 1.0, moments.df()).map_err(|e| {
            EnrichmentError::invalid(format!(
                "t distribution with {} degrees of freedom: {}",
                moments.df(),
                e
            ))
        })?;
        let zero_filled = column.mapv(|v| if v.is_nan() { 0.0 } else { v });

        Ok((zero_filled, ParametricSummary { moments, dist }))
    }

    fn score(&self, summary: &ParametricSummary, m: f64, set_sum: f64, correlation: f64) -> SetScore {
        let t = camera_t_statistic(&summary.moments, m, set_sum / m, correlation);
        SetScore {
            statistic: t,
            degrees_of_freedom: Some(summary.moments.df()),
            p_values: t_p_values(t, &summary.dist),
        }
    }
}
