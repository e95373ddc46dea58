//! Rank-sum (Wilcoxon-Mann-Whitney) moments with correlation and tie corrections.

use ndarray::{Array1, ArrayView1};
use statrs::distribution::{ContinuousCDF, Normal};
use std::cmp::Ordering;

use crate::error::{EnrichmentError, Result};
use crate::testing::inference::{SetScore, SetTest};
use crate::testing::{Direction, OneSidedPValues};

/// Average ranks of the non-missing values of `values`.
///
/// Missing (`NaN`) entries are excluded from ranking and receive rank 0 so
/// that sums of ranks only collect present values. Also returns
/// `Σ t(t+1)(t-1)` over the tie groups of the present values.
pub fn rank_with_ties(values: ArrayView1<f64>) -> (Array1<f64>, f64) {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, &v)| (i, v))
        .collect();
    present.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut ranks = Array1::zeros(values.len());
    let mut tie_sum = 0.0;
    let mut i = 0;
    while i < present.len() {
        let mut j = i + 1;
        while j < present.len() && present[j].1 == present[i].1 {
            j += 1;
        }

        // positions i..j hold ranks i+1..=j
        let rank = (i + j + 1) as f64 / 2.0;
        for &(idx, _) in &present[i..j] {
            ranks[idx] = rank;
        }

        let t = (j - i) as f64;
        if j - i > 1 {
            tie_sum += t * (t + 1.0) * (t - 1.0);
        }
        i = j;
    }

    (ranks, tie_sum)
}

/// Variance multiplier for ties among `n` ranked values.
pub fn tie_adjustment(tie_sum: f64, n: f64) -> f64 {
    1.0 - tie_sum / (n * (n + 1.0) * (n - 1.0))
}

/// Variance of the rank-sum statistic for `m` genes in the set and `m2`
/// outside it, when set members share pairwise correlation `correlation`.
///
/// With zero correlation this is the classical `m·m2·(m + m2 + 1)/12`.
pub fn rank_sum_variance(m: f64, m2: f64, correlation: f64) -> f64 {
    if correlation == 0.0 {
        return m * m2 * (m + m2 + 1.0) / 12.0;
    }

    let arcsines = 1.0_f64.asin()
        + (m2 - 1.0) * (0.5_f64.asin() + (m - 1.0) * (correlation / 2.0).asin())
        + (m - 1.0) * ((correlation + 1.0) / 2.0).asin();
    arcsines * m * m2 / (2.0 * std::f64::consts::PI)
}

/// Continuity-corrected z-scores of a rank-sum test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankSumScores {
    /// `(U + 0.5 - mu) / sigma`
    pub z_lower: f64,
    /// `(U - 0.5 - mu) / sigma`
    pub z_upper: f64,
}

/// Mann-Whitney `U` counting (outside, inside) pairs where the outside gene
/// ranks higher, with its mean and the continuity-corrected z-scores.
///
/// `sum_ranks` is the sum of the in-set ranks over all `m + m2` ranked genes.
pub fn rank_sum_scores(sum_ranks: f64, m: f64, m2: f64, variance: f64) -> RankSumScores {
    let u = m * m2 + m * (m + 1.0) / 2.0 - sum_ranks;
    let mu = 0.5 * m * m2;
    let sigma = variance.sqrt();
    RankSumScores {
        z_lower: (u + 0.5 - mu) / sigma,
        z_upper: (u - 0.5 - mu) / sigma,
    }
}

impl RankSumScores {
    /// One-sided p-values from the standard normal.
    ///
    /// A small `U` means set genes outrank the background, so `Up` is the lower
    /// tail of `z_lower` and `Down` the upper tail of `z_upper`.
    pub fn p_values(&self, normal: &Normal) -> OneSidedPValues {
        OneSidedPValues::new(normal.cdf(self.z_lower), normal.sf(self.z_upper))
    }

    /// Reported z score: `z_lower` when `Down` wins, `z_upper` otherwise.
    ///
    /// Both are centred on `U`, so a set ranking above the background gets a
    /// negative score.
    pub fn statistic(&self, p: &OneSidedPValues) -> f64 {
        match p.direction() {
            Direction::Up => self.z_upper,
            Direction::Down => self.z_lower,
        }
    }
}

/// Rank-based set test (correlation-adjusted Wilcoxon-Mann-Whitney).
#[derive(Debug, Clone, Copy, Default)]
pub struct RankSumTest;

/// Per-contrast quantities of the rank-sum test.
#[derive(Debug, Clone)]
pub struct RankSummary {
    n: f64,
    tie_factor: f64,
    normal: Normal,
}

impl SetTest for RankSumTest {
    type Summary = RankSummary;

    fn name(&self) -> &'static str {
        "rank_sum"
    }

    fn summarize(&self, column: ArrayView1<f64>) -> Result<(Array1<f64>, RankSummary)> {
        let (ranks, tie_sum) = rank_with_ties(column);
        let n = column.iter().filter(|v| !v.is_nan()).count() as f64;
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| EnrichmentError::invalid(format!("standard normal: {}", e)))?;

        Ok((
            ranks,
            RankSummary {
                n,
                tie_factor: tie_adjustment(tie_sum, n),
                normal,
            },
        ))
    }

    fn score(&self, summary: &RankSummary, m: f64, set_sum: f64, correlation: f64) -> SetScore {
        let m2 = summary.n - m;
        let variance = rank_sum_variance(m, m2, correlation) * summary.tie_factor;
        let scores = rank_sum_scores(set_sum, m, m2, variance);
        let p_values = scores.p_values(&summary.normal);

        SetScore {
            statistic: scores.statistic(&p_values),
            degrees_of_freedom: None,
            p_values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_rank_with_ties_and_missing() {
        let values = array![3.0, f64::NAN, 1.0, 3.0, 2.0];
        let (ranks, tie_sum) = rank_with_ties(values.view());

        assert_eq!(ranks.to_vec(), vec![3.5, 0.0, 1.0, 3.5, 2.0]);
        // one tie group of size 2: 2·3·1
        assert_eq!(tie_sum, 6.0);
    }

    #[test]
    fn test_rank_without_ties() {
        let (ranks, tie_sum) = rank_with_ties(array![0.5, -1.0, 2.0].view());
        assert_eq!(ranks.to_vec(), vec![2.0, 1.0, 3.0]);
        assert_eq!(tie_sum, 0.0);
        assert_eq!(tie_adjustment(tie_sum, 3.0), 1.0);
    }

    #[test]
    fn test_zero_correlation_is_classical() {
        for &(m, m2) in &[(2.0, 4.0), (5.0, 95.0), (50.0, 10_000.0)] {
            assert_eq!(rank_sum_variance(m, m2, 0.0), m * m2 * (m + m2 + 1.0) / 12.0);
        }
        assert_relative_eq!(rank_sum_variance(2.0, 4.0, 0.0), 56.0 / 12.0);
    }

    #[test]
    fn test_correlation_limit_matches_independence() {
        // Without ties the arcsine form at rho -> 0 is the independent variance
        // of a continuous rank sum, m·m2·(m + m2 + 1)/12.
        let (m, m2) = (10.0, 90.0);
        let near_zero = rank_sum_variance(m, m2, 1e-9);
        assert_relative_eq!(near_zero, m * m2 * (m + m2 + 1.0) / 12.0, max_relative = 1e-6);
    }

    #[test]
    fn test_arcsine_variance_values() {
        use std::f64::consts::PI;

        let expected = (PI / 2.0 + 3.0 * (PI / 6.0 + 0.25_f64.asin()) + 0.75_f64.asin()) * 8.0 / (2.0 * PI);
        assert_relative_eq!(rank_sum_variance(2.0, 4.0, 0.5), expected, epsilon = 1e-12);
        assert_relative_eq!(rank_sum_variance(2.0, 4.0, 0.5), 6.044953654411532, epsilon = 1e-12);

        // m = 3 weights the asin(rho / 2) term by (m2 - 1)(m - 1) = 8
        let expected = (PI / 2.0 + 4.0 * (PI / 6.0 + 2.0 * (-0.1_f64).asin()) + 2.0 * 0.4_f64.asin()) * 15.0
            / (2.0 * PI);
        assert_relative_eq!(rank_sum_variance(3.0, 5.0, -0.2), expected, epsilon = 1e-12);
        assert_relative_eq!(rank_sum_variance(3.0, 5.0, -0.2), 8.801791380761225, epsilon = 1e-12);
    }

    #[test]
    fn test_positive_correlation_inflates_variance() {
        let (m, m2) = (10.0, 90.0);
        assert!(rank_sum_variance(m, m2, 0.1) > rank_sum_variance(m, m2, 0.01));
        assert!(rank_sum_variance(m, m2, -0.05) < rank_sum_variance(m, m2, 0.0));
    }

    #[test]
    fn test_top_ranked_set_is_up() {
        // genes ranked 1..6, set holds ranks 5 and 6
        let variance = rank_sum_variance(2.0, 4.0, 0.0);
        let scores = rank_sum_scores(11.0, 2.0, 4.0, variance);
        assert_relative_eq!(scores.z_lower, -3.5 / variance.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(scores.z_upper, -4.5 / variance.sqrt(), epsilon = 1e-12);

        let normal = Normal::new(0.0, 1.0).unwrap();
        let p = scores.p_values(&normal);
        assert_eq!(p.direction(), Direction::Up);
        assert_relative_eq!(scores.statistic(&p), -2.083095, epsilon = 1e-6);
        assert_relative_eq!(p.up, normal.cdf(-1.620185), epsilon = 1e-6);
    }

    #[test]
    fn test_bottom_ranked_set_is_down() {
        // set holds ranks 1 and 2
        let variance = rank_sum_variance(2.0, 4.0, 0.0);
        let scores = rank_sum_scores(3.0, 2.0, 4.0, variance);

        let normal = Normal::new(0.0, 1.0).unwrap();
        let p = scores.p_values(&normal);
        assert_eq!(p.direction(), Direction::Down);
        assert_relative_eq!(scores.statistic(&p), scores.z_lower, epsilon = 1e-12);
        assert_relative_eq!(scores.statistic(&p), 2.083095, epsilon = 1e-6);
    }

    #[test]
    fn test_rank_sum_test_applies_tie_factor() {
        let column = array![1.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let (ranks, summary) = RankSumTest.summarize(column.view()).unwrap();
        assert_eq!(ranks[0], 1.5);
        assert_relative_eq!(summary.tie_factor, 1.0 - 6.0 / 210.0, epsilon = 1e-12);

        // set holds the two largest values: ranks 5 and 6
        let score = RankSumTest.score(&summary, 2.0, 11.0, 0.0);
        let variance = 56.0 / 12.0 * (1.0 - 6.0 / 210.0);
        assert_relative_eq!(score.statistic, -4.5 / f64::sqrt(variance), epsilon = 1e-12);
        assert!(score.degrees_of_freedom.is_none());
    }
}
