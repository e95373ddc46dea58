use ndarray::{Array1, ArrayView1};

use crate::error::Result;
use crate::testing::OneSidedPValues;

pub mod nonparametric;

pub mod parametric;

pub use nonparametric::RankSumTest;
pub use parametric::ParametricTest;

/// Score of one gene set in one contrast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetScore {
    /// Test statistic reported for the winning direction
    pub statistic: f64,
    /// Degrees of freedom (parametric test only)
    pub degrees_of_freedom: Option<f64>,
    pub p_values: OneSidedPValues,
}

/// A competitive gene set test evaluated one contrast at a time.
///
/// The engine calls [`SetTest::summarize`] once per contrast, sums the
/// returned per-gene values over every set with a single sparse product, and
/// then calls [`SetTest::score`] for each set with that sum.
pub trait SetTest: Sync {
    /// Per-contrast quantities shared by every set of the contrast.
    type Summary: Send + Sync;

    fn name(&self) -> &'static str;

    /// Values to sum over set members (missing genes must contribute 0) and the
    /// contrast summary.
    fn summarize(&self, column: ArrayView1<f64>) -> Result<(Array1<f64>, Self::Summary)>;

    /// Score a set with `m` non-missing genes whose summed values are `set_sum`.
    fn score(&self, summary: &Self::Summary, m: f64, set_sum: f64, correlation: f64) -> SetScore;
}
