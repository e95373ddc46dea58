//! Multiple testing correction for the p-values of many gene set tests.
//!
//! Missing p-values (`NaN`) are passed through unchanged and do not count
//! towards the number of tests.

use anyhow::{Result, anyhow};
use std::cmp::Ordering;
use std::str::FromStr;

/// P-value adjustment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdjustMethod {
    #[default]
    BenjaminiHochberg,
    BenjaminiYekutieli,
    Bonferroni,
    Holm,
    Hochberg,
    None,
}

impl FromStr for AdjustMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bh" | "fdr" => Ok(AdjustMethod::BenjaminiHochberg),
            "by" => Ok(AdjustMethod::BenjaminiYekutieli),
            "bonferroni" => Ok(AdjustMethod::Bonferroni),
            "holm" => Ok(AdjustMethod::Holm),
            "hochberg" => Ok(AdjustMethod::Hochberg),
            "none" => Ok(AdjustMethod::None),
            other => Err(anyhow!("Unknown p-value adjustment method '{}'", other)),
        }
    }
}

/// Adjust `p_values` with the given method.
///
/// Missing (`NaN`) p-values stay missing and are not counted as tests.
///
/// # Arguments
/// * `p_values` - A slice of p-values to adjust
/// * `method` - The adjustment procedure
///
/// # Returns
/// * `Result<Vec<f64>>` - Adjusted p-values in input order
///
/// # Example
/// ```
/// use single_enrichment::testing::correction::{AdjustMethod, adjust_p_values};
///
/// let adjusted = adjust_p_values(&[0.01, f64::NAN, 0.04], AdjustMethod::Bonferroni).unwrap();
/// assert!((adjusted[0] - 0.02).abs() < 1e-12);
/// assert!(adjusted[1].is_nan());
/// ```
pub fn adjust_p_values(p_values: &[f64], method: AdjustMethod) -> Result<Vec<f64>> {
    match method {
        AdjustMethod::BenjaminiHochberg => benjamini_hochberg_correction(p_values),
        AdjustMethod::BenjaminiYekutieli => benjamini_yekutieli_correction(p_values),
        AdjustMethod::Bonferroni => bonferroni_correction(p_values),
        AdjustMethod::Holm => holm_bonferroni_correction(p_values),
        AdjustMethod::Hochberg => hochberg_correction(p_values),
        AdjustMethod::None => {
            validate(p_values)?;
            Ok(p_values.to_vec())
        }
    }
}

fn validate(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }
    for (i, &p) in p_values.iter().enumerate() {
        if !p.is_nan() && !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }
    Ok(())
}

/// Indices of the non-missing p-values, sorted by ascending p-value.
fn ascending_order(p_values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// Step-up adjustment: walk from the largest p-value down, keeping a running
/// minimum of `p * factor(rank, n)`.
fn step_up(p_values: &[f64], factor: impl Fn(usize, usize) -> f64) -> Result<Vec<f64>> {
    validate(p_values)?;
    let order = ascending_order(p_values);
    let n = order.len();

    let mut adjusted = vec![f64::NAN; p_values.len()];
    let mut current_min = 1.0_f64;
    for (i, &idx) in order.iter().enumerate().rev() {
        let rank = i + 1;
        current_min = current_min.min((p_values[idx] * factor(rank, n)).min(1.0));
        adjusted[idx] = current_min;
    }
    Ok(adjusted)
}

/// Apply Bonferroni correction to p-values
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate(p_values)?;
    let n = p_values.iter().filter(|p| !p.is_nan()).count() as f64;
    Ok(p_values
        .iter()
        .map(|&p| if p.is_nan() { p } else { (p * n).min(1.0) })
        .collect())
}

/// Apply Benjamini-Hochberg (BH) procedure for controlling false discovery rate
///
/// # Example
/// ```
/// use single_enrichment::testing::correction::benjamini_hochberg_correction;
///
/// let adjusted = benjamini_hochberg_correction(&[0.01, 0.03, 0.05]).unwrap();
/// assert!((adjusted[0] - 0.03).abs() < 1e-12);
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    step_up(p_values, |rank, n| n as f64 / rank as f64)
}

/// Apply Benjamini-Yekutieli (BY) procedure, valid under arbitrary dependence
pub fn benjamini_yekutieli_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    let n = p_values.iter().filter(|p| !p.is_nan()).count();
    let c_n: f64 = (1..=n).map(|i| 1.0 / i as f64).sum();
    step_up(p_values, |rank, n| c_n * n as f64 / rank as f64)
}

/// Apply Hochberg's step-up method for controlling family-wise error rate
pub fn hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    step_up(p_values, |rank, n| (n - rank + 1) as f64)
}

/// Apply Holm-Bonferroni (step-down) method for controlling family-wise error rate
pub fn holm_bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate(p_values)?;
    let order = ascending_order(p_values);
    let n = order.len();

    let mut adjusted = vec![f64::NAN; p_values.len()];
    let mut current_max = 0.0_f64;
    for (i, &idx) in order.iter().enumerate() {
        current_max = current_max.max((p_values[idx] * (n - i) as f64).min(1.0));
        adjusted[idx] = current_max;
    }
    Ok(adjusted)
}
