//! Functional (single-batch) counterparts of the stateful metrics.
//!
//! Each function gives the same result as one `update` followed by one
//! `compute` on a freshly built metric, and runs through the same code.

use crate::config::validation::validate_k;
use crate::config::FBetaConfig;
use crate::core::error::{MetricsError, Result};
use crate::core::types::{MetricOutput, Predictions, Target};
use crate::metrics::classification::{ClassificationBatch, FBetaScore};
use crate::metrics::Metric;
use ndarray::ArrayView1;

/// F-beta score of a single batch.
pub fn fbeta<P, T>(preds: P, target: T, config: &FBetaConfig) -> Result<MetricOutput>
where
    P: Into<Predictions>,
    T: Into<Target>,
{
    let metric = FBetaScore::new(config.clone())?;
    let state = metric.batch_state(&ClassificationBatch::from((preds, target)))?;
    metric.reduce(&state)
}

/// F1 score of a single batch; the configured `beta` is ignored.
pub fn f1<P, T>(preds: P, target: T, config: &FBetaConfig) -> Result<MetricOutput>
where
    P: Into<Predictions>,
    T: Into<Target>,
{
    let metric = FBetaScore::f1(config.clone())?;
    let state = metric.batch_state(&ClassificationBatch::from((preds, target)))?;
    metric.reduce(&state)
}

/// Reciprocal rank of the first relevant document of a single query.
///
/// Returns 0 when no document is relevant.
pub fn retrieval_reciprocal_rank(preds: &ArrayView1<'_, f64>, target: &ArrayView1<'_, bool>) -> Result<f64> {
    let (preds, target) = query_slices(preds, target)?;
    Ok(reciprocal_rank(&preds, &target))
}

/// Fraction of the relevant documents of a single query found in its top
/// `k` (all documents when `k` is `None`).
///
/// Returns NaN when no document is relevant.
pub fn retrieval_recall(
    preds: &ArrayView1<'_, f64>,
    target: &ArrayView1<'_, bool>,
    k: Option<usize>,
) -> Result<f64> {
    if let Some(k) = k {
        validate_k(k)?;
    }
    let (preds, target) = query_slices(preds, target)?;
    Ok(recall_at_k(&preds, &target, k))
}

/// Fraction of the top `k` documents of a single query that are relevant.
///
/// Returns 0 when no document is relevant.
pub fn retrieval_precision(
    preds: &ArrayView1<'_, f64>,
    target: &ArrayView1<'_, bool>,
    k: Option<usize>,
) -> Result<f64> {
    if let Some(k) = k {
        validate_k(k)?;
    }
    let (preds, target) = query_slices(preds, target)?;
    Ok(precision_at_k(&preds, &target, k))
}

/// Average precision of a single query.
///
/// Returns 0 when no document is relevant.
pub fn retrieval_average_precision(
    preds: &ArrayView1<'_, f64>,
    target: &ArrayView1<'_, bool>,
) -> Result<f64> {
    let (preds, target) = query_slices(preds, target)?;
    Ok(average_precision(&preds, &target))
}

fn query_slices(preds: &ArrayView1<'_, f64>, target: &ArrayView1<'_, bool>) -> Result<(Vec<f64>, Vec<bool>)> {
    if preds.len() != target.len() {
        return Err(MetricsError::dimension_mismatch(
            format!("`preds` and `target` of equal length {}", preds.len()),
            format!("target length {}", target.len()),
        ));
    }
    if preds.is_empty() {
        return Err(MetricsError::invalid_input("`preds` and `target` must be non-empty"));
    }
    Ok((preds.to_vec(), target.to_vec()))
}

/// Targets ordered by descending prediction. Equal predictions keep their
/// input order.
pub(crate) fn ranked_targets(preds: &[f64], target: &[bool]) -> Vec<bool> {
    let mut order: Vec<usize> = (0..preds.len()).collect();
    order.sort_by(|&a, &b| preds[b].total_cmp(&preds[a]));
    order.into_iter().map(|i| target[i]).collect()
}

pub(crate) fn reciprocal_rank(preds: &[f64], target: &[bool]) -> f64 {
    ranked_targets(preds, target)
        .iter()
        .position(|&relevant| relevant)
        .map_or(0.0, |rank| 1.0 / (rank as f64 + 1.0))
}

pub(crate) fn recall_at_k(preds: &[f64], target: &[bool], k: Option<usize>) -> f64 {
    let total_relevant = target.iter().filter(|&&t| t).count();
    if total_relevant == 0 {
        return f64::NAN;
    }

    let k = k.unwrap_or(preds.len());
    let retrieved = ranked_targets(preds, target)
        .into_iter()
        .take(k)
        .filter(|&relevant| relevant)
        .count();

    retrieved as f64 / total_relevant as f64
}

pub(crate) fn precision_at_k(preds: &[f64], target: &[bool], k: Option<usize>) -> f64 {
    if !target.iter().any(|&t| t) {
        return 0.0;
    }

    let k = k.unwrap_or(preds.len());
    let retrieved = ranked_targets(preds, target)
        .into_iter()
        .take(k)
        .filter(|&relevant| relevant)
        .count();

    retrieved as f64 / k as f64
}

pub(crate) fn average_precision(preds: &[f64], target: &[bool]) -> f64 {
    let positions: Vec<usize> = ranked_targets(preds, target)
        .into_iter()
        .enumerate()
        .filter(|&(_, relevant)| relevant)
        .map(|(rank, _)| rank + 1)
        .collect();

    if positions.is_empty() {
        return 0.0;
    }

    positions
        .iter()
        .enumerate()
        .map(|(hit, &position)| (hit + 1) as f64 / position as f64)
        .sum::<f64>()
        / positions.len() as f64
}
