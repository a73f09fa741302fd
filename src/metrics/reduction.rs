//! Reduction of confusion counts into scores.
//!
//! Scores are computed from a numerator and a denominator matrix shaped
//! like the counts. A negative denominator marks an ignored entry; a zero
//! denominator scores [`ZERO_DIVISION_SCORE`]. Rows are weighted and summed
//! (or averaged sample-wise) according to the averaging method.

use crate::core::constants::ZERO_DIVISION_SCORE;
use crate::core::types::{AverageMethod, MetricOutput};
use crate::metrics::stat_scores::{ReduceMode, StatLayout, StatScores};
use ndarray::{Array1, Array2, Axis, Zip};

/// Reduce F-beta counts into a score.
///
/// `average` must be the effective method (single-class data already mapped
/// to micro), and `layout` the layout the counts were taken under.
pub fn fbeta_reduce(
    stats: &StatScores,
    layout: StatLayout,
    beta: f64,
    average: AverageMethod,
    ignore_index: Option<usize>,
) -> MetricOutput {
    // Per-sample counts of a global layout are one score row over samples.
    let stats = if layout.reduce == ReduceMode::Samples && !layout.samplewise {
        stats.transpose()
    } else {
        stats.clone()
    };

    let beta2 = beta * beta;
    let tp = stats.tp.mapv(|v| v as f64);
    let fp = stats.fp.mapv(|v| v as f64);
    let fn_ = stats.fn_.mapv(|v| v as f64);

    let numerator = (1.0 + beta2) * &tp;
    let mut denominator = (1.0 + beta2) * &tp + beta2 * &fn_ + &fp;

    // Classes never predicted nor present drop out of a global macro mean.
    if average == AverageMethod::Macro && !layout.samplewise {
        Zip::from(&mut denominator)
            .and(&stats.tp)
            .and(&stats.fp)
            .and(&stats.fn_)
            .for_each(|den, &tp, &fp, &fn_| {
                if tp + fp + fn_ == 0 {
                    *den = -1.0;
                }
            });
    }

    if let (Some(ignore_index), ReduceMode::Macro) = (ignore_index, layout.reduce) {
        if ignore_index < denominator.ncols() {
            denominator.column_mut(ignore_index).fill(-1.0);
        }
    }

    let weights = match average {
        AverageMethod::Weighted => stats.support().mapv(|v| v as f64),
        _ => Array2::ones(denominator.raw_dim()),
    };

    reduce_scores(&numerator, &denominator, &weights, average, layout.samplewise)
}

/// Weighted reduction of per-entry `numerator / denominator` scores.
///
/// Zero denominators score 0; negative ones mark ignored entries, which get
/// zero weight and a NaN slot in per-class outputs. Except for micro and
/// unaveraged outputs, weights are normalized per row; a row whose weights
/// sum to zero scores 0 rather than NaN.
pub fn reduce_scores(
    numerator: &Array2<f64>,
    denominator: &Array2<f64>,
    weights: &Array2<f64>,
    average: AverageMethod,
    samplewise: bool,
) -> MetricOutput {
    let ignore_mask = denominator.mapv(|d| d < 0.0);

    let mut numerator = numerator.clone();
    let mut denominator = denominator.clone();
    let mut weights = weights.clone();
    Zip::from(&mut numerator)
        .and(&mut denominator)
        .and(&mut weights)
        .for_each(|num, den, weight| {
            if *den == 0.0 {
                *num = ZERO_DIVISION_SCORE;
                *den = 1.0;
            } else if *den < 0.0 {
                *den = 1.0;
                *weight = 0.0;
            }
        });

    if !matches!(average, AverageMethod::Micro | AverageMethod::None) {
        let totals = weights.sum_axis(Axis(1)).insert_axis(Axis(1));
        weights = &weights / &totals;
    }

    let scores = (&weights * &numerator / &denominator)
        .mapv(|s| if s.is_nan() { ZERO_DIVISION_SCORE } else { s });

    let (scores, ignored): (Array1<f64>, Array1<bool>) = if samplewise {
        let columns = scores.ncols();
        (
            scores
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::from_elem(columns, ZERO_DIVISION_SCORE)),
            ignore_mask.fold_axis(Axis(0), false, |&acc, &flag| acc || flag),
        )
    } else {
        (
            scores.sum_axis(Axis(0)),
            ignore_mask.fold_axis(Axis(0), false, |&acc, &flag| acc || flag),
        )
    };

    match average {
        AverageMethod::None => {
            let mut per_class = scores;
            Zip::from(&mut per_class).and(&ignored).for_each(|score, &ignore| {
                if ignore {
                    *score = f64::NAN;
                }
            });
            MetricOutput::PerClass(per_class)
        }
        _ => MetricOutput::Scalar(scores.sum()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn macro_stats(tp: Array2<i64>, fp: Array2<i64>, fn_: Array2<i64>) -> StatScores {
        let tn = Array2::zeros(tp.raw_dim());
        StatScores { tp, fp, tn, fn_ }
    }

    fn global(reduce: ReduceMode) -> StatLayout {
        StatLayout {
            reduce,
            samplewise: false,
        }
    }

    #[test]
    fn test_micro_f1() {
        let stats = macro_stats(array![[3]], array![[1]], array![[1]]);
        let out = fbeta_reduce(&stats, global(ReduceMode::Micro), 1.0, AverageMethod::Micro, None);
        assert_abs_diff_eq!(out.as_scalar().unwrap(), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_beta_weights_recall() {
        // precision 1/2, recall 1
        let stats = macro_stats(array![[1]], array![[1]], array![[0]]);
        let f2 = fbeta_reduce(&stats, global(ReduceMode::Micro), 2.0, AverageMethod::Micro, None);
        assert_abs_diff_eq!(f2.as_scalar().unwrap(), 5.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_macro_skips_absent_classes() {
        // class 1 is neither predicted nor present
        let stats = macro_stats(array![[2, 0, 0]], array![[0, 0, 1]], array![[0, 0, 0]]);
        let out = fbeta_reduce(&stats, global(ReduceMode::Macro), 1.0, AverageMethod::Macro, None);
        assert_abs_diff_eq!(out.as_scalar().unwrap(), 0.5, epsilon = 1e-12);

        let per_class = fbeta_reduce(&stats, global(ReduceMode::Macro), 1.0, AverageMethod::None, None);
        assert_eq!(per_class.as_per_class().unwrap(), &array![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_macro_without_any_present_class() {
        let stats = macro_stats(array![[0, 0]], array![[0, 0]], array![[0, 0]]);
        let out = fbeta_reduce(&stats, global(ReduceMode::Macro), 1.0, AverageMethod::Macro, None);
        assert_eq!(out.as_scalar().unwrap(), 0.0);
    }

    #[test]
    fn test_samplewise_macro_keeps_absent_classes() {
        // per sample: classes [1, absent] then [absent, 0]
        let stats = macro_stats(array![[1, 0], [0, 0]], array![[0, 0], [0, 1]], array![[0, 0], [0, 0]]);
        let layout = StatLayout {
            reduce: ReduceMode::Macro,
            samplewise: true,
        };
        let out = fbeta_reduce(&stats, layout, 1.0, AverageMethod::Macro, None);
        assert_abs_diff_eq!(out.as_scalar().unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_none_marks_ignored_class() {
        let stats = macro_stats(array![[2, 1, 0]], array![[0, 1, 1]], array![[0, 0, 1]]);
        let out = fbeta_reduce(&stats, global(ReduceMode::Macro), 1.0, AverageMethod::None, Some(1));
        let per_class = out.as_per_class().unwrap();
        assert_abs_diff_eq!(per_class[0], 1.0, epsilon = 1e-12);
        assert!(per_class[1].is_nan());
        assert_abs_diff_eq!(per_class[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_macro_skips_ignored_class() {
        let stats = macro_stats(array![[2, 1, 0]], array![[0, 1, 1]], array![[0, 0, 1]]);
        let out = fbeta_reduce(&stats, global(ReduceMode::Macro), 1.0, AverageMethod::Macro, Some(1));
        assert_abs_diff_eq!(out.as_scalar().unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_zero_support_is_zero() {
        // class 0 ignored, class 1 has no support
        let stats = macro_stats(array![[0, 0]], array![[0, 2]], array![[4, 0]]);
        let out = fbeta_reduce(&stats, global(ReduceMode::Macro), 1.0, AverageMethod::Weighted, Some(0));
        assert_eq!(out.as_scalar().unwrap(), 0.0);
    }

    #[test]
    fn test_global_samples_average_over_rows() {
        let stats = macro_stats(array![[1], [0], [1]], array![[0], [1], [1]], array![[0], [1], [0]]);
        let out = fbeta_reduce(&stats, global(ReduceMode::Samples), 1.0, AverageMethod::Samples, None);
        // sample scores: 1, 0, 2/3
        assert_abs_diff_eq!(out.as_scalar().unwrap(), (1.0 + 2.0 / 3.0) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_samplewise_mean() {
        let stats = macro_stats(array![[1], [0]], array![[0], [0]], array![[0], [3]]);
        let layout = StatLayout {
            reduce: ReduceMode::Micro,
            samplewise: true,
        };
        let out = fbeta_reduce(&stats, layout, 1.0, AverageMethod::Micro, None);
        assert_abs_diff_eq!(out.as_scalar().unwrap(), 0.5, epsilon = 1e-12);
    }
}
