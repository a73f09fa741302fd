//! Common test utilities for stateful metrics integration tests.

#![allow(dead_code)]

use ndarray::{Array1, Array2, Array3, Axis};
use rand::prelude::*;
use stateful_metrics::*;

/// Number of classes used by the random multi-class inputs
pub const NUM_CLASSES: usize = 5;

/// Number of batches the random inputs are split into
pub const NUM_BATCHES: usize = 4;

/// Batch size of the random inputs
pub const BATCH_SIZE: usize = 16;

/// Extra dimension of the random multi-dimensional inputs
pub const EXTRA_DIM: usize = 3;

/// Absolute tolerance for floating point comparisons
pub const EPSILON: f64 = 1e-10;

/// Random probabilities of shape (n, c), each row summing to one.
pub fn random_probabilities(rng: &mut StdRng, n: usize, c: usize) -> Array2<f64> {
    let mut probs = Array2::from_shape_fn((n, c), |_| rng.gen_range(0.01..1.0));
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let total = row.sum();
        row.mapv_inplace(|p| p / total);
    }
    probs
}

/// Random class labels in `0..c`.
pub fn random_labels(rng: &mut StdRng, n: usize, c: usize) -> Array1<i64> {
    Array1::from_shape_fn(n, |_| rng.gen_range(0..c as i64))
}

/// Random multi-class probability batches with label targets.
pub fn multiclass_prob_batches(seed: u64) -> Vec<(Array2<f64>, Array1<i64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_BATCHES)
        .map(|_| {
            (
                random_probabilities(&mut rng, BATCH_SIZE, NUM_CLASSES),
                random_labels(&mut rng, BATCH_SIZE, NUM_CLASSES),
            )
        })
        .collect()
}

/// Random multi-class label batches.
pub fn multiclass_label_batches(seed: u64) -> Vec<(Array1<i64>, Array1<i64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_BATCHES)
        .map(|_| {
            (
                random_labels(&mut rng, BATCH_SIZE, NUM_CLASSES),
                random_labels(&mut rng, BATCH_SIZE, NUM_CLASSES),
            )
        })
        .collect()
}

/// Random multi-label probability batches with 0/1 targets.
pub fn multilabel_prob_batches(seed: u64) -> Vec<(Array2<f64>, Array2<i64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_BATCHES)
        .map(|_| {
            (
                Array2::from_shape_fn((BATCH_SIZE, NUM_CLASSES), |_| rng.gen::<f64>()),
                Array2::from_shape_fn((BATCH_SIZE, NUM_CLASSES), |_| rng.gen_range(0..2i64)),
            )
        })
        .collect()
}

/// Random binary probability batches.
pub fn binary_prob_batches(seed: u64) -> Vec<(Array1<f64>, Array1<i64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_BATCHES)
        .map(|_| {
            (
                Array1::from_shape_fn(BATCH_SIZE, |_| rng.gen::<f64>()),
                Array1::from_shape_fn(BATCH_SIZE, |_| rng.gen_range(0..2i64)),
            )
        })
        .collect()
}

/// Random multi-dimensional multi-class probability batches, preds of shape
/// (N, C, X) and targets of shape (N, X).
pub fn mdmc_prob_batches(seed: u64) -> Vec<(Array3<f64>, Array2<i64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_BATCHES)
        .map(|_| {
            let mut preds = Array3::zeros((BATCH_SIZE, NUM_CLASSES, EXTRA_DIM));
            for x in 0..EXTRA_DIM {
                let probs = random_probabilities(&mut rng, BATCH_SIZE, NUM_CLASSES);
                preds.index_axis_mut(Axis(2), x).assign(&probs);
            }
            let target = Array2::from_shape_fn((BATCH_SIZE, EXTRA_DIM), |_| {
                rng.gen_range(0..NUM_CLASSES as i64)
            });
            (preds, target)
        })
        .collect()
}

/// Random retrieval batches over `num_queries` query ids.
pub fn retrieval_batches(seed: u64, num_queries: i64) -> Vec<(Array1<i64>, Array1<f64>, Array1<i64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_BATCHES)
        .map(|_| {
            (
                Array1::from_shape_fn(BATCH_SIZE, |_| rng.gen_range(0..num_queries)),
                Array1::from_shape_fn(BATCH_SIZE, |_| rng.gen::<f64>()),
                Array1::from_shape_fn(BATCH_SIZE, |_| i64::from(rng.gen_bool(0.3))),
            )
        })
        .collect()
}

/// Concatenate batches along the sample axis.
pub fn concat_batches<A, B, D1, D2>(
    batches: &[(ndarray::Array<A, D1>, ndarray::Array<B, D2>)],
) -> (ndarray::Array<A, D1>, ndarray::Array<B, D2>)
where
    A: Clone,
    B: Clone,
    D1: ndarray::RemoveAxis,
    D2: ndarray::RemoveAxis,
{
    let preds: Vec<_> = batches.iter().map(|(p, _)| p.view()).collect();
    let target: Vec<_> = batches.iter().map(|(_, t)| t.view()).collect();
    (
        ndarray::concatenate(Axis(0), &preds).expect("batches share trailing dimensions"),
        ndarray::concatenate(Axis(0), &target).expect("batches share trailing dimensions"),
    )
}

/// Concatenate retrieval batches.
pub fn concat_retrieval(
    batches: &[(Array1<i64>, Array1<f64>, Array1<i64>)],
) -> (Array1<i64>, Array1<f64>, Array1<i64>) {
    let indexes: Vec<_> = batches.iter().map(|(i, _, _)| i.view()).collect();
    let preds: Vec<_> = batches.iter().map(|(_, p, _)| p.view()).collect();
    let target: Vec<_> = batches.iter().map(|(_, _, t)| t.view()).collect();
    (
        ndarray::concatenate(Axis(0), &indexes).expect("1-d batches"),
        ndarray::concatenate(Axis(0), &preds).expect("1-d batches"),
        ndarray::concatenate(Axis(0), &target).expect("1-d batches"),
    )
}

/// F-beta configuration for the given averaging.
pub fn fbeta_config(beta: f64, average: AverageMethod, num_classes: usize) -> FBetaConfig {
    FBetaConfigBuilder::new()
        .beta(beta)
        .average(average)
        .num_classes(num_classes)
        .build()
        .expect("valid configuration")
}

/// Compare two metric outputs, treating NaN as equal to NaN.
pub fn assert_outputs_close(actual: &MetricOutput, expected: &MetricOutput) {
    match (actual, expected) {
        (MetricOutput::Scalar(a), MetricOutput::Scalar(e)) => {
            assert!((a - e).abs() < EPSILON, "{} != {}", a, e);
        }
        (MetricOutput::PerClass(a), MetricOutput::PerClass(e)) => {
            assert_eq!(a.len(), e.len());
            for (x, y) in a.iter().zip(e.iter()) {
                assert!(
                    (x.is_nan() && y.is_nan()) || (x - y).abs() < EPSILON,
                    "{} != {}",
                    a,
                    e
                );
            }
        }
        _ => panic!("output kinds differ: {:?} vs {:?}", actual, expected),
    }
}

/// Test data generator macro
#[macro_export]
macro_rules! random_batches {
    (multiclass_prob, $seed:expr) => {
        common::multiclass_prob_batches($seed)
    };
    (multiclass_labels, $seed:expr) => {
        common::multiclass_label_batches($seed)
    };
    (multilabel_prob, $seed:expr) => {
        common::multilabel_prob_batches($seed)
    };
    (binary_prob, $seed:expr) => {
        common::binary_prob_batches($seed)
    };
    (mdmc_prob, $seed:expr) => {
        common::mdmc_prob_batches($seed)
    };
}
