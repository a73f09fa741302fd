//! Input normalization for classification metrics.
//!
//! Raw `(preds, target)` pairs arrive in many shapes: one probability per
//! sample, one label per sample, a probability row per sample, 0/1 indicator
//! rows, or any of those with extra trailing axes. [`normalize`] detects the
//! case and converts the pair into a canonical one-hot layout of shape
//! `(N, C, X)`, where `X` is the flattened size of the extra axes (1 when
//! there are none).
//!
//! Floating-point predictions are probabilities, integer predictions are
//! labels. Shapes are matched as follows:
//!
//! | preds           | target       | case                           |
//! |-----------------|--------------|--------------------------------|
//! | `(N,)` float    | `(N,)`       | binary                         |
//! | `(N,)` int      | `(N,)`       | multi-class                    |
//! | `(N, ...)` float| `(N, ...)`   | multi-label                    |
//! | `(N, ...)` int  | `(N, ...)`   | multi-dim multi-class          |
//! | `(N, C)` float  | `(N,)`       | multi-class                    |
//! | `(N, C, ...)`   | `(N, ...)`   | multi-dim multi-class          |

use crate::core::error::{MetricsError, Result};
use crate::core::types::{DataType, Predictions, Target};
use crate::{ensure, input_error};
use ndarray::{Array3, ArrayD, Axis, Dimension, IxDyn, Zip};

/// Canonical one-hot form of a classification batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalInput {
    /// Predicted positives, `(N, C, X)`
    pub preds: Array3<u8>,
    /// Actual positives, `(N, C, X)`
    pub target: Array3<u8>,
    /// Input case the batch was detected as
    pub case: DataType,
}

impl CanonicalInput {
    /// Number of samples `N`.
    pub fn num_samples(&self) -> usize {
        self.preds.shape()[0]
    }

    /// Number of class columns `C`.
    pub fn num_classes(&self) -> usize {
        self.preds.shape()[1]
    }

    /// Flattened size `X` of the extra axes.
    pub fn extra_dim(&self) -> usize {
        self.preds.shape()[2]
    }

    /// Whether the batch carries an extra axis that needs `mdmc_average`.
    pub fn is_multidim(&self) -> bool {
        self.extra_dim() > 1
    }
}

/// Convert a raw prediction/target pair into canonical form.
///
/// * `threshold` turns binary and multi-label probabilities into predictions.
/// * `num_classes` is checked against the class count the shapes imply.
/// * `is_multiclass = Some(true)` turns binary/multi-label data into two-class
///   data; `Some(false)` turns two-class data into binary/multi-label data.
/// * `top_k` marks the `k` highest probabilities of each sample as positive.
pub fn normalize(
    preds: &Predictions,
    target: &Target,
    threshold: f64,
    num_classes: Option<usize>,
    is_multiclass: Option<bool>,
    top_k: Option<usize>,
) -> Result<CanonicalInput> {
    let preds = squeeze_predictions(preds)?;
    let target = squeeze(target.labels())?;
    let num_classes = num_classes.filter(|&c| c > 0);

    let case = check_inputs(&preds, &target, num_classes, is_multiclass, top_k)?;

    let multiclass_layout =
        matches!(case, DataType::MultiClass | DataType::MultiDimMultiClass) || is_multiclass == Some(true);

    let (mut preds_bin, mut target_bin, mut class_axis) = if multiclass_layout {
        let (preds_onehot, classes) = match &preds {
            Predictions::Probabilities(probs)
                if matches!(case, DataType::MultiClass | DataType::MultiDimMultiClass) =>
            {
                (select_topk(probs, top_k.unwrap_or(1))?, probs.shape()[1])
            }
            Predictions::Probabilities(probs) => {
                let labels = probs.mapv(|p| i64::from(p >= threshold));
                (to_onehot(&labels, 2)?, 2)
            }
            Predictions::Labels(labels) => {
                let classes = match num_classes {
                    Some(c) => c,
                    None => (max_label(labels).max(max_label(&target)) + 1) as usize,
                };
                (to_onehot(labels, classes.max(2))?, classes)
            }
        };
        let target_onehot = to_onehot(&target, classes.max(2))?;
        (preds_onehot, target_onehot, true)
    } else {
        let preds_bin = match &preds {
            Predictions::Probabilities(probs) => match top_k {
                Some(k) => select_topk(probs, k)?,
                None => probs.mapv(|p| u8::from(p >= threshold)),
            },
            Predictions::Labels(_) => {
                return Err(MetricsError::internal(format!(
                    "{} input with integer predictions has no binary layout",
                    case
                )))
            }
        };
        (preds_bin, target.mapv(|l| l as u8), false)
    };

    if multiclass_layout && is_multiclass == Some(false) {
        preds_bin = preds_bin.index_axis(Axis(1), 1).to_owned();
        target_bin = target_bin.index_axis(Axis(1), 1).to_owned();
        class_axis = false;
    }

    Ok(CanonicalInput {
        preds: into_canonical(preds_bin, class_axis)?,
        target: into_canonical(target_bin, class_axis)?,
        case,
    })
}

/// One-hot encode labels of shape `(N, ...)` into `(N, num_classes, ...)`.
pub fn to_onehot(labels: &ArrayD<i64>, num_classes: usize) -> Result<ArrayD<u8>> {
    ensure!(labels.ndim() >= 1, input_error!("labels must have a sample axis"));

    let mut shape = labels.shape().to_vec();
    shape.insert(1, num_classes);
    let mut onehot = ArrayD::<u8>::zeros(IxDyn(&shape));

    let mut index = vec![0usize; shape.len()];
    for (position, &label) in labels.indexed_iter() {
        if label < 0 || label as usize >= num_classes {
            return Err(input_error!(
                "label {} is out of range for {} classes",
                label,
                num_classes
            ));
        }
        index[0] = position[0];
        index[1] = label as usize;
        for axis in 1..position.ndim() {
            index[axis + 1] = position[axis];
        }
        onehot[index.as_slice()] = 1;
    }

    Ok(onehot)
}

/// Mark the `k` largest scores along the class axis (axis 1) of every lane.
///
/// Ties keep the lower class index first.
pub fn select_topk(probs: &ArrayD<f64>, k: usize) -> Result<ArrayD<u8>> {
    ensure!(
        probs.ndim() >= 2,
        input_error!("top-k selection needs a class axis, got shape {:?}", probs.shape())
    );

    let mut selected = ArrayD::<u8>::zeros(probs.raw_dim());
    Zip::from(selected.lanes_mut(Axis(1)))
        .and(probs.lanes(Axis(1)))
        .for_each(|mut out, lane| {
            let mut order: Vec<usize> = (0..lane.len()).collect();
            order.sort_by(|&a, &b| lane[b].total_cmp(&lane[a]));
            for &class in order.iter().take(k) {
                out[class] = 1;
            }
        });

    Ok(selected)
}

/// Detect the input case and reject inconsistent inputs.
fn check_inputs(
    preds: &Predictions,
    target: &ArrayD<i64>,
    num_classes: Option<usize>,
    is_multiclass: Option<bool>,
    top_k: Option<usize>,
) -> Result<DataType> {
    let preds_shape = preds.shape();
    let target_shape = target.shape();

    if preds_shape[0] != target_shape[0] {
        return Err(MetricsError::dimension_mismatch(
            format!("target with {} samples", preds_shape[0]),
            format!("{} samples", target_shape[0]),
        ));
    }

    let target_max = max_label(target);
    ensure!(
        target.iter().all(|&t| t >= 0),
        input_error!("the `target` has to be a non-negative tensor")
    );

    let preds_float = preds.is_probabilities();
    match preds {
        Predictions::Probabilities(probs) => ensure!(
            probs.iter().all(|p| (0.0..=1.0).contains(p)),
            input_error!("the `preds` should be probabilities, but values were detected outside of [0,1] range")
        ),
        Predictions::Labels(labels) => {
            ensure!(
                labels.iter().all(|&l| l >= 0),
                input_error!("the `preds` has to be a non-negative tensor")
            );
            if is_multiclass == Some(false) {
                ensure!(
                    max_label(labels) <= 1,
                    input_error!("if you set `is_multiclass=false` and `preds` are integers, then `preds` should not exceed 1")
                );
            }
        }
    }

    if is_multiclass == Some(false) {
        ensure!(
            target_max <= 1,
            input_error!("if you set `is_multiclass=false`, then `target` should not exceed 1")
        );
    }

    let (case, implied_classes) = if preds_shape.len() == target_shape.len() {
        if preds_shape != target_shape {
            return Err(MetricsError::dimension_mismatch(
                format!("preds and target of equal shape, target {:?}", target_shape),
                format!("preds {:?}", preds_shape),
            ));
        }
        if preds_float {
            ensure!(
                target_max <= 1,
                input_error!("if `preds` and `target` are of shape (N, ...) and `preds` are floats, `target` should be binary")
            );
        }
        let case = match (preds_shape.len() == 1, preds_float) {
            (true, true) => DataType::Binary,
            (true, false) => DataType::MultiClass,
            (false, true) => DataType::MultiLabel,
            (false, false) => DataType::MultiDimMultiClass,
        };
        (case, preds_shape[1..].iter().product::<usize>())
    } else if preds_shape.len() == target_shape.len() + 1 {
        ensure!(
            preds_float,
            input_error!("if `preds` have one dimension more than `target`, `preds` should be probabilities")
        );
        if preds_shape[2..] != target_shape[1..] {
            return Err(MetricsError::dimension_mismatch(
                format!("preds extra axes {:?}", &target_shape[1..]),
                format!("{:?}", &preds_shape[2..]),
            ));
        }
        let case = if preds_shape.len() == 2 {
            DataType::MultiClass
        } else {
            DataType::MultiDimMultiClass
        };
        (case, preds_shape[1])
    } else {
        return Err(input_error!(
            "either `preds` and `target` both should have the (same) shape (N, ...), or `target` should be (N, ...) and `preds` should be (N, C, ...); got {:?} and {:?}",
            preds_shape,
            target_shape
        ));
    };

    if preds_shape != target_shape {
        ensure!(
            !(is_multiclass == Some(false) && implied_classes != 2),
            input_error!("you have set `is_multiclass=false`, but have more than 2 classes in your data, based on the C dimension of `preds`")
        );
        ensure!(
            (target_max as usize) < implied_classes,
            input_error!("the highest label in `target` should be smaller than the size of the `C` dimension of `preds`")
        );
    }

    if let Some(num_classes) = num_classes {
        match case {
            DataType::Binary => check_num_classes_binary(num_classes, is_multiclass)?,
            DataType::MultiClass | DataType::MultiDimMultiClass => check_num_classes_mc(
                preds,
                target_max,
                num_classes,
                is_multiclass,
                implied_classes,
                preds_shape != target_shape,
            )?,
            DataType::MultiLabel => check_num_classes_ml(num_classes, is_multiclass, implied_classes)?,
        }
    }

    if let Some(top_k) = top_k {
        check_top_k(top_k, case, implied_classes, is_multiclass, preds_float)?;
    }

    Ok(case)
}

fn check_num_classes_binary(num_classes: usize, is_multiclass: Option<bool>) -> Result<()> {
    ensure!(
        num_classes <= 2,
        input_error!("your data is binary, but `num_classes` is larger than 2")
    );
    ensure!(
        !(num_classes == 2 && is_multiclass != Some(true)),
        input_error!("your data is binary and `num_classes=2`, but `is_multiclass` is not true; set it to true to transform binary data to two-class data")
    );
    ensure!(
        !(num_classes == 1 && is_multiclass == Some(true)),
        input_error!("you have binary data and have set `is_multiclass=true`, but `num_classes` is 1")
    );
    Ok(())
}

fn check_num_classes_mc(
    preds: &Predictions,
    target_max: i64,
    num_classes: usize,
    is_multiclass: Option<bool>,
    implied_classes: usize,
    has_class_axis: bool,
) -> Result<()> {
    ensure!(
        !(num_classes == 1 && is_multiclass != Some(false)),
        input_error!("you have set `num_classes=1`, but predictions are multi-class; set `is_multiclass=false` to convert two-class data to binary data")
    );
    if num_classes > 1 {
        if is_multiclass == Some(false) {
            ensure!(
                implied_classes == num_classes,
                input_error!("you have set `is_multiclass=false`, but the implied number of classes (from shape of inputs) does not match `num_classes`")
            );
        }
        ensure!(
            (target_max as usize) < num_classes,
            input_error!("the highest label in `target` should be smaller than `num_classes`")
        );
        if let Predictions::Labels(labels) = preds {
            ensure!(
                (max_label(labels) as usize) < num_classes,
                input_error!("the highest label in `preds` should be smaller than `num_classes`")
            );
        }
        ensure!(
            !(has_class_axis && num_classes != implied_classes),
            input_error!("the size of C dimension of `preds` does not match `num_classes`")
        );
    }
    Ok(())
}

fn check_num_classes_ml(
    num_classes: usize,
    is_multiclass: Option<bool>,
    implied_classes: usize,
) -> Result<()> {
    if is_multiclass == Some(true) {
        ensure!(
            num_classes == 2,
            input_error!("you have set `is_multiclass=true`, but `num_classes` is not equal to 2")
        );
    } else {
        ensure!(
            num_classes == implied_classes,
            input_error!("the implied number of classes (from shape of inputs) does not match `num_classes`")
        );
    }
    Ok(())
}

fn check_top_k(
    top_k: usize,
    case: DataType,
    implied_classes: usize,
    is_multiclass: Option<bool>,
    preds_float: bool,
) -> Result<()> {
    ensure!(
        case != DataType::Binary,
        input_error!("you can not use the `top_k` parameter with binary data")
    );
    ensure!(top_k > 0, input_error!("the `top_k` has to be an integer larger than 0"));
    ensure!(
        preds_float,
        input_error!("you have set `top_k`, but you do not have probability predictions")
    );
    ensure!(
        is_multiclass != Some(false),
        input_error!("if you set `is_multiclass=false`, you can not set `top_k`")
    );
    ensure!(
        !(case == DataType::MultiLabel && is_multiclass == Some(true)),
        input_error!("if you transform multi-label data to two-class data using `is_multiclass=true`, you can not use `top_k`")
    );
    ensure!(
        top_k <= implied_classes,
        input_error!("the `top_k` can not be larger than the `C` dimension of `preds`")
    );
    Ok(())
}

/// Drop size-1 axes after the sample axis.
fn squeeze<A: Clone>(array: &ArrayD<A>) -> Result<ArrayD<A>> {
    ensure!(
        array.ndim() >= 1 && !array.is_empty(),
        input_error!("`preds` and `target` must be non-empty and have a sample axis")
    );
    let shape: Vec<usize> = array
        .shape()
        .iter()
        .enumerate()
        .filter(|&(axis, &len)| axis == 0 || len != 1)
        .map(|(_, &len)| len)
        .collect();
    let values: Vec<A> = array.iter().cloned().collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

fn squeeze_predictions(preds: &Predictions) -> Result<Predictions> {
    Ok(match preds {
        Predictions::Labels(labels) => Predictions::Labels(squeeze(labels)?),
        Predictions::Probabilities(probs) => Predictions::Probabilities(squeeze(probs)?),
    })
}

fn max_label(labels: &ArrayD<i64>) -> i64 {
    labels.iter().copied().max().unwrap_or(0)
}

/// Reshape to `(N, C, X)`. Without a class axis every trailing axis is a
/// class column and `X == 1`.
fn into_canonical(array: ArrayD<u8>, class_axis: bool) -> Result<Array3<u8>> {
    let shape = array.shape();
    let samples = shape[0];
    let (classes, extra) = if class_axis {
        (shape[1], shape[2..].iter().product::<usize>())
    } else {
        (shape[1..].iter().product::<usize>(), 1)
    };
    let values: Vec<u8> = array.iter().copied().collect();
    Ok(Array3::from_shape_vec((samples, classes, extra), values)?)
}
