//! True/false positive and negative counting.
//!
//! Counts are laid out as `(rows, columns)` matrices whose meaning depends
//! on the reduce mode and on whether a multi-dimensional batch is scored
//! sample by sample:
//!
//! | layout        | Micro   | Macro   | Samples |
//! |---------------|---------|---------|---------|
//! | global        | `(1,1)` | `(1,C)` | `(N,1)` |
//! | samplewise    | `(N,1)` | `(N,C)` | `(N,X)` |
//!
//! Global layouts first flatten `(N, C, X)` into `(N·X, C)`. Micro and Macro
//! global counts are summed across batches; every other layout grows by one
//! row per sample and is concatenated.

use crate::core::error::{MetricsError, Result};
use crate::core::types::{AverageMethod, MdmcAverageMethod};
use crate::metrics::input::CanonicalInput;
use crate::metrics::MetricState;
use crate::{ensure, input_error};
use ndarray::{concatenate, Array2, ArrayD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};

/// What the count matrices are reduced over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReduceMode {
    /// One count over every sample and class
    Micro,
    /// One count per class
    Macro,
    /// One count per sample
    Samples,
}

impl From<AverageMethod> for ReduceMode {
    fn from(average: AverageMethod) -> Self {
        match average {
            AverageMethod::Micro => ReduceMode::Micro,
            AverageMethod::Macro | AverageMethod::Weighted | AverageMethod::None => ReduceMode::Macro,
            AverageMethod::Samples => ReduceMode::Samples,
        }
    }
}

/// Shape contract of accumulated counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatLayout {
    /// Reduce mode the counts were taken under
    pub reduce: ReduceMode,
    /// Whether rows are samples of a multi-dimensional batch
    pub samplewise: bool,
}

impl StatLayout {
    /// Layout for a batch. Sample-wise scoring only applies to batches that
    /// actually carry an extra axis.
    pub fn new(reduce: ReduceMode, mdmc_average: Option<MdmcAverageMethod>, multidim: bool) -> Self {
        StatLayout {
            reduce,
            samplewise: multidim && mdmc_average == Some(MdmcAverageMethod::Samplewise),
        }
    }

    /// Whether batches combine by elementwise sum rather than concatenation.
    pub fn sums_across_batches(&self) -> bool {
        !self.samplewise && self.reduce != ReduceMode::Samples
    }
}

/// Confusion counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatScores {
    /// True positives
    pub tp: Array2<i64>,
    /// False positives
    pub fp: Array2<i64>,
    /// True negatives
    pub tn: Array2<i64>,
    /// False negatives
    pub fn_: Array2<i64>,
}

impl StatScores {
    /// All-zero counts of the given shape.
    pub fn zeros(rows: usize, columns: usize) -> Self {
        StatScores {
            tp: Array2::zeros((rows, columns)),
            fp: Array2::zeros((rows, columns)),
            tn: Array2::zeros((rows, columns)),
            fn_: Array2::zeros((rows, columns)),
        }
    }

    /// `(rows, columns)` of every count matrix.
    pub fn shape(&self) -> (usize, usize) {
        self.tp.dim()
    }

    /// Number of actual positives, `tp + fn`.
    pub fn support(&self) -> Array2<i64> {
        &self.tp + &self.fn_
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> StatScores {
        StatScores {
            tp: self.tp.t().to_owned(),
            fp: self.fp.t().to_owned(),
            tn: self.tn.t().to_owned(),
            fn_: self.fn_.t().to_owned(),
        }
    }

    /// Add counts of identical shape.
    pub fn add_assign(&mut self, other: &StatScores) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(MetricsError::dimension_mismatch(
                format!("counts of shape {:?}", self.shape()),
                format!("{:?}", other.shape()),
            ));
        }
        self.tp += &other.tp;
        self.fp += &other.fp;
        self.tn += &other.tn;
        self.fn_ += &other.fn_;
        Ok(())
    }

    /// Append the rows of `other`.
    pub fn append_rows(&mut self, other: &StatScores) -> Result<()> {
        if self.shape().1 != other.shape().1 {
            return Err(MetricsError::dimension_mismatch(
                format!("counts with {} columns", self.shape().1),
                format!("{} columns", other.shape().1),
            ));
        }
        self.tp = concatenate(Axis(0), &[self.tp.view(), other.tp.view()])?;
        self.fp = concatenate(Axis(0), &[self.fp.view(), other.fp.view()])?;
        self.tn = concatenate(Axis(0), &[self.tn.view(), other.tn.view()])?;
        self.fn_ = concatenate(Axis(0), &[self.fn_.view(), other.fn_.view()])?;
        Ok(())
    }
}

/// Count tp/fp/tn/fn of a canonical batch.
///
/// With `ignore_index`, Micro and Samples counts drop the class column
/// before counting; Macro counts keep it so the reduction can mask it.
pub fn compute_stats(
    input: &CanonicalInput,
    reduce: ReduceMode,
    mdmc_average: Option<MdmcAverageMethod>,
    ignore_index: Option<usize>,
) -> Result<StatScores> {
    let (samples, classes, extra) = input.preds.dim();

    if let Some(ignore_index) = ignore_index {
        ensure!(
            classes > 1,
            input_error!("you can not use `ignore_index` with binary data")
        );
        ensure!(
            ignore_index < classes,
            input_error!(
                "the `ignore_index` {} is not valid for inputs with {} classes",
                ignore_index,
                classes
            )
        );
    }

    let multidim = input.is_multidim();
    if multidim && mdmc_average.is_none() {
        return Err(input_error!(
            "when your inputs are multi-dimensional multi-class, you have to set the `mdmc_average` parameter"
        ));
    }
    let layout = StatLayout::new(reduce, mdmc_average, multidim);

    let (mut preds, mut target) = if layout.samplewise {
        (input.preds.clone().into_dyn(), input.target.clone().into_dyn())
    } else {
        (flatten_global(&input.preds)?, flatten_global(&input.target)?)
    };

    if let (Some(ignore_index), false) = (ignore_index, reduce == ReduceMode::Macro) {
        let keep: Vec<usize> = (0..classes).filter(|&c| c != ignore_index).collect();
        preds = preds.select(Axis(1), &keep);
        target = target.select(Axis(1), &keep);
    }

    // Axes summed away, and the matrix shape of what remains.
    let kept_classes = preds.shape()[1];
    let (axes, shape): (&[usize], (usize, usize)) = match (layout.samplewise, reduce) {
        (false, ReduceMode::Micro) => (&[0, 1][..], (1, 1)),
        (false, ReduceMode::Macro) => (&[0][..], (1, kept_classes)),
        (false, ReduceMode::Samples) => (&[1][..], (preds.shape()[0], 1)),
        (true, ReduceMode::Micro) => (&[1, 2][..], (samples, 1)),
        (true, ReduceMode::Macro) => (&[2][..], (samples, kept_classes)),
        (true, ReduceMode::Samples) => (&[1][..], (samples, extra)),
    };

    let mut tp = ArrayD::<i64>::zeros(preds.raw_dim());
    let mut fp = ArrayD::<i64>::zeros(preds.raw_dim());
    let mut tn = ArrayD::<i64>::zeros(preds.raw_dim());
    let mut fn_ = ArrayD::<i64>::zeros(preds.raw_dim());
    Zip::from(&mut tp)
        .and(&mut fp)
        .and(&mut tn)
        .and(&mut fn_)
        .and(&preds)
        .and(&target)
        .for_each(|tp, fp, tn, fn_, &p, &t| match (p, t) {
            (1, 1) => *tp = 1,
            (1, _) => *fp = 1,
            (_, 1) => *fn_ = 1,
            _ => *tn = 1,
        });

    Ok(StatScores {
        tp: sum_to_matrix(tp, axes, shape)?,
        fp: sum_to_matrix(fp, axes, shape)?,
        tn: sum_to_matrix(tn, axes, shape)?,
        fn_: sum_to_matrix(fn_, axes, shape)?,
    })
}

/// `(N, C, X)` to `(N·X, C)`.
fn flatten_global(array: &ndarray::Array3<u8>) -> Result<ArrayD<u8>> {
    let (samples, classes, extra) = array.dim();
    let values: Vec<u8> = array.view().permuted_axes([0, 2, 1]).iter().copied().collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&[samples * extra, classes]), values)?)
}

fn sum_to_matrix(mut counts: ArrayD<i64>, axes: &[usize], shape: (usize, usize)) -> Result<Array2<i64>> {
    for &axis in axes.iter().rev() {
        counts = counts.sum_axis(Axis(axis));
    }
    let values: Vec<i64> = counts.iter().copied().collect();
    Ok(Array2::from_shape_vec(shape, values)?)
}

/// Accumulated counts of a classification metric.
///
/// The class count of the first batch binds every later one, whatever the
/// reduce mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatScoresState {
    stats: Option<StatScores>,
    layout: Option<StatLayout>,
    num_classes: Option<usize>,
}

impl StatScoresState {
    /// State holding the counts of a single batch with `num_classes`
    /// canonical class columns.
    pub fn from_batch(stats: StatScores, layout: StatLayout, num_classes: usize) -> Self {
        StatScoresState {
            stats: Some(stats),
            layout: Some(layout),
            num_classes: Some(num_classes),
        }
    }

    /// Class count bound by the first batch.
    pub fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    /// Accumulated counts, if any batch was seen.
    pub fn stats(&self) -> Option<&StatScores> {
        self.stats.as_ref()
    }

    /// Layout of the accumulated counts, if any batch was seen.
    pub fn layout(&self) -> Option<StatLayout> {
        self.layout
    }
}

impl MetricState for StatScoresState {
    fn merge(&mut self, other: Self) -> Result<()> {
        let (other_stats, other_layout) = match (other.stats, other.layout) {
            (Some(stats), Some(layout)) => (stats, layout),
            _ => return Ok(()),
        };

        match (&mut self.stats, self.layout) {
            (Some(stats), Some(layout)) => {
                if let (Some(seen), Some(incoming)) = (self.num_classes, other.num_classes) {
                    if seen != incoming {
                        return Err(MetricsError::dimension_mismatch(
                            format!("{} classes as in earlier batches", seen),
                            format!("{} classes", incoming),
                        ));
                    }
                }
                if layout != other_layout {
                    return Err(input_error!(
                        "batch counts laid out as {:?} can not be combined with {:?}; all batches must agree on being multi-dimensional",
                        other_layout,
                        layout
                    ));
                }
                if layout.sums_across_batches() {
                    stats.add_assign(&other_stats)
                } else {
                    stats.append_rows(&other_stats)
                }
            }
            _ => {
                self.stats = Some(other_stats);
                self.layout = Some(other_layout);
                self.num_classes = other.num_classes;
                Ok(())
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.stats.is_none()
    }
}
