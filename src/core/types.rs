//! Core data types for stateful metrics.
//!
//! Inputs are dynamic-dimensional `ndarray` containers so that binary,
//! multiclass, multilabel and multi-dimensional inputs all travel through
//! the same entry points. Integer and floating-point predictions are kept
//! apart at the type level: the input normalizer treats floats as
//! probabilities and integers as labels.

use crate::core::error::{MetricsError, Result};
use ndarray::{Array, Array1, ArrayD, Dimension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model predictions, either hard labels or probability scores.
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    /// Integer class labels (or 0/1 indicators)
    Labels(ArrayD<i64>),
    /// Probabilities or scores in `[0, 1]`
    Probabilities(ArrayD<f64>),
}

impl Predictions {
    /// Shape of the underlying array.
    pub fn shape(&self) -> &[usize] {
        match self {
            Predictions::Labels(a) => a.shape(),
            Predictions::Probabilities(a) => a.shape(),
        }
    }

    /// Number of axes of the underlying array.
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Whether the predictions are floating point.
    pub fn is_probabilities(&self) -> bool {
        matches!(self, Predictions::Probabilities(_))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Predictions::Labels(a) => a.len(),
            Predictions::Probabilities(a) => a.len(),
        }
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ground-truth labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Target(pub ArrayD<i64>);

impl Target {
    /// Shape of the underlying array.
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Number of axes of the underlying array.
    pub fn ndim(&self) -> usize {
        self.0.ndim()
    }

    /// Borrow the labels.
    pub fn labels(&self) -> &ArrayD<i64> {
        &self.0
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

macro_rules! impl_label_conversions {
    ($($elem:ty),*) => {
        $(
            impl<D: Dimension> From<Array<$elem, D>> for Predictions {
                fn from(array: Array<$elem, D>) -> Self {
                    Predictions::Labels(array.mapv(|v| v as i64).into_dyn())
                }
            }

            impl<D: Dimension> From<Array<$elem, D>> for Target {
                fn from(array: Array<$elem, D>) -> Self {
                    Target(array.mapv(|v| v as i64).into_dyn())
                }
            }
        )*
    };
}

impl_label_conversions!(i64, i32, u8, usize);

impl<D: Dimension> From<Array<f64, D>> for Predictions {
    fn from(array: Array<f64, D>) -> Self {
        Predictions::Probabilities(array.into_dyn())
    }
}

impl<D: Dimension> From<Array<f32, D>> for Predictions {
    fn from(array: Array<f32, D>) -> Self {
        Predictions::Probabilities(array.mapv(f64::from).into_dyn())
    }
}

impl<D: Dimension> From<Array<bool, D>> for Target {
    fn from(array: Array<bool, D>) -> Self {
        Target(array.mapv(i64::from).into_dyn())
    }
}

/// Result of a metric computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricOutput {
    /// A single averaged score
    Scalar(f64),
    /// One score per class; ignored classes hold NaN
    PerClass(Array1<f64>),
}

impl MetricOutput {
    /// The scalar value, if this output is averaged.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricOutput::Scalar(v) => Some(*v),
            MetricOutput::PerClass(_) => None,
        }
    }

    /// The per-class scores, if this output is not averaged.
    pub fn as_per_class(&self) -> Option<&Array1<f64>> {
        match self {
            MetricOutput::Scalar(_) => None,
            MetricOutput::PerClass(v) => Some(v),
        }
    }
}

impl fmt::Display for MetricOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricOutput::Scalar(v) => write!(f, "{:.6}", v),
            MetricOutput::PerClass(v) => write!(f, "{}", v),
        }
    }
}

/// Input case detected by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// One score or label per sample, two classes
    Binary,
    /// Independent 0/1 indicators per class
    MultiLabel,
    /// One label (or probability row) per sample
    MultiClass,
    /// Multiclass with extra axes (per pixel, per token, ...)
    MultiDimMultiClass,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Binary => write!(f, "binary"),
            DataType::MultiLabel => write!(f, "multi-label"),
            DataType::MultiClass => write!(f, "multi-class"),
            DataType::MultiDimMultiClass => write!(f, "multi-dim multi-class"),
        }
    }
}

/// How per-class statistics are combined into a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageMethod {
    /// Sum statistics over classes, then score once
    Micro,
    /// Unweighted mean of per-class scores
    Macro,
    /// Support-weighted mean of per-class scores
    Weighted,
    /// Mean of per-sample scores
    Samples,
    /// Per-class scores, no averaging
    None,
}

impl AverageMethod {
    /// All accepted spellings, in declaration order.
    pub const VARIANTS: [&'static str; 5] = ["micro", "macro", "weighted", "samples", "none"];

    /// Whether this average needs per-class statistics.
    pub fn needs_num_classes(self) -> bool {
        matches!(self, AverageMethod::Macro | AverageMethod::Weighted | AverageMethod::None)
    }
}

impl Default for AverageMethod {
    fn default() -> Self {
        AverageMethod::Micro
    }
}

impl fmt::Display for AverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageMethod::Micro => write!(f, "micro"),
            AverageMethod::Macro => write!(f, "macro"),
            AverageMethod::Weighted => write!(f, "weighted"),
            AverageMethod::Samples => write!(f, "samples"),
            AverageMethod::None => write!(f, "none"),
        }
    }
}

impl FromStr for AverageMethod {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "micro" => Ok(AverageMethod::Micro),
            "macro" => Ok(AverageMethod::Macro),
            "weighted" => Ok(AverageMethod::Weighted),
            "samples" => Ok(AverageMethod::Samples),
            "none" => Ok(AverageMethod::None),
            _ => Err(MetricsError::invalid_parameter(
                "average",
                s,
                format!("the `average` has to be one of {:?}", AverageMethod::VARIANTS),
            )),
        }
    }
}

/// How inputs with an extra (multi-dimensional) axis are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MdmcAverageMethod {
    /// Flatten the extra axis into the sample axis
    Global,
    /// Score each sample on its own, then average across samples
    Samplewise,
}

impl MdmcAverageMethod {
    /// All accepted spellings, in declaration order.
    pub const VARIANTS: [&'static str; 2] = ["global", "samplewise"];
}

impl fmt::Display for MdmcAverageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MdmcAverageMethod::Global => write!(f, "global"),
            MdmcAverageMethod::Samplewise => write!(f, "samplewise"),
        }
    }
}

impl FromStr for MdmcAverageMethod {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(MdmcAverageMethod::Global),
            "samplewise" => Ok(MdmcAverageMethod::Samplewise),
            _ => Err(MetricsError::invalid_parameter(
                "mdmc_average",
                s,
                format!(
                    "the `mdmc_average` has to be one of {:?} or absent",
                    MdmcAverageMethod::VARIANTS
                ),
            )),
        }
    }
}

/// What a retrieval metric does with queries that have no positive target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyTargetAction {
    /// Leave the query out of the average
    Skip,
    /// Fail the computation
    Error,
    /// Score the query as 1.0
    Pos,
    /// Score the query as 0.0
    Neg,
}

impl EmptyTargetAction {
    /// All accepted spellings, in declaration order.
    pub const VARIANTS: [&'static str; 4] = ["skip", "error", "pos", "neg"];
}

impl Default for EmptyTargetAction {
    fn default() -> Self {
        EmptyTargetAction::Skip
    }
}

impl fmt::Display for EmptyTargetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyTargetAction::Skip => write!(f, "skip"),
            EmptyTargetAction::Error => write!(f, "error"),
            EmptyTargetAction::Pos => write!(f, "pos"),
            EmptyTargetAction::Neg => write!(f, "neg"),
        }
    }
}

impl FromStr for EmptyTargetAction {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(EmptyTargetAction::Skip),
            "error" => Ok(EmptyTargetAction::Error),
            "pos" => Ok(EmptyTargetAction::Pos),
            "neg" => Ok(EmptyTargetAction::Neg),
            _ => Err(MetricsError::invalid_parameter(
                "empty_target_action",
                s,
                format!(
                    "the `empty_target_action` has to be one of {:?}",
                    EmptyTargetAction::VARIANTS
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_prediction_conversions() {
        let labels: Predictions = array![0i64, 2, 1].into();
        assert!(!labels.is_probabilities());
        assert_eq!(labels.shape(), &[3]);

        let probs: Predictions = array![[0.1f32, 0.9], [0.7, 0.3]].into();
        assert!(probs.is_probabilities());
        assert_eq!(probs.ndim(), 2);
    }

    #[test]
    fn test_target_from_bool() {
        let target: Target = array![true, false, true].into();
        assert_eq!(target.labels().as_slice().unwrap(), &[1, 0, 1]);
    }

    #[test]
    fn test_average_parsing() {
        assert_eq!("macro".parse::<AverageMethod>().unwrap(), AverageMethod::Macro);
        assert_eq!("NONE".parse::<AverageMethod>().unwrap(), AverageMethod::None);

        let err = "wrong".parse::<AverageMethod>().unwrap_err();
        assert!(err.to_string().contains("`average`"));
    }

    #[test]
    fn test_mdmc_parsing() {
        assert_eq!(
            "samplewise".parse::<MdmcAverageMethod>().unwrap(),
            MdmcAverageMethod::Samplewise
        );
        let err = "wrong".parse::<MdmcAverageMethod>().unwrap_err();
        assert!(err.to_string().contains("`mdmc"));
    }

    #[test]
    fn test_empty_target_action_parsing() {
        assert_eq!("pos".parse::<EmptyTargetAction>().unwrap(), EmptyTargetAction::Pos);
        assert!("maybe".parse::<EmptyTargetAction>().is_err());
        assert_eq!(EmptyTargetAction::default(), EmptyTargetAction::Skip);
    }

    #[test]
    fn test_metric_output_accessors() {
        let scalar = MetricOutput::Scalar(0.5);
        assert_eq!(scalar.as_scalar(), Some(0.5));
        assert!(scalar.as_per_class().is_none());

        let per_class = MetricOutput::PerClass(array![0.1, f64::NAN]);
        assert!(per_class.as_scalar().is_none());
        assert_eq!(per_class.as_per_class().unwrap().len(), 2);
    }
}
