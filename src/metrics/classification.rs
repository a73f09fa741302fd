//! F-beta and F1 scores.
//!
//! The F-beta score is the weighted harmonic mean of precision and recall,
//! `(1 + β²)·tp / ((1 + β²)·tp + β²·fn + fp)`; F1 is the `β = 1` case.
//! Inputs go through [`normalize`](crate::metrics::input::normalize), are
//! counted by [`compute_stats`] and reduced by [`fbeta_reduce`].

use crate::config::FBetaConfig;
use crate::core::error::{MetricsError, Result};
use crate::core::types::{AverageMethod, MetricOutput, Predictions, Target};
use crate::metrics::input::normalize;
use crate::metrics::reduction::fbeta_reduce;
use crate::metrics::stat_scores::{compute_stats, ReduceMode, StatLayout, StatScoresState};
use crate::core::network::Collective;
use crate::metrics::{Metric, Phase, StatefulMetric};
use ndarray::Array1;
use std::sync::Arc;

/// A classification batch: predictions and ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationBatch {
    /// Labels or probabilities
    pub preds: Predictions,
    /// Ground-truth labels
    pub target: Target,
}

impl<P, T> From<(P, T)> for ClassificationBatch
where
    P: Into<Predictions>,
    T: Into<Target>,
{
    fn from((preds, target): (P, T)) -> Self {
        ClassificationBatch {
            preds: preds.into(),
            target: target.into(),
        }
    }
}

/// F-beta score configuration and transition functions.
#[derive(Debug, Clone)]
pub struct FBetaScore {
    config: FBetaConfig,
    average: AverageMethod,
    reduce: ReduceMode,
}

impl FBetaScore {
    /// Create the metric, validating the configuration.
    pub fn new(config: FBetaConfig) -> Result<Self> {
        config.validate()?;
        let average = config.effective_average();
        Ok(FBetaScore {
            average,
            reduce: ReduceMode::from(average),
            config,
        })
    }

    /// Create an F1 metric; the configured `beta` is replaced by 1.
    pub fn f1(mut config: FBetaConfig) -> Result<Self> {
        config.beta = 1.0;
        Self::new(config)
    }

    /// The configuration the metric was built from.
    pub fn config(&self) -> &FBetaConfig {
        &self.config
    }

    /// `beta` of the score.
    pub fn beta(&self) -> f64 {
        self.config.beta
    }

    /// Averaging actually applied.
    pub fn average(&self) -> AverageMethod {
        self.average
    }

    fn empty_output(&self) -> MetricOutput {
        match self.average {
            AverageMethod::None => {
                let classes = self.config.num_classes.unwrap_or(1);
                let mut scores = Array1::zeros(classes);
                if let Some(ignore_index) = self.config.ignore_index.filter(|&i| i < classes) {
                    scores[ignore_index] = f64::NAN;
                }
                MetricOutput::PerClass(scores)
            }
            _ => MetricOutput::Scalar(0.0),
        }
    }
}

impl Metric for FBetaScore {
    type Input = ClassificationBatch;
    type State = StatScoresState;
    type Output = MetricOutput;

    fn name(&self) -> &'static str {
        if self.config.beta == 1.0 {
            "f1"
        } else {
            "fbeta"
        }
    }

    fn batch_state(&self, input: &ClassificationBatch) -> Result<StatScoresState> {
        let config = &self.config;
        let canonical = normalize(
            &input.preds,
            &input.target,
            config.threshold,
            config.num_classes,
            config.is_multiclass,
            config.top_k,
        )?;

        if self.reduce == ReduceMode::Macro {
            if let Some(num_classes) = config.num_classes {
                if canonical.num_classes() != num_classes {
                    return Err(MetricsError::dimension_mismatch(
                        format!("{} classes", num_classes),
                        format!("{} classes in the normalized input", canonical.num_classes()),
                    ));
                }
            }
        }

        let stats = compute_stats(&canonical, self.reduce, config.mdmc_average, config.ignore_index)?;
        let layout = StatLayout::new(self.reduce, config.mdmc_average, canonical.is_multidim());

        log::debug!(
            "{}: {} batch of {} samples counted as {:?}",
            self.name(),
            canonical.case,
            canonical.num_samples(),
            stats.shape()
        );

        Ok(StatScoresState::from_batch(stats, layout, canonical.num_classes()))
    }

    fn reduce(&self, state: &StatScoresState) -> Result<MetricOutput> {
        match (state.stats(), state.layout()) {
            (Some(stats), Some(layout)) => Ok(fbeta_reduce(
                stats,
                layout,
                self.config.beta,
                self.average,
                self.config.ignore_index,
            )),
            _ => Ok(self.empty_output()),
        }
    }

    fn compute_on_step(&self) -> bool {
        self.config.compute_on_step
    }

    fn dist_sync_on_step(&self) -> bool {
        self.config.dist_sync_on_step
    }
}

/// Stateful F-beta score.
pub type FBeta = StatefulMetric<FBetaScore>;

/// Stateful F1 score: an [`FBeta`] whose `beta` is always 1.
#[derive(Debug)]
pub struct F1(FBeta);

impl F1 {
    /// Stateful F1 score; the configured `beta` is replaced by 1.
    pub fn from_config(config: FBetaConfig) -> Result<Self> {
        FBeta::f1(config).map(F1)
    }

    /// Synchronize through `collective` instead of running locally.
    pub fn with_collective(self, collective: Arc<dyn Collective>) -> Self {
        F1(self.0.with_collective(collective))
    }

    /// The wrapped metric.
    pub fn metric(&self) -> &FBetaScore {
        self.0.metric()
    }

    /// The local (unsynchronized) accumulated counts.
    pub fn state(&self) -> &StatScoresState {
        self.0.state()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.0.phase()
    }

    /// Fold a batch into the accumulated counts.
    pub fn update<I: Into<ClassificationBatch>>(&mut self, input: I) -> Result<()> {
        self.0.update(input)
    }

    /// F1 over every batch seen by every worker.
    pub fn compute(&mut self) -> Result<MetricOutput> {
        self.0.compute()
    }

    /// Update with a batch and return its own F1 if `compute_on_step` is set.
    pub fn forward<I: Into<ClassificationBatch>>(&mut self, input: I) -> Result<Option<MetricOutput>> {
        self.0.forward(input)
    }

    /// Drop the accumulated counts.
    pub fn reset(&mut self) {
        self.0.reset()
    }

    /// Unwrap into the underlying [`FBeta`].
    pub fn into_inner(self) -> FBeta {
        self.0
    }
}

impl StatefulMetric<FBetaScore> {
    /// Stateful F-beta score with the configured `beta`.
    pub fn from_config(config: FBetaConfig) -> Result<Self> {
        Ok(StatefulMetric::new(FBetaScore::new(config)?))
    }

    /// Stateful F1 score; the configured `beta` is replaced by 1.
    pub fn f1(config: FBetaConfig) -> Result<Self> {
        Ok(StatefulMetric::new(FBetaScore::f1(config)?))
    }
}
