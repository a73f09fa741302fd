//! Query-grouped retrieval metrics.
//!
//! Retrieval metrics need the full ranking of every query, so unlike the
//! classification metrics they cannot accumulate counts: `update` buffers
//! raw `(index, pred, target)` rows and `compute` groups them by query id,
//! scores every query with a [`QueryScorer`] and averages the scores.
//!
//! Rows whose target equals `exclude` are dropped before grouping. Queries
//! without a positive target are handled by [`EmptyTargetAction`].

use crate::config::validation::validate_k;
use crate::config::RetrievalConfig;
use crate::core::constants::{EMPTY_QUERY_NEG_SCORE, EMPTY_QUERY_POS_SCORE};
use crate::core::error::{MetricsError, Result};
use crate::core::types::{EmptyTargetAction, Target};
use crate::metrics::functional;
use crate::metrics::{Metric, MetricState, StatefulMetric};
use ndarray::{Array, ArrayD, Dimension};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Score of a single query.
pub trait QueryScorer: Debug + Clone + Send + Sync {
    /// Name used in log messages.
    const NAME: &'static str;

    /// Score one query. `preds` and `target` are non-empty, of equal length,
    /// and `target` holds at least one relevant document.
    fn score(&self, preds: &[f64], target: &[bool]) -> f64;
}

/// Reciprocal rank of the first relevant document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReciprocalRank;

impl QueryScorer for ReciprocalRank {
    const NAME: &'static str = "retrieval_mrr";

    fn score(&self, preds: &[f64], target: &[bool]) -> f64 {
        functional::reciprocal_rank(preds, target)
    }
}

/// Share of the relevant documents found in the top `k`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecallAtK {
    k: Option<usize>,
}

impl RecallAtK {
    /// Recall over the top `k` documents, or all of them when `None`.
    pub fn new(k: Option<usize>) -> Result<Self> {
        if let Some(k) = k {
            validate_k(k)?;
        }
        Ok(RecallAtK { k })
    }
}

impl QueryScorer for RecallAtK {
    const NAME: &'static str = "retrieval_recall";

    fn score(&self, preds: &[f64], target: &[bool]) -> f64 {
        functional::recall_at_k(preds, target, self.k)
    }
}

/// Share of the top `k` documents that are relevant.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecisionAtK {
    k: Option<usize>,
}

impl PrecisionAtK {
    /// Precision over the top `k` documents, or all of them when `None`.
    pub fn new(k: Option<usize>) -> Result<Self> {
        if let Some(k) = k {
            validate_k(k)?;
        }
        Ok(PrecisionAtK { k })
    }
}

impl QueryScorer for PrecisionAtK {
    const NAME: &'static str = "retrieval_precision";

    fn score(&self, preds: &[f64], target: &[bool]) -> f64 {
        functional::precision_at_k(preds, target, self.k)
    }
}

/// Mean of the precisions at every relevant document.
#[derive(Debug, Clone, Copy, Default)]
pub struct AveragePrecision;

impl QueryScorer for AveragePrecision {
    const NAME: &'static str = "retrieval_map";

    fn score(&self, preds: &[f64], target: &[bool]) -> f64 {
        functional::average_precision(preds, target)
    }
}

/// A retrieval batch: query ids, scores and relevance, all of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalBatch {
    /// Query id of every row
    pub indexes: ArrayD<i64>,
    /// Predicted relevance scores
    pub preds: ArrayD<f64>,
    /// 0/1 relevance (or the excluded value)
    pub target: Target,
}

impl<D, T> From<(Array<i64, D>, Array<f64, D>, T)> for RetrievalBatch
where
    D: Dimension,
    T: Into<Target>,
{
    fn from((indexes, preds, target): (Array<i64, D>, Array<f64, D>, T)) -> Self {
        RetrievalBatch {
            indexes: indexes.into_dyn(),
            preds: preds.into_dyn(),
            target: target.into(),
        }
    }
}

/// Buffered rows of a retrieval metric, flattened in row-major order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalState {
    /// Query id of every buffered row
    pub indexes: Vec<i64>,
    /// Score of every buffered row
    pub preds: Vec<f64>,
    /// Target of every buffered row
    pub target: Vec<i64>,
}

impl RetrievalState {
    /// Number of buffered rows.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }
}

impl MetricState for RetrievalState {
    fn merge(&mut self, other: Self) -> Result<()> {
        self.indexes.extend(other.indexes);
        self.preds.extend(other.preds);
        self.target.extend(other.target);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Retrieval metric built from a per-query scorer.
#[derive(Debug, Clone)]
pub struct RetrievalMetric<Q: QueryScorer> {
    config: RetrievalConfig,
    scorer: Q,
}

impl<Q: QueryScorer> RetrievalMetric<Q> {
    /// Create the metric, validating the configuration.
    pub fn new(config: RetrievalConfig, scorer: Q) -> Result<Self> {
        config.validate()?;
        Ok(RetrievalMetric { config, scorer })
    }

    /// The configuration the metric was built from.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The per-query scorer.
    pub fn scorer(&self) -> &Q {
        &self.scorer
    }

    /// Group the non-excluded rows by query id, in ascending id order.
    fn group_queries(&self, state: &RetrievalState) -> Vec<(i64, Vec<f64>, Vec<bool>)> {
        let mut groups: BTreeMap<i64, (Vec<f64>, Vec<bool>)> = BTreeMap::new();
        for ((&index, &pred), &target) in state.indexes.iter().zip(&state.preds).zip(&state.target) {
            if target == self.config.exclude {
                continue;
            }
            let (preds, targets) = groups.entry(index).or_default();
            preds.push(pred);
            targets.push(target == 1);
        }
        groups
            .into_iter()
            .map(|(index, (preds, targets))| (index, preds, targets))
            .collect()
    }
}

impl<Q: QueryScorer> Metric for RetrievalMetric<Q> {
    type Input = RetrievalBatch;
    type State = RetrievalState;
    type Output = f64;

    fn name(&self) -> &'static str {
        Q::NAME
    }

    fn batch_state(&self, input: &RetrievalBatch) -> Result<RetrievalState> {
        let target = input.target.labels();
        if input.indexes.shape() != input.preds.shape() || input.preds.shape() != target.shape() {
            return Err(MetricsError::dimension_mismatch(
                format!(
                    "`indexes`, `preds` and `target` of the same shape, indexes {:?}",
                    input.indexes.shape()
                ),
                format!("preds {:?}, target {:?}", input.preds.shape(), target.shape()),
            ));
        }
        if input.indexes.is_empty() {
            return Err(MetricsError::invalid_input(
                "`indexes`, `preds` and `target` must be non-empty",
            ));
        }
        if target
            .iter()
            .any(|&t| t != self.config.exclude && t != 0 && t != 1)
        {
            return Err(MetricsError::invalid_input("`target` must be of type `binary`"));
        }

        Ok(RetrievalState {
            indexes: input.indexes.iter().copied().collect(),
            preds: input.preds.iter().copied().collect(),
            target: target.iter().copied().collect(),
        })
    }

    fn reduce(&self, state: &RetrievalState) -> Result<f64> {
        let queries = self.group_queries(state);

        let scores: Vec<Option<f64>> = queries
            .par_iter()
            .map(|(_, preds, targets)| {
                if targets.iter().any(|&t| t) {
                    Some(self.scorer.score(preds, targets))
                } else {
                    None
                }
            })
            .collect();

        let mut contributions = Vec::with_capacity(scores.len());
        for ((index, _, _), score) in queries.iter().zip(scores) {
            match (score, self.config.empty_target_action) {
                (Some(score), _) => contributions.push(score),
                (None, EmptyTargetAction::Skip) => {}
                (None, EmptyTargetAction::Pos) => contributions.push(EMPTY_QUERY_POS_SCORE),
                (None, EmptyTargetAction::Neg) => contributions.push(EMPTY_QUERY_NEG_SCORE),
                (None, EmptyTargetAction::Error) => {
                    return Err(MetricsError::empty_query(format!(
                        "`compute` method was provided with query {} that has no positive target",
                        index
                    )));
                }
            }
        }

        if contributions.is_empty() {
            log::warn!(
                "{}: no query could be scored out of {}; returning 0.0",
                self.name(),
                queries.len()
            );
            return Ok(0.0);
        }

        log::debug!(
            "{}: averaged {} of {} queries",
            self.name(),
            contributions.len(),
            queries.len()
        );
        Ok(contributions.iter().sum::<f64>() / contributions.len() as f64)
    }

    fn compute_on_step(&self) -> bool {
        self.config.compute_on_step
    }

    fn dist_sync_on_step(&self) -> bool {
        self.config.dist_sync_on_step
    }
}

/// Stateful mean reciprocal rank.
pub type RetrievalMRR = StatefulMetric<RetrievalMetric<ReciprocalRank>>;

/// Stateful mean recall at `k`.
pub type RetrievalRecall = StatefulMetric<RetrievalMetric<RecallAtK>>;

/// Stateful mean precision at `k`.
pub type RetrievalPrecision = StatefulMetric<RetrievalMetric<PrecisionAtK>>;

/// Stateful mean average precision.
pub type RetrievalMAP = StatefulMetric<RetrievalMetric<AveragePrecision>>;

impl StatefulMetric<RetrievalMetric<ReciprocalRank>> {
    /// Mean reciprocal rank; `k` is not used.
    pub fn from_config(config: RetrievalConfig) -> Result<Self> {
        Ok(StatefulMetric::new(RetrievalMetric::new(config, ReciprocalRank)?))
    }
}

impl StatefulMetric<RetrievalMetric<RecallAtK>> {
    /// Mean recall over the configured top `k`.
    pub fn from_config(config: RetrievalConfig) -> Result<Self> {
        let scorer = RecallAtK::new(config.k)?;
        Ok(StatefulMetric::new(RetrievalMetric::new(config, scorer)?))
    }
}

impl StatefulMetric<RetrievalMetric<PrecisionAtK>> {
    /// Mean precision over the configured top `k`.
    pub fn from_config(config: RetrievalConfig) -> Result<Self> {
        let scorer = PrecisionAtK::new(config.k)?;
        Ok(StatefulMetric::new(RetrievalMetric::new(config, scorer)?))
    }
}

impl StatefulMetric<RetrievalMetric<AveragePrecision>> {
    /// Mean average precision; `k` is not used.
    pub fn from_config(config: RetrievalConfig) -> Result<Self> {
        Ok(StatefulMetric::new(RetrievalMetric::new(config, AveragePrecision)?))
    }
}
