//! Stateful evaluation metrics.
//!
//! A metric is split in two halves:
//!
//! - a [`Metric`]: immutable configuration plus two pure functions, one
//!   turning a batch into a state and one reducing a state into a result;
//! - a [`StatefulMetric`]: owns the accumulated state, drives the
//!   `update`/`compute`/`forward`/`reset` lifecycle and synchronizes the
//!   state across workers right before reduction.
//!
//! # Examples
//!
//! ## Classification
//!
//! ```rust,no_run
//! use stateful_metrics::config::FBetaConfigBuilder;
//! use stateful_metrics::metrics::F1;
//! use stateful_metrics::AverageMethod;
//! use ndarray::array;
//!
//! # fn example() -> stateful_metrics::Result<()> {
//! let config = FBetaConfigBuilder::new()
//!     .average(AverageMethod::Macro)
//!     .num_classes(3)
//!     .build()?;
//! let mut f1 = F1::from_config(config)?;
//!
//! f1.update((array![0i64, 2, 1], array![0i64, 1, 1]))?;
//! f1.update((array![2i64, 2], array![2i64, 0]))?;
//! println!("F1: {}", f1.compute()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Retrieval
//!
//! ```rust,no_run
//! use stateful_metrics::config::RetrievalConfig;
//! use stateful_metrics::metrics::RetrievalMRR;
//! use ndarray::array;
//!
//! # fn example() -> stateful_metrics::Result<()> {
//! let mut mrr = RetrievalMRR::from_config(RetrievalConfig::default())?;
//! mrr.update((
//!     array![0i64, 0, 0, 1, 1, 1, 1],
//!     array![0.2, 0.3, 0.5, 0.1, 0.3, 0.5, 0.2],
//!     array![false, false, true, false, true, false, true],
//! ))?;
//! println!("MRR: {:.4}", mrr.compute()?);
//! # Ok(())
//! # }
//! ```

pub mod classification;
pub mod functional;
pub mod input;
pub mod ranking;
pub mod reduction;
pub mod stat_scores;

pub use classification::{ClassificationBatch, FBeta, FBetaScore, F1};
pub use input::{normalize, CanonicalInput};
pub use ranking::{
    AveragePrecision, PrecisionAtK, QueryScorer, RecallAtK, ReciprocalRank, RetrievalBatch,
    RetrievalMAP, RetrievalMRR, RetrievalMetric, RetrievalPrecision, RetrievalRecall,
    RetrievalState,
};
pub use stat_scores::{compute_stats, ReduceMode, StatLayout, StatScores, StatScoresState};

use crate::core::error::Result;
use crate::core::network::{self, Collective, LocalCollective};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Accumulated state of a metric.
///
/// `merge` folds another state into this one; it must be associative so
/// that accumulating batch by batch, or gathering from workers in rank
/// order, yields the state of the concatenated input.
pub trait MetricState: Clone + Default + Debug + Serialize + DeserializeOwned + Send {
    /// Fold `other` into `self`.
    fn merge(&mut self, other: Self) -> Result<()>;

    /// Whether no batch has been folded in yet.
    fn is_empty(&self) -> bool;
}

/// Configuration and pure transition functions of a metric.
pub trait Metric: Debug + Send + Sync {
    /// Batch accepted by `update`
    type Input;
    /// Accumulated state
    type State: MetricState;
    /// Result of `compute`
    type Output: Clone + Debug;

    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// State of a single batch.
    fn batch_state(&self, input: &Self::Input) -> Result<Self::State>;

    /// Reduce a (synchronized) state into a result.
    fn reduce(&self, state: &Self::State) -> Result<Self::Output>;

    /// Whether `forward` returns the score of the batch it was given.
    fn compute_on_step(&self) -> bool {
        true
    }

    /// Whether `forward` synchronizes the batch score across workers.
    fn dist_sync_on_step(&self) -> bool {
        false
    }
}

/// Lifecycle phase of a [`StatefulMetric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Fresh or just reset; no batch seen
    Initialized,
    /// At least one batch folded in since the last compute
    Accumulating,
    /// State gathered from every worker, not yet reduced
    Synchronized,
    /// A result was produced from the current state
    Computed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initialized => write!(f, "initialized"),
            Phase::Accumulating => write!(f, "accumulating"),
            Phase::Synchronized => write!(f, "synchronized"),
            Phase::Computed => write!(f, "computed"),
        }
    }
}

/// Combine every worker's copy of a state, in rank order.
///
/// Returns the local state unchanged when the collective has a single
/// worker. Otherwise this is a barrier: every worker must call it.
pub fn sync_state<S: MetricState>(collective: &dyn Collective, local: &S) -> Result<S> {
    network::all_reduce(collective, local, |acc, other| acc.merge(other))
}

/// A metric together with its accumulated state.
#[derive(Debug)]
pub struct StatefulMetric<M: Metric> {
    metric: M,
    state: M::State,
    phase: Phase,
    collective: Arc<dyn Collective>,
}

impl<M: Metric> StatefulMetric<M> {
    /// Wrap a metric with an empty state, running on a single worker.
    pub fn new(metric: M) -> Self {
        StatefulMetric {
            metric,
            state: M::State::default(),
            phase: Phase::Initialized,
            collective: Arc::new(LocalCollective),
        }
    }

    /// Synchronize through `collective` instead of running locally.
    pub fn with_collective(mut self, collective: Arc<dyn Collective>) -> Self {
        self.collective = collective;
        self
    }

    /// The wrapped metric.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// The local (unsynchronized) accumulated state.
    pub fn state(&self) -> &M::State {
        &self.state
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fold a batch into the accumulated state.
    ///
    /// On error the state is left untouched.
    pub fn update<I: Into<M::Input>>(&mut self, input: I) -> Result<()> {
        let batch = self.metric.batch_state(&input.into())?;
        self.state.merge(batch)?;
        self.phase = Phase::Accumulating;
        log::debug!("{}: batch folded into state", self.metric.name());
        Ok(())
    }

    /// Reduce the state accumulated on every worker.
    ///
    /// Synchronization works on a copy; calling `compute` again without an
    /// intervening `update` returns the same result.
    pub fn compute(&mut self) -> Result<M::Output> {
        if self.state.is_empty() {
            log::warn!(
                "{}: `compute` called before any `update`; the result is the empty-state default",
                self.metric.name()
            );
        }

        let synced = sync_state(self.collective.as_ref(), &self.state)?;
        self.phase = Phase::Synchronized;
        log::debug!(
            "{}: state synchronized over {} worker(s)",
            self.metric.name(),
            self.collective.world_size()
        );

        let output = self.metric.reduce(&synced)?;
        self.phase = Phase::Computed;
        Ok(output)
    }

    /// Update with a batch and, if `compute_on_step` is set, return the
    /// result of that batch alone.
    ///
    /// With `dist_sync_on_step` the batch result covers the batches every
    /// worker passed to this `forward` call.
    pub fn forward<I: Into<M::Input>>(&mut self, input: I) -> Result<Option<M::Output>> {
        let batch = self.metric.batch_state(&input.into())?;
        self.state.merge(batch.clone())?;
        self.phase = Phase::Accumulating;

        if !self.metric.compute_on_step() {
            return Ok(None);
        }

        let batch = if self.metric.dist_sync_on_step() {
            sync_state(self.collective.as_ref(), &batch)?
        } else {
            batch
        };
        self.metric.reduce(&batch).map(Some)
    }

    /// Drop the accumulated state.
    pub fn reset(&mut self) {
        self.state = M::State::default();
        self.phase = Phase::Initialized;
    }
}
