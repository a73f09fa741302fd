//! # Stateful Metrics
//!
//! Evaluation metrics for machine-learning outputs that accumulate over
//! mini-batches and distributed workers and still produce the result a
//! single pass over the whole data would.
//!
//! ## Features
//!
//! - **F-beta / F1**: binary, multi-class, multi-label and multi-dimensional
//!   inputs; micro, macro, weighted, samples and per-class averaging;
//!   global or sample-wise reduction of extra axes; `ignore_index` and
//!   `top_k` selection.
//! - **Retrieval**: mean reciprocal rank, recall@k, precision@k and mean
//!   average precision over query-grouped rows, with a configurable policy
//!   for queries without relevant documents.
//! - **Distributed synchronization**: metric state is combined through an
//!   injected [`Collective`] right before reduction.
//! - **Functional forms**: every metric has a pure single-batch counterpart in
//!   [`metrics::functional`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stateful_metrics::{AverageMethod, FBeta, FBetaConfigBuilder};
//! use ndarray::array;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! stateful_metrics::init()?;
//!
//! let config = FBetaConfigBuilder::new()
//!     .beta(2.0)
//!     .average(AverageMethod::Micro)
//!     .num_classes(3)
//!     .top_k(2)
//!     .build()?;
//! let mut f2 = FBeta::from_config(config)?;
//!
//! let preds = array![[0.35, 0.4, 0.25], [0.1, 0.5, 0.4], [0.2, 0.1, 0.7]];
//! let target = array![0i64, 1, 2];
//! f2.update((preds, target))?;
//!
//! println!("F2: {}", f2.compute()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: error type, input and output types, constants and collective
//!   communication
//! - [`config`]: metric configurations, builders and validation
//! - [`metrics`]: the stateful metric base, input normalization, counting,
//!   reduction and the concrete metrics

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module - always available
pub mod core;

// Configuration management module
pub mod config;

// Metrics module
pub mod metrics;

// Re-export core functionality for convenience
pub use crate::core::{
    constants::*,
    error::{MetricsError, Result},
    network::{Collective, LocalCollective, ThreadCollective},
    types::*,
};

pub use config::{FBetaConfig, FBetaConfigBuilder, RetrievalConfig, RetrievalConfigBuilder};

pub use metrics::{
    FBeta, FBetaScore, Metric, MetricState, Phase, RetrievalMAP, RetrievalMRR, RetrievalMetric,
    RetrievalPrecision, RetrievalRecall, StatefulMetric, F1,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library: installs an `env_logger` logger unless the host
/// application already installed one.
pub fn init() -> Result<()> {
    crate::core::initialize_core()
}

/// Whether [`init`] has run.
pub fn is_initialized() -> bool {
    crate::core::is_core_initialized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_initialization() {
        assert!(init().is_ok());
        assert!(is_initialized());
        assert!(init().is_ok());
    }

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION, STATEFUL_METRICS_VERSION);
    }
}
