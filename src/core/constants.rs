//! Library constants and configuration defaults.

/// Default threshold turning a probability into a positive prediction.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Default `beta` for the F-beta score; 1.0 is the F1 score.
pub const DEFAULT_BETA: f64 = 1.0;

/// Target value marking rows that retrieval metrics should disregard.
pub const IGNORE_IDX: i64 = -100;

/// Value contributed by an empty query under `EmptyTargetAction::Pos`.
pub const EMPTY_QUERY_POS_SCORE: f64 = 1.0;

/// Value contributed by an empty query under `EmptyTargetAction::Neg`.
pub const EMPTY_QUERY_NEG_SCORE: f64 = 0.0;

/// Score used wherever a denominator is zero.
pub const ZERO_DIVISION_SCORE: f64 = 0.0;

/// Crate version string.
pub const STATEFUL_METRICS_VERSION: &str = env!("CARGO_PKG_VERSION");
