//! Configuration management for the metrics.
//!
//! Every metric is built from an immutable configuration that is validated
//! before any data is seen:
//!
//! - [`core`]: the configuration structs, their builders and file IO
//! - [`validation`]: the checks shared by builders, file loading and the
//!   functional entry points

pub mod core;
pub mod validation;

pub use self::core::{FBetaConfig, FBetaConfigBuilder, RetrievalConfig, RetrievalConfigBuilder};
pub use validation::{parse_k, validate_fbeta, validate_retrieval, K_POSITIVE_MESSAGE};
