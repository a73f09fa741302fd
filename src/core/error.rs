//! Error handling and error types for stateful metrics.
//!
//! Configuration errors surface at construction time, shape errors at the
//! first offending `update`. Numeric edge cases (zero denominators, empty
//! supports) are never reported through this type: they degrade to a defined
//! fallback value inside the reduction engine.

use std::io;
use thiserror::Error;

/// Main error type for the metrics library.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Dimension mismatch errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Inputs that cannot be classified or contain out-of-domain values
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A query without positive targets under `EmptyTargetAction::Error`
    #[error("Empty query: {message}")]
    EmptyQuery { message: String },

    /// Collective communication failures
    #[error("Distributed error: {message}")]
    Distributed { message: String },

    /// Array reshaping errors
    #[error("Shape error: {source}")]
    Shape {
        #[from]
        source: ndarray::ShapeError,
    },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using MetricsError
pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        MetricsError::Config {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        MetricsError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        MetricsError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        MetricsError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an empty query error
    pub fn empty_query<S: Into<String>>(message: S) -> Self {
        MetricsError::EmptyQuery {
            message: message.into(),
        }
    }

    /// Create a distributed communication error
    pub fn distributed<S: Into<String>>(message: S) -> Self {
        MetricsError::Distributed {
            message: message.into(),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        MetricsError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable.
    ///
    /// Shape and input errors only poison the offending batch; the metric
    /// state is left untouched and further updates may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MetricsError::Config { .. } => false,
            MetricsError::InvalidParameter { .. } => false,
            MetricsError::DimensionMismatch { .. } => true,
            MetricsError::InvalidInput { .. } => true,
            MetricsError::EmptyQuery { .. } => true,
            MetricsError::Distributed { .. } => false,
            MetricsError::Shape { .. } => true,
            MetricsError::IO { .. } => false,
            MetricsError::Json { .. } => false,
            MetricsError::Bincode { .. } => false,
            MetricsError::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            MetricsError::Config { .. } => "config",
            MetricsError::InvalidParameter { .. } => "invalid_parameter",
            MetricsError::DimensionMismatch { .. } => "dimension_mismatch",
            MetricsError::InvalidInput { .. } => "invalid_input",
            MetricsError::EmptyQuery { .. } => "empty_query",
            MetricsError::Distributed { .. } => "distributed",
            MetricsError::Shape { .. } => "shape",
            MetricsError::IO { .. } => "io",
            MetricsError::Json { .. } => "json",
            MetricsError::Bincode { .. } => "bincode",
            MetricsError::Internal { .. } => "internal",
        }
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::MetricsError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::MetricsError::config(format!($fmt, $($arg)*))
    };
}

/// Build a [`MetricsError::InvalidInput`] from a message or format string.
#[macro_export]
macro_rules! input_error {
    ($msg:expr) => {
        $crate::core::error::MetricsError::invalid_input($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::MetricsError::invalid_input(format!($fmt, $($arg)*))
    };
}

/// Return early with the given error unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
