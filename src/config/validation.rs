//! Eager validation of metric configurations.
//!
//! Every check here runs before any data is seen. The messages name the
//! offending parameter in backticks so callers can match on them.

use crate::config::core::{FBetaConfig, RetrievalConfig};
use crate::core::error::{MetricsError, Result};

/// Message used whenever `k` is rejected.
pub const K_POSITIVE_MESSAGE: &str = "`k` has to be a positive integer or None";

/// Validate an F-beta configuration.
///
/// Checks run in a fixed order so that a configuration with several
/// problems always reports the same one first.
pub fn validate_fbeta(config: &FBetaConfig) -> Result<()> {
    if !(config.beta.is_finite() && config.beta > 0.0) {
        return Err(MetricsError::invalid_parameter(
            "beta",
            config.beta.to_string(),
            "`beta` has to be a positive real number",
        ));
    }

    validate_threshold(config.threshold)?;

    if config.average.needs_num_classes() && config.num_classes.map_or(true, |c| c < 1) {
        return Err(MetricsError::invalid_parameter(
            "num_classes",
            "None",
            format!(
                "when you set `average` as {}, you have to provide the number of classes",
                config.average
            ),
        ));
    }

    if let (Some(num_classes), Some(ignore_index)) = (config.num_classes, config.ignore_index) {
        validate_ignore_index(ignore_index, num_classes)?;
    }

    if let Some(top_k) = config.top_k {
        validate_top_k(top_k, config.num_classes)?;
    }

    Ok(())
}

/// Validate a retrieval configuration.
pub fn validate_retrieval(config: &RetrievalConfig) -> Result<()> {
    if let Some(k) = config.k {
        validate_k(k)?;
    }
    Ok(())
}

/// `threshold` must be a probability.
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(MetricsError::invalid_parameter(
            "threshold",
            threshold.to_string(),
            "`threshold` has to be in [0, 1]",
        ));
    }
    Ok(())
}

/// `ignore_index` must address a real class of a non-binary problem.
pub fn validate_ignore_index(ignore_index: usize, num_classes: usize) -> Result<()> {
    if ignore_index >= num_classes || num_classes == 1 {
        return Err(MetricsError::invalid_parameter(
            "ignore_index",
            ignore_index.to_string(),
            format!(
                "the `ignore_index` {} is not valid for inputs with {} classes",
                ignore_index, num_classes
            ),
        ));
    }
    Ok(())
}

/// `top_k` must be positive and, when the class count is known, fit in it.
pub fn validate_top_k(top_k: usize, num_classes: Option<usize>) -> Result<()> {
    if top_k == 0 {
        return Err(MetricsError::invalid_parameter(
            "top_k",
            "0",
            "`top_k` has to be a positive integer",
        ));
    }
    if let Some(num_classes) = num_classes {
        if top_k > num_classes {
            return Err(MetricsError::invalid_parameter(
                "top_k",
                top_k.to_string(),
                format!("`top_k` can not be larger than the {} classes", num_classes),
            ));
        }
    }
    Ok(())
}

/// `k` must be a positive integer.
pub fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(MetricsError::invalid_parameter("k", "0", K_POSITIVE_MESSAGE));
    }
    Ok(())
}

/// Parse `k` from its textual form: a positive integer, or `none`.
///
/// Floats such as `1.0` and negative integers are rejected.
pub fn parse_k(raw: &str) -> Result<Option<usize>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let k: usize = raw
        .parse()
        .map_err(|_| MetricsError::invalid_parameter("k", raw, K_POSITIVE_MESSAGE))?;
    validate_k(k)?;
    Ok(Some(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AverageMethod;

    #[test]
    fn test_default_fbeta_is_valid() {
        assert!(validate_fbeta(&FBetaConfig::default()).is_ok());
    }

    #[test]
    fn test_average_requires_classes() {
        let config = FBetaConfig {
            average: AverageMethod::Macro,
            num_classes: None,
            ..FBetaConfig::default()
        };
        let err = validate_fbeta(&config).unwrap_err();
        assert!(err.to_string().contains("number of classes"));
    }

    #[test]
    fn test_binary_rejects_ignore_index() {
        let config = FBetaConfig {
            average: AverageMethod::Macro,
            num_classes: Some(1),
            ignore_index: Some(0),
            ..FBetaConfig::default()
        };
        let err = validate_fbeta(&config).unwrap_err();
        assert!(err.to_string().contains("ignore_index"));
    }

    #[test]
    fn test_ignore_index_out_of_range() {
        assert!(validate_ignore_index(3, 3).is_err());
        assert!(validate_ignore_index(2, 3).is_ok());
    }

    #[test]
    fn test_non_positive_beta() {
        let config = FBetaConfig {
            beta: 0.0,
            ..FBetaConfig::default()
        };
        assert!(validate_fbeta(&config).is_err());
    }

    #[test]
    fn test_top_k_bounds() {
        assert!(validate_top_k(0, None).is_err());
        assert!(validate_top_k(4, Some(3)).is_err());
        assert!(validate_top_k(3, Some(3)).is_ok());
    }

    #[test]
    fn test_parse_k() {
        assert_eq!(parse_k("none").unwrap(), None);
        assert_eq!(parse_k("5").unwrap(), Some(5));
        for bad in ["-1", "1.0", "0"] {
            let err = parse_k(bad).unwrap_err();
            assert!(err.to_string().contains(K_POSITIVE_MESSAGE), "{}", bad);
        }
    }
}
