//! Metric configuration structures and builders.
//!
//! Configurations are plain serde structs. They can be assembled with a
//! fluent builder, parsed from a string parameter map, or loaded from a
//! JSON/TOML file; all three routes end in the same `validate()` call.

use crate::config::validation;
use crate::core::constants::*;
use crate::core::error::{MetricsError, Result};
use crate::core::types::*;
use crate::config_error;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Configuration of the F-beta family of classification metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FBetaConfig {
    /// Weight of recall relative to precision
    pub beta: f64,
    /// Averaging over classes
    pub average: AverageMethod,
    /// Averaging over the extra axis of multi-dimensional inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mdmc_average: Option<MdmcAverageMethod>,
    /// Number of classes; required by per-class averages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
    /// Class left out of the score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_index: Option<usize>,
    /// Probability threshold for binary and multilabel inputs
    pub threshold: f64,
    /// Force (`true`) or forbid (`false`) the multiclass interpretation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_multiclass: Option<bool>,
    /// Number of highest-scored classes counted as predicted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Whether `forward` returns the score of the current batch
    pub compute_on_step: bool,
    /// Whether `forward` synchronizes the batch score across workers
    pub dist_sync_on_step: bool,
}

impl Default for FBetaConfig {
    fn default() -> Self {
        Self {
            beta: DEFAULT_BETA,
            average: AverageMethod::Micro,
            mdmc_average: None,
            num_classes: None,
            ignore_index: None,
            threshold: DEFAULT_THRESHOLD,
            is_multiclass: None,
            top_k: None,
            compute_on_step: true,
            dist_sync_on_step: false,
        }
    }
}

impl FBetaConfig {
    /// Create a default configuration (F1, micro average).
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate_fbeta(self)
    }

    /// Averaging actually applied: a single class is always scored as a
    /// binary problem.
    pub fn effective_average(&self) -> AverageMethod {
        if self.num_classes == Some(1) {
            AverageMethod::Micro
        } else {
            self.average
        }
    }

    /// Load configuration from a `.json` or `.toml` file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = load_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_file(self, path.as_ref())
    }

    /// Flatten the configuration into a string map, the inverse of
    /// [`FBetaConfigBuilder::from_params`].
    pub fn as_parameter_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("beta".to_string(), self.beta.to_string());
        map.insert("average".to_string(), self.average.to_string());
        map.insert("threshold".to_string(), self.threshold.to_string());
        map.insert("compute_on_step".to_string(), self.compute_on_step.to_string());
        map.insert("dist_sync_on_step".to_string(), self.dist_sync_on_step.to_string());
        if let Some(mdmc) = self.mdmc_average {
            map.insert("mdmc_average".to_string(), mdmc.to_string());
        }
        if let Some(num_classes) = self.num_classes {
            map.insert("num_classes".to_string(), num_classes.to_string());
        }
        if let Some(ignore_index) = self.ignore_index {
            map.insert("ignore_index".to_string(), ignore_index.to_string());
        }
        if let Some(is_multiclass) = self.is_multiclass {
            map.insert("is_multiclass".to_string(), is_multiclass.to_string());
        }
        if let Some(top_k) = self.top_k {
            map.insert("top_k".to_string(), top_k.to_string());
        }
        map
    }
}

/// Fluent builder for [`FBetaConfig`].
#[derive(Debug, Clone)]
pub struct FBetaConfigBuilder {
    config: FBetaConfig,
    validation_errors: Vec<String>,
}

impl FBetaConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        FBetaConfigBuilder {
            config: FBetaConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Set `beta`
    pub fn beta(mut self, beta: f64) -> Self {
        if !(beta.is_finite() && beta > 0.0) {
            self.validation_errors
                .push("`beta` has to be a positive real number".to_string());
        }
        self.config.beta = beta;
        self
    }

    /// Set the class averaging method
    pub fn average(mut self, average: AverageMethod) -> Self {
        self.config.average = average;
        self
    }

    /// Set the multi-dimensional averaging method
    pub fn mdmc_average(mut self, mdmc_average: MdmcAverageMethod) -> Self {
        self.config.mdmc_average = Some(mdmc_average);
        self
    }

    /// Set the number of classes
    pub fn num_classes(mut self, num_classes: usize) -> Self {
        self.config.num_classes = Some(num_classes);
        self
    }

    /// Set the ignored class
    pub fn ignore_index(mut self, ignore_index: usize) -> Self {
        self.config.ignore_index = Some(ignore_index);
        self
    }

    /// Set the probability threshold
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Force or forbid the multiclass interpretation
    pub fn is_multiclass(mut self, is_multiclass: bool) -> Self {
        self.config.is_multiclass = Some(is_multiclass);
        self
    }

    /// Set `top_k`
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = Some(top_k);
        self
    }

    /// Set `compute_on_step`
    pub fn compute_on_step(mut self, compute_on_step: bool) -> Self {
        self.config.compute_on_step = compute_on_step;
        self
    }

    /// Set `dist_sync_on_step`
    pub fn dist_sync_on_step(mut self, dist_sync_on_step: bool) -> Self {
        self.config.dist_sync_on_step = dist_sync_on_step;
        self
    }

    /// Create a builder from textual parameters.
    ///
    /// Enumerations are parsed from their lowercase names; `none` (or an
    /// empty value) clears an optional parameter.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Self::new();

        // Fixed order keeps error reporting deterministic.
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort_by_key(|k| param_rank(k));

        for key in keys {
            let value = params[key].as_str();
            builder = match key.as_str() {
                "beta" => builder.beta(parse_param(key, value)?),
                "average" => builder.average(value.parse()?),
                "mdmc_average" => {
                    builder.config.mdmc_average = parse_optional(value, |v| v.parse())?;
                    builder
                }
                "num_classes" => {
                    builder.config.num_classes = parse_optional(value, |v| parse_param(key, v))?;
                    builder
                }
                "ignore_index" => {
                    builder.config.ignore_index = parse_optional(value, |v| {
                        parse_param(key, v).map_err(|_| {
                            MetricsError::invalid_parameter(
                                "ignore_index",
                                v,
                                "the `ignore_index` has to be a non-negative class index",
                            )
                        })
                    })?;
                    builder
                }
                "threshold" => builder.threshold(parse_param(key, value)?),
                "is_multiclass" => {
                    builder.config.is_multiclass = parse_optional(value, |v| parse_param(key, v))?;
                    builder
                }
                "top_k" => {
                    builder.config.top_k = parse_optional(value, |v| parse_param(key, v))?;
                    builder
                }
                "compute_on_step" => builder.compute_on_step(parse_param(key, value)?),
                "dist_sync_on_step" => builder.dist_sync_on_step(parse_param(key, value)?),
                _ => {
                    log::warn!("Unknown configuration parameter: {}", key);
                    builder
                }
            };
        }

        Ok(builder)
    }

    /// Build the configuration
    pub fn build(self) -> Result<FBetaConfig> {
        if !self.validation_errors.is_empty() {
            return Err(config_error!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            ));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for FBetaConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of the query-grouped retrieval metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Policy for queries without positive targets
    pub empty_target_action: EmptyTargetAction,
    /// Rows whose target equals this value are dropped
    pub exclude: i64,
    /// Only the top `k` documents of each query are considered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    /// Whether `forward` returns the score of the current batch
    pub compute_on_step: bool,
    /// Whether `forward` synchronizes the batch score across workers
    pub dist_sync_on_step: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            empty_target_action: EmptyTargetAction::Skip,
            exclude: IGNORE_IDX,
            k: None,
            compute_on_step: true,
            dist_sync_on_step: false,
        }
    }
}

impl RetrievalConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate_retrieval(self)
    }

    /// Load configuration from a `.json` or `.toml` file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = load_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_file(self, path.as_ref())
    }
}

/// Fluent builder for [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the empty query policy
    pub fn empty_target_action(mut self, action: EmptyTargetAction) -> Self {
        self.config.empty_target_action = action;
        self
    }

    /// Set the excluded target value
    pub fn exclude(mut self, exclude: i64) -> Self {
        self.config.exclude = exclude;
        self
    }

    /// Set `k`
    pub fn k(mut self, k: usize) -> Self {
        self.config.k = Some(k);
        self
    }

    /// Set `compute_on_step`
    pub fn compute_on_step(mut self, compute_on_step: bool) -> Self {
        self.config.compute_on_step = compute_on_step;
        self
    }

    /// Set `dist_sync_on_step`
    pub fn dist_sync_on_step(mut self, dist_sync_on_step: bool) -> Self {
        self.config.dist_sync_on_step = dist_sync_on_step;
        self
    }

    /// Create a builder from textual parameters.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Self::new();
        for (key, value) in params {
            match key.as_str() {
                "empty_target_action" => builder.config.empty_target_action = value.parse()?,
                "exclude" => builder.config.exclude = parse_param(key, value)?,
                "k" => builder.config.k = validation::parse_k(value)?,
                "compute_on_step" => builder.config.compute_on_step = parse_param(key, value)?,
                "dist_sync_on_step" => builder.config.dist_sync_on_step = parse_param(key, value)?,
                _ => log::warn!("Unknown configuration parameter: {}", key),
            }
        }
        Ok(builder)
    }

    /// Build the configuration
    pub fn build(self) -> Result<RetrievalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn param_rank(key: &str) -> usize {
    const ORDER: [&str; 10] = [
        "average",
        "mdmc_average",
        "num_classes",
        "ignore_index",
        "beta",
        "threshold",
        "is_multiclass",
        "top_k",
        "compute_on_step",
        "dist_sync_on_step",
    ];
    ORDER.iter().position(|k| *k == key).unwrap_or(ORDER.len())
}

fn parse_param<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        MetricsError::invalid_parameter(key, value, format!("could not parse `{}`", key))
    })
}

fn parse_optional<T, F>(value: &str, parse: F) -> Result<Option<T>>
where
    F: FnOnce(&str) -> Result<T>,
{
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse(value).map(Some)
    }
}

fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("toml") => toml::from_str(&content)
            .map_err(|e| config_error!("Failed to parse TOML config: {}", e)),
        _ => Err(config_error!(
            "Unsupported config file format {}. Use .json or .toml",
            path.display()
        )),
    }
}

fn save_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::to_string_pretty(value)?,
        Some("toml") => toml::to_string_pretty(value)
            .map_err(|e| config_error!("Failed to serialize to TOML: {}", e))?,
        _ => {
            return Err(config_error!(
                "Unsupported config file format {}. Use .json or .toml",
                path.display()
            ))
        }
    };

    std::fs::write(path, content)?;
    Ok(())
}
