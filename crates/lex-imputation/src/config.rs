//! Configuration for the segmented imputation pipeline.
//!
//! [`DmiConfig`] holds what the user asked for. Options that depend on the
//! dataset (leaf size, merge threshold, EM cap) may be left unset and are
//! derived per run by [`DmiConfig::resolve`], so the same configuration can
//! be reused across datasets.

use serde::{Deserialize, Serialize};

/// User-facing options of the imputation filter.
///
/// # Example
///
/// ```rust,ignore
/// use lex_imputation::DmiConfig;
///
/// let config = DmiConfig::builder()
///     .min_records_for_em(4)
///     .confidence_factor(0.25)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmiConfig {
    /// Lower bound on the number of bins used when a numeric attribute is
    /// discretized for tree induction. Must be at least 2.
    /// Default: 2
    pub min_categories_for_discretization: usize,

    /// Minimum number of records per tree leaf.
    /// `None` derives it as numeric-attribute count + 2.
    /// Default: None
    pub min_records_in_leaf: Option<usize>,

    /// Pruning confidence factor, in (0, 0.5].
    /// Default: 0.25
    pub confidence_factor: f32,

    /// Rules with less support than this are merged into their parent.
    /// `None` derives it as numeric-attribute count + 2.
    /// Default: None
    pub min_records_for_em: Option<usize>,

    /// EM iteration cap. `None` means unbounded.
    /// Default: None
    pub em_max_iterations: Option<usize>,

    /// EM stops once the log-likelihood improves by less than this.
    /// 0 is only valid together with `em_max_iterations`.
    /// Default: 1e-4
    pub em_log_likelihood_threshold: f64,
}

impl Default for DmiConfig {
    fn default() -> Self {
        Self {
            min_categories_for_discretization: 2,
            min_records_in_leaf: None,
            confidence_factor: 0.25,
            min_records_for_em: None,
            em_max_iterations: None,
            em_log_likelihood_threshold: 1e-4,
        }
    }
}

/// Concrete per-run parameters, derived from a [`DmiConfig`] and the
/// number of numeric attributes in the dataset being imputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParams {
    pub min_categories_for_discretization: usize,
    pub min_records_in_leaf: usize,
    pub confidence_factor: f32,
    pub min_records_for_em: usize,
    pub em_max_iterations: usize,
    pub em_log_likelihood_threshold: f64,
}

impl DmiConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DmiConfigBuilder {
        DmiConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.min_categories_for_discretization < 2 {
            return Err(ConfigValidationError::TooFewCategories(
                self.min_categories_for_discretization,
            ));
        }

        if !(self.confidence_factor > 0.0 && self.confidence_factor <= 0.5) {
            return Err(ConfigValidationError::InvalidConfidenceFactor(
                self.confidence_factor,
            ));
        }

        if self.min_records_in_leaf == Some(0) {
            return Err(ConfigValidationError::InvalidLeafSize(0));
        }

        if !self.em_log_likelihood_threshold.is_finite() || self.em_log_likelihood_threshold < 0.0
        {
            return Err(ConfigValidationError::InvalidLogLikelihoodThreshold(
                self.em_log_likelihood_threshold,
            ));
        }

        if self.em_log_likelihood_threshold == 0.0 && self.em_max_iterations.is_none() {
            return Err(ConfigValidationError::UnboundedEm);
        }

        Ok(())
    }

    /// Fill in the derived options for a dataset with `numeric_count`
    /// numeric attributes.
    pub fn resolve(&self, numeric_count: usize) -> ResolvedParams {
        let derived = numeric_count + 2;
        ResolvedParams {
            min_categories_for_discretization: self.min_categories_for_discretization,
            min_records_in_leaf: self.min_records_in_leaf.unwrap_or(derived),
            confidence_factor: self.confidence_factor,
            min_records_for_em: self.min_records_for_em.unwrap_or(derived),
            em_max_iterations: self.em_max_iterations.unwrap_or(usize::MAX),
            em_log_likelihood_threshold: self.em_log_likelihood_threshold,
        }
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("min_categories_for_discretization is {0} (must be at least 2)")]
    TooFewCategories(usize),

    #[error("Invalid confidence factor: {0} (must be in (0, 0.5])")]
    InvalidConfidenceFactor(f32),

    #[error("Invalid minimum leaf size: {0} (must be at least 1)")]
    InvalidLeafSize(usize),

    #[error("Invalid EM log-likelihood threshold: {0} (must be finite and non-negative)")]
    InvalidLogLikelihoodThreshold(f64),

    #[error("EM log-likelihood threshold of 0 requires em_max_iterations")]
    UnboundedEm,
}

/// Builder for [`DmiConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct DmiConfigBuilder {
    min_categories_for_discretization: Option<usize>,
    min_records_in_leaf: Option<usize>,
    confidence_factor: Option<f32>,
    min_records_for_em: Option<usize>,
    em_max_iterations: Option<usize>,
    em_log_likelihood_threshold: Option<f64>,
}

impl DmiConfigBuilder {
    /// Set the minimum number of bins for discretizing a numeric target.
    pub fn min_categories_for_discretization(mut self, categories: usize) -> Self {
        self.min_categories_for_discretization = Some(categories);
        self
    }

    /// Set the minimum leaf size. `None` derives it from the dataset.
    pub fn min_records_in_leaf(mut self, records: impl Into<Option<usize>>) -> Self {
        self.min_records_in_leaf = records.into();
        self
    }

    /// Set the pruning confidence factor.
    pub fn confidence_factor(mut self, factor: f32) -> Self {
        self.confidence_factor = Some(factor);
        self
    }

    /// Set the merge threshold. `None` derives it from the dataset.
    pub fn min_records_for_em(mut self, records: impl Into<Option<usize>>) -> Self {
        self.min_records_for_em = records.into();
        self
    }

    /// Set the EM iteration cap. `None` leaves EM unbounded.
    pub fn em_max_iterations(mut self, iterations: impl Into<Option<usize>>) -> Self {
        self.em_max_iterations = iterations.into();
        self
    }

    /// Set the EM convergence threshold.
    ///
    /// A threshold of 0 stops only at exact convergence, so it is rejected
    /// unless [`em_max_iterations`](Self::em_max_iterations) is also set.
    pub fn em_log_likelihood_threshold(mut self, threshold: f64) -> Self {
        self.em_log_likelihood_threshold = Some(threshold);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<DmiConfig, ConfigValidationError> {
        let defaults = DmiConfig::default();
        let config = DmiConfig {
            min_categories_for_discretization: self
                .min_categories_for_discretization
                .unwrap_or(defaults.min_categories_for_discretization),
            min_records_in_leaf: self.min_records_in_leaf,
            confidence_factor: self.confidence_factor.unwrap_or(defaults.confidence_factor),
            min_records_for_em: self.min_records_for_em,
            em_max_iterations: self.em_max_iterations,
            em_log_likelihood_threshold: self
                .em_log_likelihood_threshold
                .unwrap_or(defaults.em_log_likelihood_threshold),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DmiConfig::default();
        assert_eq!(config.min_categories_for_discretization, 2);
        assert_eq!(config.min_records_in_leaf, None);
        assert_eq!(config.confidence_factor, 0.25);
        assert_eq!(config.min_records_for_em, None);
        assert_eq!(config.em_max_iterations, None);
        assert_eq!(config.em_log_likelihood_threshold, 1e-4);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = DmiConfig::builder()
            .min_categories_for_discretization(4)
            .min_records_in_leaf(3)
            .min_records_for_em(6)
            .em_max_iterations(50)
            .build()
            .unwrap();

        assert_eq!(config.min_categories_for_discretization, 4);
        assert_eq!(config.min_records_in_leaf, Some(3));
        assert_eq!(config.min_records_for_em, Some(6));
        assert_eq!(config.em_max_iterations, Some(50));
    }

    #[test]
    fn test_resolve_derives_from_numeric_count() {
        let resolved = DmiConfig::default().resolve(3);
        assert_eq!(resolved.min_records_in_leaf, 5);
        assert_eq!(resolved.min_records_for_em, 5);
        assert_eq!(resolved.em_max_iterations, usize::MAX);
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let config = DmiConfig::builder()
            .min_records_in_leaf(7)
            .min_records_for_em(4)
            .em_max_iterations(10)
            .build()
            .unwrap();
        let resolved = config.resolve(3);
        assert_eq!(resolved.min_records_in_leaf, 7);
        assert_eq!(resolved.min_records_for_em, 4);
        assert_eq!(resolved.em_max_iterations, 10);
        // the configuration itself is left alone
        assert_eq!(config.min_records_in_leaf, Some(7));
    }

    #[test]
    fn test_validation_too_few_categories() {
        let result = DmiConfig::builder().min_categories_for_discretization(1).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::TooFewCategories(1)
        ));
    }

    #[test]
    fn test_validation_confidence_factor() {
        assert!(DmiConfig::builder().confidence_factor(0.0).build().is_err());
        assert!(DmiConfig::builder().confidence_factor(0.6).build().is_err());
        assert!(DmiConfig::builder().confidence_factor(0.5).build().is_ok());
    }

    #[test]
    fn test_validation_threshold_and_leaf() {
        assert!(matches!(
            DmiConfig::builder()
                .em_log_likelihood_threshold(f64::NAN)
                .build()
                .unwrap_err(),
            ConfigValidationError::InvalidLogLikelihoodThreshold(_)
        ));
        assert!(matches!(
            DmiConfig::builder().min_records_in_leaf(0).build().unwrap_err(),
            ConfigValidationError::InvalidLeafSize(0)
        ));
    }

    #[test]
    fn test_validation_zero_threshold_needs_iteration_cap() {
        assert!(matches!(
            DmiConfig::builder()
                .em_log_likelihood_threshold(0.0)
                .build()
                .unwrap_err(),
            ConfigValidationError::UnboundedEm
        ));

        let bounded = DmiConfig::builder()
            .em_log_likelihood_threshold(0.0)
            .em_max_iterations(25)
            .build()
            .unwrap();
        assert_eq!(bounded.resolve(2).em_max_iterations, 25);

        let json = r#"{ "em_log_likelihood_threshold": 0.0 }"#;
        let config: DmiConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "min_categories_for_discretization": 3,
            "min_records_for_em": 8,
            "em_max_iterations": null
        }"#;

        let config: DmiConfig = serde_json::from_str(json).expect("partial JSON should load");
        assert_eq!(config.min_categories_for_discretization, 3);
        assert_eq!(config.min_records_for_em, Some(8));
        assert_eq!(config.em_max_iterations, None);
        assert_eq!(config.confidence_factor, 0.25);
    }
}
