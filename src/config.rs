//! Evaluation configuration and default constants.
//!
//! All knobs arrive through CLI flags; this module centralizes their
//! defaults and fail-fast validation so commands reject bad values before
//! touching any input file.

use crate::error::{EvalError, Result};

/// Default target average confidence.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;
/// Default target relative effect size.
pub const DEFAULT_RELATIVE_SIZE: f64 = 0.01;
/// Default target absolute effect size.
pub const DEFAULT_ABSOLUTE_SIZE: f64 = 0.01;
/// Default number of fractional digits in output.
pub const DEFAULT_DECIMAL_DIGITS: usize = 4;
/// Default number of batches to select.
pub const DEFAULT_NUMBER_OF_BATCHES: usize = 1;
/// Default number of documents per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Maximum relevance level of the Fine scale (0..100).
pub const DEFAULT_MAX_RELEVANCE: u32 = 100;

/// Validated evaluation settings shared by the commands.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Target average confidence, in (0, 1).
    pub confidence: f64,
    /// Target relative effect size.
    pub size_rel: f64,
    /// Target absolute effect size.
    pub size_abs: f64,
    /// Fractional digits in output tables.
    pub decimal_digits: usize,
    /// Maximum relevance level of the judgment scale.
    pub max_relevance: u32,
    /// Number of batches to select per round.
    pub batch_num: usize,
    /// Number of documents per batch.
    pub batch_size: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            size_rel: DEFAULT_RELATIVE_SIZE,
            size_abs: DEFAULT_ABSOLUTE_SIZE,
            decimal_digits: DEFAULT_DECIMAL_DIGITS,
            max_relevance: DEFAULT_MAX_RELEVANCE,
            batch_num: DEFAULT_NUMBER_OF_BATCHES,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl EvalConfig {
    /// Validate all settings, failing fast on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.confidence <= 0.0 || self.confidence >= 1.0 {
            return Err(EvalError::InvalidConfig(format!(
                "confidence must be in (0, 1), got {}",
                self.confidence
            )));
        }
        if self.size_rel < 0.0 {
            return Err(EvalError::InvalidConfig(format!(
                "relative effect size cannot be negative, got {}",
                self.size_rel
            )));
        }
        if self.size_abs < 0.0 {
            return Err(EvalError::InvalidConfig(format!(
                "absolute effect size cannot be negative, got {}",
                self.size_abs
            )));
        }
        if self.max_relevance < 1 {
            return Err(EvalError::InvalidConfig(
                "the maximum relevance level cannot be less than 1".to_string(),
            ));
        }
        if self.batch_num < 1 {
            return Err(EvalError::InvalidConfig(
                "the number of batches cannot be less than 1".to_string(),
            ));
        }
        if self.batch_size < 1 {
            return Err(EvalError::InvalidConfig(
                "the batch size cannot be less than 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EvalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_confidence_out_of_range() {
        let mut config = EvalConfig::default();
        config.confidence = 1.0;
        assert!(config.validate().is_err());
        config.confidence = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_settings_must_be_positive() {
        let mut config = EvalConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.batch_num = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_relevance_must_be_positive() {
        let mut config = EvalConfig::default();
        config.max_relevance = 0;
        assert!(config.validate().is_err());
    }
}
