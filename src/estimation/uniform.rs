//! Uniform relevance estimator: the model-free prior.

use crate::error::{EvalError, Result};
use crate::estimation::RelevanceEstimator;
use crate::model::RelevanceEstimate;

/// Estimator that assumes relevance is uniformly distributed over the
/// judgment scale `0..=max_relevance`, regardless of the pair.
#[derive(Debug, Clone)]
pub struct UniformEstimator {
    max_relevance: u32,
}

impl UniformEstimator {
    /// Create a uniform estimator over `0..=max_relevance`.
    pub fn new(max_relevance: u32) -> Result<Self> {
        if max_relevance < 1 {
            return Err(EvalError::InvalidConfig(
                "the maximum relevance level cannot be less than 1".to_string(),
            ));
        }
        Ok(Self { max_relevance })
    }
}

impl RelevanceEstimator for UniformEstimator {
    fn estimate(&self, query: &str, document: &str) -> Result<RelevanceEstimate> {
        let max = f64::from(self.max_relevance);
        // Mean and variance of a discrete uniform distribution over 0..=max.
        let expectation = max / 2.0;
        let variance = ((max + 1.0).powi(2) - 1.0) / 12.0;
        Ok(RelevanceEstimate::new(query, document, expectation, variance))
    }

    fn update(&mut self, _judgment: &RelevanceEstimate) {
        // Nothing to do: the uniform prior ignores judgments.
    }
}
