//! Cumulative-odds ordinal logistic regression over a fixed label scale.

use crate::model::Estimate;

/// A fitted ordinal logistic regression model.
///
/// Holds L ascending relevance labels, L-1 intercepts (alphas) and K
/// coefficients (betas) matching a fixed feature vector layout. Evaluation
/// is a pure function of the fitted constants and the input features.
#[derive(Debug, Clone)]
pub struct OrdinalLogisticRegression {
    labels: Vec<f64>,
    alphas: Vec<f64>,
    betas: Vec<f64>,
}

impl OrdinalLogisticRegression {
    /// Create a model from fitted constants.
    ///
    /// `labels` must be ascending and one element longer than `alphas`.
    pub fn new(labels: &[f64], alphas: &[f64], betas: &[f64]) -> Self {
        debug_assert_eq!(labels.len(), alphas.len() + 1);
        Self {
            labels: labels.to_vec(),
            alphas: alphas.to_vec(),
            betas: betas.to_vec(),
        }
    }

    /// Evaluate the model for a feature vector of length K.
    ///
    /// Computes cumulative probabilities P(R >= label_t) through the inverse
    /// logit of `alpha_t + sum_k beta_k * feature_k` (with P(R >= label_0)
    /// fixed at 1), converts them to per-label probabilities by successive
    /// differencing, and returns the expectation and variance of the
    /// resulting distribution over the labels.
    pub fn evaluate(&self, features: &[f64]) -> Estimate {
        debug_assert_eq!(features.len(), self.betas.len());

        // probs[l] holds P(R >= label_l) first, then p(label_l) after differencing.
        let mut probs = vec![1.0; self.labels.len()];
        for (l, alpha) in self.alphas.iter().enumerate() {
            let log_odds: f64 = alpha
                + self
                    .betas
                    .iter()
                    .zip(features)
                    .map(|(beta, feature)| beta * feature)
                    .sum::<f64>();
            probs[l + 1] = inverse_logit(log_odds);
        }

        let mut expectation = 0.0;
        let mut variance = 0.0;
        for l in 0..probs.len() {
            if l < probs.len() - 1 {
                probs[l] -= probs[l + 1];
            }
            expectation += probs[l] * self.labels[l];
            variance += probs[l] * self.labels[l] * self.labels[l];
        }
        variance -= expectation * expectation;

        Estimate::new(expectation, variance)
    }
}

fn inverse_logit(x: f64) -> f64 {
    let e = x.exp();
    e / (1.0 + e)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: [f64; 4] = [0.0, 1.0, 2.0, 3.0];
    const ALPHAS: [f64; 3] = [1.5, 0.0, -1.5];

    #[test]
    fn test_expectation_within_label_range() {
        let model = OrdinalLogisticRegression::new(&LABELS, &ALPHAS, &[0.8, -0.3]);
        for features in [[0.0, 0.0], [1.0, 1.0], [-5.0, 3.0], [10.0, -10.0]] {
            let est = model.evaluate(&features);
            assert!(est.expectation >= LABELS[0] && est.expectation <= LABELS[3]);
            assert!(est.variance >= -1e-12);
        }
    }

    #[test]
    fn test_zero_betas_ignore_features() {
        let model = OrdinalLogisticRegression::new(&LABELS, &ALPHAS, &[0.0, 0.0]);
        let a = model.evaluate(&[0.0, 0.0]);
        let b = model.evaluate(&[123.0, -456.0]);
        assert!((a.expectation - b.expectation).abs() < 1e-12);
        assert!((a.variance - b.variance).abs() < 1e-12);
    }

    #[test]
    fn test_probabilities_follow_alphas() {
        // With zero betas the prior comes purely from the alphas: alpha=0
        // maps to cumulative probability 0.5 at that threshold.
        let model = OrdinalLogisticRegression::new(&[0.0, 1.0], &[0.0], &[]);
        let est = model.evaluate(&[]);
        assert!((est.expectation - 0.5).abs() < 1e-12);
        assert!((est.variance - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_strong_positive_shift_moves_expectation_up() {
        let model = OrdinalLogisticRegression::new(&LABELS, &ALPHAS, &[1.0]);
        let low = model.evaluate(&[-10.0]);
        let high = model.evaluate(&[10.0]);
        assert!(high.expectation > low.expectation);
        assert!(high.expectation > 2.9); // saturates near the top label
        assert!(low.expectation < 0.1); // saturates near the bottom label
    }
}
