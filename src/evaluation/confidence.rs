//! Normal-approximation confidence intervals and confidence levels.

use crate::error::{EvalError, Result};
use crate::model::Estimate;

/// Converts (expectation, variance) beliefs into confidence intervals and
/// confidence levels against target effect sizes, under a Normal
/// approximation.
#[derive(Debug, Clone)]
pub struct NormalConfidenceEstimator {
    confidence: f64,
    size_rel: f64,
    size_abs: f64,
}

impl NormalConfidenceEstimator {
    /// Create an estimator for a target confidence level in (0, 1) and the
    /// target relative/absolute effect sizes.
    pub fn new(confidence: f64, size_rel: f64, size_abs: f64) -> Result<Self> {
        if confidence <= 0.0 || confidence >= 1.0 {
            return Err(EvalError::InvalidConfig(format!(
                "confidence must be in (0, 1), got {confidence}"
            )));
        }
        Ok(Self {
            confidence,
            size_rel,
            size_abs,
        })
    }

    /// Two-sided confidence interval `expectation +/- z * sqrt(variance)`.
    pub fn interval(&self, estimate: &Estimate) -> (f64, f64) {
        let z = normal_quantile((1.0 - self.confidence) / 2.0);
        let half_width = (z * estimate.variance.sqrt()).abs();
        (
            estimate.expectation - half_width,
            estimate.expectation + half_width,
        )
    }

    /// One-sided probability that the true relative difference exceeds the
    /// target relative effect size.
    pub fn relative_confidence(&self, estimate: &Estimate) -> f64 {
        normal_cdf((estimate.expectation - self.size_rel) / estimate.variance.sqrt())
    }

    /// Two-sided probability that the true absolute value differs from zero
    /// by at least the target absolute effect size.
    pub fn absolute_confidence(&self, estimate: &Estimate) -> f64 {
        1.0 - 2.0 * normal_cdf(-self.size_abs / estimate.variance.sqrt())
    }
}

/// Standard Normal CDF via the Abramowitz-Stegun 7.1.26 rational
/// approximation (absolute error below ~1e-7). The evaluation thresholds
/// were validated against this approximation; replacing it with an exact
/// erf requires revalidating the tests.
fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / 2.0f64.sqrt();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Standard Normal quantile via the Abramowitz-Stegun 26.2.23 rational
/// approximation (absolute error below 4.5e-4). `p` must be in (0, 1).
fn normal_quantile(p: f64) -> f64 {
    debug_assert!(p > 0.0 && p < 1.0);
    if p < 0.5 {
        -quantile_tail((-2.0 * p.ln()).sqrt())
    } else {
        quantile_tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

fn quantile_tail(t: f64) -> f64 {
    const C: [f64; 3] = [2.515517, 0.802853, 0.010328];
    const D: [f64; 3] = [1.432788, 0.189269, 0.001308];
    t - ((C[2] * t + C[1]) * t + C[0]) / (((D[2] * t + D[1]) * t + D[0]) * t + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdf_reference_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.9750021).abs() < 1e-6);
        assert!((normal_cdf(-1.96) - 0.0249979).abs() < 1e-6);
        assert!(normal_cdf(8.0) > 1.0 - 1e-7);
        assert!(normal_cdf(-8.0) < 1e-7);
    }

    #[test]
    fn test_quantile_reference_values() {
        assert!((normal_quantile(0.975) - 1.959964).abs() < 4.5e-4);
        assert!((normal_quantile(0.025) + 1.959964).abs() < 4.5e-4);
        assert!((normal_quantile(0.5)).abs() < 4.5e-4);
    }

    #[test]
    fn test_interval_is_symmetric_and_grows_with_variance() {
        let estimator = NormalConfidenceEstimator::new(0.95, 0.01, 0.01).unwrap();

        let narrow = estimator.interval(&Estimate::new(0.4, 0.01));
        let wide = estimator.interval(&Estimate::new(0.4, 0.04));

        assert!(((narrow.0 + narrow.1) / 2.0 - 0.4).abs() < 1e-12);
        assert!(wide.1 - wide.0 > narrow.1 - narrow.0);

        // Zero variance collapses the interval onto the expectation.
        let point = estimator.interval(&Estimate::new(0.4, 0.0));
        assert_eq!(point, (0.4, 0.4));
    }

    #[test]
    fn test_absolute_confidence_limits() {
        let estimator = NormalConfidenceEstimator::new(0.95, 0.01, 0.1).unwrap();

        // Vanishing variance: certain the effect exceeds the target size.
        let certain = estimator.absolute_confidence(&Estimate::new(0.5, 1e-300));
        assert!(certain > 1.0 - 1e-9);

        // Exploding variance: no confidence at all.
        let unsure = estimator.absolute_confidence(&Estimate::new(0.5, 1e300));
        assert!(unsure < 1e-6);
    }

    #[test]
    fn test_relative_confidence_tracks_expectation() {
        let estimator = NormalConfidenceEstimator::new(0.95, 0.1, 0.01).unwrap();

        let above = estimator.relative_confidence(&Estimate::new(0.5, 0.01));
        let at = estimator.relative_confidence(&Estimate::new(0.1, 0.01));
        let below = estimator.relative_confidence(&Estimate::new(-0.3, 0.01));

        assert!(above > 0.99);
        assert!((at - 0.5).abs() < 1e-7);
        assert!(below < 0.01);
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        assert!(NormalConfidenceEstimator::new(0.0, 0.01, 0.01).is_err());
        assert!(NormalConfidenceEstimator::new(1.0, 0.01, 0.01).is_err());
    }
}
