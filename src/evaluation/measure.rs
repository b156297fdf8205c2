//! Cumulative-gain effectiveness measure and selection-weight computation.

use crate::error::{EvalError, Result};
use crate::estimation::RelevanceEstimator;
use crate::evaluation::NormalConfidenceEstimator;
use crate::model::{
    AbsoluteEffectivenessEstimate, RelativeEffectivenessEstimate, RelevanceEstimate, Run,
};
use std::collections::{HashMap, HashSet};

/// Pending (query, document) pairs still awaiting judgment, with their
/// current estimates and selection weights.
pub type PendingPool = HashMap<String, HashMap<String, RelevanceEstimate>>;

/// Cumulative-gain style effectiveness measure over a graded relevance
/// scale, normalized by the maximum relevance level.
#[derive(Debug, Clone, Copy)]
pub struct CgMeasure {
    max_relevance: u32,
}

impl CgMeasure {
    /// Create the measure for a judgment scale `0..=max_relevance`.
    pub fn new(max_relevance: u32) -> Result<Self> {
        if max_relevance < 1 {
            return Err(EvalError::InvalidConfig(
                "the maximum relevance level cannot be less than 1".to_string(),
            ));
        }
        Ok(Self { max_relevance })
    }

    /// Estimate a single run's effectiveness: the mean relevance over its
    /// documents, normalized to [0, 1].
    pub fn absolute(
        &self,
        run: &Run,
        estimator: &dyn RelevanceEstimator,
        confidence: &NormalConfidenceEstimator,
    ) -> Result<AbsoluteEffectivenessEstimate> {
        let mut expectation = 0.0;
        let mut variance = 0.0;
        for doc in &run.documents {
            let est = estimator.estimate(&run.query, doc)?;
            expectation += est.expectation;
            variance += est.variance;
        }
        let n = run.documents.len() as f64;
        let max = f64::from(self.max_relevance);
        expectation /= n * max;
        variance /= n * n * max * max;

        let estimate = crate::model::Estimate::new(expectation, variance);
        Ok(AbsoluteEffectivenessEstimate {
            system: run.system.clone(),
            query: run.query.clone(),
            expectation,
            variance,
            interval: confidence.interval(&estimate),
            confidence: confidence.absolute_confidence(&estimate),
        })
    }

    /// Estimate the effectiveness difference between two runs for the same
    /// query: the paired mean difference, normalized to [-1, 1].
    ///
    /// Documents retrieved by both runs contribute the same random
    /// relevance to both sides, so their variance is subtracted rather
    /// than added.
    pub fn relative(
        &self,
        run_a: &Run,
        run_b: &Run,
        estimator: &dyn RelevanceEstimator,
        confidence: &NormalConfidenceEstimator,
    ) -> Result<RelativeEffectivenessEstimate> {
        let mut expectation = 0.0;
        let mut variance = 0.0;

        let mut in_run_a: HashSet<&str> = HashSet::new();
        for doc in &run_a.documents {
            let est = estimator.estimate(&run_a.query, doc)?;
            expectation += est.expectation;
            variance += est.variance;
            in_run_a.insert(doc);
        }
        for doc in &run_b.documents {
            let est = estimator.estimate(&run_b.query, doc)?;
            expectation -= est.expectation;
            if in_run_a.contains(doc.as_str()) {
                variance -= est.variance;
            } else {
                variance += est.variance;
            }
        }

        let n = in_run_a.len() as f64;
        let max = f64::from(self.max_relevance);
        expectation /= n * max;
        variance /= n * n * max * max;

        let estimate = crate::model::Estimate::new(expectation, variance);
        Ok(RelativeEffectivenessEstimate {
            system_a: run_a.system.clone(),
            system_b: run_b.system.clone(),
            query: run_a.query.clone(),
            expectation,
            variance,
            interval: confidence.interval(&estimate),
            confidence: confidence.relative_confidence(&estimate),
        })
    }
}

/// Selection weights when targeting relative effectiveness.
///
/// A document's weight is the number of system pairs whose relative
/// estimate is actually sensitive to its relevance: pairs within the
/// retrieving systems cancel it out, and pairs within the non-retrieving
/// systems never see it.
pub fn compute_relative_weights(
    pending: &mut PendingPool,
    retrieving_systems: &HashMap<String, HashMap<String, HashSet<String>>>,
    n_systems: usize,
) {
    let total_pairs = pairs(n_systems);
    for (query, docs) in pending.iter_mut() {
        for (doc, estimate) in docs.iter_mut() {
            let retrieving = retrieving_systems
                .get(query)
                .and_then(|d| d.get(doc))
                .map_or(0, |systems| systems.len());
            let weight =
                total_pairs - pairs(retrieving) - pairs(n_systems - retrieving);
            estimate.weight = weight as f64;
        }
    }
}

/// Selection weights when targeting absolute effectiveness.
///
/// A document's weight is the summed per-query aggregate variance of the
/// systems that retrieved it: documents touching high-uncertainty systems
/// are preferred.
pub fn compute_absolute_weights(
    pending: &mut PendingPool,
    retrieving_systems: &HashMap<String, HashMap<String, HashSet<String>>>,
    system_query_variance: &HashMap<(String, String), f64>,
) {
    for (query, docs) in pending.iter_mut() {
        for (doc, estimate) in docs.iter_mut() {
            let mut weight = 0.0;
            if let Some(systems) = retrieving_systems.get(query).and_then(|d| d.get(doc)) {
                for system in systems {
                    if let Some(var) =
                        system_query_variance.get(&(system.clone(), query.clone()))
                    {
                        weight += var;
                    }
                }
            }
            estimate.weight = weight;
        }
    }
}

fn pairs(n: usize) -> usize {
    n * (n.saturating_sub(1)) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::UniformEstimator;
    use crate::model::RelevanceEstimate;

    fn confidence() -> NormalConfidenceEstimator {
        NormalConfidenceEstimator::new(0.95, 0.01, 0.01).unwrap()
    }

    #[test]
    fn test_absolute_uniform_normalization() {
        let measure = CgMeasure::new(100).unwrap();
        let estimator = UniformEstimator::new(100).unwrap();
        let run = Run::new("s1", "q1", vec!["d1".into(), "d2".into()]);

        let abs = measure.absolute(&run, &estimator, &confidence()).unwrap();
        assert!((abs.expectation - 0.5).abs() < 1e-12);
        // Var = 2 * 850 / (2^2 * 100^2).
        assert!((abs.variance - 0.0425).abs() < 1e-12);
        assert!(abs.interval.0 < abs.expectation && abs.expectation < abs.interval.1);
    }

    #[test]
    fn test_relative_identical_runs_collapse_to_zero() {
        let measure = CgMeasure::new(100).unwrap();
        let estimator = UniformEstimator::new(100).unwrap();
        let run_a = Run::new("s1", "q1", vec!["d1".into(), "d2".into()]);
        let run_b = Run::new("s2", "q1", vec!["d1".into(), "d2".into()]);

        let rel = measure
            .relative(&run_a, &run_b, &estimator, &confidence())
            .unwrap();
        assert_eq!(rel.expectation, 0.0);
        assert_eq!(rel.variance, 0.0);
    }

    #[test]
    fn test_relative_antisymmetry() {
        let measure = CgMeasure::new(100).unwrap();
        let confidence = confidence();

        let mut store = crate::estimation::RelevanceEstimateStore::default();
        store.insert(RelevanceEstimate::new("q1", "d1", 80.0, 10.0));
        store.insert(RelevanceEstimate::new("q1", "d2", 20.0, 30.0));
        store.insert(RelevanceEstimate::new("q1", "d3", 50.0, 20.0));

        let run_a = Run::new("s1", "q1", vec!["d1".into(), "d2".into()]);
        let run_b = Run::new("s2", "q1", vec!["d2".into(), "d3".into()]);

        let ab = measure.relative(&run_a, &run_b, &store, &confidence).unwrap();
        let ba = measure.relative(&run_b, &run_a, &store, &confidence).unwrap();

        assert!((ab.expectation + ba.expectation).abs() < 1e-12);
        assert!((ab.variance - ba.variance).abs() < 1e-12);
        // Shared d2 cancels: only d1 and d3 contribute variance.
        assert!((ab.variance - (10.0 + 20.0) / (4.0 * 10000.0)).abs() < 1e-12);
        // (80 + 20 - 20 - 50) / (2 * 100).
        assert!((ab.expectation - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_relative_weights_for_three_systems() {
        let mut retrieving: HashMap<String, HashMap<String, HashSet<String>>> = HashMap::new();
        let q = retrieving.entry("q1".to_string()).or_default();
        q.insert("one".to_string(), HashSet::from(["s1".to_string()]));
        q.insert(
            "all".to_string(),
            HashSet::from(["s1".to_string(), "s2".to_string(), "s3".to_string()]),
        );

        let mut pending: PendingPool = HashMap::new();
        let docs = pending.entry("q1".to_string()).or_default();
        for doc in ["one", "all", "none"] {
            docs.insert(
                doc.to_string(),
                RelevanceEstimate::new("q1", doc, 50.0, 850.0),
            );
        }

        compute_relative_weights(&mut pending, &retrieving, 3);
        let docs = pending.get("q1").unwrap();
        assert_eq!(docs.get("one").unwrap().weight, 2.0); // 3 - 0 - 1
        assert_eq!(docs.get("all").unwrap().weight, 0.0); // 3 - 3 - 0
        assert_eq!(docs.get("none").unwrap().weight, 0.0); // 3 - 0 - 3
    }

    #[test]
    fn test_absolute_weights_sum_system_variance() {
        let mut retrieving: HashMap<String, HashMap<String, HashSet<String>>> = HashMap::new();
        let q = retrieving.entry("q1".to_string()).or_default();
        q.insert(
            "d1".to_string(),
            HashSet::from(["s1".to_string(), "s2".to_string()]),
        );
        q.insert("d2".to_string(), HashSet::from(["s2".to_string()]));

        let mut variances = HashMap::new();
        variances.insert(("s1".to_string(), "q1".to_string()), 0.04);
        variances.insert(("s2".to_string(), "q1".to_string()), 0.01);

        let mut pending: PendingPool = HashMap::new();
        let docs = pending.entry("q1".to_string()).or_default();
        docs.insert(
            "d1".to_string(),
            RelevanceEstimate::new("q1", "d1", 50.0, 850.0),
        );
        docs.insert(
            "d2".to_string(),
            RelevanceEstimate::new("q1", "d2", 50.0, 850.0),
        );

        compute_absolute_weights(&mut pending, &retrieving, &variances);
        let docs = pending.get("q1").unwrap();
        assert!((docs.get("d1").unwrap().weight - 0.05).abs() < 1e-12);
        assert!((docs.get("d2").unwrap().weight - 0.01).abs() < 1e-12);
    }
}
