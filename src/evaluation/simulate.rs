//! The iterative estimate-evaluate-judge loop, driven against an oracle of
//! known judgments.

use crate::config::EvalConfig;
use crate::error::Result;
use crate::estimation::RelevanceEstimator;
use crate::evaluation::{
    compute_absolute_weights, compute_relative_weights, group_runs, query_doc_systems,
    select_batches, sorted_mean_absolutes, sorted_mean_relatives, system_pair_relatives,
    system_query_absolutes, system_query_variances, CgMeasure, EvaluationTarget,
    NormalConfidenceEstimator, PendingPool,
};
use crate::model::{RelevanceEstimate, Run};
use std::collections::HashSet;

/// Progress notification emitted while the simulation runs.
#[derive(Debug)]
pub enum SimulationEvent<'a> {
    /// One evaluation round finished, with the mean confidence so far.
    Iteration {
        iteration: usize,
        confidence: f64,
        judged: usize,
    },
    /// A batch was judged against the oracle.
    Batch {
        query: &'a str,
        documents: &'a [String],
    },
}

/// Where the simulation stopped.
#[derive(Debug, Clone, Copy)]
pub struct SimulationOutcome {
    /// Number of evaluation rounds run, including the final one.
    pub iterations: usize,
    /// Total documents judged.
    pub judged: usize,
    /// Mean confidence at termination.
    pub confidence: f64,
}

/// All pooled pairs not yet judged, with their current estimates.
pub fn pending_pool(
    runs: &[Run],
    judged: &[RelevanceEstimate],
    estimator: &dyn RelevanceEstimator,
) -> Result<PendingPool> {
    let judged_keys: HashSet<(String, String)> =
        judged.iter().map(RelevanceEstimate::key).collect();

    let mut pending = PendingPool::new();
    for (query, docs) in query_doc_systems(runs) {
        for doc in docs.keys() {
            if judged_keys.contains(&(query.clone(), doc.clone())) {
                continue;
            }
            let estimate = estimator.estimate(&query, doc)?;
            pending.entry(query.clone()).or_default().insert(doc.clone(), estimate);
        }
    }
    Ok(pending)
}

/// Mean of a confidence series; an empty series (nothing left to compare)
/// counts as full confidence.
pub fn mean_confidence(confidences: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = confidences.fold((0.0, 0usize), |(s, c), conf| (s + conf, c + 1));
    if count == 0 {
        1.0
    } else {
        sum / count as f64
    }
}

/// Run the judge-and-reestimate loop until the mean confidence reaches the
/// target, the pending pool is exhausted, or no batch can be formed.
///
/// Each round evaluates the current estimates, reports progress through
/// `observer`, selects the highest-weight batches, judges them against the
/// oracle, and re-estimates the remaining pool so dynamic estimators can
/// shift with the new judgments.
pub fn run_simulation(
    runs: &[Run],
    estimator: &mut dyn RelevanceEstimator,
    oracle: &dyn RelevanceEstimator,
    config: &EvalConfig,
    target: EvaluationTarget,
    mut observer: impl FnMut(SimulationEvent<'_>),
) -> Result<SimulationOutcome> {
    let measure = CgMeasure::new(config.max_relevance)?;
    let conf =
        NormalConfidenceEstimator::new(config.confidence, config.size_rel, config.size_abs)?;
    let grouped = group_runs(runs);
    let retrieving = query_doc_systems(runs);
    let mut pending = pending_pool(runs, &[], &*estimator)?;

    let mut iteration = 1usize;
    let mut judged_count = 0usize;
    loop {
        let mean = match target {
            EvaluationTarget::Relative => {
                let relatives = system_pair_relatives(&grouped, measure, &*estimator, &conf)?;
                let sorted = sorted_mean_relatives(&relatives, &conf);
                let mean = mean_confidence(sorted.iter().map(|r| r.confidence));
                if mean < config.confidence {
                    compute_relative_weights(&mut pending, &retrieving, grouped.len());
                }
                mean
            }
            EvaluationTarget::Absolute => {
                let absolutes = system_query_absolutes(&grouped, measure, &*estimator, &conf)?;
                let sorted = sorted_mean_absolutes(&absolutes, &conf);
                let mean = mean_confidence(sorted.iter().map(|a| a.confidence));
                if mean < config.confidence {
                    let variances = system_query_variances(&absolutes);
                    compute_absolute_weights(&mut pending, &retrieving, &variances);
                }
                mean
            }
        };

        observer(SimulationEvent::Iteration {
            iteration,
            confidence: mean,
            judged: judged_count,
        });
        if mean >= config.confidence || pending.is_empty() {
            return Ok(SimulationOutcome {
                iterations: iteration,
                judged: judged_count,
                confidence: mean,
            });
        }

        let batches = select_batches(&pending, config.batch_num, config.batch_size);
        if batches.is_empty() {
            // Every remaining pair has zero selection weight; judging more
            // cannot move the target comparison.
            return Ok(SimulationOutcome {
                iterations: iteration,
                judged: judged_count,
                confidence: mean,
            });
        }
        for batch in &batches {
            observer(SimulationEvent::Batch {
                query: &batch.query,
                documents: &batch.documents,
            });
            for doc in &batch.documents {
                let judgment = oracle.estimate(&batch.query, doc)?;
                estimator.update(&judgment);
                judged_count += 1;
                let emptied = if let Some(docs) = pending.get_mut(&batch.query) {
                    docs.remove(doc);
                    docs.is_empty()
                } else {
                    false
                };
                if emptied {
                    pending.remove(&batch.query);
                }
            }
        }

        // Dynamic estimators shift with the new judgments, so the whole
        // pending pool is re-estimated.
        for (query, docs) in pending.iter_mut() {
            for (doc, estimate) in docs.iter_mut() {
                *estimate = estimator.estimate(query, doc)?;
            }
        }

        iteration += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::{EstimatorKind, EstimatorWrapper, RelevanceEstimateStore};

    fn disjoint_runs() -> Vec<Run> {
        vec![
            Run::new("s1", "q1", vec!["d1".into()]),
            Run::new("s2", "q1", vec!["d2".into()]),
        ]
    }

    fn config(confidence: f64) -> EvalConfig {
        EvalConfig {
            confidence,
            ..EvalConfig::default()
        }
    }

    #[test]
    fn test_loop_ends_when_pool_is_exhausted() {
        let runs = disjoint_runs();
        // Noisy oracle judgments: even fully judged, the difference stays
        // far from certain.
        let oracle = RelevanceEstimateStore::new(vec![
            RelevanceEstimate::new("q1", "d1", 55.0, 900.0),
            RelevanceEstimate::new("q1", "d2", 45.0, 900.0),
        ]);
        let mut estimator = EstimatorWrapper::new(&EstimatorKind::Uniform, &runs, &[]).unwrap();

        let mut batch_events = 0usize;
        let outcome = run_simulation(
            &runs,
            &mut estimator,
            &oracle,
            &config(0.95),
            EvaluationTarget::Relative,
            |event| {
                if matches!(event, SimulationEvent::Batch { .. }) {
                    batch_events += 1;
                }
            },
        )
        .unwrap();

        // Every pooled pair was judged, yet the target was never reached.
        assert_eq!(outcome.judged, 2);
        assert!(outcome.confidence < 0.95);
        assert_eq!(outcome.iterations, 2);
        assert!(batch_events >= 1);
    }

    #[test]
    fn test_loop_ends_when_target_confidence_is_met() {
        let runs = disjoint_runs();
        let oracle = RelevanceEstimateStore::new(vec![
            RelevanceEstimate::new("q1", "d1", 55.0, 900.0),
            RelevanceEstimate::new("q1", "d2", 45.0, 900.0),
        ]);
        let mut estimator = EstimatorWrapper::new(&EstimatorKind::Uniform, &runs, &[]).unwrap();

        // Under the uniform prior the zero-difference confidence is ~0.49,
        // already past a 0.4 target: nothing should be judged.
        let outcome = run_simulation(
            &runs,
            &mut estimator,
            &oracle,
            &config(0.4),
            EvaluationTarget::Relative,
            |_| {},
        )
        .unwrap();

        assert_eq!(outcome.judged, 0);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.confidence >= 0.4);
    }

    #[test]
    fn test_judgments_flow_into_the_estimator() {
        let runs = disjoint_runs();
        let oracle = RelevanceEstimateStore::new(vec![
            RelevanceEstimate::new("q1", "d1", 90.0, 0.0),
            RelevanceEstimate::new("q1", "d2", 10.0, 0.0),
        ]);
        let mut estimator = EstimatorWrapper::new(&EstimatorKind::Uniform, &runs, &[]).unwrap();

        run_simulation(
            &runs,
            &mut estimator,
            &oracle,
            &config(0.95),
            EvaluationTarget::Relative,
            |_| {},
        )
        .unwrap();

        // The oracle's exact judgments override the prior afterwards.
        assert_eq!(estimator.estimate("q1", "d1").unwrap().expectation, 90.0);
        assert_eq!(estimator.judged_count(), 2);
    }

    #[test]
    fn test_pending_pool_excludes_judged_pairs() {
        let runs = disjoint_runs();
        let judged = vec![RelevanceEstimate::new("q1", "d1", 80.0, 0.0)];
        let estimator = EstimatorWrapper::new(&EstimatorKind::Uniform, &runs, &judged).unwrap();

        let pending = pending_pool(&runs, &judged, &estimator).unwrap();
        let docs = pending.get("q1").unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs.contains_key("d2"));
    }

    #[test]
    fn test_mean_confidence_of_empty_series_is_full() {
        assert_eq!(mean_confidence(std::iter::empty()), 1.0);
        assert!((mean_confidence([0.2, 0.4].into_iter()) - 0.3).abs() < 1e-12);
    }
}
