//! Grouping and aggregation of per-query effectiveness into per-system and
//! per-system-pair results.

use crate::error::Result;
use crate::estimation::RelevanceEstimator;
use crate::evaluation::measure::CgMeasure;
use crate::evaluation::NormalConfidenceEstimator;
use crate::model::{
    AbsoluteEffectivenessEstimate, Estimate, RelativeEffectivenessEstimate, Run, AGGREGATE_QUERY,
};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// Runs indexed by system, then query.
pub type SystemQueryRuns<'a> = HashMap<&'a str, HashMap<&'a str, &'a Run>>;

/// Group runs by system then query.
pub fn group_runs(runs: &[Run]) -> SystemQueryRuns<'_> {
    let mut grouped: SystemQueryRuns = HashMap::new();
    for run in runs {
        grouped
            .entry(&run.system)
            .or_default()
            .insert(&run.query, run);
    }
    grouped
}

/// For each (query, document) pair, the set of systems that retrieved it.
pub fn query_doc_systems(runs: &[Run]) -> HashMap<String, HashMap<String, HashSet<String>>> {
    let mut map: HashMap<String, HashMap<String, HashSet<String>>> = HashMap::new();
    for run in runs {
        let docs = map.entry(run.query.clone()).or_default();
        for doc in &run.documents {
            docs.entry(doc.clone())
                .or_default()
                .insert(run.system.clone());
        }
    }
    map
}

/// Compute per-system, per-query absolute effectiveness estimates.
pub fn system_query_absolutes(
    sq_runs: &SystemQueryRuns<'_>,
    measure: CgMeasure,
    estimator: &dyn RelevanceEstimator,
    confidence: &NormalConfidenceEstimator,
) -> Result<HashMap<String, Vec<AbsoluteEffectivenessEstimate>>> {
    let mut results: HashMap<String, Vec<AbsoluteEffectivenessEstimate>> = HashMap::new();
    for (&system, queries) in sq_runs {
        let mut estimates = Vec::with_capacity(queries.len());
        for run in queries.values() {
            estimates.push(measure.absolute(run, estimator, confidence)?);
        }
        results.insert(system.to_string(), estimates);
    }
    Ok(results)
}

/// Per-(system, query) aggregate variance, used by the absolute-target
/// selection weights.
pub fn system_query_variances(
    absolutes: &HashMap<String, Vec<AbsoluteEffectivenessEstimate>>,
) -> HashMap<(String, String), f64> {
    let mut variances = HashMap::new();
    for (system, estimates) in absolutes {
        for est in estimates {
            variances.insert((system.clone(), est.query.clone()), est.variance);
        }
    }
    variances
}

/// Average each system's per-query absolutes into one `[all]` estimate per
/// system, sorted descending by mean expectation.
pub fn sorted_mean_absolutes(
    absolutes: &HashMap<String, Vec<AbsoluteEffectivenessEstimate>>,
    confidence: &NormalConfidenceEstimator,
) -> Vec<AbsoluteEffectivenessEstimate> {
    let mut means: Vec<AbsoluteEffectivenessEstimate> = absolutes
        .iter()
        .map(|(system, estimates)| {
            let n = estimates.len() as f64;
            let expectation = estimates.iter().map(|e| e.expectation).sum::<f64>() / n;
            let variance = estimates.iter().map(|e| e.variance).sum::<f64>() / (n * n);
            let estimate = Estimate::new(expectation, variance);
            AbsoluteEffectivenessEstimate {
                system: system.clone(),
                query: AGGREGATE_QUERY.to_string(),
                expectation,
                variance,
                interval: confidence.interval(&estimate),
                confidence: confidence.absolute_confidence(&estimate),
            }
        })
        .collect();

    means.sort_by(|a, b| {
        b.expectation
            .total_cmp(&a.expectation)
            .then_with(|| a.system.cmp(&b.system))
    });
    means
}

/// Compute per-query relative effectiveness for every system pair (i < j
/// over the sorted system names; pairing is exhaustive, not limited to
/// adjacent ranks).
///
/// Pair comparisons are independent, so they run on the rayon pool; each
/// worker owns its pair's results and the map is assembled after the
/// parallel region.
pub fn system_pair_relatives(
    sq_runs: &SystemQueryRuns<'_>,
    measure: CgMeasure,
    estimator: &dyn RelevanceEstimator,
    confidence: &NormalConfidenceEstimator,
) -> Result<HashMap<(String, String), Vec<RelativeEffectivenessEstimate>>> {
    let mut systems: Vec<&str> = sq_runs.keys().copied().collect();
    systems.sort_unstable();

    let mut pairs = Vec::new();
    for (i, &a) in systems.iter().enumerate() {
        for &b in &systems[i + 1..] {
            pairs.push((a, b));
        }
    }

    let results: Vec<((String, String), Vec<RelativeEffectivenessEstimate>)> = pairs
        .par_iter()
        .map(|&(a, b)| {
            let queries_a = &sq_runs[a];
            let queries_b = &sq_runs[b];
            let mut estimates = Vec::with_capacity(queries_a.len());
            for (&query, &run_a) in queries_a {
                if let Some(&run_b) = queries_b.get(query) {
                    estimates.push(measure.relative(run_a, run_b, estimator, confidence)?);
                }
            }
            Ok(((a.to_string(), b.to_string()), estimates))
        })
        .collect::<Result<_>>()?;

    Ok(results.into_iter().collect())
}

/// Average each pair's per-query relatives into one `[all]` estimate,
/// normalize the sign so system A is (weakly) better, and order the table:
/// group by system A, sort each group ascending by expectation, then
/// concatenate groups by descending size.
pub fn sorted_mean_relatives(
    relatives: &HashMap<(String, String), Vec<RelativeEffectivenessEstimate>>,
    confidence: &NormalConfidenceEstimator,
) -> Vec<RelativeEffectivenessEstimate> {
    let mut groups: HashMap<String, Vec<RelativeEffectivenessEstimate>> = HashMap::new();
    for ((system_a, system_b), estimates) in relatives {
        let n = estimates.len() as f64;
        let mut expectation = estimates.iter().map(|e| e.expectation).sum::<f64>() / n;
        let variance = estimates.iter().map(|e| e.variance).sum::<f64>() / (n * n);

        // Normalize sign: a negative difference swaps the pair.
        let (first, second) = if expectation < 0.0 {
            expectation = -expectation;
            (system_b.clone(), system_a.clone())
        } else {
            (system_a.clone(), system_b.clone())
        };

        let estimate = Estimate::new(expectation, variance);
        groups
            .entry(first.clone())
            .or_default()
            .push(RelativeEffectivenessEstimate {
                system_a: first,
                system_b: second,
                query: AGGREGATE_QUERY.to_string(),
                expectation,
                variance,
                interval: confidence.interval(&estimate),
                confidence: confidence.relative_confidence(&estimate),
            });
    }

    let mut ordered_groups: Vec<Vec<RelativeEffectivenessEstimate>> =
        groups.into_values().collect();
    for group in &mut ordered_groups {
        group.sort_by(|a, b| {
            a.expectation
                .total_cmp(&b.expectation)
                .then_with(|| a.system_b.cmp(&b.system_b))
        });
    }
    ordered_groups.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a[0].system_a.cmp(&b[0].system_a))
    });

    ordered_groups.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::UniformEstimator;

    fn confidence() -> NormalConfidenceEstimator {
        NormalConfidenceEstimator::new(0.95, 0.01, 0.01).unwrap()
    }

    fn overlapping_runs() -> Vec<Run> {
        vec![
            Run::new("s1", "q1", vec!["d1".into(), "d2".into()]),
            Run::new("s2", "q1", vec!["d1".into(), "d2".into()]),
        ]
    }

    #[test]
    fn test_group_runs() {
        let runs = overlapping_runs();
        let grouped = group_runs(&runs);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["s1"]["q1"].documents.len(), 2);
    }

    #[test]
    fn test_query_doc_systems() {
        let runs = vec![
            Run::new("s1", "q1", vec!["d1".into(), "d2".into()]),
            Run::new("s2", "q1", vec!["d2".into(), "d3".into()]),
        ];
        let map = query_doc_systems(&runs);
        assert_eq!(map["q1"]["d1"].len(), 1);
        assert_eq!(map["q1"]["d2"].len(), 2);
    }

    #[test]
    fn test_fully_overlapping_systems_tie_at_half() {
        // Two systems, one query, identical document sets, uniform
        // estimator on the Fine scale.
        let runs = overlapping_runs();
        let grouped = group_runs(&runs);
        let measure = CgMeasure::new(100).unwrap();
        let estimator = UniformEstimator::new(100).unwrap();
        let confidence = confidence();

        let absolutes =
            system_query_absolutes(&grouped, measure, &estimator, &confidence).unwrap();
        let sorted_abs = sorted_mean_absolutes(&absolutes, &confidence);
        assert_eq!(sorted_abs.len(), 2);
        for abs in &sorted_abs {
            assert!((abs.expectation - 0.5).abs() < 1e-12);
            assert_eq!(abs.query, AGGREGATE_QUERY);
            let mid = (abs.interval.0 + abs.interval.1) / 2.0;
            assert!((mid - 0.5).abs() < 1e-9);
        }

        let relatives =
            system_pair_relatives(&grouped, measure, &estimator, &confidence).unwrap();
        let sorted_rel = sorted_mean_relatives(&relatives, &confidence);
        assert_eq!(sorted_rel.len(), 1);
        assert_eq!(sorted_rel[0].expectation, 0.0);
        assert_eq!(sorted_rel[0].variance, 0.0);
    }

    #[test]
    fn test_pairing_is_exhaustive() {
        let runs = vec![
            Run::new("s1", "q1", vec!["d1".into()]),
            Run::new("s2", "q1", vec!["d2".into()]),
            Run::new("s3", "q1", vec!["d3".into()]),
        ];
        let grouped = group_runs(&runs);
        let measure = CgMeasure::new(100).unwrap();
        let estimator = UniformEstimator::new(100).unwrap();
        let confidence = confidence();

        let relatives =
            system_pair_relatives(&grouped, measure, &estimator, &confidence).unwrap();
        // 3 systems -> 3 pairs.
        assert_eq!(relatives.len(), 3);
        assert!(relatives.contains_key(&("s1".to_string(), "s3".to_string())));
    }

    #[test]
    fn test_sign_normalization_keeps_expectation_non_negative() {
        let mut store = crate::estimation::RelevanceEstimateStore::default();
        store.insert(crate::model::RelevanceEstimate::new("q1", "d1", 10.0, 0.0));
        store.insert(crate::model::RelevanceEstimate::new("q1", "d2", 90.0, 0.0));

        let runs = vec![
            Run::new("s1", "q1", vec!["d1".into()]),
            Run::new("s2", "q1", vec!["d2".into()]),
        ];
        let grouped = group_runs(&runs);
        let measure = CgMeasure::new(100).unwrap();
        let confidence = confidence();

        let relatives = system_pair_relatives(&grouped, measure, &store, &confidence).unwrap();
        let sorted = sorted_mean_relatives(&relatives, &confidence);
        assert_eq!(sorted.len(), 1);
        // s2 beats s1, so the pair is flipped.
        assert_eq!(sorted[0].system_a, "s2");
        assert_eq!(sorted[0].system_b, "s1");
        assert!((sorted[0].expectation - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_sorted_mean_absolutes_order() {
        let mut store = crate::estimation::RelevanceEstimateStore::default();
        store.insert(crate::model::RelevanceEstimate::new("q1", "d1", 10.0, 0.0));
        store.insert(crate::model::RelevanceEstimate::new("q1", "d2", 90.0, 0.0));

        let runs = vec![
            Run::new("low", "q1", vec!["d1".into()]),
            Run::new("high", "q1", vec!["d2".into()]),
        ];
        let grouped = group_runs(&runs);
        let measure = CgMeasure::new(100).unwrap();
        let confidence = confidence();

        let absolutes = system_query_absolutes(&grouped, measure, &store, &confidence).unwrap();
        let sorted = sorted_mean_absolutes(&absolutes, &confidence);
        assert_eq!(sorted[0].system, "high");
        assert_eq!(sorted[1].system, "low");
    }
}
