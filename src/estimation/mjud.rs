//! Mjud: relevance model fitted on system outputs, metadata and the
//! judgments known so far.
//!
//! The aSYS/aART features are derived from incoming judgments and cached
//! behind a dirty flag: updates only record samples, and the per-pair
//! aggregates are recomputed once per dirty window on the next read.

use crate::error::Result;
use crate::estimation::mout::MoutEstimator;
use crate::estimation::regression::OrdinalLogisticRegression;
use crate::estimation::{RelevanceEstimator, pooled_system_fractions};
use crate::model::{Metadata, RelevanceEstimate, Run};
use std::collections::HashMap;
use std::sync::RwLock;

/// Artist value that aggregates too many unrelated documents to be a
/// meaningful grouping for aART.
pub const VARIOUS_ARTISTS: &str = "Various Artists";

/// Labels of the Fine judgment scale, midpoints of its ten bands.
const LABELS: [f64; 10] = [5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0, 95.0];
// Intercepts and coefficients fitted offline on Fine-scale audio similarity
// judgments. Feature layout: fSYS, aSYS, aART.
// Do not edit without refitting the model.
const ALPHAS: [f64; 9] = [
    -2.7554, -4.9168, -7.0128, -9.001, -10.8548, -12.7158, -14.6722, -16.8831, -19.2536,
];
const BETAS: [f64; 3] = [0.7954, 0.0128, 0.2078];

/// Per-pair dynamic aggregates, recomputed lazily after judgment updates.
#[derive(Debug, Default)]
struct DynamicCache {
    dirty: bool,
    /// (query, document) -> mean of per-system judged-relevance means.
    a_sys: HashMap<(String, String), f64>,
    /// (query, document) -> mean judged relevance of same-artist documents.
    a_art: HashMap<(String, String), f64>,
}

/// Estimator backed by an ordinal regression over output and judgment
/// features. Pairs missing any dynamic feature fall back to the full Mout
/// model, which in turn may fall back to the uniform prior.
pub struct MjudEstimator {
    model: OrdinalLogisticRegression,
    fallback: MoutEstimator,
    /// query -> document -> fraction of systems retrieving the pair.
    f_sys: HashMap<String, HashMap<String, f64>>,
    /// query -> document -> systems that retrieved the pair.
    retrieved_by: HashMap<String, HashMap<String, Vec<String>>>,
    /// document -> artist.
    artists: HashMap<String, String>,
    /// (query, system) -> judged relevance values seen so far.
    system_samples: HashMap<(String, String), Vec<f64>>,
    /// (query, artist) -> judged relevance values seen so far.
    artist_samples: HashMap<(String, String), Vec<f64>>,
    cache: RwLock<DynamicCache>,
}

impl MjudEstimator {
    /// Build the estimator, seeding its aggregates from an initial batch of
    /// known judgments.
    pub fn new(runs: &[Run], metadata: &[Metadata], judged: &[RelevanceEstimate]) -> Result<Self> {
        let mut retrieved_by: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
        for run in runs {
            let docs = retrieved_by.entry(run.query.clone()).or_default();
            for doc in &run.documents {
                docs.entry(doc.clone()).or_default().push(run.system.clone());
            }
        }

        let mut estimator = Self {
            model: OrdinalLogisticRegression::new(&LABELS, &ALPHAS, &BETAS),
            fallback: MoutEstimator::new(runs, metadata)?,
            f_sys: pooled_system_fractions(runs),
            retrieved_by,
            artists: metadata
                .iter()
                .map(|m| (m.document.clone(), m.artist.clone()))
                .collect(),
            system_samples: HashMap::new(),
            artist_samples: HashMap::new(),
            cache: RwLock::new(DynamicCache {
                dirty: true,
                ..DynamicCache::default()
            }),
        };
        for judgment in judged {
            estimator.update(judgment);
        }
        Ok(estimator)
    }

    /// Recompute the dynamic aggregates if a judgment arrived since the
    /// last read. The write lock guarantees the refreshed cache publishes
    /// atomically before any concurrent read observes it.
    fn refresh_cache(&self) {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if !cache.dirty {
                return;
            }
        }
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if !cache.dirty {
            // Another writer refreshed while we waited.
            return;
        }
        cache.a_sys.clear();
        cache.a_art.clear();

        for (query, docs) in &self.retrieved_by {
            for (doc, systems) in docs {
                let key = (query.clone(), doc.clone());

                // aSYS: mean, over retrieving systems with judged documents,
                // of each system's mean known relevance for this query.
                let mut sum = 0.0;
                let mut count = 0usize;
                for system in systems {
                    if let Some(samples) =
                        self.system_samples.get(&(query.clone(), system.clone()))
                    {
                        sum += mean(samples);
                        count += 1;
                    }
                }
                if count > 0 {
                    cache.a_sys.insert(key.clone(), sum / count as f64);
                }

                // aART: mean known relevance among same-query documents by
                // the same artist.
                if let Some(artist) = self.artists.get(doc)
                    && artist != VARIOUS_ARTISTS
                    && let Some(samples) =
                        self.artist_samples.get(&(query.clone(), artist.clone()))
                {
                    cache.a_art.insert(key, mean(samples));
                }
            }
        }
        cache.dirty = false;
    }
}

impl RelevanceEstimator for MjudEstimator {
    fn estimate(&self, query: &str, document: &str) -> Result<RelevanceEstimate> {
        self.refresh_cache();

        let thetas = {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            let key = (query.to_string(), document.to_string());
            match (
                self.f_sys.get(query).and_then(|docs| docs.get(document)),
                cache.a_sys.get(&key),
                cache.a_art.get(&key),
            ) {
                (Some(&f_sys), Some(&a_sys), Some(&a_art)) => Some([f_sys, a_sys, a_art]),
                _ => None,
            }
        };

        match thetas {
            Some(thetas) => {
                let est = self.model.evaluate(&thetas);
                Ok(RelevanceEstimate::new(
                    query,
                    document,
                    est.expectation,
                    est.variance,
                ))
            }
            // Some feature was missing: fall back to the full Mout model.
            None => self.fallback.estimate(query, document),
        }
    }

    fn update(&mut self, judgment: &RelevanceEstimate) {
        let relevance = judgment.expectation;
        if let Some(systems) = self
            .retrieved_by
            .get(&judgment.query)
            .and_then(|docs| docs.get(&judgment.document))
        {
            for system in systems {
                self.system_samples
                    .entry((judgment.query.clone(), system.clone()))
                    .or_default()
                    .push(relevance);
            }
        }
        if let Some(artist) = self.artists.get(&judgment.document)
            && artist != VARIOUS_ARTISTS
        {
            self.artist_samples
                .entry((judgment.query.clone(), artist.clone()))
                .or_default()
                .push(relevance);
        }
        self.cache
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .dirty = true;
    }

    fn features(&self, query: &str, document: &str) -> Option<Vec<f64>> {
        self.refresh_cache();

        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        let key = (query.to_string(), document.to_string());
        match (
            self.f_sys.get(query).and_then(|docs| docs.get(document)),
            cache.a_sys.get(&key),
            cache.a_art.get(&key),
        ) {
            (Some(&f_sys), Some(&a_sys), Some(&a_art)) => Some(vec![f_sys, a_sys, a_art]),
            _ => {
                drop(cache);
                self.fallback.features(query, document)
            }
        }
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metadata;

    fn sample_runs() -> Vec<Run> {
        vec![
            Run::new("s1", "q1", vec!["d1".into(), "d2".into()]),
            Run::new("s2", "q1", vec!["d2".into(), "d3".into()]),
        ]
    }

    fn sample_metadata() -> Vec<Metadata> {
        vec![
            Metadata::new("q1", "qart", "rock"),
            Metadata::new("d1", "a1", "rock"),
            Metadata::new("d2", "a1", "jazz"),
            Metadata::new("d3", "a2", "rock"),
        ]
    }

    #[test]
    fn test_no_judgments_falls_back_to_mout() {
        let runs = sample_runs();
        let metadata = sample_metadata();
        let mjud = MjudEstimator::new(&runs, &metadata, &[]).unwrap();
        let mout = MoutEstimator::new(&runs, &metadata).unwrap();

        let a = mjud.estimate("q1", "d1").unwrap();
        let b = mout.estimate("q1", "d1").unwrap();
        assert_eq!(a.expectation, b.expectation);
        assert_eq!(a.variance, b.variance);
    }

    #[test]
    fn test_judgments_activate_dynamic_model() {
        let runs = sample_runs();
        let metadata = sample_metadata();
        let mut mjud = MjudEstimator::new(&runs, &metadata, &[]).unwrap();
        let mout = MoutEstimator::new(&runs, &metadata).unwrap();

        // Judging d2 (retrieved by both systems, artist a1) gives every
        // system a sample and artist a1 a sample.
        mjud.update(&RelevanceEstimate::new("q1", "d2", 85.0, 0.0));

        // d1 is retrieved by s1 (judged via d2) and owned by a1.
        let est = mjud.estimate("q1", "d1").unwrap();
        let fallback = mout.estimate("q1", "d1").unwrap();
        assert!((est.expectation - fallback.expectation).abs() > 1e-9);
        assert!(est.expectation >= 5.0 && est.expectation <= 95.0);
        assert!(est.variance >= 0.0);

        let features = mjud.features("q1", "d1").unwrap();
        assert_eq!(features.len(), 3);
        assert!((features[0] - 0.5).abs() < 1e-12); // fSYS
        assert!((features[1] - 85.0).abs() < 1e-12); // aSYS
        assert!((features[2] - 85.0).abs() < 1e-12); // aART
    }

    #[test]
    fn test_seeding_matches_incremental_updates() {
        let runs = sample_runs();
        let metadata = sample_metadata();
        let judgment = RelevanceEstimate::new("q1", "d2", 60.0, 0.0);

        let seeded = MjudEstimator::new(&runs, &metadata, std::slice::from_ref(&judgment)).unwrap();
        let mut incremental = MjudEstimator::new(&runs, &metadata, &[]).unwrap();
        incremental.update(&judgment);

        let a = seeded.estimate("q1", "d3").unwrap();
        let b = incremental.estimate("q1", "d3").unwrap();
        assert_eq!(a.expectation, b.expectation);
        assert_eq!(a.variance, b.variance);
    }

    #[test]
    fn test_various_artists_excluded_from_a_art() {
        let runs = sample_runs();
        let metadata = vec![
            Metadata::new("q1", "qart", "rock"),
            Metadata::new("d1", VARIOUS_ARTISTS, "rock"),
            Metadata::new("d2", VARIOUS_ARTISTS, "jazz"),
            Metadata::new("d3", "a2", "rock"),
        ];
        let mut mjud = MjudEstimator::new(&runs, &metadata, &[]).unwrap();
        mjud.update(&RelevanceEstimate::new("q1", "d2", 85.0, 0.0));

        // d1 gets aSYS (s1 has a sample) but no aART, so the dynamic model
        // cannot apply and the estimate comes from the fallback chain.
        let mout = MoutEstimator::new(&runs, &metadata).unwrap();
        let est = mjud.estimate("q1", "d1").unwrap();
        let fallback = mout.estimate("q1", "d1").unwrap();
        assert_eq!(est.expectation, fallback.expectation);
    }

    #[test]
    fn test_a_sys_averages_per_system_means() {
        let runs = sample_runs();
        let metadata = sample_metadata();
        let mut mjud = MjudEstimator::new(&runs, &metadata, &[]).unwrap();

        // s1 judged via d1 (20) and d2 (40): mean 30. s2 judged via d2 (40)
        // and d3 (80): mean 60. d2 is retrieved by both systems.
        mjud.update(&RelevanceEstimate::new("q1", "d1", 20.0, 0.0));
        mjud.update(&RelevanceEstimate::new("q1", "d2", 40.0, 0.0));
        mjud.update(&RelevanceEstimate::new("q1", "d3", 80.0, 0.0));

        let features = mjud.features("q1", "d2").unwrap();
        assert!((features[1] - 45.0).abs() < 1e-12); // (30 + 60) / 2
    }
}
