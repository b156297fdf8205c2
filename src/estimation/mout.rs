//! Mout: relevance model fitted on system outputs and document metadata.

use crate::error::Result;
use crate::estimation::regression::OrdinalLogisticRegression;
use crate::estimation::uniform::UniformEstimator;
use crate::estimation::{RelevanceEstimator, pooled_system_fractions};
use crate::model::{Metadata, RelevanceEstimate, Run};
use std::collections::HashMap;

/// Labels of the Fine judgment scale, midpoints of its ten bands.
const LABELS: [f64; 10] = [5.0, 15.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0, 95.0];
// Intercepts and coefficients fitted offline on Fine-scale audio similarity
// judgments. Feature layout: fSYS, OV, fSYS*OV, fART, sGEN, fGEN, sGEN*fGEN.
// Do not edit without refitting the model.
const ALPHAS: [f64; 9] = [
    -0.5092, -1.2231, -1.7919, -2.2787, -2.7216, -3.1956, -3.8044, -4.6928, -5.9567,
];
const BETAS: [f64; 7] = [-17.4721, 0.1336, 26.455, 2.9111, 2.0443, 5.4544, -3.4851];

/// Per-(query, document) static features. Optional fields are absent when
/// the document or the query lacks the metadata they derive from.
#[derive(Debug, Clone, Copy)]
struct PairFeatures {
    f_sys: f64,
    s_gen: Option<bool>,
    f_gen: Option<f64>,
    f_art: Option<f64>,
}

/// Estimator backed by an ordinal regression over output/metadata features.
///
/// All features are computed once at construction from the full run set and
/// the metadata table. Pairs with any missing feature fall back to the
/// uniform prior.
pub struct MoutEstimator {
    model: OrdinalLogisticRegression,
    fallback: UniformEstimator,
    overlap: f64,
    features: HashMap<String, HashMap<String, PairFeatures>>,
}

impl MoutEstimator {
    /// Build the estimator from the run set and document metadata.
    pub fn new(runs: &[Run], metadata: &[Metadata]) -> Result<Self> {
        let model = OrdinalLogisticRegression::new(&LABELS, &ALPHAS, &BETAS);
        let fallback = UniformEstimator::new(100)?;

        let mut artists: HashMap<&str, &str> = HashMap::new();
        let mut genres: HashMap<&str, &str> = HashMap::new();
        for m in metadata {
            artists.insert(&m.document, &m.artist);
            genres.insert(&m.document, &m.genre);
        }

        let f_sys = pooled_system_fractions(runs);
        let overlap = compute_overlap(runs, &f_sys);

        // Genre and artist fractions replicate the query-document structure
        // of the pooled fractions.
        let mut features: HashMap<String, HashMap<String, PairFeatures>> = HashMap::new();
        for (query, docs) in &f_sys {
            let query_genre = genres.get(query.as_str()).copied();
            let mut doc_features: HashMap<String, PairFeatures> = HashMap::new();
            for (doc, &pair_f_sys) in docs {
                let doc_genre = genres.get(doc.as_str()).copied();
                let s_gen = match (doc_genre, query_genre) {
                    (Some(dg), Some(qg)) => Some(dg == qg),
                    _ => None,
                };
                let f_gen = doc_genre.map(|dg| {
                    sharing_fraction(docs.keys(), |other| genres.get(other).copied(), dg)
                });
                let f_art = artists.get(doc.as_str()).map(|&da| {
                    sharing_fraction(docs.keys(), |other| artists.get(other).copied(), da)
                });
                doc_features.insert(
                    doc.clone(),
                    PairFeatures {
                        f_sys: pair_f_sys,
                        s_gen,
                        f_gen,
                        f_art,
                    },
                );
            }
            features.insert(query.clone(), doc_features);
        }

        Ok(Self {
            model,
            fallback,
            overlap,
            features,
        })
    }

    fn complete_features(&self, query: &str, document: &str) -> Option<[f64; 7]> {
        let f = self.features.get(query)?.get(document)?;
        let s_gen = f.s_gen?;
        let f_gen = f.f_gen?;
        let f_art = f.f_art?;
        let s = if s_gen { 1.0 } else { 0.0 };
        Some([
            f.f_sys,
            self.overlap,
            f.f_sys * self.overlap,
            f_art,
            s,
            f_gen,
            if s_gen { f_gen } else { 0.0 },
        ])
    }
}

impl RelevanceEstimator for MoutEstimator {
    fn estimate(&self, query: &str, document: &str) -> Result<RelevanceEstimate> {
        match self.complete_features(query, document) {
            Some(thetas) => {
                let est = self.model.evaluate(&thetas);
                Ok(RelevanceEstimate::new(
                    query,
                    document,
                    est.expectation,
                    est.variance,
                ))
            }
            // Some feature was missing: fall back to the uniform prior.
            None => self.fallback.estimate(query, document),
        }
    }

    fn update(&mut self, _judgment: &RelevanceEstimate) {
        // Output/metadata features are static; nothing to update.
    }

    fn features(&self, query: &str, document: &str) -> Option<Vec<f64>> {
        let f = self.features.get(query)?.get(document)?;
        let s_gen = f.s_gen?;
        Some(vec![
            f.f_sys,
            self.overlap,
            f.f_art?,
            if s_gen { 1.0 } else { 0.0 },
            f.f_gen?,
        ])
    }
}

/// Global overlap ratio: the fraction of the system x query x document
/// space actually covered by retrieved pairs.
fn compute_overlap(runs: &[Run], f_sys: &HashMap<String, HashMap<String, f64>>) -> f64 {
    let n_systems = runs
        .iter()
        .map(|r| r.system.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();
    let docs_per_run = runs.first().map_or(0, |r| r.documents.len());
    let distinct_pairs: usize = f_sys.values().map(|docs| docs.len()).sum();
    distinct_pairs as f64 / (n_systems * f_sys.len() * docs_per_run) as f64
}

/// Fraction of same-query documents sharing `value`, computed only over
/// documents for which `lookup` knows a value.
fn sharing_fraction<'a>(
    docs: impl Iterator<Item = &'a String>,
    lookup: impl Fn(&str) -> Option<&'a str>,
    value: &str,
) -> f64 {
    let mut shared = 0usize;
    let mut known = 0usize;
    for doc in docs {
        if let Some(other) = lookup(doc) {
            known += 1;
            if other == value {
                shared += 1;
            }
        }
    }
    shared as f64 / known as f64
}
