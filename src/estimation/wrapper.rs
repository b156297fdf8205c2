//! Judgment stores: the known-judgments decorator and the pure lookup store.

use crate::error::{EvalError, Result};
use crate::estimation::{EstimatorKind, RelevanceEstimator};
use crate::model::{RelevanceEstimate, Run};
use std::collections::HashMap;

/// Decorates an inner estimator with a known-judgments override table.
///
/// Judged pairs bypass the model entirely; updates grow the table and are
/// forwarded to the inner estimator so dynamic models stay in sync.
pub struct EstimatorWrapper {
    judged: HashMap<(String, String), RelevanceEstimate>,
    inner: Box<dyn RelevanceEstimator>,
}

impl EstimatorWrapper {
    /// Build the wrapper: instantiate the inner estimator from its kind and
    /// seed both the override table and the inner estimator's state with an
    /// initial batch of known judgments.
    pub fn new(kind: &EstimatorKind, runs: &[Run], judged: &[RelevanceEstimate]) -> Result<Self> {
        let mut inner = kind.build(runs)?;
        let mut table = HashMap::new();
        for judgment in judged {
            inner.update(judgment);
            table.insert(judgment.key(), judgment.clone());
        }
        Ok(Self {
            judged: table,
            inner,
        })
    }

    /// Number of known judgments held.
    pub fn judged_count(&self) -> usize {
        self.judged.len()
    }

    /// Whether a pair has already been judged.
    pub fn is_judged(&self, query: &str, document: &str) -> bool {
        self.judged
            .contains_key(&(query.to_string(), document.to_string()))
    }
}

impl RelevanceEstimator for EstimatorWrapper {
    fn estimate(&self, query: &str, document: &str) -> Result<RelevanceEstimate> {
        if let Some(judgment) = self
            .judged
            .get(&(query.to_string(), document.to_string()))
        {
            return Ok(judgment.clone());
        }
        self.inner.estimate(query, document)
    }

    fn update(&mut self, judgment: &RelevanceEstimate) {
        self.judged.insert(judgment.key(), judgment.clone());
        self.inner.update(judgment);
    }

    fn features(&self, query: &str, document: &str) -> Option<Vec<f64>> {
        self.inner.features(query, document)
    }
}

/// A pure map of relevance estimates with no model behind it.
///
/// Lookup misses are hard errors: when evaluating from an estimates file,
/// every pair referenced by the runs must be present.
#[derive(Debug, Default)]
pub struct RelevanceEstimateStore {
    estimates: HashMap<(String, String), RelevanceEstimate>,
}

impl RelevanceEstimateStore {
    /// Create a store from a batch of estimates.
    pub fn new(estimates: Vec<RelevanceEstimate>) -> Self {
        let mut store = Self::default();
        for estimate in estimates {
            store.insert(estimate);
        }
        store
    }

    /// Insert or overwrite a single estimate.
    pub fn insert(&mut self, estimate: RelevanceEstimate) {
        self.estimates.insert(estimate.key(), estimate);
    }

    /// Number of estimates held.
    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }
}

impl RelevanceEstimator for RelevanceEstimateStore {
    fn estimate(&self, query: &str, document: &str) -> Result<RelevanceEstimate> {
        self.estimates
            .get(&(query.to_string(), document.to_string()))
            .cloned()
            .ok_or_else(|| EvalError::MissingEstimate {
                query: query.to_string(),
                document: document.to_string(),
            })
    }

    fn update(&mut self, judgment: &RelevanceEstimate) {
        self.insert(judgment.clone());
    }
}
