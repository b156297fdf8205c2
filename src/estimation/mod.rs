//! Relevance estimators: the models that turn runs, metadata and known
//! judgments into per-pair relevance beliefs.
//!
//! The fallback chain is Mjud -> Mout -> Uniform: a missing feature is
//! never an error, it just drops the pair down to a simpler model.

mod mjud;
mod mout;
mod regression;
mod uniform;
mod wrapper;

pub use mjud::{MjudEstimator, VARIOUS_ARTISTS};
pub use mout::MoutEstimator;
pub use regression::OrdinalLogisticRegression;
pub use uniform::UniformEstimator;
pub use wrapper::{EstimatorWrapper, RelevanceEstimateStore};

use crate::config::DEFAULT_MAX_RELEVANCE;
use crate::error::{EvalError, Result};
use crate::model::{RelevanceEstimate, Run};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// A strategy for estimating the relevance of a (query, document) pair.
///
/// Model-backed estimators never fail: missing inputs trigger the
/// documented fallback chain. Only pure stores (no fallback available)
/// return an error for unknown pairs.
pub trait RelevanceEstimator: Send + Sync {
    /// Estimate the relevance of a document for a query.
    fn estimate(&self, query: &str, document: &str) -> Result<RelevanceEstimate>;

    /// Incorporate a new known judgment.
    fn update(&mut self, judgment: &RelevanceEstimate);

    /// Raw feature vector for a pair, for feature-based estimators.
    fn features(&self, _query: &str, _document: &str) -> Option<Vec<f64>> {
        None
    }
}

/// Fraction of systems retrieving each (query, document) pair, weighted
/// 1/nSystems per occurrence.
pub(crate) fn pooled_system_fractions(runs: &[Run]) -> HashMap<String, HashMap<String, f64>> {
    let n_systems = runs
        .iter()
        .map(|r| r.system.as_str())
        .collect::<HashSet<_>>()
        .len();
    let weight = 1.0 / n_systems as f64;

    let mut fractions: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for run in runs {
        let docs = fractions.entry(run.query.clone()).or_default();
        for doc in &run.documents {
            *docs.entry(doc.clone()).or_insert(0.0) += weight;
        }
    }
    fractions
}

/// The closed registry of estimator variants and their parameters.
///
/// Parsing validates the parameter schema per variant and fails fast with a
/// configuration error before any file I/O.
#[derive(Debug, Clone)]
pub enum EstimatorKind {
    /// Uniform prior over the Fine scale. No parameters.
    Uniform,
    /// Model on output and metadata features. Requires `meta`.
    Mout { meta: PathBuf },
    /// Model on output, metadata and judgment features. Requires `meta`,
    /// accepts an optional `judged` seed file.
    Mjud {
        meta: PathBuf,
        judged: Option<PathBuf>,
    },
}

impl EstimatorKind {
    /// Validate an estimator name and its `name=value` parameters.
    pub fn from_name(name: &str, params: &HashMap<String, String>) -> Result<Self> {
        match name {
            "uniform" => {
                if !params.is_empty() {
                    return Err(EvalError::InvalidConfig(
                        "estimator 'uniform' does not have parameters".to_string(),
                    ));
                }
                Ok(Self::Uniform)
            }
            "mout" => {
                let meta = require_file_param(params, "meta", "mout")?;
                if params.len() != 1 {
                    return Err(EvalError::InvalidConfig(
                        "invalid parameters for estimator 'mout'".to_string(),
                    ));
                }
                Ok(Self::Mout { meta })
            }
            "mjud" => {
                let meta = require_file_param(params, "meta", "mjud")?;
                let judged = match params.get("judged") {
                    Some(path) => Some(existing_file(path)?),
                    None => None,
                };
                let expected = if judged.is_some() { 2 } else { 1 };
                if params.len() != expected {
                    return Err(EvalError::InvalidConfig(
                        "invalid parameters for estimator 'mjud'".to_string(),
                    ));
                }
                Ok(Self::Mjud { meta, judged })
            }
            other => Err(EvalError::UnknownEstimator(other.to_string())),
        }
    }

    /// Build the estimator, reading its parameter files.
    pub fn build(&self, runs: &[Run]) -> Result<Box<dyn RelevanceEstimator>> {
        match self {
            Self::Uniform => Ok(Box::new(UniformEstimator::new(DEFAULT_MAX_RELEVANCE)?)),
            Self::Mout { meta } => {
                let metadata = crate::io::read_metadata(meta)?;
                Ok(Box::new(MoutEstimator::new(runs, &metadata)?))
            }
            Self::Mjud { meta, judged } => {
                let metadata = crate::io::read_metadata(meta)?;
                let seed = match judged {
                    Some(path) => crate::io::read_estimates(path)?,
                    None => Vec::new(),
                };
                Ok(Box::new(MjudEstimator::new(runs, &metadata, &seed)?))
            }
        }
    }
}

/// Parse repeated `name=value` CLI parameters into a map.
pub fn parse_name_value_params(params: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for param in params {
        let Some((name, value)) = param.split_once('=') else {
            return Err(EvalError::InvalidConfig(format!(
                "parameter '{param}' is not in name=value form"
            )));
        };
        if map.insert(name.to_string(), value.to_string()).is_some() {
            return Err(EvalError::InvalidConfig(format!(
                "parameter '{name}' given more than once"
            )));
        }
    }
    Ok(map)
}

fn require_file_param(
    params: &HashMap<String, String>,
    name: &str,
    estimator: &str,
) -> Result<PathBuf> {
    let Some(path) = params.get(name) else {
        return Err(EvalError::InvalidConfig(format!(
            "estimator '{estimator}' requires a '{name}' parameter"
        )));
    };
    existing_file(path)
}

fn existing_file(path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(EvalError::FileNotFound(path));
    }
    Ok(path)
}
