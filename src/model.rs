//! Core value types: runs, relevance estimates and effectiveness estimates.

use serde::{Deserialize, Serialize};

/// Marker used for effectiveness estimates aggregated over all queries.
pub const AGGREGATE_QUERY: &str = "[all]";

/// One system's retrieval output for one query.
///
/// Immutable once parsed from the runs file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// System identifier.
    pub system: String,
    /// Query identifier.
    pub query: String,
    /// Document identifiers, in file order.
    pub documents: Vec<String>,
}

impl Run {
    /// Create a new run.
    pub fn new(
        system: impl Into<String>,
        query: impl Into<String>,
        documents: Vec<String>,
    ) -> Self {
        Self {
            system: system.into(),
            query: query.into(),
            documents,
        }
    }
}

/// A probabilistic belief: expectation plus variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Expected value.
    pub expectation: f64,
    /// Variance (non-negative).
    pub variance: f64,
}

impl Estimate {
    /// Create a new estimate.
    pub fn new(expectation: f64, variance: f64) -> Self {
        Self {
            expectation,
            variance,
        }
    }
}

/// A relevance belief for one (query, document) pair.
///
/// The selection weight defaults to zero and is mutated only by the
/// selection-weight computation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceEstimate {
    /// Query identifier.
    pub query: String,
    /// Document identifier.
    pub document: String,
    /// Expected relevance.
    pub expectation: f64,
    /// Relevance variance.
    pub variance: f64,
    /// Selection weight for active judging.
    #[serde(default)]
    pub weight: f64,
}

impl RelevanceEstimate {
    /// Create a new relevance estimate with zero selection weight.
    pub fn new(
        query: impl Into<String>,
        document: impl Into<String>,
        expectation: f64,
        variance: f64,
    ) -> Self {
        Self {
            query: query.into(),
            document: document.into(),
            expectation,
            variance,
            weight: 0.0,
        }
    }

    /// Identity key of this estimate.
    pub fn key(&self) -> (String, String) {
        (self.query.clone(), self.document.clone())
    }

    /// The plain (expectation, variance) belief.
    pub fn estimate(&self) -> Estimate {
        Estimate::new(self.expectation, self.variance)
    }
}

/// A single system's estimated effectiveness for one query (or `[all]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsoluteEffectivenessEstimate {
    /// System identifier.
    pub system: String,
    /// Query identifier, or [`AGGREGATE_QUERY`].
    pub query: String,
    /// Mean estimated effectiveness, normalized to [0, 1].
    pub expectation: f64,
    /// Variance of the mean.
    pub variance: f64,
    /// Two-sided confidence interval [low, high].
    pub interval: (f64, f64),
    /// Confidence that the effectiveness exceeds the target absolute size.
    pub confidence: f64,
}

impl AbsoluteEffectivenessEstimate {
    /// The plain (expectation, variance) belief.
    pub fn estimate(&self) -> Estimate {
        Estimate::new(self.expectation, self.variance)
    }
}

/// The estimated effectiveness difference between two systems.
///
/// After aggregate sign normalization the stored expectation is always
/// non-negative: system A is (weakly) better than system B.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeEffectivenessEstimate {
    /// First system identifier.
    pub system_a: String,
    /// Second system identifier.
    pub system_b: String,
    /// Query identifier, or [`AGGREGATE_QUERY`].
    pub query: String,
    /// Mean estimated difference, normalized to [-1, 1].
    pub expectation: f64,
    /// Variance of the mean difference.
    pub variance: f64,
    /// Two-sided confidence interval [low, high].
    pub interval: (f64, f64),
    /// Confidence that the difference exceeds the target relative size.
    pub confidence: f64,
}

impl RelativeEffectivenessEstimate {
    /// The plain (expectation, variance) belief.
    pub fn estimate(&self) -> Estimate {
        Estimate::new(self.expectation, self.variance)
    }
}

/// Static artist/genre metadata for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Document identifier.
    pub document: String,
    /// Artist identifier.
    pub artist: String,
    /// Genre identifier.
    pub genre: String,
}

impl Metadata {
    /// Create a new metadata record.
    pub fn new(
        document: impl Into<String>,
        artist: impl Into<String>,
        genre: impl Into<String>,
    ) -> Self {
        Self {
            document: document.into(),
            artist: artist.into(),
            genre: genre.into(),
        }
    }
}
