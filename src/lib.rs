//! Releval - retrieval-system evaluation with incomplete judgments.
//!
//! Estimates the relevance of unjudged (query, document) pairs from pooled
//! run output, document metadata and the judgments collected so far, then
//! turns those estimates into system effectiveness scores with confidence
//! intervals. The point is to rank systems (and decide what to judge next)
//! long before the judgment pool is complete.
//!
//! # Overview
//!
//! Evaluation runs in rounds:
//! 1. A relevance estimator assigns each pooled pair an expected relevance
//!    and a variance (known judgments get variance zero).
//! 2. The cumulative-gain measure aggregates those beliefs into absolute
//!    per-system scores and pairwise differences, each with a Normal
//!    confidence interval.
//! 3. Selection weights rank the still-unjudged pairs by how much their
//!    judgment would sharpen the target comparison, yielding the next
//!    batches to judge.
//!
//! # Quick Start
//!
//! ```no_run
//! use releval::estimation::{EstimatorKind, EstimatorWrapper};
//! use releval::evaluation::{
//!     group_runs, sorted_mean_absolutes, system_query_absolutes, CgMeasure,
//!     NormalConfidenceEstimator,
//! };
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let runs = releval::io::read_runs(Path::new("runs.tsv"))?;
//!     let judged = releval::io::read_estimates(Path::new("judged.tsv"))?;
//!
//!     let estimator = EstimatorWrapper::new(&EstimatorKind::Uniform, &runs, &judged)?;
//!     let measure = CgMeasure::new(100)?;
//!     let confidence = NormalConfidenceEstimator::new(0.95, 0.01, 0.01)?;
//!
//!     let grouped = group_runs(&runs);
//!     let per_query = system_query_absolutes(&grouped, measure, &estimator, &confidence)?;
//!     for result in sorted_mean_absolutes(&per_query, &confidence) {
//!         println!("{}\t{:.4}\t{:.4}", result.system, result.expectation, result.confidence);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **io**: tab-separated readers and writers for runs, estimates and
//!   metadata
//! - **estimation**: the Uniform/Mout/Mjud estimator chain and the
//!   known-judgments wrapper
//! - **evaluation**: the CG measure, Normal confidence estimation,
//!   per-system aggregation and judgment-batch selection
//! - **config**: evaluation parameters and their defaults

pub mod config;
pub mod error;
pub mod estimation;
pub mod evaluation;
pub mod io;
pub mod model;

// Re-export commonly used types
pub use config::EvalConfig;
pub use error::{EvalError, Result};
pub use estimation::{EstimatorKind, EstimatorWrapper, RelevanceEstimator};
pub use evaluation::{CgMeasure, EvaluationTarget, NormalConfidenceEstimator};
pub use model::{
    AbsoluteEffectivenessEstimate, RelativeEffectivenessEstimate, RelevanceEstimate, Run,
};
