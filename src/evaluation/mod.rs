//! Effectiveness evaluation: the cumulative-gain measure, Normal
//! confidence estimation, per-system aggregation and judgment selection.

mod aggregate;
mod confidence;
mod measure;
mod selection;
mod simulate;

pub use aggregate::{
    group_runs, query_doc_systems, sorted_mean_absolutes, sorted_mean_relatives,
    system_pair_relatives, system_query_absolutes, system_query_variances, SystemQueryRuns,
};
pub use confidence::NormalConfidenceEstimator;
pub use measure::{compute_absolute_weights, compute_relative_weights, CgMeasure, PendingPool};
pub use selection::{select_batches, Batch};
pub use simulate::{
    mean_confidence, pending_pool, run_simulation, SimulationEvent, SimulationOutcome,
};

use crate::error::EvalError;
use crate::model::{AbsoluteEffectivenessEstimate, RelativeEffectivenessEstimate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What an evaluation round targets: differences between system pairs, or
/// each system's own effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationTarget {
    Relative,
    Absolute,
}

impl FromStr for EvaluationTarget {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rel" => Ok(Self::Relative),
            "abs" => Ok(Self::Absolute),
            other => Err(EvalError::InvalidConfig(format!(
                "unknown evaluation target '{other}', expected 'rel' or 'abs'"
            ))),
        }
    }
}

impl fmt::Display for EvaluationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative => write!(f, "rel"),
            Self::Absolute => write!(f, "abs"),
        }
    }
}

/// A full evaluation round, serializable for machine consumption.
#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub relative: Vec<RelativeEffectivenessEstimate>,
    pub absolute: Vec<AbsoluteEffectivenessEstimate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parsing() {
        assert_eq!("rel".parse::<EvaluationTarget>().unwrap(), EvaluationTarget::Relative);
        assert_eq!("abs".parse::<EvaluationTarget>().unwrap(), EvaluationTarget::Absolute);
        assert!("both".parse::<EvaluationTarget>().is_err());
    }

    #[test]
    fn test_target_display_round_trips() {
        for target in [EvaluationTarget::Relative, EvaluationTarget::Absolute] {
            assert_eq!(target.to_string().parse::<EvaluationTarget>().unwrap(), target);
        }
    }
}
