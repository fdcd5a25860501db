//! Error types for model validation, business rules, and optimization.

use std::fmt;
use std::time::Duration;

/// Status reported by a solver backend for one solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// Proven optimal for the relaxed problem.
    Optimal,
    /// The constraints admit no solution.
    Infeasible,
    /// The objective can decrease without bound.
    Unbounded,
    /// The wall-clock budget ran out before a solution was proven.
    TimeLimit,
    /// The solver broke down (numerics, iteration cap, non-finite output).
    Error,
}

impl SolverStatus {
    /// `true` for the outcomes the engine reports as a normal infeasible result.
    pub fn is_expected_failure(self) -> bool {
        matches!(self, SolverStatus::Infeasible | SolverStatus::TimeLimit)
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStatus::Optimal => write!(f, "optimal"),
            SolverStatus::Infeasible => write!(f, "infeasible"),
            SolverStatus::Unbounded => write!(f, "unbounded"),
            SolverStatus::TimeLimit => write!(f, "time_limit"),
            SolverStatus::Error => write!(f, "error"),
        }
    }
}

/// Failures of the optimization engine itself.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum OptimizationError {
    #[error("no solver backend is available (enable the `simplex` or `separable` feature)")]
    SolverUnavailable,

    #[error("solver failed with status {status} after {:.3}s: {reason}", .solve_time.as_secs_f64())]
    Failed {
        status: SolverStatus,
        solve_time: Duration,
        reason: String,
    },

    #[error("rebalancing problem is infeasible (after {:.3}s)", .solve_time.as_secs_f64())]
    Infeasible { solve_time: Duration },

    #[error("solver hit its time limit after {:.3}s", .solve_time.as_secs_f64())]
    TimeLimit { solve_time: Duration },
}

impl OptimizationError {
    /// The solver status this error corresponds to.
    pub fn solver_status(&self) -> SolverStatus {
        match self {
            OptimizationError::SolverUnavailable => SolverStatus::Error,
            OptimizationError::Failed { status, .. } => *status,
            OptimizationError::Infeasible { .. } => SolverStatus::Infeasible,
            OptimizationError::TimeLimit { .. } => SolverStatus::TimeLimit,
        }
    }

    /// Wall-clock time spent before the failure, if a solve was attempted.
    pub fn solve_time(&self) -> Option<Duration> {
        match self {
            OptimizationError::SolverUnavailable => None,
            OptimizationError::Failed { solve_time, .. }
            | OptimizationError::Infeasible { solve_time }
            | OptimizationError::TimeLimit { solve_time } => Some(*solve_time),
        }
    }
}

/// All errors produced by the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range input. The caller can fix it and retry.
    #[error("validation error: {0}")]
    Validation(String),

    /// Well-formed input that would break a model invariant.
    #[error("business rule violation: {0}")]
    BusinessRule(String),

    #[error(transparent)]
    Optimization(#[from] OptimizationError),

    /// The stored model moved past the version this writer started from.
    #[error("version conflict: expected stored version {expected}, found {found}")]
    VersionConflict { expected: u32, found: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "parallel")]
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[cfg(feature = "persistence")]
    #[error("failed to (de)serialize model record: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn business_rule(msg: impl Into<String>) -> Self {
        Error::BusinessRule(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_business_rule(&self) -> bool {
        matches!(self, Error::BusinessRule(_))
    }

    pub fn is_optimization(&self) -> bool {
        matches!(self, Error::Optimization(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
