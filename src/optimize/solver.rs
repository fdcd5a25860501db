//! Solver seam: the rebalancing formulation and the backends that solve it.
//!
//! All numbers in this module are `f64` and expressed as fractions of market
//! value. Nothing here is exposed to callers of the engine without going
//! through the decimal conversion in the parent module.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::SolverStatus;

/// One security's row of the relaxed problem, normalized by market value.
///
/// The decision variable is the position weight `v = q * price / MV`; the
/// solver must keep `lower <= v <= upper`, `v >= 0`, and minimize `|v - target|`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Row {
    pub target: f64,
    pub lower: f64,
    pub upper: f64,
}

/// The relaxed rebalancing problem:
///
/// ```text
/// minimize   Σ d_i
/// subject to d_i >= v_i - target_i
///            d_i >= target_i - v_i
///            lower_i <= v_i <= upper_i,  v_i >= 0
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Formulation {
    pub rows: Vec<Row>,
}

impl Formulation {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Optimal point of a [`Formulation`].
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// Weight `v_i` per row.
    pub weights: Vec<f64>,
    /// Absolute deviation `d_i` per row.
    pub deviations: Vec<f64>,
    /// `Σ d_i`
    pub objective: f64,
}

impl Solution {
    pub(crate) fn from_weights(problem: &Formulation, weights: Vec<f64>) -> Self {
        let deviations: Vec<f64> = problem
            .rows
            .iter()
            .zip(&weights)
            .map(|(row, v)| (v - row.target).abs())
            .collect();
        let objective = deviations.iter().sum();
        Self {
            weights,
            deviations,
            objective,
        }
    }
}

/// Why a backend returned without a solution.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveFailure {
    pub status: SolverStatus,
    pub reason: String,
}

impl SolveFailure {
    pub fn new(status: SolverStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub(crate) fn time_limit() -> Self {
        Self::new(SolverStatus::TimeLimit, "deadline reached")
    }
}

impl fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.reason)
    }
}

/// Wall-clock budget for one solve. Backends poll it cooperatively.
#[derive(Clone, Copy, Debug)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline `budget` from now. Budgets too large to represent never expire.
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now().checked_add(budget))
    }

    pub fn never() -> Self {
        Self(None)
    }

    #[inline]
    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

/// A continuous solver for [`Formulation`]s.
///
/// Implementations are stateless; every call is an independent solve, so one
/// instance can serve concurrent callers.
pub trait Solver: Send + Sync + fmt::Debug {
    fn backend(&self) -> SolverBackend;

    fn solve(&self, problem: &Formulation, deadline: Deadline) -> Result<Solution, SolveFailure>;
}

/// Available solver implementations, in default preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverBackend {
    /// Dense two-phase tableau simplex over the full LP.
    Simplex,
    /// Exact per-row solver exploiting the block-separable structure.
    Separable,
}

impl SolverBackend {
    /// Preference order used when no configuration overrides it.
    pub const DEFAULT_PREFERENCE: [SolverBackend; 2] =
        [SolverBackend::Simplex, SolverBackend::Separable];

    /// Whether this backend was compiled in.
    pub fn is_available(self) -> bool {
        match self {
            SolverBackend::Simplex => cfg!(feature = "simplex"),
            SolverBackend::Separable => cfg!(feature = "separable"),
        }
    }

    /// Backends compiled into this build.
    pub fn available() -> Vec<SolverBackend> {
        Self::DEFAULT_PREFERENCE
            .into_iter()
            .filter(|b| b.is_available())
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            SolverBackend::Simplex => "simplex",
            SolverBackend::Separable => "separable",
        }
    }

    /// Instantiate the backend, or `None` if it was not compiled in.
    pub fn instantiate(self) -> Option<Box<dyn Solver>> {
        match self {
            #[cfg(feature = "simplex")]
            SolverBackend::Simplex => Some(Box::new(super::simplex::SimplexSolver)),
            #[cfg(feature = "separable")]
            SolverBackend::Separable => Some(Box::new(super::separable::SeparableSolver)),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// First available backend in `preference`.
    pub fn select(preference: &[SolverBackend]) -> Option<Box<dyn Solver>> {
        preference.iter().find_map(|b| b.instantiate())
    }
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
