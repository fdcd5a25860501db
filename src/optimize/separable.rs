//! Exact solver for the block-separable rebalancing LP.
//!
//! Rows share no constraints, so each `|v - target|` is minimized on its own
//! by clamping the target into `[max(lower, 0), upper]`.

use crate::error::SolverStatus;

use super::solver::{Deadline, Formulation, Solution, SolveFailure, Solver, SolverBackend};

const EPS: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Default)]
pub struct SeparableSolver;

impl Solver for SeparableSolver {
    fn backend(&self) -> SolverBackend {
        SolverBackend::Separable
    }

    fn solve(&self, problem: &Formulation, deadline: Deadline) -> Result<Solution, SolveFailure> {
        if deadline.expired() {
            return Err(SolveFailure::time_limit());
        }
        let mut weights = Vec::with_capacity(problem.len());
        for (i, row) in problem.rows.iter().enumerate() {
            if !(row.target.is_finite() && row.lower.is_finite() && row.upper.is_finite()) {
                return Err(SolveFailure::new(
                    SolverStatus::Error,
                    format!("row {i} has a non-finite coefficient"),
                ));
            }
            let lo = row.lower.max(0.0);
            if lo > row.upper + EPS {
                return Err(SolveFailure::new(
                    SolverStatus::Infeasible,
                    format!("row {i}: lower bound {lo} exceeds upper bound {}", row.upper),
                ));
            }
            weights.push(row.target.max(lo).min(row.upper.max(lo)));
        }
        Ok(Solution::from_weights(problem, weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::solver::Row;

    #[test]
    fn clamps_into_band() {
        let problem = Formulation::new(vec![
            Row { target: 0.5, lower: 0.6, upper: 0.8 },
            Row { target: 0.3, lower: 0.25, upper: 0.35 },
            Row { target: 0.4, lower: 0.1, upper: 0.2 },
        ]);
        let s = SeparableSolver.solve(&problem, Deadline::never()).unwrap();
        assert_eq!(s.weights, vec![0.6, 0.3, 0.2]);
        assert!((s.objective - 0.3).abs() < 1e-12);
    }

    #[test]
    fn negative_lower_floors_at_zero() {
        let problem = Formulation::new(vec![Row { target: 0.0, lower: -0.05, upper: 0.05 }]);
        let s = SeparableSolver.solve(&problem, Deadline::never()).unwrap();
        assert_eq!(s.weights, vec![0.0]);
        assert_eq!(s.objective, 0.0);
    }

    #[test]
    fn crossed_band_is_infeasible() {
        let problem = Formulation::new(vec![Row { target: 0.5, lower: 0.6, upper: 0.4 }]);
        let err = SeparableSolver.solve(&problem, Deadline::never()).unwrap_err();
        assert_eq!(err.status, SolverStatus::Infeasible);

        let below_zero = Formulation::new(vec![Row { target: 0.0, lower: -0.2, upper: -0.1 }]);
        let err = SeparableSolver.solve(&below_zero, Deadline::never()).unwrap_err();
        assert_eq!(err.status, SolverStatus::Infeasible);
    }

    #[test]
    fn non_finite_is_error() {
        let problem = Formulation::new(vec![Row { target: f64::NAN, lower: 0.0, upper: 1.0 }]);
        let err = SeparableSolver.solve(&problem, Deadline::never()).unwrap_err();
        assert_eq!(err.status, SolverStatus::Error);
    }

    #[test]
    fn expired_deadline() {
        let problem = Formulation::new(vec![Row { target: 0.5, lower: 0.4, upper: 0.6 }]);
        let err = SeparableSolver
            .solve(&problem, Deadline::after(std::time::Duration::ZERO))
            .unwrap_err();
        assert_eq!(err.status, SolverStatus::TimeLimit);
    }
}
