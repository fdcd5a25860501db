//! Dense two-phase tableau simplex.
//!
//! Solves `min c·x` subject to `A x {<=,>=} b`, `x >= 0`. Pricing is Dantzig
//! (most negative reduced cost) and switches to Bland's rule after a run of
//! degenerate pivots so cycling cannot stall the solve.

use crate::error::SolverStatus;

use super::solver::{Deadline, Formulation, Solution, SolveFailure, Solver, SolverBackend};

const EPS: f64 = 1e-9;
/// Phase 1 residual above which the problem is declared infeasible.
const FEASIBILITY_TOL: f64 = 1e-7;
/// Consecutive zero-step pivots before falling back to Bland's rule.
const DEGENERATE_LIMIT: usize = 50;
/// Hard pivot cap as a multiple of `rows + cols`.
const ITERATION_FACTOR: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Relation {
    Le,
    Ge,
}

#[derive(Clone, Debug)]
pub(crate) struct Constraint {
    /// Sparse `(variable, coefficient)` pairs.
    pub coeffs: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// `min objective·x` over `x >= 0`.
#[derive(Clone, Debug)]
pub(crate) struct LinearProgram {
    pub num_vars: usize,
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
}

impl LinearProgram {
    /// Lay out the rebalancing problem with `v_i` at column `2i` and `d_i` at `2i + 1`.
    pub(crate) fn from_formulation(problem: &Formulation) -> Self {
        let n = problem.len();
        let mut objective = vec![0.0; 2 * n];
        let mut constraints = Vec::with_capacity(4 * n);

        for (i, row) in problem.rows.iter().enumerate() {
            let (v, d) = (2 * i, 2 * i + 1);
            objective[d] = 1.0;
            // d - v >= -t
            constraints.push(Constraint {
                coeffs: vec![(d, 1.0), (v, -1.0)],
                relation: Relation::Ge,
                rhs: -row.target,
            });
            // d + v >= t
            constraints.push(Constraint {
                coeffs: vec![(d, 1.0), (v, 1.0)],
                relation: Relation::Ge,
                rhs: row.target,
            });
            if row.lower > 0.0 {
                constraints.push(Constraint {
                    coeffs: vec![(v, 1.0)],
                    relation: Relation::Ge,
                    rhs: row.lower,
                });
            }
            constraints.push(Constraint {
                coeffs: vec![(v, 1.0)],
                relation: Relation::Le,
                rhs: row.upper,
            });
        }

        Self {
            num_vars: 2 * n,
            objective,
            constraints,
        }
    }
}

struct Tableau {
    /// `m` rows of `cols + 1` entries; the last entry is the right-hand side.
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    cols: usize,
    /// First artificial column; everything at or past it is artificial.
    first_artificial: usize,
}

impl Tableau {
    fn build(lp: &LinearProgram) -> Result<Self, SolveFailure> {
        let m = lp.constraints.len();
        let n = lp.num_vars;

        // After sign normalization every Ge row needs a surplus and an
        // artificial; every Le row needs only a slack.
        let mut normalized = Vec::with_capacity(m);
        for c in &lp.constraints {
            if !c.rhs.is_finite() || c.coeffs.iter().any(|(_, a)| !a.is_finite()) {
                return Err(SolveFailure::new(
                    SolverStatus::Error,
                    "non-finite coefficient in constraint",
                ));
            }
            if c.rhs < 0.0 {
                let flipped = match c.relation {
                    Relation::Le => Relation::Ge,
                    Relation::Ge => Relation::Le,
                };
                let coeffs = c.coeffs.iter().map(|&(j, a)| (j, -a)).collect();
                normalized.push((coeffs, flipped, -c.rhs));
            } else {
                normalized.push((c.coeffs.clone(), c.relation, c.rhs));
            }
        }

        let ge_rows = normalized.iter().filter(|(_, r, _)| *r == Relation::Ge).count();
        let first_artificial = n + m;
        let cols = first_artificial + ge_rows;

        let mut rows = Vec::with_capacity(m);
        let mut basis = Vec::with_capacity(m);
        let mut next_artificial = first_artificial;
        for (i, (coeffs, relation, rhs)) in normalized.into_iter().enumerate() {
            let mut row = vec![0.0; cols + 1];
            for (j, a) in coeffs {
                row[j] += a;
            }
            row[cols] = rhs;
            match relation {
                Relation::Le => {
                    row[n + i] = 1.0;
                    basis.push(n + i);
                }
                Relation::Ge => {
                    row[n + i] = -1.0;
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
            rows.push(row);
        }

        Ok(Self {
            rows,
            basis,
            cols,
            first_artificial,
        })
    }

    #[inline]
    fn rhs(&self, r: usize) -> f64 {
        self.rows[r][self.cols]
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let p = self.rows[r][c];
        for x in self.rows[r].iter_mut() {
            *x /= p;
        }
        let pivot_row = std::mem::take(&mut self.rows[r]);
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r {
                continue;
            }
            let f = row[c];
            if f == 0.0 {
                continue;
            }
            for (x, pv) in row.iter_mut().zip(&pivot_row) {
                *x -= f * pv;
                if x.abs() < EPS * 1e-3 {
                    *x = 0.0;
                }
            }
        }
        self.rows[r] = pivot_row;
        self.basis[r] = c;
    }

    fn reduced_costs(&self, cost: &[f64]) -> Vec<f64> {
        let mut rc = cost.to_vec();
        for (row, &b) in self.rows.iter().zip(&self.basis) {
            let cb = cost[b];
            if cb == 0.0 {
                continue;
            }
            for (r, a) in rc.iter_mut().zip(row) {
                *r -= cb * a;
            }
        }
        rc
    }

    /// Minimize `cost` over columns `< allowed`, pivoting until optimal.
    fn optimize(
        &mut self,
        cost: &[f64],
        allowed: usize,
        deadline: Deadline,
    ) -> Result<(), SolveFailure> {
        let limit = ITERATION_FACTOR * (self.rows.len() + self.cols).max(1);
        let mut degenerate_run = 0usize;

        for _ in 0..limit {
            if deadline.expired() {
                return Err(SolveFailure::time_limit());
            }

            let rc = self.reduced_costs(cost);
            let bland = degenerate_run >= DEGENERATE_LIMIT;
            let entering = if bland {
                (0..allowed).find(|&j| rc[j] < -EPS)
            } else {
                (0..allowed)
                    .filter(|&j| rc[j] < -EPS)
                    .min_by(|&a, &b| rc[a].total_cmp(&rc[b]))
            };
            let Some(c) = entering else {
                return Ok(());
            };

            // Min-ratio test, ties broken by smallest basic index.
            let mut leaving: Option<(usize, f64)> = None;
            for r in 0..self.rows.len() {
                let a = self.rows[r][c];
                if a <= EPS {
                    continue;
                }
                let ratio = self.rhs(r) / a;
                leaving = match leaving {
                    Some((best, best_ratio))
                        if ratio > best_ratio + EPS
                            || ((ratio - best_ratio).abs() <= EPS
                                && self.basis[r] > self.basis[best]) =>
                    {
                        Some((best, best_ratio))
                    }
                    _ => Some((r, ratio)),
                };
            }
            let Some((r, ratio)) = leaving else {
                return Err(SolveFailure::new(
                    SolverStatus::Unbounded,
                    format!("column {c} improves without limit"),
                ));
            };

            if ratio <= EPS {
                degenerate_run += 1;
            } else {
                degenerate_run = 0;
            }
            self.pivot(r, c);
        }

        Err(SolveFailure::new(
            SolverStatus::Error,
            format!("no convergence after {limit} pivots"),
        ))
    }

    /// Pivot basic artificials out wherever a real column can replace them.
    fn drive_out_artificials(&mut self) {
        for r in 0..self.rows.len() {
            if self.basis[r] < self.first_artificial {
                continue;
            }
            if let Some(c) = (0..self.first_artificial).find(|&j| self.rows[r][j].abs() > EPS) {
                self.pivot(r, c);
            }
            // otherwise the row is redundant and the artificial stays at zero
        }
    }
}

/// Solve a general LP. Returns the values of the structural variables.
pub(crate) fn solve_lp(lp: &LinearProgram, deadline: Deadline) -> Result<Vec<f64>, SolveFailure> {
    let mut t = Tableau::build(lp)?;

    // Phase 1: minimize the sum of artificials.
    if t.cols > t.first_artificial {
        let mut cost = vec![0.0; t.cols];
        for c in cost.iter_mut().skip(t.first_artificial) {
            *c = 1.0;
        }
        t.optimize(&cost, t.cols, deadline)?;

        let residual: f64 = (0..t.rows.len())
            .filter(|&r| t.basis[r] >= t.first_artificial)
            .map(|r| t.rhs(r))
            .sum();
        if residual > FEASIBILITY_TOL {
            return Err(SolveFailure::new(
                SolverStatus::Infeasible,
                format!("phase 1 residual {residual:.3e}"),
            ));
        }
        t.drive_out_artificials();
    }

    // Phase 2: real objective, artificials barred from entering.
    let mut cost = vec![0.0; t.cols];
    cost[..lp.num_vars].copy_from_slice(&lp.objective);
    t.optimize(&cost, t.first_artificial, deadline)?;

    let mut x = vec![0.0; lp.num_vars];
    for (r, &b) in t.basis.iter().enumerate() {
        if b < lp.num_vars {
            x[b] = t.rhs(r).max(0.0);
        }
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SolveFailure::new(SolverStatus::Error, "numeric breakdown"));
    }
    Ok(x)
}

/// General LP backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexSolver;

impl Solver for SimplexSolver {
    fn backend(&self) -> SolverBackend {
        SolverBackend::Simplex
    }

    fn solve(&self, problem: &Formulation, deadline: Deadline) -> Result<Solution, SolveFailure> {
        let lp = LinearProgram::from_formulation(problem);
        let x = solve_lp(&lp, deadline)?;
        let weights = (0..problem.len()).map(|i| x[2 * i]).collect();
        Ok(Solution::from_weights(problem, weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::solver::Row;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn textbook_lp() {
        // max 3x + 5y  s.t. x <= 4, 2y <= 12, 3x + 2y <= 18  →  (2, 6), 36
        let lp = LinearProgram {
            num_vars: 2,
            objective: vec![-3.0, -5.0],
            constraints: vec![
                Constraint { coeffs: vec![(0, 1.0)], relation: Relation::Le, rhs: 4.0 },
                Constraint { coeffs: vec![(1, 2.0)], relation: Relation::Le, rhs: 12.0 },
                Constraint {
                    coeffs: vec![(0, 3.0), (1, 2.0)],
                    relation: Relation::Le,
                    rhs: 18.0,
                },
            ],
        };
        let x = solve_lp(&lp, Deadline::never()).unwrap();
        assert!(close(x[0], 2.0));
        assert!(close(x[1], 6.0));
    }

    #[test]
    fn phase_one_with_ge_rows() {
        // min x + y  s.t. x + y >= 2, x >= 0.5
        let lp = LinearProgram {
            num_vars: 2,
            objective: vec![1.0, 1.0],
            constraints: vec![
                Constraint {
                    coeffs: vec![(0, 1.0), (1, 1.0)],
                    relation: Relation::Ge,
                    rhs: 2.0,
                },
                Constraint { coeffs: vec![(0, 1.0)], relation: Relation::Ge, rhs: 0.5 },
            ],
        };
        let x = solve_lp(&lp, Deadline::never()).unwrap();
        assert!(close(x[0] + x[1], 2.0));
        assert!(x[0] >= 0.5 - 1e-9);
    }

    #[test]
    fn detects_infeasible() {
        // x >= 2 and x <= 1
        let lp = LinearProgram {
            num_vars: 1,
            objective: vec![1.0],
            constraints: vec![
                Constraint { coeffs: vec![(0, 1.0)], relation: Relation::Ge, rhs: 2.0 },
                Constraint { coeffs: vec![(0, 1.0)], relation: Relation::Le, rhs: 1.0 },
            ],
        };
        let err = solve_lp(&lp, Deadline::never()).unwrap_err();
        assert_eq!(err.status, SolverStatus::Infeasible);
    }

    #[test]
    fn detects_unbounded() {
        // min -x  s.t. x >= 1
        let lp = LinearProgram {
            num_vars: 1,
            objective: vec![-1.0],
            constraints: vec![Constraint {
                coeffs: vec![(0, 1.0)],
                relation: Relation::Ge,
                rhs: 1.0,
            }],
        };
        let err = solve_lp(&lp, Deadline::never()).unwrap_err();
        assert_eq!(err.status, SolverStatus::Unbounded);
    }

    #[test]
    fn expired_deadline_is_time_limit() {
        let problem = Formulation::new(vec![Row { target: 0.5, lower: 0.4, upper: 0.6 }]);
        let err = SimplexSolver
            .solve(&problem, Deadline::after(std::time::Duration::ZERO))
            .unwrap_err();
        assert_eq!(err.status, SolverStatus::TimeLimit);
    }

    #[test]
    fn target_inside_band_is_exact() {
        let problem = Formulation::new(vec![
            Row { target: 0.30, lower: 0.25, upper: 0.35 },
            Row { target: 0.20, lower: 0.18, upper: 0.23 },
        ]);
        let s = SimplexSolver.solve(&problem, Deadline::never()).unwrap();
        assert!(close(s.weights[0], 0.30));
        assert!(close(s.weights[1], 0.20));
        assert!(close(s.objective, 0.0));
    }

    #[test]
    fn target_outside_band_snaps_to_edge() {
        let problem = Formulation::new(vec![
            Row { target: 0.5, lower: 0.6, upper: 0.8 },
            Row { target: 0.1, lower: -0.2, upper: 0.05 },
        ]);
        let s = SimplexSolver.solve(&problem, Deadline::never()).unwrap();
        assert!(close(s.weights[0], 0.6));
        assert!(close(s.weights[1], 0.05));
        assert!(close(s.objective, 0.15));
    }

    #[test]
    fn empty_problem() {
        let s = SimplexSolver
            .solve(&Formulation::default(), Deadline::never())
            .unwrap();
        assert!(s.weights.is_empty());
        assert_eq!(s.objective, 0.0);
    }
}
