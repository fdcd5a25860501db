//! Rebalancing optimizer.
//!
//! Solves the continuous relaxation of the rebalancing problem
//!
//! ```text
//! minimize   Σ d_i
//! subject to q_i >= 0
//!            d_i >=   q_i·price_i - MV·target_i
//!            d_i >= -(q_i·price_i - MV·target_i)
//!            MV·(target_i - low_i) <= q_i·price_i <= MV·(target_i + high_i)
//! ```
//!
//! and rounds the continuous quantities to whole shares. Backends work in
//! `f64` on rows normalized by market value; everything returned to callers
//! is `Decimal`.
//!
//! # Example
//!
//! ```
//! use driftbook::{
//!     DriftBounds, Holdings, InvestmentModel, OptimizationEngine, Position, Prices,
//!     SecurityId, TargetPercentage, ValidationService,
//! };
//! use rust_decimal_macros::dec;
//! use std::time::Duration;
//!
//! let id = SecurityId::parse("AAPL00000000000000000001").unwrap();
//! let model = InvestmentModel::new(
//!     "Growth",
//!     vec![Position::new(
//!         id.clone(),
//!         TargetPercentage::new(dec!(0.60)).unwrap(),
//!         DriftBounds::new(dec!(0.05), dec!(0.05)).unwrap(),
//!     )],
//!     vec!["PORTFOLIO-1".into()],
//! )
//! .unwrap();
//! let prices = Prices::from([(id.clone(), dec!(150))]);
//!
//! let engine = OptimizationEngine::new(ValidationService::new()).unwrap();
//! let result = engine
//!     .optimize_portfolio(&Holdings::new(), &model, &prices, dec!(100000), Duration::from_secs(5))
//!     .unwrap();
//!
//! assert!(result.is_feasible());
//! assert_eq!(result.optimal_quantities()[&id], dec!(400));
//! assert!(engine.validate_solution(&result, &model, &prices, dec!(100000)));
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{Error, OptimizationError, Result, SolverStatus};
use crate::model::InvestmentModel;
use crate::types::{Holdings, Prices, SecurityId};
use crate::validation::ValidationService;

#[cfg(feature = "parallel")]
pub mod pool;
#[cfg(feature = "separable")]
mod separable;
#[cfg(feature = "simplex")]
mod simplex;
pub mod solver;

#[cfg(feature = "separable")]
pub use separable::SeparableSolver;
#[cfg(feature = "simplex")]
pub use simplex::SimplexSolver;
pub use solver::{Deadline, Formulation, Row, SolveFailure, Solution, Solver, SolverBackend};

/// Budget for the built-in self-test.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_CHECK_ID: &str = "HEALTHCHECK0000000000000";

// ============================================================================
// Result
// ============================================================================

/// Outcome of one optimization.
///
/// `Infeasible` and `TimeLimit` are ordinary outcomes and come back as a
/// result with `is_feasible() == false`; use [`into_outcome`](Self::into_outcome)
/// to turn them into errors instead.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationResult {
    optimal_quantities: BTreeMap<SecurityId, Decimal>,
    objective_value: Option<Decimal>,
    solver_status: SolverStatus,
    solve_time: Duration,
    is_feasible: bool,
}

impl OptimizationResult {
    /// A solved result. `objective_value` is the total absolute dollar deviation.
    pub fn feasible(
        optimal_quantities: BTreeMap<SecurityId, Decimal>,
        objective_value: Decimal,
        solver_status: SolverStatus,
        solve_time: Duration,
    ) -> Self {
        Self {
            optimal_quantities,
            objective_value: Some(objective_value),
            solver_status,
            solve_time,
            is_feasible: true,
        }
    }

    /// An unsolved result: no quantities, no objective.
    pub fn infeasible(solver_status: SolverStatus, solve_time: Duration) -> Self {
        Self {
            optimal_quantities: BTreeMap::new(),
            objective_value: None,
            solver_status,
            solve_time,
            is_feasible: false,
        }
    }

    /// Whole-share target quantity per modeled security.
    pub fn optimal_quantities(&self) -> &BTreeMap<SecurityId, Decimal> {
        &self.optimal_quantities
    }

    pub fn into_quantities(self) -> BTreeMap<SecurityId, Decimal> {
        self.optimal_quantities
    }

    pub fn objective_value(&self) -> Option<Decimal> {
        self.objective_value
    }

    pub fn solver_status(&self) -> SolverStatus {
        self.solver_status
    }

    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }

    pub fn is_feasible(&self) -> bool {
        self.is_feasible
    }

    /// `Ok(self)` if feasible, otherwise the matching [`OptimizationError`].
    pub fn into_outcome(self) -> std::result::Result<Self, OptimizationError> {
        if self.is_feasible {
            return Ok(self);
        }
        let solve_time = self.solve_time;
        Err(match self.solver_status {
            SolverStatus::TimeLimit => OptimizationError::TimeLimit { solve_time },
            SolverStatus::Infeasible => OptimizationError::Infeasible { solve_time },
            status => OptimizationError::Failed {
                status,
                solve_time,
                reason: "no solution".into(),
            },
        })
    }
}

/// Static description of the engine's solver.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolverInfo {
    pub name: &'static str,
    pub backend: SolverBackend,
    pub available_backends: Vec<SolverBackend>,
    pub supports_continuous: bool,
    pub supports_integer: bool,
    pub version: &'static str,
}

// ============================================================================
// Engine
// ============================================================================

/// Computes whole-share target quantities for an [`InvestmentModel`].
///
/// The engine is immutable after construction and `Sync`; one instance can
/// serve concurrent callers. Each call is an independent solve.
#[derive(Debug)]
pub struct OptimizationEngine {
    validator: ValidationService,
    solver: Box<dyn Solver>,
    default_timeout: Duration,
}

impl OptimizationEngine {
    /// Engine using the default backend preference.
    pub fn new(validator: ValidationService) -> Result<Self> {
        Self::with_config(validator, &EngineConfig::default())
    }

    pub fn with_config(validator: ValidationService, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let solver = SolverBackend::select(&config.solver_preference)
            .ok_or(OptimizationError::SolverUnavailable)?;
        debug!("optimization engine using {} backend", solver.backend());
        Ok(Self {
            validator,
            solver,
            default_timeout: config.timeout(),
        })
    }

    /// First available backend in `preference`, default timeout.
    pub fn with_preference(
        validator: ValidationService,
        preference: &[SolverBackend],
    ) -> Result<Self> {
        let config = EngineConfig {
            solver_preference: preference.to_vec(),
            ..EngineConfig::default()
        };
        Self::with_config(validator, &config)
    }

    pub fn backend(&self) -> SolverBackend {
        self.solver.backend()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn validator(&self) -> &ValidationService {
        &self.validator
    }

    /// Solve for target quantities of every modeled security.
    ///
    /// Inputs are validated first. `current_positions` only takes part in
    /// validation: the optimum depends on targets, bands, and prices alone.
    /// Running out of `timeout` returns an infeasible `TimeLimit` result.
    pub fn optimize_portfolio(
        &self,
        current_positions: &Holdings,
        target_model: &InvestmentModel,
        prices: &Prices,
        market_value: Decimal,
        timeout: Duration,
    ) -> Result<OptimizationResult> {
        self.validator.validate_model(target_model)?;
        self.validator
            .validate_optimization_inputs(current_positions, prices, market_value, target_model)?;

        let problem = Problem::from_model(target_model, prices, market_value)?;
        debug!(
            "optimizing model {} ({} positions, MV {market_value}) with {}",
            target_model.model_id(),
            problem.ids.len(),
            self.solver.backend()
        );

        let result = self.solve(&problem, timeout)?;
        if result.is_feasible() {
            if let Err(e) = self.validator.validate_optimization_result(
                &result,
                target_model,
                prices,
                market_value,
            ) {
                warn!(
                    "rounded solution for model {} leaves its bands: {e}",
                    target_model.model_id()
                );
            }
            info!(
                "model {} optimized: objective {} in {:.3}ms",
                target_model.model_id(),
                result.objective_value().unwrap_or_default(),
                result.solve_time().as_secs_f64() * 1e3
            );
        } else {
            info!(
                "model {} not solved: {} after {:.3}ms",
                target_model.model_id(),
                result.solver_status(),
                result.solve_time().as_secs_f64() * 1e3
            );
        }
        Ok(result)
    }

    /// `true` if `solution` is feasible and every position lands in its band.
    pub fn validate_solution(
        &self,
        solution: &OptimizationResult,
        model: &InvestmentModel,
        prices: &Prices,
        market_value: Decimal,
    ) -> bool {
        solution.is_feasible()
            && self
                .validator
                .validate_optimization_result(solution, model, prices, market_value)
                .is_ok()
    }

    /// Solve a fixed one-security problem with a known optimum.
    ///
    /// Price 10, MV 1000, target 50% with band [60%, 80%]: the optimum holds
    /// 60 shares at a $100 deviation.
    pub fn check_solver_health(&self) -> bool {
        let problem = match Problem::health_check() {
            Ok(p) => p,
            Err(e) => {
                error!("health check problem could not be built: {e}");
                return false;
            }
        };
        match self.solve(&problem, HEALTH_CHECK_TIMEOUT) {
            Ok(r) if r.is_feasible() => {
                let qty = problem
                    .ids
                    .first()
                    .and_then(|id| r.optimal_quantities().get(id))
                    .copied();
                let healthy = qty == Some(Decimal::from(60))
                    && r.objective_value() == Some(Decimal::from(100));
                if !healthy {
                    warn!(
                        "solver health check returned q={qty:?} objective={:?}",
                        r.objective_value()
                    );
                }
                healthy
            }
            Ok(r) => {
                warn!("solver health check not solved: {}", r.solver_status());
                false
            }
            Err(e) => {
                warn!("solver health check failed: {e}");
                false
            }
        }
    }

    pub fn get_solver_info(&self) -> SolverInfo {
        SolverInfo {
            name: "driftbook-lp",
            backend: self.solver.backend(),
            available_backends: SolverBackend::available(),
            supports_continuous: true,
            supports_integer: false,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    fn solve(&self, problem: &Problem, timeout: Duration) -> Result<OptimizationResult> {
        let start = Instant::now();
        let outcome = self
            .solver
            .solve(&problem.formulation, Deadline::after(timeout));
        let solve_time = start.elapsed();

        match outcome {
            Ok(solution) => Ok(problem.recover(&solution, solve_time)?),
            Err(f) if f.status.is_expected_failure() => {
                debug!("solve ended without a solution: {f}");
                Ok(OptimizationResult::infeasible(f.status, solve_time))
            }
            Err(f) => {
                error!("solver failure: {f}");
                Err(OptimizationError::Failed {
                    status: SolverStatus::Error,
                    solve_time,
                    reason: f.to_string(),
                }
                .into())
            }
        }
    }
}

// ============================================================================
// Problem construction and recovery
// ============================================================================

/// A formulation together with what is needed to map weights back to shares.
struct Problem {
    ids: Vec<SecurityId>,
    prices: Vec<Decimal>,
    market_value: Decimal,
    formulation: Formulation,
}

impl Problem {
    fn from_model(model: &InvestmentModel, prices: &Prices, market_value: Decimal) -> Result<Self> {
        let n = model.positions().len();
        let mut problem = Problem {
            ids: Vec::with_capacity(n),
            prices: Vec::with_capacity(n),
            market_value,
            formulation: Formulation::new(Vec::with_capacity(n)),
        };
        for p in model.positions() {
            let price = prices.get(p.key()).copied().ok_or_else(|| {
                Error::validation(format!("missing price for modeled security {}", p.key()))
            })?;
            let target = p.target().value();
            let bounds = p.drift_bounds();
            problem.push(
                p.key().clone(),
                price,
                target,
                target - bounds.low_drift(),
                target + bounds.high_drift(),
            )?;
        }
        Ok(problem)
    }

    fn health_check() -> Result<Self> {
        let mut problem = Problem {
            ids: Vec::with_capacity(1),
            prices: Vec::with_capacity(1),
            market_value: Decimal::from(1000),
            formulation: Formulation::default(),
        };
        problem.push(
            SecurityId::parse(HEALTH_CHECK_ID)?,
            Decimal::from(10),
            Decimal::new(5, 1),
            Decimal::new(6, 1),
            Decimal::new(8, 1),
        )?;
        Ok(problem)
    }

    fn push(
        &mut self,
        id: SecurityId,
        price: Decimal,
        target: Decimal,
        lower: Decimal,
        upper: Decimal,
    ) -> Result<()> {
        let as_f64 = |d: Decimal| {
            d.to_f64()
                .ok_or_else(|| Error::validation(format!("{d} has no f64 representation")))
        };
        self.formulation.rows.push(Row {
            target: as_f64(target)?,
            lower: as_f64(lower)?,
            upper: as_f64(upper)?,
        });
        self.ids.push(id);
        self.prices.push(price);
        Ok(())
    }

    /// Map solver weights back to whole shares and the objective to dollars.
    fn recover(
        &self,
        solution: &Solution,
        solve_time: Duration,
    ) -> std::result::Result<OptimizationResult, OptimizationError> {
        let fail = |reason: String| OptimizationError::Failed {
            status: SolverStatus::Error,
            solve_time,
            reason,
        };

        let mut quantities = BTreeMap::new();
        for ((id, price), &w) in self.ids.iter().zip(&self.prices).zip(&solution.weights) {
            let weight = to_decimal(w).ok_or_else(|| fail(format!("weight {w} for {id}")))?;
            let shares = weight
                .checked_mul(self.market_value)
                .and_then(|v| v.checked_div(*price))
                .ok_or_else(|| fail(format!("share count for {id} overflows")))?;
            quantities.insert(id.clone(), round_shares(shares));
        }

        let objective = to_decimal(solution.objective)
            .and_then(|o| o.checked_mul(self.market_value))
            .ok_or_else(|| fail(format!("objective {}", solution.objective)))?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        Ok(OptimizationResult::feasible(
            quantities,
            objective,
            SolverStatus::Optimal,
            solve_time,
        ))
    }
}

/// The only place solver floats become decimals. Non-finite input is `None`.
fn to_decimal(x: f64) -> Option<Decimal> {
    if !x.is_finite() {
        return None;
    }
    Decimal::from_f64(x)
}

/// Round half away from zero to whole shares, never below zero.
fn round_shares(shares: Decimal) -> Decimal {
    shares
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ZERO)
}
