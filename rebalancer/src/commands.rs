//! Command implementations: load inputs → run the core → print → audit.

use std::path::Path;
use std::time::Duration;

use driftbook::{DriftCalculator, InvestmentModel, OptimizationEngine, ValidationService};
use log::{info, warn};

use crate::audit::{self, AuditLog};
use crate::book::{self, Book};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::report::{DriftReport, TradePlan};

/// Check a model file against every structural and business rule.
pub fn validate(model_path: &Path) -> Result<InvestmentModel> {
    let model = book::load_model(model_path)?;
    ValidationService::new().validate_model(&model)?;

    println!(
        "Model '{}' ({}) v{}: OK",
        model.name(),
        model.model_id(),
        model.version()
    );
    println!(
        "  {} positions ({} active), {:.1}% invested, {:.1}% cash, {} portfolio(s)",
        model.positions().len(),
        model.active_position_count(),
        model.total_target() * rust_decimal::Decimal::ONE_HUNDRED,
        model.cash_target() * rust_decimal::Decimal::ONE_HUNDRED,
        model.portfolios().len(),
    );
    Ok(model)
}

/// Report drift of the book against the model.
pub fn drift(config: &Config, model_path: &Path, book_path: &Path) -> Result<DriftReport> {
    let model = book::load_model(model_path)?;
    let book = Book::load(book_path)?;

    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, "drift", &model)?;

    let calc = DriftCalculator::new(ValidationService::new());
    let infos =
        calc.calculate_portfolio_drift(&book.positions, &book.prices, book.market_value, &model)?;
    let report = DriftReport::new(&calc, infos);

    print!("{report}");
    if report.needs_rebalance() {
        println!("\nRebalance recommended.");
    } else {
        println!("\nAll positions within bounds.");
    }

    audit::log_drift(&mut audit, &report)?;
    audit::log_run_completed(&mut audit, "drift", true)?;
    Ok(report)
}

/// Optimize the model against the book and print the resulting trade plan.
///
/// Returns `None` when the solver found no solution within its budget.
pub fn optimize(
    config: &Config,
    model_path: &Path,
    book_path: &Path,
    timeout: Option<Duration>,
) -> Result<Option<TradePlan>> {
    let model = book::load_model(model_path)?;
    let book = Book::load(book_path)?;

    let mut audit = AuditLog::open(&config.audit_path())?;
    audit::log_run_started(&mut audit, "optimize", &model)?;

    let engine = OptimizationEngine::with_config(ValidationService::new(), &config.engine)?;
    let timeout = timeout.unwrap_or_else(|| engine.default_timeout());
    info!("optimizing with {} backend, timeout {timeout:?}", engine.backend());

    let result = engine.optimize_portfolio(
        &book.positions,
        &model,
        &book.prices,
        book.market_value,
        timeout,
    )?;
    audit::log_optimization(&mut audit, &result)?;

    if !result.is_feasible() {
        warn!("no solution: {}", result.solver_status());
        println!(
            "No solution ({}) after {:.3}s.",
            result.solver_status(),
            result.solve_time().as_secs_f64()
        );
        audit::log_run_completed(&mut audit, "optimize", false)?;
        return Ok(None);
    }

    println!(
        "Solved in {:.3}ms, objective ${:.2}{}",
        result.solve_time().as_secs_f64() * 1e3,
        result.objective_value().unwrap_or_default(),
        if engine.validate_solution(&result, &model, &book.prices, book.market_value) {
            ""
        } else {
            " (rounding left a position outside its band)"
        }
    );

    let calc = DriftCalculator::new(*engine.validator());
    let plan = TradePlan::build(
        &calc,
        &book.positions,
        result.optimal_quantities(),
        &book.prices,
        config.engine.commission_rate,
    )?;
    println!();
    print!("{plan}");

    audit::log_plan(&mut audit, &plan)?;
    audit::log_run_completed(&mut audit, "optimize", true)?;
    Ok(Some(plan))
}

/// Run the solver self-test on every preferred backend that is compiled in.
pub fn health(config: &Config) -> Result<()> {
    let mut checked = 0;
    for &backend in &config.engine.solver_preference {
        if !backend.is_available() {
            println!("  {backend:10} not compiled in");
            continue;
        }
        let engine = OptimizationEngine::with_preference(ValidationService::new(), &[backend])?;
        checked += 1;
        if engine.check_solver_health() {
            println!("  {backend:10} OK");
        } else {
            println!("  {backend:10} FAILED");
            return Err(Error::Unhealthy(backend));
        }
    }
    if checked == 0 {
        return Err(driftbook::Error::from(driftbook::OptimizationError::SolverUnavailable).into());
    }

    let engine = OptimizationEngine::with_config(ValidationService::new(), &config.engine)?;
    let info = engine.get_solver_info();
    println!(
        "Solver {} v{} (active: {}, integer: {})",
        info.name, info.version, info.backend, info.supports_integer
    );
    Ok(())
}
