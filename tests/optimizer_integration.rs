//! End-to-end optimizer scenarios: validate → optimize → check → trades.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use driftbook::optimize::pool::{OptimizationPool, OptimizationRequest};
use driftbook::{
    DriftBounds, DriftCalculator, EngineConfig, Holdings, InvestmentModel, OptimizationEngine,
    OptimizationError, Position, Prices, SecurityId, SolverBackend, SolverStatus, TargetPercentage,
    ValidationService,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TIMEOUT: Duration = Duration::from_secs(30);

fn aapl() -> SecurityId {
    SecurityId::parse("AAPL00000000000000000001").unwrap()
}
fn msft() -> SecurityId {
    SecurityId::parse("MSFT00000000000000000002").unwrap()
}
fn bond() -> SecurityId {
    SecurityId::parse("BOND00000000000000000003").unwrap()
}

fn model() -> InvestmentModel {
    let pos = |id, t, low, high| {
        Position::new(id, TargetPercentage::new(t).unwrap(), DriftBounds::new(low, high).unwrap())
    };
    InvestmentModel::new(
        "Core",
        vec![
            pos(aapl(), dec!(0.40), dec!(0.02), dec!(0.03)),
            pos(msft(), dec!(0.35), dec!(0.05), dec!(0.05)),
            pos(bond(), dec!(0.20), dec!(0.01), dec!(0.01)),
        ],
        vec!["P-1".into(), "P-2".into()],
    )
    .unwrap()
}

fn prices() -> Prices {
    Prices::from([(aapl(), dec!(187.50)), (msft(), dec!(412.30)), (bond(), dec!(98.75))])
}

fn engines() -> Vec<OptimizationEngine> {
    SolverBackend::available()
        .into_iter()
        .map(|b| OptimizationEngine::with_preference(ValidationService::new(), &[b]).unwrap())
        .collect()
}

// ============================================================================
// Full workflow
// ============================================================================

#[test]
fn workflow_from_drift_to_trades() {
    let mv = dec!(1000000);
    let current = Holdings::from([(aapl(), dec!(1000)), (msft(), dec!(1500)), (bond(), dec!(500))]);

    let calc = DriftCalculator::default();
    let drift = calc.calculate_portfolio_drift(&current, &prices(), mv, &model()).unwrap();
    assert!(calc.needs_rebalance(&drift));

    for engine in engines() {
        let result = engine
            .optimize_portfolio(&current, &model(), &prices(), mv, TIMEOUT)
            .unwrap();
        assert!(result.is_feasible());
        assert!(engine.validate_solution(&result, &model(), &prices(), mv));

        // 400_000 / 187.50 = 2133.33, 350_000 / 412.30 = 848.90, 200_000 / 98.75 = 2025.32
        let q = result.optimal_quantities();
        assert_eq!(q[&aapl()], dec!(2133));
        assert_eq!(q[&msft()], dec!(849));
        assert_eq!(q[&bond()], dec!(2025));
        // the relaxation hits every target exactly
        assert_eq!(result.objective_value(), Some(dec!(0)));

        let trades = calc.calculate_required_trades(&current, q);
        assert_eq!(trades[&aapl()], dec!(1133));
        assert_eq!(trades[&msft()], dec!(-651));
        assert_eq!(trades[&bond()], dec!(1525));

        // drift after trading is inside every band
        let after = calc.calculate_portfolio_drift(q, &prices(), mv, &model()).unwrap();
        assert!(!calc.needs_rebalance(&after));
    }
}

#[test]
fn trade_costs_use_commission_rate() {
    let calc = DriftCalculator::default();
    let trades = calc.calculate_required_trades(
        &Holdings::new(),
        &Holdings::from([(aapl(), dec!(100)), (bond(), dec!(200))]),
    );
    // (100 * 187.50 + 200 * 98.75) * 0.001
    let cost = calc
        .estimate_trade_costs(&trades, &prices(), EngineConfig::default().commission_rate)
        .unwrap();
    assert_eq!(cost, dec!(38.5));
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn time_limit_can_be_propagated_as_error() {
    for engine in engines() {
        let result = engine
            .optimize_portfolio(&Holdings::new(), &model(), &prices(), dec!(10000), Duration::ZERO)
            .unwrap();
        assert_eq!(result.solver_status(), SolverStatus::TimeLimit);
        let err = result.into_outcome().unwrap_err();
        assert!(matches!(err, OptimizationError::TimeLimit { .. }));
        assert_eq!(err.solver_status(), SolverStatus::TimeLimit);
    }
}

#[test]
fn bad_inputs_never_reach_the_solver() {
    let engine = OptimizationEngine::new(ValidationService::new()).unwrap();
    let negative = Holdings::from([(aapl(), dec!(-10))]);
    assert!(engine
        .optimize_portfolio(&negative, &model(), &prices(), dec!(10000), TIMEOUT)
        .unwrap_err()
        .is_validation());

    let mut free = prices();
    free.insert(bond(), Decimal::ZERO);
    assert!(engine
        .optimize_portfolio(&Holdings::new(), &model(), &free, dec!(10000), TIMEOUT)
        .unwrap_err()
        .is_validation());
}

#[test]
fn tiny_market_value_can_leave_bands_after_rounding() {
    // One share of MSFT is worth far more than its whole band at this size
    for engine in engines() {
        let result = engine
            .optimize_portfolio(&Holdings::new(), &model(), &prices(), dec!(1000), TIMEOUT)
            .unwrap();
        assert!(result.is_feasible());
        assert!(!engine.validate_solution(&result, &model(), &prices(), dec!(1000)));
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn engine_is_shareable_across_threads() {
    let engine = Arc::new(OptimizationEngine::new(ValidationService::new()).unwrap());
    let handles: Vec<_> = (1..=8u32)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mv = Decimal::from(i) * dec!(100000);
                let r = engine
                    .optimize_portfolio(&Holdings::new(), &model(), &prices(), mv, TIMEOUT)
                    .unwrap();
                let healthy = engine.check_solver_health();
                (r.is_feasible(), healthy)
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), (true, true));
    }
}

#[test]
fn pool_batch_matches_direct_calls() {
    let config = EngineConfig {
        workers: 4,
        ..EngineConfig::default()
    };
    let pool = OptimizationPool::from_config(&config).unwrap();
    let requests: Vec<_> = (1..=6u32)
        .map(|i| OptimizationRequest {
            current_positions: Holdings::new(),
            model: model(),
            prices: prices(),
            market_value: Decimal::from(i) * dec!(250000),
            timeout: Some(TIMEOUT),
        })
        .collect();

    let batch = pool.optimize_batch(&requests);
    for (req, got) in requests.iter().zip(batch) {
        let direct = pool
            .engine()
            .optimize_portfolio(
                &req.current_positions,
                &req.model,
                &req.prices,
                req.market_value,
                TIMEOUT,
            )
            .unwrap();
        assert_eq!(got.unwrap().optimal_quantities(), direct.optimal_quantities());
    }
}

#[test]
fn solver_info_is_static() {
    let engine = OptimizationEngine::new(ValidationService::new()).unwrap();
    let a = engine.get_solver_info();
    let b = engine.get_solver_info();
    assert_eq!(a, b);
    assert!(!a.supports_integer);
    assert_eq!(a.version, env!("CARGO_PKG_VERSION"));
}
