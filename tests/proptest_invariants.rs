//! Property-based tests for allocation, model, drift, and optimizer invariants.
//!
//! These tests use proptest to verify that key invariants hold
//! across randomly generated scenarios.

use std::time::Duration;

use driftbook::{
    DriftBounds, DriftCalculator, Holdings, InvestmentModel, OptimizationEngine, Position, Prices,
    SecurityId, SolverBackend, TargetPercentage, ValidationService,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn sid(i: usize) -> SecurityId {
    SecurityId::parse(&format!("PROP{i:020}")).unwrap()
}

/// `k * 0.005`
fn step(k: u32) -> Decimal {
    Decimal::from(k) * dec!(0.005)
}

/// A valid target on the 0.5% grid
fn target_strategy(max_steps: u32) -> impl Strategy<Value = TargetPercentage> {
    (0..=max_steps).prop_map(|k| TargetPercentage::new(step(k)).unwrap())
}

/// Non-degenerate drift bounds with low <= high, 0.5% to 10% per side
fn bounds_strategy() -> impl Strategy<Value = DriftBounds> {
    (1u32..=10, 0u32..=10)
        .prop_map(|(l, extra)| DriftBounds::new(step(l), step(l + extra)).unwrap())
}

/// A model with 1..=10 positions, each 0.5%..9.5%
fn model_strategy() -> impl Strategy<Value = InvestmentModel> {
    prop::collection::vec((1u32..=19, bounds_strategy()), 1..=10).prop_map(|specs| {
        let positions = specs
            .into_iter()
            .enumerate()
            .map(|(i, (k, b))| Position::new(sid(i), TargetPercentage::new(step(k)).unwrap(), b))
            .collect();
        InvestmentModel::new("Prop", positions, vec!["P".into()]).unwrap()
    })
}

#[derive(Clone, Debug)]
enum Op {
    Add(usize, u32),
    Update(usize, u32),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8, 0u32..=100).prop_map(|(i, k)| Op::Add(i, k)),
        (0usize..8, 0u32..=100).prop_map(|(i, k)| Op::Update(i, k)),
        (0usize..8).prop_map(Op::Remove),
    ]
}

fn position(i: usize, k: u32) -> Position {
    Position::new(
        sid(i),
        TargetPercentage::new(step(k)).unwrap(),
        DriftBounds::new(dec!(0.01), dec!(0.01)).unwrap(),
    )
}

fn holdings_strategy(n: usize) -> impl Strategy<Value = Holdings> {
    prop::collection::vec(0u32..=5_000, n).prop_map(|qtys| {
        qtys.into_iter()
            .enumerate()
            .map(|(i, q)| (sid(i), Decimal::from(q)))
            .collect()
    })
}

fn prices_for(model: &InvestmentModel, raw: &[u32]) -> Prices {
    model
        .positions()
        .iter()
        .zip(raw.iter().cycle())
        .map(|(p, &price)| (p.key().clone(), Decimal::from(price)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // ========================================================================
    // VALUE OBJECTS
    // ========================================================================

    /// Every grid value up to 95% is a valid target; displays round-trip
    #[test]
    fn grid_targets_are_valid(k in 0u32..=190) {
        let t = TargetPercentage::new(step(k)).unwrap();
        prop_assert_eq!(t.value(), step(k));
        prop_assert!(t.to_string().ends_with('%'));
    }

    /// Off-grid values are always rejected
    #[test]
    fn off_grid_targets_are_rejected(k in 0u32..=950) {
        prop_assume!(k % 5 != 0);
        let v = Decimal::from(k) * dec!(0.001);
        prop_assert!(TargetPercentage::new(v).unwrap_err().is_validation());
    }

    /// Bounds accept each side in [0, 1] with low <= high
    #[test]
    fn bounds_validity(low in 0u32..=1_200, high in 0u32..=1_200) {
        let milli = |v: u32| Decimal::from(v) * dec!(0.001);
        let result = DriftBounds::new(milli(low), milli(high));
        prop_assert_eq!(result.is_ok(), low <= high && high <= 1_000);
    }

    /// The drift range brackets the target value and is inclusive at both ends
    #[test]
    fn drift_range_brackets_target(
        t in target_strategy(190),
        b in bounds_strategy(),
        mv in 1u64..=10_000_000,
    ) {
        let mv = Decimal::from(mv);
        let (lo, hi) = b.calculate_drift_range(t, mv);
        let value = t.calculate_target_value(mv);
        prop_assert!(lo <= value && value <= hi);
        prop_assert!(b.is_within_bounds(lo, t, mv));
        prop_assert!(b.is_within_bounds(hi, t, mv));
    }

    // ========================================================================
    // MODEL INVARIANTS
    // ========================================================================

    /// No sequence of mutations can break the model's invariants
    #[test]
    fn mutations_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut model = InvestmentModel::new("Prop", vec![], vec!["P".into()]).unwrap();

        for op in ops {
            let before = model.to_record();
            let result = match op {
                Op::Add(i, k) => model.add_position(position(i, k)),
                Op::Update(i, k) => model.update_position(position(i, k)),
                Op::Remove(i) => model.remove_position(&sid(i)).map(|_| ()),
            };
            if result.is_err() {
                prop_assert_eq!(model.to_record(), before, "failed mutation changed the model");
            }

            prop_assert!(model.total_target() <= dec!(0.95));
            prop_assert!(model.active_position_count() <= 100);
            prop_assert!(model.validate_all_business_rules().is_ok());
        }
    }

    // ========================================================================
    // DRIFT
    // ========================================================================

    /// Applying the required trades to current holdings yields the target
    #[test]
    fn required_trades_reach_target(
        current in holdings_strategy(6),
        target in holdings_strategy(4),
    ) {
        let calc = DriftCalculator::default();
        let trades = calc.calculate_required_trades(&current, &target);

        prop_assert!(trades.values().all(|q| !q.is_zero()));
        for id in current.keys().chain(target.keys()) {
            let have = current.get(id).copied().unwrap_or_default();
            let want = target.get(id).copied().unwrap_or_default();
            let delta = trades.get(id).copied().unwrap_or_default();
            prop_assert_eq!(have + delta, want);
        }
    }

    /// Total drift does not depend on the order of the reports
    #[test]
    fn total_drift_is_order_invariant(
        model in model_strategy(),
        holdings in holdings_strategy(10),
        raw_prices in prop::collection::vec(1u32..=500, 10),
    ) {
        let calc = DriftCalculator::default();
        let prices = prices_for(&model, &raw_prices);
        let mut infos = calc
            .calculate_portfolio_drift(&holdings, &prices, dec!(1000000), &model)
            .unwrap();

        let forward = calc.calculate_total_drift(&infos);
        infos.reverse();
        prop_assert_eq!(forward, calc.calculate_total_drift(&infos));
        prop_assert!(forward >= Decimal::ZERO);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ========================================================================
    // OPTIMIZER
    // ========================================================================

    /// A feasible result always validates when one share is small against the band
    #[test]
    fn feasible_results_validate(
        model in model_strategy(),
        raw_prices in prop::collection::vec(1u32..=100, 10),
        mv in 100_000u64..=5_000_000,
    ) {
        let prices = prices_for(&model, &raw_prices);
        let mv = Decimal::from(mv);

        for backend in SolverBackend::available() {
            let engine =
                OptimizationEngine::with_preference(ValidationService::new(), &[backend]).unwrap();
            let result = engine
                .optimize_portfolio(&Holdings::new(), &model, &prices, mv, Duration::from_secs(10))
                .unwrap();
            prop_assert!(result.is_feasible());
            let whole = |q: &Decimal| *q >= Decimal::ZERO && q.fract().is_zero();
            prop_assert!(result.optimal_quantities().values().all(whole));
            prop_assert!(engine.validate_solution(&result, &model, &prices, mv));
        }
    }

    /// Both backends land on the same shares, up to a rounding tie
    #[test]
    fn backends_agree(
        model in model_strategy(),
        raw_prices in prop::collection::vec(1u32..=100, 10),
    ) {
        let prices = prices_for(&model, &raw_prices);
        let solve = |backend| {
            OptimizationEngine::with_preference(ValidationService::new(), &[backend])
                .unwrap()
                .optimize_portfolio(
                    &Holdings::new(),
                    &model,
                    &prices,
                    dec!(250000),
                    Duration::from_secs(10),
                )
                .unwrap()
        };
        let a = solve(SolverBackend::Simplex);
        let b = solve(SolverBackend::Separable);

        for (id, qa) in a.optimal_quantities() {
            let qb = b.optimal_quantities()[id];
            prop_assert!((*qa - qb).abs() <= Decimal::ONE, "{id}: {qa} vs {qb}");
        }
    }
}
