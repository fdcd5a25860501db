//! Drift analysis: how far current holdings sit from the model's targets.
//!
//! The calculator is independent of the optimizer. It reports per-position
//! drift, aggregates it, and produces the naive current → target share deltas
//! used to turn an optimizer result into trades.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::allocation::TargetPercentage;
use crate::error::{Error, Result};
use crate::model::InvestmentModel;
use crate::types::{Holdings, Prices, SecurityId, Trades, holding_value};
use crate::validation::ValidationService;

/// Commission rate used when the caller has no better estimate (10 bps).
pub const DEFAULT_COMMISSION_RATE: Decimal = dec!(0.001);

/// Drift of one modeled position. Transient, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DriftInfo {
    pub security_id: SecurityId,
    pub current_value: Decimal,
    pub target_value: Decimal,
    pub current_percentage: Decimal,
    pub target_percentage: Decimal,
    /// `current_percentage - target_percentage`
    pub drift_amount: Decimal,
    pub is_within_bounds: bool,
}

impl std::fmt::Display for DriftInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:>8.2}% -> {:>8.2}% (drift {:+.2}%) {}",
            self.security_id,
            self.current_percentage * dec!(100),
            self.target_percentage * dec!(100),
            self.drift_amount * dec!(100),
            if self.is_within_bounds { "ok" } else { "OUT" },
        )
    }
}

/// Computes drift reports and trade deltas.
#[derive(Clone, Copy, Debug, Default)]
pub struct DriftCalculator {
    validator: ValidationService,
}

impl DriftCalculator {
    pub fn new(validator: ValidationService) -> Self {
        Self { validator }
    }

    /// One [`DriftInfo`] per modeled position, in model order.
    ///
    /// Securities missing from `positions` are treated as zero holdings.
    pub fn calculate_portfolio_drift(
        &self,
        positions: &Holdings,
        prices: &Prices,
        market_value: Decimal,
        model: &InvestmentModel,
    ) -> Result<Vec<DriftInfo>> {
        self.validator
            .validate_optimization_inputs(positions, prices, market_value, model)?;

        model
            .positions()
            .iter()
            .map(|p| {
                let price = prices.get(p.key()).copied().ok_or_else(|| {
                    Error::validation(format!("missing price for modeled security {}", p.key()))
                })?;
                let qty = positions.get(p.key()).copied().unwrap_or(Decimal::ZERO);
                let current_value = holding_value(p.key(), qty, price)?;
                let current_percentage = current_value.checked_div(market_value).ok_or_else(|| {
                    Error::validation(format!(
                        "weight of {} in market value {market_value} is out of range",
                        p.key()
                    ))
                })?;
                let target_percentage = p.target().value();
                Ok(DriftInfo {
                    security_id: p.key().clone(),
                    current_value,
                    target_value: p.target().calculate_target_value(market_value),
                    current_percentage,
                    target_percentage,
                    drift_amount: current_percentage - target_percentage,
                    is_within_bounds: p.is_within_bounds(current_value, market_value),
                })
            })
            .collect()
    }

    /// `current_value / market_value - target`.
    pub fn calculate_position_drift(
        &self,
        current_value: Decimal,
        target: TargetPercentage,
        market_value: Decimal,
    ) -> Result<Decimal> {
        if market_value.is_zero() {
            return Err(Error::validation("market value must not be zero"));
        }
        Ok(current_value / market_value - target.value())
    }

    /// Sum of absolute drift amounts.
    pub fn calculate_total_drift(&self, infos: &[DriftInfo]) -> Decimal {
        infos.iter().map(|i| i.drift_amount.abs()).sum()
    }

    /// Positions whose value sits outside their drift band.
    pub fn get_positions_outside_bounds<'a>(&self, infos: &'a [DriftInfo]) -> Vec<&'a DriftInfo> {
        infos.iter().filter(|i| !i.is_within_bounds).collect()
    }

    /// `true` if any position is outside its band.
    pub fn needs_rebalance(&self, infos: &[DriftInfo]) -> bool {
        infos.iter().any(|i| !i.is_within_bounds)
    }

    /// Share deltas that move `current` to `target`.
    ///
    /// Covers the union of both key sets; absent keys count as zero and zero
    /// deltas are omitted.
    pub fn calculate_required_trades(&self, current: &Holdings, target: &Holdings) -> Trades {
        let mut trades = Trades::new();
        for id in current.keys().chain(target.keys()) {
            if trades.contains_key(id) {
                continue;
            }
            let delta = target.get(id).copied().unwrap_or(Decimal::ZERO)
                - current.get(id).copied().unwrap_or(Decimal::ZERO);
            if !delta.is_zero() {
                trades.insert(id.clone(), delta);
            }
        }
        trades
    }

    /// `Σ |qty| * price * commission_rate` over all trades.
    pub fn estimate_trade_costs(
        &self,
        trades: &Trades,
        prices: &Prices,
        commission_rate: Decimal,
    ) -> Result<Decimal> {
        trades.iter().try_fold(Decimal::ZERO, |acc, (id, qty)| {
            let price = prices.get(id).ok_or_else(|| {
                Error::validation(format!("missing price for traded security {id}"))
            })?;
            holding_value(id, qty.abs(), *price)?
                .checked_mul(commission_rate)
                .and_then(|cost| acc.checked_add(cost))
                .ok_or_else(|| Error::validation(format!("trade cost for {id} is out of range")))
        })
    }
}
