//! Drift reports and trade plans derived from core results.

use std::fmt;

use driftbook::{DriftCalculator, DriftInfo, Holdings, Prices, SecurityId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::Result;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

/// One line of a trade plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTrade {
    pub security_id: SecurityId,
    pub action: Action,
    /// Always positive; direction is in `action`.
    pub shares: Decimal,
    pub price: Decimal,
    pub notional: Decimal,
}

/// Trades that move current holdings onto the optimizer's quantities.
#[derive(Debug, Clone, Serialize)]
pub struct TradePlan {
    pub trades: Vec<PlannedTrade>,
    pub turnover: Decimal,
    pub estimated_cost: Decimal,
}

impl TradePlan {
    /// Sells first (they fund the buys), then buys; each group by security id.
    pub fn build(
        calc: &DriftCalculator,
        current: &Holdings,
        target: &Holdings,
        prices: &Prices,
        commission_rate: Decimal,
    ) -> Result<Self> {
        let deltas = calc.calculate_required_trades(current, target);
        let estimated_cost = calc
            .estimate_trade_costs(&deltas, prices, commission_rate)?
            .round_dp(2);

        let mut trades: Vec<PlannedTrade> = deltas
            .iter()
            .filter_map(|(id, qty)| {
                let price = *prices.get(id)?;
                let shares = qty.abs();
                Some(PlannedTrade {
                    security_id: id.clone(),
                    action: if qty.is_sign_negative() { Action::Sell } else { Action::Buy },
                    shares,
                    price,
                    notional: shares * price,
                })
            })
            .collect();
        trades.sort_by_key(|t| t.action == Action::Buy);

        let turnover = trades.iter().map(|t| t.notional).sum();
        Ok(Self {
            trades,
            turnover,
            estimated_cost,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

impl fmt::Display for TradePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.trades.is_empty() {
            return writeln!(f, "No trades needed.");
        }
        writeln!(f, "TRADE PLAN:")?;
        writeln!(
            f,
            "  {:>3}  {:6} {:24} {:>10} {:>12} {:>14}",
            "#", "Action", "Security", "Shares", "Price", "Notional"
        )?;
        for (i, t) in self.trades.iter().enumerate() {
            writeln!(
                f,
                "  {:>3}  {:6} {:24} {:>10} ${:>11.2} ${:>13.2}",
                i + 1,
                t.action.to_string(),
                t.security_id,
                t.shares,
                t.price,
                t.notional,
            )?;
        }
        writeln!(f, "\nTurnover: ${:.2}", self.turnover)?;
        writeln!(f, "Est. cost: ${:.2}", self.estimated_cost)
    }
}

/// Drift of every modeled position plus the portfolio totals.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub positions: Vec<DriftInfo>,
    pub total_drift: Decimal,
    pub outside_bounds: usize,
}

impl DriftReport {
    pub fn new(calc: &DriftCalculator, positions: Vec<DriftInfo>) -> Self {
        let total_drift = calc.calculate_total_drift(&positions);
        let outside_bounds = calc.get_positions_outside_bounds(&positions).len();
        Self {
            positions,
            total_drift,
            outside_bounds,
        }
    }

    pub fn needs_rebalance(&self) -> bool {
        self.outside_bounds > 0
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DRIFT:")?;
        for info in &self.positions {
            writeln!(f, "  {info}")?;
        }
        writeln!(
            f,
            "\nTotal drift: {:.2}%  ({} of {} outside bounds)",
            self.total_drift * dec!(100),
            self.outside_bounds,
            self.positions.len()
        )
    }
}
