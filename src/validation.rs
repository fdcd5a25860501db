//! Stateless input/output validation for models, market data, and optimizer runs.
//!
//! Every check is a pure read over borrowed data. Failures carry a message
//! naming the offending rule and value.

use rust_decimal::Decimal;
use rustc_hash::FxHashSet;

use crate::allocation::is_target_step;
use crate::error::{Error, Result};
use crate::model::InvestmentModel;
use crate::optimize::OptimizationResult;
use crate::types::{Holdings, Prices, check_security_id, holding_value, is_integral};

/// Stateless validator.
///
/// Held by value by the optimization engine so the collaborator is explicit
/// rather than global.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Structural fields and every business rule of the model.
    pub fn validate_model(&self, model: &InvestmentModel) -> Result<()> {
        model.validate_all_business_rules()?;
        for p in model.positions() {
            self.validate_percentage_precision(p.target().value())?;
        }
        Ok(())
    }

    /// Inputs to `OptimizationEngine::optimize_portfolio`.
    ///
    /// Security ids are well-formed by construction of [`SecurityId`](crate::SecurityId).
    pub fn validate_optimization_inputs(
        &self,
        current_positions: &Holdings,
        prices: &Prices,
        market_value: Decimal,
        model: &InvestmentModel,
    ) -> Result<()> {
        check_market_value(market_value)?;
        check_quantities(current_positions)?;
        check_prices(prices)?;
        for p in model.positions() {
            if !prices.contains_key(p.key()) {
                return Err(Error::validation(format!(
                    "missing price for modeled security {}",
                    p.key()
                )));
            }
        }
        Ok(())
    }

    /// A price snapshot on its own.
    pub fn validate_market_data(&self, prices: &Prices) -> Result<()> {
        if prices.is_empty() {
            return Err(Error::validation("market data contains no prices"));
        }
        check_prices(prices)
    }

    /// A holdings snapshot and its market value.
    pub fn validate_portfolio_data(
        &self,
        positions: &Holdings,
        market_value: Decimal,
    ) -> Result<()> {
        check_market_value(market_value)?;
        check_quantities(positions)
    }

    /// Check a solved result against the model's drift bounds.
    ///
    /// Each modeled position's post-trade dollar value (`quantity * price`,
    /// zero if absent) must lie inside its band.
    pub fn validate_optimization_result(
        &self,
        result: &OptimizationResult,
        model: &InvestmentModel,
        prices: &Prices,
        market_value: Decimal,
    ) -> Result<()> {
        check_market_value(market_value)?;
        check_quantities(result.optimal_quantities())?;

        for p in model.positions() {
            let price = prices.get(p.key()).copied().ok_or_else(|| {
                Error::validation(format!("missing price for modeled security {}", p.key()))
            })?;
            let qty = result
                .optimal_quantities()
                .get(p.key())
                .copied()
                .unwrap_or(Decimal::ZERO);
            let value = holding_value(p.key(), qty, price)?;
            if !p.is_within_bounds(value, market_value) {
                let (low, high) = p.drift_range(market_value);
                return Err(Error::validation(format!(
                    "security {} value {value} is outside its drift range [{low}, {high}]",
                    p.key()
                )));
            }
        }
        Ok(())
    }

    /// Raw id strings: no duplicates, each exactly 24 alphanumeric characters.
    pub fn validate_security_ids(&self, ids: &[&str]) -> Result<()> {
        let mut seen = FxHashSet::default();
        for id in ids {
            check_security_id(id)?;
            if !seen.insert(*id) {
                return Err(Error::validation(format!("duplicate security id {id}")));
            }
        }
        Ok(())
    }

    /// `pct` must be an exact multiple of 0.005.
    pub fn validate_percentage_precision(&self, pct: Decimal) -> Result<()> {
        if !is_target_step(pct) {
            return Err(Error::validation(format!(
                "percentage {pct} is not a multiple of 0.005"
            )));
        }
        Ok(())
    }

    /// Compare the summed holding value against market value.
    ///
    /// Market value includes cash, so holdings may legitimately fall short of
    /// it; whether an excess beyond `tolerance` should be rejected is
    /// unresolved. No validation path calls this.
    pub fn check_market_value_consistency(
        &self,
        positions: &Holdings,
        prices: &Prices,
        market_value: Decimal,
        tolerance: Decimal,
    ) -> Result<()> {
        let held = positions
            .iter()
            .filter_map(|(id, qty)| prices.get(id).map(|price| (id, *qty, *price)))
            .try_fold(Decimal::ZERO, |acc, (id, qty, price)| {
                let value = holding_value(id, qty, price)?;
                acc.checked_add(value).ok_or_else(|| {
                    Error::validation(format!("total holding value overflows at {id}"))
                })
            })?;
        let ceiling = (Decimal::ONE + tolerance)
            .checked_mul(market_value)
            .ok_or_else(|| {
                Error::validation(format!("market value {market_value} is out of range"))
            })?;
        if held > ceiling {
            return Err(Error::validation(format!(
                "holdings worth {held} exceed market value {market_value} \
                 beyond tolerance {tolerance}"
            )));
        }
        Ok(())
    }
}

fn check_market_value(market_value: Decimal) -> Result<()> {
    if market_value <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "market value must be positive, got {market_value}"
        )));
    }
    Ok(())
}

fn check_quantities(positions: &Holdings) -> Result<()> {
    for (id, qty) in positions {
        if *qty < Decimal::ZERO {
            return Err(Error::validation(format!(
                "quantity for {id} must be non-negative, got {qty}"
            )));
        }
        if !is_integral(*qty) {
            return Err(Error::validation(format!(
                "quantity for {id} must be a whole number, got {qty}"
            )));
        }
    }
    Ok(())
}

fn check_prices(prices: &Prices) -> Result<()> {
    for (id, price) in prices {
        if *price <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "price for {id} must be positive, got {price}"
            )));
        }
    }
    Ok(())
}
