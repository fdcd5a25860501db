//! Investment models: the target allocation a portfolio is rebalanced toward.
//!
//! An [`InvestmentModel`] owns an ordered list of [`Position`]s and the set of
//! portfolios that follow it. Every mutation re-checks the invariants it could
//! break and leaves the model untouched on failure:
//!
//! - the sum of all targets is at most 95%,
//! - at most 100 positions carry a nonzero target,
//! - security ids are unique,
//! - the name is non-empty and at least one portfolio is attached.
//!
//! # Example
//!
//! ```
//! use driftbook::{DriftBounds, InvestmentModel, Position, SecurityId, TargetPercentage};
//! use rust_decimal_macros::dec;
//!
//! let aapl = Position::new(
//!     SecurityId::parse("AAPL00000000000000000001").unwrap(),
//!     TargetPercentage::new(dec!(0.40)).unwrap(),
//!     DriftBounds::new(dec!(0.02), dec!(0.03)).unwrap(),
//! );
//! let mut model = InvestmentModel::new("Growth", vec![aapl], vec!["P-1".into()]).unwrap();
//!
//! // A zero target removes the position
//! let cleared = Position::new(
//!     SecurityId::parse("AAPL00000000000000000001").unwrap(),
//!     TargetPercentage::ZERO,
//!     DriftBounds::new(dec!(0), dec!(0)).unwrap(),
//! );
//! model.update_position(cleared).unwrap();
//! assert!(model.positions().is_empty());
//! ```

pub mod position;
pub mod record;

pub use position::Position;
pub use record::{ModelRecord, PositionRecord};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use uuid::Uuid;

use crate::allocation::MAX_TARGET;
use crate::error::{Error, Result};
use crate::types::SecurityId;

/// Upper bound on the sum of all position targets.
pub const MAX_TOTAL_TARGET: Decimal = MAX_TARGET;

/// Upper bound on positions with a nonzero target.
pub const MAX_ACTIVE_POSITIONS: usize = 100;

/// Aggregate of positions, attached portfolios, and a version token.
///
/// Mutation takes `&mut self` and is not meant to be shared across writers;
/// the `version` is the baseline an external optimistic-locking check
/// compares against.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "ModelRecord", into = "ModelRecord")]
pub struct InvestmentModel {
    model_id: Uuid,
    name: String,
    positions: Vec<Position>,
    portfolios: Vec<String>,
    version: u32,
    last_rebalance_date: Option<DateTime<Utc>>,
}

impl InvestmentModel {
    /// Create a new model with a fresh id at version 1.
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Position>,
        portfolios: Vec<String>,
    ) -> Result<Self> {
        Self::with_id(Uuid::new_v4(), name, positions, portfolios)
    }

    /// Create a model with an explicit id at version 1.
    pub fn with_id(
        model_id: Uuid,
        name: impl Into<String>,
        positions: Vec<Position>,
        portfolios: Vec<String>,
    ) -> Result<Self> {
        let model = Self {
            model_id,
            name: name.into(),
            positions,
            portfolios,
            version: 1,
            last_rebalance_date: None,
        };
        model.validate_all_business_rules()?;
        Ok(model)
    }

    // === Queries ===

    #[inline]
    pub fn model_id(&self) -> Uuid {
        self.model_id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positions in insertion order.
    #[inline]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    #[inline]
    pub fn portfolios(&self) -> &[String] {
        &self.portfolios
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn last_rebalance_date(&self) -> Option<DateTime<Utc>> {
        self.last_rebalance_date
    }

    /// Look up a position by security id.
    pub fn position(&self, security_id: &SecurityId) -> Option<&Position> {
        self.positions.iter().find(|p| p.key() == security_id)
    }

    /// Sum of all position targets.
    pub fn total_target(&self) -> Decimal {
        self.positions.iter().map(|p| p.target().value()).sum()
    }

    /// Fraction of market value the model leaves in cash.
    pub fn cash_target(&self) -> Decimal {
        Decimal::ONE - self.total_target()
    }

    /// Number of positions with a nonzero target.
    pub fn active_position_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_active()).count()
    }

    /// Persisted form of this model.
    pub fn to_record(&self) -> ModelRecord {
        ModelRecord::from(self)
    }

    // === Position mutation ===

    /// Append a position.
    ///
    /// Fails with a business-rule error if the security is already modeled or
    /// if the projected target sum or active count would exceed its limit.
    pub fn add_position(&mut self, position: Position) -> Result<()> {
        if self.index_of(position.key()).is_some() {
            return Err(Error::business_rule(format!(
                "security {} is already in model '{}'",
                position.key(),
                self.name
            )));
        }

        let projected_total = self.total_target() + position.target().value();
        check_total_target(projected_total)?;

        if position.is_active() {
            check_active_count(self.active_position_count() + 1)?;
        }

        self.positions.push(position);
        Ok(())
    }

    /// Replace the position with the same security id.
    ///
    /// A zero target removes the position instead of storing it. Updating a
    /// security that is not modeled is a validation error.
    pub fn update_position(&mut self, position: Position) -> Result<()> {
        let idx = self.index_of(position.key()).ok_or_else(|| {
            Error::validation(format!(
                "security {} is not in model '{}'",
                position.key(),
                self.name
            ))
        })?;

        if !position.is_active() {
            self.positions.remove(idx);
            return Ok(());
        }

        let existing = &self.positions[idx];
        let projected_total =
            self.total_target() - existing.target().value() + position.target().value();
        check_total_target(projected_total)?;

        if !existing.is_active() {
            check_active_count(self.active_position_count() + 1)?;
        }

        self.positions[idx] = position;
        Ok(())
    }

    /// Remove and return the position for `security_id`.
    pub fn remove_position(&mut self, security_id: &SecurityId) -> Result<Position> {
        let idx = self.index_of(security_id).ok_or_else(|| {
            Error::validation(format!(
                "security {security_id} is not in model '{}'",
                self.name
            ))
        })?;
        Ok(self.positions.remove(idx))
    }

    // === Portfolio mutation ===

    /// Attach a portfolio to this model.
    pub fn add_portfolio(&mut self, portfolio_id: impl Into<String>) -> Result<()> {
        let portfolio_id = portfolio_id.into();
        if portfolio_id.trim().is_empty() {
            return Err(Error::validation("portfolio id must not be empty"));
        }
        if self.portfolios.contains(&portfolio_id) {
            return Err(Error::business_rule(format!(
                "portfolio {portfolio_id} is already attached to model '{}'",
                self.name
            )));
        }
        self.portfolios.push(portfolio_id);
        Ok(())
    }

    /// Detach a portfolio. The last portfolio cannot be removed.
    pub fn remove_portfolio(&mut self, portfolio_id: &str) -> Result<()> {
        let idx = self
            .portfolios
            .iter()
            .position(|p| p == portfolio_id)
            .ok_or_else(|| {
                Error::validation(format!(
                    "portfolio {portfolio_id} is not attached to model '{}'",
                    self.name
                ))
            })?;
        if self.portfolios.len() == 1 {
            return Err(Error::business_rule(format!(
                "model '{}' must keep at least one portfolio",
                self.name
            )));
        }
        self.portfolios.remove(idx);
        Ok(())
    }

    // === Invariants ===

    /// Re-check every model invariant. Called before persisting.
    pub fn validate_all_business_rules(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("model name must not be empty"));
        }
        if self.version < 1 {
            return Err(Error::validation(format!(
                "model version must be >= 1, got {}",
                self.version
            )));
        }

        if self.portfolios.is_empty() {
            return Err(Error::business_rule(format!(
                "model '{}' must have at least one portfolio",
                self.name
            )));
        }
        let mut seen_portfolios = FxHashSet::default();
        for p in &self.portfolios {
            if p.trim().is_empty() {
                return Err(Error::validation("portfolio id must not be empty"));
            }
            if !seen_portfolios.insert(p.as_str()) {
                return Err(Error::business_rule(format!(
                    "duplicate portfolio {p} in model '{}'",
                    self.name
                )));
            }
        }

        let mut seen = FxHashSet::default();
        for p in &self.positions {
            if !seen.insert(p.key()) {
                return Err(Error::business_rule(format!(
                    "duplicate security {} in model '{}'",
                    p.key(),
                    self.name
                )));
            }
        }

        check_total_target(self.total_target())?;
        check_active_count(self.active_position_count())?;
        Ok(())
    }

    // === Persistence hooks ===

    /// Bump the version after a successful persisted write.
    ///
    /// Only the writer that completed the update calls this.
    pub fn increment_version(&mut self) -> u32 {
        self.version += 1;
        self.version
    }

    /// Record when the model was last rebalanced.
    pub fn update_last_rebalance_date(&mut self, at: DateTime<Utc>) {
        self.last_rebalance_date = Some(at);
    }

    pub(crate) fn restore_persisted_state(
        &mut self,
        version: u32,
        last_rebalance_date: Option<DateTime<Utc>>,
    ) {
        self.version = version;
        self.last_rebalance_date = last_rebalance_date;
    }

    fn index_of(&self, security_id: &SecurityId) -> Option<usize> {
        self.positions.iter().position(|p| p.key() == security_id)
    }
}

fn check_total_target(total: Decimal) -> Result<()> {
    if total > MAX_TOTAL_TARGET {
        return Err(Error::business_rule(format!(
            "total target {total} exceeds the {MAX_TOTAL_TARGET} limit"
        )));
    }
    Ok(())
}

fn check_active_count(count: usize) -> Result<()> {
    if count > MAX_ACTIVE_POSITIONS {
        return Err(Error::business_rule(format!(
            "{count} positions with a nonzero target exceeds the limit of {MAX_ACTIVE_POSITIONS}"
        )));
    }
    Ok(())
}
