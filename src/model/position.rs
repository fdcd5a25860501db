//! A single security's allocation within an investment model.

use rust_decimal::Decimal;

use crate::allocation::{DriftBounds, TargetPercentage};
use crate::types::SecurityId;

/// One security's target allocation and drift tolerance.
///
/// A position's identity is its security id. Two positions with the same id
/// are the same position even when their targets differ, which is what makes
/// `InvestmentModel::update_position` a replace. `Position` deliberately does
/// not implement `PartialEq`/`Hash`; collections index positions through
/// [`Position::key`].
#[derive(Clone, Debug)]
pub struct Position {
    security_id: SecurityId,
    target: TargetPercentage,
    drift_bounds: DriftBounds,
}

impl Position {
    pub fn new(
        security_id: SecurityId,
        target: TargetPercentage,
        drift_bounds: DriftBounds,
    ) -> Self {
        Self {
            security_id,
            target,
            drift_bounds,
        }
    }

    /// Natural key used for set/replace semantics.
    #[inline]
    pub fn key(&self) -> &SecurityId {
        &self.security_id
    }

    #[inline]
    pub fn security_id(&self) -> &SecurityId {
        &self.security_id
    }

    #[inline]
    pub fn target(&self) -> TargetPercentage {
        self.target
    }

    #[inline]
    pub fn drift_bounds(&self) -> DriftBounds {
        self.drift_bounds
    }

    /// `true` if the position carries a nonzero target.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.target.is_zero()
    }

    /// Acceptable dollar range for this position at `market_value`.
    pub fn drift_range(&self, market_value: Decimal) -> (Decimal, Decimal) {
        self.drift_bounds.calculate_drift_range(self.target, market_value)
    }

    /// `true` if a holding worth `value` is inside this position's band.
    pub fn is_within_bounds(&self, value: Decimal, market_value: Decimal) -> bool {
        self.drift_bounds.is_within_bounds(value, self.target, market_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(target: Decimal) -> Position {
        Position::new(
            SecurityId::parse("AAPL00000000000000000001").unwrap(),
            TargetPercentage::new(target).unwrap(),
            DriftBounds::new(dec!(0.02), dec!(0.03)).unwrap(),
        )
    }

    #[test]
    fn key_is_security_id() {
        let a = position(dec!(0.10));
        let b = position(dec!(0.30));
        assert_eq!(a.key(), b.key());
        assert_ne!(a.target(), b.target());
    }

    #[test]
    fn active_flag() {
        assert!(position(dec!(0.10)).is_active());
        assert!(!position(dec!(0)).is_active());
    }

    #[test]
    fn band_helpers() {
        let p = position(dec!(0.20));
        assert_eq!(p.drift_range(dec!(100000)), (dec!(18000), dec!(23000)));
        assert!(p.is_within_bounds(dec!(21000), dec!(100000)));
        assert!(!p.is_within_bounds(dec!(24000), dec!(100000)));
    }
}
