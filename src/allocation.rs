//! Allocation value objects: target percentages and drift tolerance bands.
//!
//! Both types are immutable and validated on construction; an invalid value
//! can never be observed.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{Error, Result};

/// Largest allowed target for a single position (and for the model total).
pub const MAX_TARGET: Decimal = dec!(0.95);

/// Granularity of target percentages: 0.5%.
pub const TARGET_STEP: Decimal = dec!(0.005);

/// Desired fraction of market value for one security.
///
/// Valid values are `0` or multiples of `0.005` in `[0, 0.95]`.
///
/// ```
/// use driftbook::TargetPercentage;
/// use rust_decimal_macros::dec;
///
/// let t = TargetPercentage::new(dec!(0.125)).unwrap();
/// assert_eq!(t.to_string(), "12.5%");
/// assert!(TargetPercentage::new(dec!(0.127)).is_err());
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TargetPercentage(Decimal);

impl TargetPercentage {
    pub const ZERO: TargetPercentage = TargetPercentage(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO || value > MAX_TARGET {
            return Err(Error::validation(format!(
                "target percentage {value} must be between 0 and {MAX_TARGET}"
            )));
        }
        if !is_target_step(value) {
            return Err(Error::validation(format!(
                "target percentage {value} must be 0 or a multiple of {TARGET_STEP}"
            )));
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn value(self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Dollar value this target represents for a portfolio of `market_value`.
    pub fn calculate_target_value(self, market_value: Decimal) -> Decimal {
        market_value * self.0
    }
}

/// `true` if `value` is zero or an exact multiple of [`TARGET_STEP`].
pub(crate) fn is_target_step(value: Decimal) -> bool {
    value.is_zero() || (value % TARGET_STEP).is_zero()
}

impl TryFrom<Decimal> for TargetPercentage {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TargetPercentage> for Decimal {
    fn from(t: TargetPercentage) -> Self {
        t.0
    }
}

impl fmt::Display for TargetPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * dec!(100)).normalize())
    }
}

/// Asymmetric tolerance band around a target, as fractions of market value.
///
/// A position is acceptable while its value stays within
/// `[target_value - mv * low_drift, target_value + mv * high_drift]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawBounds", into = "RawBounds")]
pub struct DriftBounds {
    low_drift: Decimal,
    high_drift: Decimal,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RawBounds {
    low_drift: Decimal,
    high_drift: Decimal,
}

impl DriftBounds {
    pub fn new(low_drift: Decimal, high_drift: Decimal) -> Result<Self> {
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&low_drift) {
            return Err(Error::validation(format!(
                "low drift {low_drift} must be between 0 and 1"
            )));
        }
        if !unit.contains(&high_drift) {
            return Err(Error::validation(format!(
                "high drift {high_drift} must be between 0 and 1"
            )));
        }
        if low_drift > high_drift {
            return Err(Error::validation(format!(
                "low drift {low_drift} must not exceed high drift {high_drift}"
            )));
        }
        Ok(Self {
            low_drift,
            high_drift,
        })
    }

    #[inline]
    pub fn low_drift(&self) -> Decimal {
        self.low_drift
    }

    #[inline]
    pub fn high_drift(&self) -> Decimal {
        self.high_drift
    }

    /// Acceptable dollar range `(low, high)` for a position with `target`.
    pub fn calculate_drift_range(
        &self,
        target: TargetPercentage,
        market_value: Decimal,
    ) -> (Decimal, Decimal) {
        let target_value = target.calculate_target_value(market_value);
        (
            target_value - market_value * self.low_drift,
            target_value + market_value * self.high_drift,
        )
    }

    /// `true` if `value` lies inside the drift range (inclusive).
    pub fn is_within_bounds(
        &self,
        value: Decimal,
        target: TargetPercentage,
        market_value: Decimal,
    ) -> bool {
        let (low, high) = self.calculate_drift_range(target, market_value);
        low <= value && value <= high
    }

    /// Signed drift of `value` from target, as a fraction of market value.
    pub fn calculate_current_drift(
        &self,
        value: Decimal,
        target: TargetPercentage,
        market_value: Decimal,
    ) -> Result<Decimal> {
        if market_value.is_zero() {
            return Err(Error::validation("market value must not be zero"));
        }
        Ok((value - target.calculate_target_value(market_value)) / market_value)
    }
}

impl TryFrom<RawBounds> for DriftBounds {
    type Error = Error;

    fn try_from(raw: RawBounds) -> Result<Self> {
        Self::new(raw.low_drift, raw.high_drift)
    }
}

impl From<DriftBounds> for RawBounds {
    fn from(b: DriftBounds) -> Self {
        RawBounds {
            low_drift: b.low_drift,
            high_drift: b.high_drift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: Decimal) -> TargetPercentage {
        TargetPercentage::new(v).unwrap()
    }

    #[test]
    fn target_accepts_steps() {
        for v in [dec!(0), dec!(0.005), dec!(0.125), dec!(0.5), dec!(0.95)] {
            assert!(TargetPercentage::new(v).is_ok(), "{v} should be valid");
        }
    }

    #[test]
    fn target_rejects_off_step() {
        let err = TargetPercentage::new(dec!(0.127)).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("0.127"));
        assert!(TargetPercentage::new(dec!(0.0001)).is_err());
    }

    #[test]
    fn target_rejects_out_of_range() {
        assert!(TargetPercentage::new(dec!(-0.005)).is_err());
        assert!(TargetPercentage::new(dec!(0.955)).is_err());
        assert!(TargetPercentage::new(dec!(1)).is_err());
    }

    #[test]
    fn target_display() {
        assert_eq!(pct(dec!(0.125)).to_string(), "12.5%");
        assert_eq!(pct(dec!(0.30)).to_string(), "30%");
        assert_eq!(TargetPercentage::ZERO.to_string(), "0%");
    }

    #[test]
    fn target_value() {
        assert_eq!(pct(dec!(0.25)).calculate_target_value(dec!(100000)), dec!(25000));
    }

    #[test]
    fn target_serde_validates() {
        let t: TargetPercentage = serde_json::from_str("\"0.125\"").unwrap();
        assert_eq!(t.value(), dec!(0.125));
        assert!(serde_json::from_str::<TargetPercentage>("\"0.127\"").is_err());
    }

    #[test]
    fn bounds_validation() {
        assert!(DriftBounds::new(dec!(0), dec!(0)).is_ok());
        assert!(DriftBounds::new(dec!(0.02), dec!(1)).is_ok());
        assert!(DriftBounds::new(dec!(0.05), dec!(0.02)).is_err());
        assert!(DriftBounds::new(dec!(-0.01), dec!(0.02)).is_err());
        assert!(DriftBounds::new(dec!(0.01), dec!(1.01)).is_err());
    }

    #[test]
    fn drift_range() {
        let bounds = DriftBounds::new(dec!(0.02), dec!(0.03)).unwrap();
        let (low, high) = bounds.calculate_drift_range(pct(dec!(0.20)), dec!(100000));
        assert_eq!(low, dec!(18000));
        assert_eq!(high, dec!(23000));
    }

    #[test]
    fn within_bounds_is_inclusive() {
        let bounds = DriftBounds::new(dec!(0.02), dec!(0.03)).unwrap();
        let t = pct(dec!(0.20));
        let mv = dec!(100000);
        assert!(bounds.is_within_bounds(dec!(18000), t, mv));
        assert!(bounds.is_within_bounds(dec!(23000), t, mv));
        assert!(bounds.is_within_bounds(dec!(20000), t, mv));
        assert!(!bounds.is_within_bounds(dec!(17999.99), t, mv));
        assert!(!bounds.is_within_bounds(dec!(23000.01), t, mv));
    }

    #[test]
    fn current_drift_is_signed() {
        let bounds = DriftBounds::new(dec!(0.02), dec!(0.03)).unwrap();
        let t = pct(dec!(0.20));
        assert_eq!(
            bounds.calculate_current_drift(dec!(25000), t, dec!(100000)).unwrap(),
            dec!(0.05)
        );
        assert_eq!(
            bounds.calculate_current_drift(dec!(15000), t, dec!(100000)).unwrap(),
            dec!(-0.05)
        );
        assert!(bounds.calculate_current_drift(dec!(1), t, Decimal::ZERO).is_err());
    }

    #[test]
    fn bounds_serde_validates() {
        let b: DriftBounds =
            serde_json::from_str(r#"{"low_drift":"0.02","high_drift":"0.03"}"#).unwrap();
        assert_eq!(b.low_drift(), dec!(0.02));
        let inverted = r#"{"low_drift":"0.5","high_drift":"0.1"}"#;
        assert!(serde_json::from_str::<DriftBounds>(inverted).is_err());
    }
}
