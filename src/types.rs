//! Core types: SecurityId, Holdings, Prices

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Identifier of a security: exactly 24 ASCII alphanumeric characters.
///
/// A `SecurityId` can only be obtained through [`SecurityId::parse`] (or the
/// equivalent `FromStr`/`TryFrom` impls, which serde also goes through), so any
/// map keyed by it holds only well-formed ids.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SecurityId(String);

impl SecurityId {
    /// Required length of every id.
    pub const LEN: usize = 24;

    /// Parse and validate a security id.
    pub fn parse(raw: &str) -> Result<Self> {
        check_security_id(raw)?;
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Check the id format without allocating.
pub(crate) fn check_security_id(raw: &str) -> Result<()> {
    if raw.len() != SecurityId::LEN {
        return Err(Error::validation(format!(
            "security id '{raw}' must be exactly {} characters, got {}",
            SecurityId::LEN,
            raw.len()
        )));
    }
    if !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(Error::validation(format!(
            "security id '{raw}' must be alphanumeric"
        )));
    }
    Ok(())
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SecurityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SecurityId {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        check_security_id(&raw)?;
        Ok(Self(raw))
    }
}

impl From<SecurityId> for String {
    fn from(id: SecurityId) -> Self {
        id.0
    }
}

impl AsRef<str> for SecurityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Current holdings: security → share quantity.
///
/// Quantities are decimals so that upstream data can be checked for
/// fractional or negative entries instead of silently truncated.
pub type Holdings = BTreeMap<SecurityId, Decimal>;

/// Current prices: security → price per share.
pub type Prices = BTreeMap<SecurityId, Decimal>;

/// Signed share deltas: positive = buy, negative = sell.
pub type Trades = BTreeMap<SecurityId, Decimal>;

/// `true` if `value` has no fractional part.
#[inline]
pub(crate) fn is_integral(value: Decimal) -> bool {
    value.fract().is_zero()
}

/// Dollar value of a holding, `qty * price`.
///
/// Fails with a validation error naming `id` when the product leaves the
/// range of `Decimal`.
pub(crate) fn holding_value(id: &SecurityId, qty: Decimal, price: Decimal) -> Result<Decimal> {
    qty.checked_mul(price).ok_or_else(|| {
        Error::validation(format!(
            "value of {qty} shares of {id} at {price} is out of range"
        ))
    })
}
