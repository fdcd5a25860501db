//! Persisted shape of an investment model.
//!
//! `ModelRecord` is the flat, storage-friendly form. Converting a record back
//! into an [`InvestmentModel`] re-runs every constructor and business rule, so
//! a corrupted record is rejected rather than loaded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{InvestmentModel, Position};
use crate::allocation::{DriftBounds, TargetPercentage};
use crate::error::{Error, Result};
use crate::types::SecurityId;

/// Storage form of an investment model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model_id: Uuid,
    pub name: String,
    pub positions: Vec<PositionRecord>,
    pub portfolios: Vec<String>,
    #[serde(default)]
    pub last_rebalance_date: Option<DateTime<Utc>>,
    pub version: u32,
}

/// Storage form of a position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub security_id: String,
    pub target: Decimal,
    pub high_drift: Decimal,
    pub low_drift: Decimal,
}

impl From<&Position> for PositionRecord {
    fn from(p: &Position) -> Self {
        PositionRecord {
            security_id: p.security_id().as_str().to_owned(),
            target: p.target().value(),
            high_drift: p.drift_bounds().high_drift(),
            low_drift: p.drift_bounds().low_drift(),
        }
    }
}

impl TryFrom<&PositionRecord> for Position {
    type Error = Error;

    fn try_from(r: &PositionRecord) -> Result<Self> {
        Ok(Position::new(
            SecurityId::parse(&r.security_id)?,
            TargetPercentage::new(r.target)?,
            DriftBounds::new(r.low_drift, r.high_drift)?,
        ))
    }
}

impl From<&InvestmentModel> for ModelRecord {
    fn from(m: &InvestmentModel) -> Self {
        ModelRecord {
            model_id: m.model_id(),
            name: m.name().to_owned(),
            positions: m.positions().iter().map(PositionRecord::from).collect(),
            portfolios: m.portfolios().to_vec(),
            last_rebalance_date: m.last_rebalance_date(),
            version: m.version(),
        }
    }
}

impl From<InvestmentModel> for ModelRecord {
    fn from(m: InvestmentModel) -> Self {
        ModelRecord::from(&m)
    }
}

impl TryFrom<ModelRecord> for InvestmentModel {
    type Error = Error;

    fn try_from(r: ModelRecord) -> Result<Self> {
        if r.version < 1 {
            return Err(Error::validation(format!(
                "model version must be >= 1, got {}",
                r.version
            )));
        }
        let positions = r
            .positions
            .iter()
            .map(Position::try_from)
            .collect::<Result<Vec<_>>>()?;
        let mut model = InvestmentModel::with_id(r.model_id, r.name, positions, r.portfolios)?;
        model.restore_persisted_state(r.version, r.last_rebalance_date);
        Ok(model)
    }
}
