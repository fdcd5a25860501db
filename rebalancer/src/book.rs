//! Input files: the investment model (model.json) and the book snapshot
//! (book.json) it is rebalanced against.
//!
//! Decimal fields accept JSON strings (`"101.25"`) for exact values; plain
//! JSON numbers also parse but fractional ones pass through `f64` first.

use std::path::Path;

use driftbook::{Holdings, InvestmentModel, Prices, ValidationService};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Holdings, prices, and total market value at one point in time.
#[derive(Debug, Clone, Deserialize)]
pub struct Book {
    pub market_value: Decimal,
    #[serde(default)]
    pub positions: Holdings,
    pub prices: Prices,
}

impl Book {
    /// Load and validate a book.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::InputRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let book: Book = serde_json::from_str(json)?;
        book.validate()?;
        Ok(book)
    }

    fn validate(&self) -> Result<()> {
        let v = ValidationService::new();
        v.validate_portfolio_data(&self.positions, self.market_value)
            .map_err(|e| Error::Book(e.to_string()))?;
        v.validate_market_data(&self.prices)
            .map_err(|e| Error::Book(e.to_string()))?;
        for id in self.positions.keys() {
            if !self.prices.contains_key(id) {
                return Err(Error::Book(format!("held security {id} has no price")));
            }
        }
        Ok(())
    }
}

/// Load a model.json file (a serialized model record).
pub fn load_model(path: &Path) -> Result<InvestmentModel> {
    match driftbook::persistence::load_model(path) {
        Err(driftbook::Error::Io(source)) => Err(Error::InputRead {
            path: path.to_path_buf(),
            source,
        }),
        other => Ok(other?),
    }
}
