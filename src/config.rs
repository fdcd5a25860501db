//! Engine configuration.
//!
//! Deserializable so embedding binaries can load it from their own config
//! files; every field has a default.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::drift::DEFAULT_COMMISSION_RATE;
use crate::error::{Error, Result};
use crate::optimize::SolverBackend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backends to try, first available wins.
    #[serde(default = "default_preference")]
    pub solver_preference: Vec<SolverBackend>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_commission")]
    pub commission_rate: Decimal,
    /// Worker threads for batch optimization.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_preference() -> Vec<SolverBackend> {
    SolverBackend::DEFAULT_PREFERENCE.to_vec()
}
fn default_timeout() -> u64 {
    30
}
fn default_commission() -> Decimal {
    DEFAULT_COMMISSION_RATE
}
fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solver_preference: default_preference(),
            timeout_secs: default_timeout(),
            commission_rate: default_commission(),
            workers: default_workers(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        for (i, b) in self.solver_preference.iter().enumerate() {
            if self.solver_preference[..i].contains(b) {
                return Err(Error::validation(format!(
                    "solver_preference lists {b} more than once"
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(Error::validation("timeout_secs must be > 0"));
        }
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(Error::validation(format!(
                "commission_rate must be in [0, 1), got {}",
                self.commission_rate
            )));
        }
        if self.workers == 0 {
            return Err(Error::validation("workers must be > 0"));
        }
        Ok(())
    }
}
