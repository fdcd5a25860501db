//! # driftbook
//!
//! Portfolio rebalancing core: investment models with drift tolerances,
//! drift analysis, and an optimizer that turns a model into whole-share
//! target quantities.
//!
//! ## Features
//!
//! - **Exact arithmetic**: prices, values, and percentages are [`Decimal`](rust_decimal::Decimal)
//! - **Validated value objects**: 0.5%-grid targets up to 95%, drift bands in [0, 1], low <= high
//! - **Model invariants**: each mutation re-checks total target, position count, and uniqueness
//! - **Relaxed LP optimization**: continuous solve, half-up rounding, post-solve band check
//! - **Optimistic locking**: models carry a version token checked on save
//!
//! ## Quick Start
//!
//! ```
//! use driftbook::{
//!     DriftBounds, DriftCalculator, Holdings, InvestmentModel, Position, Prices, SecurityId,
//!     TargetPercentage,
//! };
//! use rust_decimal_macros::dec;
//!
//! let aapl = SecurityId::parse("AAPL00000000000000000001").unwrap();
//! let bond = SecurityId::parse("BOND00000000000000000002").unwrap();
//! let band = DriftBounds::new(dec!(0.05), dec!(0.05)).unwrap();
//!
//! let model = InvestmentModel::new(
//!     "Balanced",
//!     vec![
//!         Position::new(aapl.clone(), TargetPercentage::new(dec!(0.60)).unwrap(), band),
//!         Position::new(bond.clone(), TargetPercentage::new(dec!(0.30)).unwrap(), band),
//!     ],
//!     vec!["PORTFOLIO-1".into()],
//! )
//! .unwrap();
//!
//! let holdings = Holdings::from([(aapl.clone(), dec!(500)), (bond.clone(), dec!(200))]);
//! let prices = Prices::from([(aapl.clone(), dec!(100)), (bond.clone(), dec!(100))]);
//!
//! let drift = DriftCalculator::default()
//!     .calculate_portfolio_drift(&holdings, &prices, dec!(100000), &model)
//!     .unwrap();
//!
//! // 50% held against a 60% target
//! assert_eq!(drift[0].drift_amount, dec!(-0.10));
//! assert!(!drift[0].is_within_bounds);
//! ```
//!
//! ## Optimizing
//!
//! ```
//! use driftbook::{
//!     DriftBounds, DriftCalculator, Holdings, InvestmentModel, OptimizationEngine, Position,
//!     Prices, SecurityId, TargetPercentage, ValidationService,
//! };
//! use rust_decimal_macros::dec;
//! use std::time::Duration;
//!
//! let id = SecurityId::parse("MSFT00000000000000000003").unwrap();
//! let model = InvestmentModel::new(
//!     "Single",
//!     vec![Position::new(
//!         id.clone(),
//!         TargetPercentage::new(dec!(0.50)).unwrap(),
//!         DriftBounds::new(dec!(0.02), dec!(0.02)).unwrap(),
//!     )],
//!     vec!["PORTFOLIO-1".into()],
//! )
//! .unwrap();
//! let current = Holdings::from([(id.clone(), dec!(10))]);
//! let prices = Prices::from([(id.clone(), dec!(40))]);
//!
//! let engine = OptimizationEngine::new(ValidationService::new()).unwrap();
//! let result = engine
//!     .optimize_portfolio(&current, &model, &prices, dec!(10000), Duration::from_secs(5))
//!     .unwrap();
//!
//! let trades = DriftCalculator::default()
//!     .calculate_required_trades(&current, result.optimal_quantities());
//! assert_eq!(trades[&id], dec!(115)); // 125 target shares - 10 held
//! ```
//!
//! ## Cargo Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `simplex` | yes | dense two-phase simplex backend |
//! | `separable` | yes | exact per-security backend |
//! | `parallel` | yes | [`optimize::pool::OptimizationPool`] on rayon |
//! | `persistence` | yes | JSON model files with optimistic locking |

pub mod allocation;
pub mod config;
pub mod drift;
mod error;
pub mod model;
pub mod optimize;
#[cfg(feature = "persistence")]
pub mod persistence;
mod types;
mod validation;

// Re-export public API
pub use allocation::{DriftBounds, TargetPercentage};
pub use config::EngineConfig;
pub use drift::{DriftCalculator, DriftInfo};
pub use error::{Error, OptimizationError, Result, SolverStatus};
pub use model::{InvestmentModel, ModelRecord, Position, PositionRecord};
pub use optimize::{OptimizationEngine, OptimizationResult, SolverBackend, SolverInfo};
pub use types::{Holdings, Prices, SecurityId, Trades};
pub use validation::ValidationService;
