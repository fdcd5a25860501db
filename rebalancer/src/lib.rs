//! driftbook-rebalancer: command-line front end for the driftbook core.
//!
//! Reads an investment model (model.json) and a book snapshot (book.json),
//! reports drift, runs the optimizer, turns its quantities into a trade plan,
//! and records every run in a JSONL audit trail.

pub mod audit;
pub mod book;
pub mod commands;
pub mod config;
pub mod error;
pub mod report;
