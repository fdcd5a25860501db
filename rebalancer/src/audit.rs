//! JSONL audit trail logging.
//!
//! Each rebalancer command appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use driftbook::{InvestmentModel, OptimizationResult};
use serde::Serialize;

use crate::error::Result;
use crate::report::{DriftReport, TradePlan};

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

pub fn log_run_started(audit: &mut AuditLog, command: &str, model: &InvestmentModel) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "command": command,
            "model_id": model.model_id(),
            "model_name": model.name(),
            "model_version": model.version(),
        }),
    )
}

pub fn log_drift(audit: &mut AuditLog, report: &DriftReport) -> Result<()> {
    audit.log(
        "drift_computed",
        serde_json::json!({
            "total_drift": report.total_drift,
            "outside_bounds": report.outside_bounds,
            "positions": report.positions,
        }),
    )
}

pub fn log_optimization(audit: &mut AuditLog, result: &OptimizationResult) -> Result<()> {
    audit.log(
        "optimization_finished",
        serde_json::json!({
            "feasible": result.is_feasible(),
            "status": result.solver_status(),
            "objective": result.objective_value(),
            "solve_ms": result.solve_time().as_secs_f64() * 1e3,
            "quantities": result.optimal_quantities(),
        }),
    )
}

pub fn log_plan(audit: &mut AuditLog, plan: &TradePlan) -> Result<()> {
    audit.log(
        "plan_computed",
        serde_json::to_value(plan)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?,
    )
}

pub fn log_run_completed(audit: &mut AuditLog, command: &str, ok: bool) -> Result<()> {
    audit.log(
        "run_completed",
        serde_json::json!({
            "command": command,
            "ok": ok,
        }),
    )
}
