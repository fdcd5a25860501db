//! Bounded worker pool for concurrent optimizations.
//!
//! Solves are CPU-bound and blocking, so they run on a dedicated rayon pool
//! sized by [`EngineConfig::workers`] instead of the caller's threads.

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use rust_decimal::Decimal;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::InvestmentModel;
use crate::types::{Holdings, Prices};
use crate::validation::ValidationService;

use super::{OptimizationEngine, OptimizationResult};

/// Everything one `optimize_portfolio` call needs, owned so it can cross threads.
#[derive(Clone, Debug)]
pub struct OptimizationRequest {
    pub current_positions: Holdings,
    pub model: InvestmentModel,
    pub prices: Prices,
    pub market_value: Decimal,
    /// `None` uses the engine's default timeout.
    pub timeout: Option<Duration>,
}

/// A shared engine plus the threads that run it.
pub struct OptimizationPool {
    engine: Arc<OptimizationEngine>,
    pool: rayon::ThreadPool,
}

impl OptimizationPool {
    pub fn new(engine: OptimizationEngine, workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("driftbook-solve-{i}"))
            .build()?;
        Ok(Self {
            engine: Arc::new(engine),
            pool,
        })
    }

    /// Engine and pool from one configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let engine = OptimizationEngine::with_config(ValidationService::new(), config)?;
        Self::new(engine, config.workers)
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn engine(&self) -> &OptimizationEngine {
        &self.engine
    }

    /// Run every request on the pool. Results come back in request order.
    pub fn optimize_batch(
        &self,
        requests: &[OptimizationRequest],
    ) -> Vec<Result<OptimizationResult>> {
        let engine = &*self.engine;
        self.pool.install(|| {
            requests
                .par_iter()
                .map(|req| run(engine, req))
                .collect()
        })
    }

    /// Dispatch one request and hand its result to `on_done` on a worker thread.
    pub fn spawn<F>(&self, request: OptimizationRequest, on_done: F)
    where
        F: FnOnce(Result<OptimizationResult>) + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        self.pool.spawn(move || on_done(run(&engine, &request)));
    }
}

impl std::fmt::Debug for OptimizationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationPool")
            .field("backend", &self.engine.backend())
            .field("workers", &self.workers())
            .finish()
    }
}

fn run(engine: &OptimizationEngine, req: &OptimizationRequest) -> Result<OptimizationResult> {
    engine.optimize_portfolio(
        &req.current_positions,
        &req.model,
        &req.prices,
        req.market_value,
        req.timeout.unwrap_or_else(|| engine.default_timeout()),
    )
}
