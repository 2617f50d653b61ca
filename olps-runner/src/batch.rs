//! Parallel batch runner.
//!
//! Jobs share one read-only price matrix and one strategy registry; each job
//! builds its own strategy state, so workers never lock. Results come back in
//! job order whatever order the workers finish in, and a failing job never
//! aborts the others.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use olps_core::{PriceMatrix, StrategyRegistry};

use crate::config::{BacktestConfig, BatchConfig};
use crate::runner::{run_single, RunError, RunReport};

/// One named configuration in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub name: String,
    pub config: BacktestConfig,
}

impl BatchJob {
    pub fn new(name: impl Into<String>, config: BacktestConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// How a batch is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Worker threads; rayon's default (all cores) when `None`.
    pub threads: Option<usize>,
    /// `false` runs the jobs one after another on the calling thread.
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threads: None,
            parallel: true,
        }
    }
}

impl BatchOptions {
    pub fn sequential() -> Self {
        Self {
            threads: None,
            parallel: false,
        }
    }
}

/// Progress snapshot passed to the callback after each job finishes.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Index of the job that just finished.
    pub index: usize,
    pub name: String,
    /// Jobs finished so far, this one included.
    pub completed: usize,
    pub total: usize,
    pub succeeded: bool,
}

/// Outcome of one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub result: Result<RunReport, RunError>,
}

impl BatchConfig {
    pub fn jobs(&self) -> Vec<BatchJob> {
        self.resolve()
            .into_iter()
            .map(|(name, config)| BatchJob::new(name, config))
            .collect()
    }

    pub fn options(&self) -> BatchOptions {
        BatchOptions {
            threads: self.threads,
            parallel: self.parallel,
        }
    }
}

/// Run every job and return their outcomes in job order.
///
/// `cancel` is shared by all jobs and checked once per date inside each
/// backtest; jobs cancelled mid-run return partial reports flagged
/// `cancelled`. Fails only when the thread pool cannot be built.
pub fn run_batch(
    jobs: &[BatchJob],
    prices: &PriceMatrix,
    registry: &StrategyRegistry,
    options: &BatchOptions,
    cancel: Option<&AtomicBool>,
    on_progress: Option<&(dyn Fn(&BatchProgress) + Sync)>,
) -> Result<Vec<JobOutcome>, RunError> {
    let total = jobs.len();
    let completed = AtomicUsize::new(0);

    let run_job = |(index, job): (usize, &BatchJob)| {
        let result = run_single(&job.name, &job.config, prices, registry, cancel);
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        match &result {
            Ok(report) => tracing::info!(
                job = %job.name,
                strategy = %report.result.metadata.strategy.id,
                final_value = report.metrics.final_value,
                cancelled = report.cancelled(),
                done,
                total,
                "job finished"
            ),
            Err(e) => tracing::info!(job = %job.name, error = %e, done, total, "job failed"),
        }
        if let Some(cb) = on_progress {
            cb(&BatchProgress {
                index,
                name: job.name.clone(),
                completed: done,
                total,
                succeeded: result.is_ok(),
            });
        }
        JobOutcome {
            name: job.name.clone(),
            result,
        }
    };

    if !options.parallel {
        return Ok(jobs.iter().enumerate().map(run_job).collect());
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = options.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;
    Ok(pool.install(|| jobs.par_iter().enumerate().map(run_job).collect()))
}
