//! Monte Carlo orchestration
//!
//! Paths are independent: each derives its seed from the master seed and its
//! index, runs the full pipeline, and reports a summary. With the `parallel`
//! feature they run on a dedicated rayon pool sized by `workers`. A path
//! failing with a transient error is retried once on a fresh seed; if the
//! retry fails too it is recorded as failed and left out of the statistics.
//! Invariant violations abort the run.
//!
//! Cancellation is cooperative and checked before each path starts, so a
//! cancelled or timed-out run still returns every path that completed.

use std::time::{Duration, Instant};

use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::error::{ConfigError, SimulationError};
use crate::model::{
    FailedPath, MonteCarloConfig, MonteCarloProgress, MonteCarloSummary, PathResult,
};
use crate::reinvestment::{NoReinvestment, ReinvestmentPolicy};
use crate::seeding::{Stream, derive_seed};
use crate::simulation::Pipeline;
use crate::stats;

enum PathOutcome {
    Completed { result: Box<PathResult>, retried: bool },
    Failed(FailedPath),
    Skipped,
}

pub struct MonteCarloOrchestrator<'a> {
    pipeline: Pipeline<'a>,
    mc: &'a MonteCarloConfig,
    reinvestment: &'a dyn ReinvestmentPolicy,
}

impl<'a> MonteCarloOrchestrator<'a> {
    /// Validates both configurations before any path runs
    pub fn new(config: &'a SimulationConfig, mc: &'a MonteCarloConfig) -> Result<Self, ConfigError> {
        validate_mc(mc)?;
        Ok(Self {
            pipeline: Pipeline::new(config)?,
            mc,
            reinvestment: &NoReinvestment,
        })
    }

    #[must_use]
    pub fn with_reinvestment(mut self, policy: &'a dyn ReinvestmentPolicy) -> Self {
        self.reinvestment = policy;
        self
    }

    /// Seed of path `index` under `master_seed`
    #[must_use]
    pub fn path_seed(master_seed: u64, index: usize) -> u64 {
        derive_seed(master_seed, Stream::Path, index as u64)
    }

    pub fn run(&self, progress: &MonteCarloProgress) -> Result<MonteCarloSummary, SimulationError> {
        let mc = self.mc;
        let master_seed = mc.seed.unwrap_or_else(|| rand::rng().random());
        let started = Instant::now();
        let deadline = mc.max_duration_ms.map(|ms| started + Duration::from_millis(ms));

        tracing::info!(
            paths = mc.iterations,
            workers = mc.workers,
            seed = master_seed,
            "Starting Monte Carlo simulation"
        );

        let outcomes = self.run_paths(master_seed, deadline, progress)?;

        let mut summaries = Vec::new();
        let mut path_results = Vec::new();
        let mut failed_paths = Vec::new();
        let mut retried_paths = 0;
        let mut skipped = 0;
        for outcome in outcomes {
            match outcome {
                PathOutcome::Completed { result, retried } => {
                    retried_paths += usize::from(retried);
                    summaries.push(result.summary.clone());
                    if mc.keep_path_results {
                        path_results.push(*result);
                    }
                }
                PathOutcome::Failed(failed) => failed_paths.push(failed),
                PathOutcome::Skipped => skipped += 1,
            }
        }

        let cancelled = skipped > 0 || progress.is_cancelled();
        let stats = stats::aggregate(&summaries, &mc.percentiles, &mc.confidence_levels);

        tracing::info!(
            completed = summaries.len(),
            failed = failed_paths.len(),
            retried = retried_paths,
            cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Monte Carlo simulation finished"
        );

        Ok(MonteCarloSummary {
            master_seed,
            requested_paths: mc.iterations,
            paths: summaries,
            failed_paths,
            retried_paths,
            cancelled,
            stats,
            path_results,
        })
    }

    #[cfg(feature = "parallel")]
    fn run_paths(
        &self,
        master_seed: u64,
        deadline: Option<Instant>,
        progress: &MonteCarloProgress,
    ) -> Result<Vec<PathOutcome>, SimulationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.mc.workers)
            .build()
            .map_err(|e| ConfigError::invalid("workers", e.to_string()))?;

        pool.install(|| {
            (0..self.mc.iterations)
                .into_par_iter()
                .map(|index| self.run_path(index, master_seed, deadline, progress))
                .collect()
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn run_paths(
        &self,
        master_seed: u64,
        deadline: Option<Instant>,
        progress: &MonteCarloProgress,
    ) -> Result<Vec<PathOutcome>, SimulationError> {
        (0..self.mc.iterations)
            .map(|index| self.run_path(index, master_seed, deadline, progress))
            .collect()
    }

    fn run_path(
        &self,
        index: usize,
        master_seed: u64,
        deadline: Option<Instant>,
        progress: &MonteCarloProgress,
    ) -> Result<PathOutcome, SimulationError> {
        if deadline.is_some_and(|d| Instant::now() >= d) && !progress.is_cancelled() {
            tracing::warn!(path = index, "time budget exhausted, cancelling remaining paths");
            progress.cancel();
        }
        if progress.is_cancelled() {
            return Ok(PathOutcome::Skipped);
        }

        let seed = Self::path_seed(master_seed, index);
        let first = match self.pipeline.run(index, seed, self.reinvestment) {
            Ok(result) => {
                progress.increment();
                return Ok(PathOutcome::Completed {
                    result: Box::new(result),
                    retried: false,
                });
            }
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e),
        };

        let retry_seed = derive_seed(seed, Stream::Retry, 0);
        tracing::debug!(path = index, error = %first, "retrying path with a fresh seed");
        match self.pipeline.run(index, retry_seed, self.reinvestment) {
            Ok(result) => {
                progress.increment();
                Ok(PathOutcome::Completed {
                    result: Box::new(result),
                    retried: true,
                })
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(path = index, error = %e, "path failed twice and is excluded");
                progress.increment_failed();
                Ok(PathOutcome::Failed(FailedPath {
                    path_index: index,
                    seed: retry_seed,
                    error: e.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }
}

fn validate_mc(mc: &MonteCarloConfig) -> Result<(), ConfigError> {
    if mc.iterations == 0 {
        return Err(ConfigError::invalid("iterations", "must be at least 1"));
    }
    if let Some(p) = mc.percentiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(ConfigError::invalid(
            "percentiles",
            format!("{p} is outside [0, 1]"),
        ));
    }
    if let Some(c) = mc.confidence_levels.iter().find(|c| !(**c > 0.0 && **c < 1.0)) {
        return Err(ConfigError::invalid(
            "confidence_levels",
            format!("{c} is outside (0, 1)"),
        ));
    }
    Ok(())
}

/// Run a Monte Carlo simulation with no reinvestment
pub fn monte_carlo_simulate(
    config: &SimulationConfig,
    mc: &MonteCarloConfig,
) -> Result<MonteCarloSummary, SimulationError> {
    monte_carlo_simulate_with_progress(config, mc, &MonteCarloProgress::new())
}

/// Run a Monte Carlo simulation reporting into (and cancellable through) `progress`
pub fn monte_carlo_simulate_with_progress(
    config: &SimulationConfig,
    mc: &MonteCarloConfig,
    progress: &MonteCarloProgress,
) -> Result<MonteCarloSummary, SimulationError> {
    MonteCarloOrchestrator::new(config, mc)?.run(progress)
}
