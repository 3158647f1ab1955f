//! Simulation results
//!
//! Contains the output of a single simulated path, the per-path summary kept
//! by the Monte Carlo orchestrator, and the aggregate statistics across paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use super::cashflow::FundPeriodCashflow;
use super::exit_event::{ExitCounts, ExitEvent, ExitType};
use super::loan::{HeldPosition, Loan};
use super::macro_state::MacroState;
use super::price_path::PricePath;
use super::waterfall::WaterfallResult;

/// Complete results from one simulated path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    pub seed: u64,
    /// Every loan funded on the path, including reinvestment originations
    pub loans: Vec<Loan>,
    pub price_paths: Vec<PricePath>,
    pub macro_path: Vec<MacroState>,
    /// Exit events sorted by loan id
    pub exits: Vec<ExitEvent>,
    /// Loans still outstanding at the horizon
    pub held: Vec<HeldPosition>,
    pub cashflows: Vec<FundPeriodCashflow>,
    pub waterfall: WaterfallResult,
    pub summary: PathSummary,
}

impl PathResult {
    #[must_use]
    pub fn exit_for(&self, loan_id: super::LoanId) -> Option<&ExitEvent> {
        self.exits
            .binary_search_by_key(&loan_id, |e| e.loan_id)
            .ok()
            .map(|i| &self.exits[i])
    }
}

/// Headline metrics of one path, retained by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub path_index: usize,
    pub seed: u64,
    /// Annualized LP net IRR; `None` when the flows have no sign change
    pub lp_irr: Option<f64>,
    /// Annualized gross IRR of loan-level flows
    pub fund_irr: Option<f64>,
    pub lp_moic: Option<f64>,
    /// Total loan proceeds over total loan investment, minus one
    pub portfolio_roi: f64,
    pub exit_counts: ExitCounts,
    pub loans_originated: usize,
    pub total_invested: f64,
    pub total_contributed: f64,
    pub total_to_lp: f64,
    pub total_to_gp: f64,
    pub gp_carry: f64,
    pub clawback: f64,
    pub realized_losses: f64,
}

/// Monte Carlo run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Master seed; `None` draws fresh entropy for every run
    #[serde(default)]
    pub seed: Option<u64>,
    /// Worker threads in the path pool (0 = available parallelism)
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,
    /// Keep full `PathResult`s (memory heavy; for inspection only)
    #[serde(default)]
    pub keep_path_results: bool,
    /// Wall-clock budget; when exceeded, remaining paths are abandoned
    #[serde(default)]
    pub max_duration_ms: Option<u64>,
}

fn default_iterations() -> usize {
    1_000
}

fn default_percentiles() -> Vec<f64> {
    vec![0.05, 0.25, 0.50, 0.75, 0.95]
}

fn default_confidence_levels() -> Vec<f64> {
    vec![0.95, 0.99]
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: None,
            workers: 0,
            percentiles: default_percentiles(),
            confidence_levels: default_confidence_levels(),
            keep_path_results: false,
            max_duration_ms: None,
        }
    }
}

/// Shared progress counters and cancellation flag for a Monte Carlo run.
///
/// Cloning shares the same atomics, so a caller can keep one handle and pass
/// another to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloProgress {
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl MonteCarloProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Request cooperative cancellation; running paths finish, no new paths start
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Summary statistics of one metric across paths
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DistributionStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// `(percentile, value)` pairs in the requested order
    pub percentiles: Vec<(f64, f64)>,
}

impl DistributionStats {
    #[must_use]
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(q, _)| (q - p).abs() < 1e-9)
            .map(|(_, v)| *v)
    }
}

/// Tail-loss measures of a return distribution at one confidence level.
/// Both are expressed as positive losses (negated returns).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMeasures {
    pub confidence: f64,
    pub var: f64,
    pub cvar: f64,
}

/// Aggregate statistics across the successful paths of a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonteCarloStats {
    pub lp_irr: DistributionStats,
    pub fund_irr: DistributionStats,
    pub lp_moic: DistributionStats,
    pub portfolio_roi: DistributionStats,
    pub gp_carry: DistributionStats,
    pub clawback: DistributionStats,
    pub lp_irr_risk: Vec<RiskMeasures>,
    pub portfolio_roi_risk: Vec<RiskMeasures>,
    pub exit_counts: ExitCounts,
    /// Share of all exits by type
    pub exit_distribution: Vec<(ExitType, f64)>,
    /// Paths whose LP IRR was undefined (excluded from `lp_irr` only)
    pub undefined_irr_paths: usize,
}

/// A path that failed twice and was excluded from the aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPath {
    pub path_index: usize,
    pub seed: u64,
    pub error: String,
}

/// Results from a Monte Carlo run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub master_seed: u64,
    pub requested_paths: usize,
    /// Successful path summaries ordered by path index
    pub paths: Vec<PathSummary>,
    pub failed_paths: Vec<FailedPath>,
    /// Paths that succeeded on their retry
    pub retried_paths: usize,
    pub cancelled: bool,
    pub stats: MonteCarloStats,
    /// Full per-path detail, only when `keep_path_results` was requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_results: Vec<PathResult>,
}

impl MonteCarloSummary {
    #[must_use]
    pub fn completed_paths(&self) -> usize {
        self.paths.len()
    }
}
