//! Monte Carlo retries, failures and cancellation

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{SimulationBuilder, SimulationConfig};
use crate::error::PathError;
use crate::model::{ExitType, Loan, MonteCarloConfig, MonteCarloProgress};
use crate::monte_carlo::{
    MonteCarloOrchestrator, monte_carlo_simulate, monte_carlo_simulate_with_progress,
};
use crate::reinvestment::{ReinvestmentPolicy, ReinvestmentRequest};

/// Every path exits its only loan at month 24, which always asks for reinvestment
fn riskless() -> SimulationConfig {
    SimulationBuilder::new()
        .horizon_months(48)
        .zone(0, 0.04, 0.0)
        .variation(0.0, 0.0)
        .base_exit_rate(0.0)
        .life_event_probability(0.0)
        .hold_period_years(1.0, 2.0)
        .loan(0, 500_000.0, 0.6)
        .build()
        .unwrap()
}

fn portfolio() -> SimulationConfig {
    SimulationBuilder::new()
        .horizon_years(6)
        .zone(0, 0.04, 0.12)
        .zone(1, 0.02, 0.10)
        .uniform_correlation(0.5)
        .base_exit_rate(0.25)
        .loan_interest_rate(0.04)
        .loan(0, 600_000.0, 0.2)
        .loan(0, 450_000.0, 0.3)
        .loan(1, 380_000.0, 0.25)
        .loan(1, 820_000.0, 0.15)
        .build()
        .unwrap()
}

struct AlwaysFails;

impl ReinvestmentPolicy for AlwaysFails {
    fn reinvest(&self, _request: &ReinvestmentRequest<'_>) -> Result<Vec<Loan>, PathError> {
        Err(PathError::Reinvestment("timed out".into()))
    }
}

/// Fails the first call only
struct FailsOnce {
    calls: AtomicUsize,
}

impl ReinvestmentPolicy for FailsOnce {
    fn reinvest(&self, _request: &ReinvestmentRequest<'_>) -> Result<Vec<Loan>, PathError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(PathError::Reinvestment("transient".into()));
        }
        Ok(Vec::new())
    }
}

#[test]
fn test_failed_paths_are_excluded_not_zeroed() {
    let config = riskless();
    let mc = MonteCarloConfig {
        iterations: 5,
        seed: Some(8),
        workers: 2,
        ..Default::default()
    };
    let progress = MonteCarloProgress::new();
    let summary = MonteCarloOrchestrator::new(&config, &mc)
        .unwrap()
        .with_reinvestment(&AlwaysFails)
        .run(&progress)
        .unwrap();

    assert_eq!(summary.completed_paths(), 0);
    assert_eq!(summary.failed_paths.len(), 5);
    assert_eq!(progress.failed(), 5);
    assert_eq!(progress.completed(), 0);
    assert_eq!(summary.stats.lp_moic.count, 0);
    assert_eq!(summary.stats.portfolio_roi.count, 0);
    assert!(!summary.cancelled);

    let mut indices: Vec<usize> = summary.failed_paths.iter().map(|f| f.path_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert!(summary.failed_paths.iter().all(|f| f.error.contains("timed out")));
}

#[test]
fn test_transient_failure_is_retried_once() {
    let config = riskless();
    let mc = MonteCarloConfig {
        iterations: 4,
        seed: Some(8),
        workers: 1,
        ..Default::default()
    };
    let policy = FailsOnce {
        calls: AtomicUsize::new(0),
    };
    let summary = MonteCarloOrchestrator::new(&config, &mc)
        .unwrap()
        .with_reinvestment(&policy)
        .run(&MonteCarloProgress::new())
        .unwrap();

    assert_eq!(summary.completed_paths(), 4);
    assert_eq!(summary.retried_paths, 1);
    assert!(summary.failed_paths.is_empty());
}

#[test]
fn test_zero_time_budget_cancels_run() {
    let config = portfolio();
    let mc = MonteCarloConfig {
        iterations: 50,
        seed: Some(3),
        max_duration_ms: Some(0),
        ..Default::default()
    };
    let progress = MonteCarloProgress::new();
    let summary = monte_carlo_simulate_with_progress(&config, &mc, &progress).unwrap();

    assert!(summary.cancelled);
    assert!(progress.is_cancelled());
    assert_eq!(summary.completed_paths(), 0);
    assert_eq!(summary.requested_paths, 50);
}

#[test]
fn test_statistics_cover_completed_paths() {
    let config = portfolio();
    let mc = MonteCarloConfig {
        iterations: 40,
        seed: Some(12),
        keep_path_results: true,
        ..Default::default()
    };
    let summary = monte_carlo_simulate(&config, &mc).unwrap();
    let stats = &summary.stats;

    assert_eq!(summary.completed_paths(), 40);
    assert_eq!(summary.path_results.len(), 40);
    assert_eq!(stats.portfolio_roi.count, 40);
    assert_eq!(stats.lp_irr.count + stats.undefined_irr_paths, 40);

    let exits: usize = summary.paths.iter().map(|p| p.exit_counts.total()).sum();
    assert_eq!(stats.exit_counts.total(), exits);
    if exits > 0 {
        let shares: f64 = stats.exit_distribution.iter().map(|(_, s)| s).sum();
        assert!((shares - 1.0).abs() < 1e-9);
    }
    assert_eq!(stats.exit_distribution.len(), ExitType::ALL.len());

    let p05 = stats.portfolio_roi.percentile(0.05).unwrap();
    let p95 = stats.portfolio_roi.percentile(0.95).unwrap();
    assert!(p05 <= stats.portfolio_roi.percentile(0.50).unwrap());
    assert!(stats.portfolio_roi.percentile(0.50).unwrap() <= p95);
    assert!(stats.portfolio_roi.min <= p05 && p95 <= stats.portfolio_roi.max);

    assert_eq!(stats.portfolio_roi_risk.len(), 2);
    for risk in &stats.portfolio_roi_risk {
        assert!(risk.cvar >= risk.var - 1e-12);
    }
}

#[test]
fn test_random_master_seed_is_reported() {
    let config = portfolio();
    let mc = MonteCarloConfig {
        iterations: 3,
        seed: None,
        keep_path_results: true,
        ..Default::default()
    };
    let summary = monte_carlo_simulate(&config, &mc).unwrap();
    let replay = monte_carlo_simulate(
        &config,
        &MonteCarloConfig {
            seed: Some(summary.master_seed),
            ..mc
        },
    )
    .unwrap();
    assert_eq!(summary.paths, replay.paths);
}
