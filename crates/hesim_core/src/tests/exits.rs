//! Exit timing guarantees across many seeds

use rustc_hash::FxHashSet;

use crate::config::{SimulationBuilder, SimulationConfig};
use crate::model::{ExitTrigger, ExitType};
use crate::simulation::simulate;

fn portfolio(allow_early_default: bool) -> SimulationConfig {
    let mut builder = SimulationBuilder::new()
        .horizon_years(8)
        .zone(0, 0.02, 0.15)
        .zone(1, 0.05, 0.10)
        .uniform_correlation(0.4)
        .base_exit_rate(0.35)
        .hold_period_years(1.0, 5.0)
        .exit_weights(0.5, 0.3, 0.2)
        .life_event_probability(0.05)
        .loan_term(72)
        .loan_interest_rate(0.05);
    for i in 0..24u32 {
        builder = builder
            .originate_at(i % 6)
            .loan((i % 2) as u16, 300_000.0 + 10_000.0 * f64::from(i), 0.25);
    }
    let mut config = builder.build().unwrap();
    config.exits.allow_default_before_min_hold = allow_early_default;
    config
}

#[test]
fn test_exit_months_stay_inside_hold_window() {
    let config = portfolio(false);
    let min_hold = config.exits.min_hold_months();

    for seed in 0..12 {
        let result = simulate(&config, seed).unwrap();
        for exit in &result.exits {
            let loan = config
                .loans
                .iter()
                .find(|l| l.loan_id == exit.loan_id)
                .unwrap();
            assert!(
                exit.exit_month >= loan.origination_month + min_hold,
                "seed {seed}: {:?} exited at {} before the minimum hold",
                exit.loan_id,
                exit.exit_month
            );
            assert!(exit.exit_month <= loan.origination_month + loan.term_months);
        }
    }
}

#[test]
fn test_only_defaults_may_exit_early() {
    let config = portfolio(true);
    let min_hold = config.exits.min_hold_months();

    for seed in 0..12 {
        let result = simulate(&config, seed).unwrap();
        for exit in &result.exits {
            let loan = config
                .loans
                .iter()
                .find(|l| l.loan_id == exit.loan_id)
                .unwrap();
            if exit.exit_month < loan.origination_month + min_hold {
                assert_eq!(exit.exit_type, ExitType::Default);
            }
        }
    }
}

#[test]
fn test_each_loan_exits_at_most_once() {
    let config = portfolio(true);
    for seed in 0..12 {
        let result = simulate(&config, seed).unwrap();
        let mut seen = FxHashSet::default();
        for exit in &result.exits {
            assert!(seen.insert(exit.loan_id), "{:?} exited twice", exit.loan_id);
        }
        for held in &result.held {
            assert!(seen.insert(held.loan_id), "{:?} both exited and held", held.loan_id);
        }
        assert_eq!(seen.len(), config.loans.len());
    }
}

/// Hold periods capped at the maximum force term completion on schedule
#[test]
fn test_max_hold_forces_term_completion() {
    let config = SimulationBuilder::new()
        .horizon_years(6)
        .zone(0, 0.03, 0.10)
        .base_exit_rate(0.0)
        .life_event_probability(0.0)
        .hold_period_years(1.0, 3.0)
        .loan(0, 500_000.0, 0.3)
        .originate_at(5)
        .loan(0, 450_000.0, 0.3)
        .build()
        .unwrap();

    let result = simulate(&config, 17).unwrap();
    assert_eq!(result.exits.len(), 2);
    for (exit, loan) in result.exits.iter().zip(&config.loans) {
        assert_eq!(exit.exit_type, ExitType::TermCompletion);
        assert_eq!(exit.trigger, ExitTrigger::MaxHold);
        assert_eq!(exit.exit_month, loan.origination_month + 36);
    }
}

/// A stressed loan-to-value breach defaults every loan at its first month
#[test]
fn test_stress_breach_defaults_immediately() {
    let config = SimulationBuilder::new()
        .horizon_years(4)
        .zone(0, 0.03, 0.05)
        .base_exit_rate(0.0)
        .stress_ltv(0.5, 0.9)
        .loan(0, 400_000.0, 0.6)
        .loan(0, 300_000.0, 0.7)
        .build()
        .unwrap();

    let result = simulate(&config, 2).unwrap();
    for exit in &result.exits {
        assert_eq!(exit.exit_type, ExitType::Default);
        assert_eq!(exit.trigger, ExitTrigger::StressLtv);
        assert_eq!(exit.exit_month, 1);
        assert!(exit.settlement_month > exit.exit_month);
    }
}

/// Twenty identical loans in one zone: with identical hazards, only the
/// behavioural correlation decides whether their exits coincide
fn identical_loans(rho: f64) -> SimulationConfig {
    let mut builder = SimulationBuilder::new()
        .horizon_years(5)
        .zone(0, 0.03, 0.0)
        .variation(0.0, 0.0)
        .base_exit_rate(0.3)
        .hold_period_years(1.0, 10.0)
        .loan_term(180)
        .life_event_probability(0.0)
        .behavioral_correlation(rho);
    for _ in 0..20 {
        builder = builder.loan(0, 400_000.0, 0.3);
    }
    builder.build().unwrap()
}

#[test]
fn test_full_behavioral_correlation_synchronizes_zone_exits() {
    let clustered = identical_loans(1.0);
    let independent = identical_loans(0.0);
    let seeds = 0..60u64;

    let mut clustered_exits = 0;
    let mut independent_exits = 0;
    let mut independent_months = 0;
    for seed in seeds.clone() {
        let result = simulate(&clustered, seed).unwrap();
        let months: FxHashSet<u32> = result.exits.iter().map(|e| e.exit_month).collect();
        assert!(months.len() <= 1, "seed {seed}: exits spread over {months:?}");
        assert!(result.exits.is_empty() || result.exits.len() == 20);
        clustered_exits += result.exits.len();

        let result = simulate(&independent, seed).unwrap();
        let months: FxHashSet<u32> = result.exits.iter().map(|e| e.exit_month).collect();
        independent_months += months.len();
        independent_exits += result.exits.len();
    }

    let paths = seeds.count();
    assert!(independent_months >= 3 * paths, "only {independent_months} exit months");

    // The copula leaves each loan's exit probability unchanged
    let loans = (20 * paths) as f64;
    let clustered_rate = clustered_exits as f64 / loans;
    let independent_rate = independent_exits as f64 / loans;
    assert!(
        (clustered_rate - independent_rate).abs() < 0.2,
        "exit rates {clustered_rate} vs {independent_rate}"
    );
}
