//! Seeded reproducibility
//!
//! Every random draw is derived from the path seed, so re-running a seed must
//! reproduce the path bit for bit and changing the seed must change it.

use crate::config::{PriceModel, Regime, SimulationBuilder, SimulationConfig};
use crate::model::MonteCarloConfig;
use crate::monte_carlo::{MonteCarloOrchestrator, monte_carlo_simulate};
use crate::reinvestment::NoReinvestment;
use crate::simulation::{Pipeline, simulate};

fn portfolio() -> SimulationConfig {
    SimulationBuilder::new()
        .horizon_years(6)
        .zone(0, 0.04, 0.12)
        .zone(1, 0.03, 0.09)
        .zone(2, 0.05, 0.15)
        .uniform_correlation(0.4)
        .variation(0.04, 0.06)
        .loan_interest_rate(0.045)
        .in_suburb(Some(7))
        .loan(0, 700_000.0, 0.2)
        .loan(0, 540_000.0, 0.25)
        .in_suburb(None)
        .loan(1, 480_000.0, 0.3)
        .originate_at(9)
        .loan(2, 910_000.0, 0.15)
        .loan(2, 620_000.0, 0.2)
        .build()
        .unwrap()
}

#[test]
fn test_same_seed_reproduces_path() {
    let config = portfolio();
    let a = simulate(&config, 2024).unwrap();
    let b = simulate(&config, 2024).unwrap();

    assert_eq!(a.price_paths, b.price_paths);
    assert_eq!(a.macro_path, b.macro_path);
    assert_eq!(a.exits, b.exits);
    assert_eq!(a.held, b.held);
    assert_eq!(a.cashflows, b.cashflows);
    assert_eq!(a.waterfall, b.waterfall);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn test_different_seeds_diverge() {
    let config = portfolio();
    let a = simulate(&config, 1).unwrap();
    let b = simulate(&config, 2).unwrap();
    assert_ne!(a.price_paths, b.price_paths);
}

#[test]
fn test_pipeline_reuse_matches_fresh_run() {
    let config = portfolio();
    let pipeline = Pipeline::new(&config).unwrap();
    let warm_up = pipeline.run(0, 3, &NoReinvestment).unwrap();
    let reused = pipeline.run(0, 8, &NoReinvestment).unwrap();
    let fresh = simulate(&config, 8).unwrap();

    assert_eq!(reused.price_paths, fresh.price_paths);
    assert_eq!(reused.exits, fresh.exits);
    assert_ne!(warm_up.price_paths, reused.price_paths);
}

#[test]
fn test_regime_switching_is_reproducible() {
    let config = SimulationBuilder::new()
        .horizon_years(5)
        .zone(0, 0.04, 0.10)
        .price_model(PriceModel::RegimeSwitching {
            regimes: vec![
                Regime {
                    name: "expansion".into(),
                    annual_drift: 0.01,
                    annual_volatility: 0.08,
                    recession: false,
                },
                Regime {
                    name: "contraction".into(),
                    annual_drift: -0.06,
                    annual_volatility: 0.18,
                    recession: true,
                },
            ],
            transition: vec![vec![0.97, 0.03], vec![0.10, 0.90]],
            initial_regime: 0,
        })
        .loan(0, 500_000.0, 0.25)
        .loan(0, 650_000.0, 0.2)
        .build()
        .unwrap();

    let a = simulate(&config, 77).unwrap();
    let b = simulate(&config, 77).unwrap();
    assert_eq!(a.macro_path, b.macro_path);
    assert_eq!(a.price_paths, b.price_paths);
    assert!(a.macro_path.iter().all(|m| m.regime < 2));
}

#[test]
fn test_monte_carlo_paths_match_single_path_runs() {
    let config = portfolio();
    let mc = MonteCarloConfig {
        iterations: 6,
        seed: Some(31),
        keep_path_results: true,
        ..Default::default()
    };
    let summary = monte_carlo_simulate(&config, &mc).unwrap();
    assert_eq!(summary.master_seed, 31);
    assert_eq!(summary.path_results.len(), 6);

    for (index, path) in summary.path_results.iter().enumerate() {
        let seed = MonteCarloOrchestrator::path_seed(31, index);
        assert_eq!(path.seed, seed);
        let single = simulate(&config, seed).unwrap();
        assert_eq!(path.price_paths, single.price_paths);
        assert_eq!(path.exits, single.exits);
    }
}
