//! Builder DSL for fluent configuration

use crate::config::{ExitConfig, FeeBasis, SimulationBuilder, WaterfallMode};
use crate::error::ConfigError;
use crate::model::{Granularity, InterestTreatment, LeverageEntry, Loan, LoanId, PropertyId, ZoneId};

#[test]
fn test_fund_configured_fluently() {
    let config = SimulationBuilder::new()
        .start(2026, 7, 1)
        .horizon_years(8)
        .granularity(Granularity::Monthly)
        .zone(0, 0.045, 0.11)
        .zone(1, 0.030, 0.07)
        .correlation(vec![vec![1.0, 0.55], vec![0.55, 1.0]])
        .migration_score(1, 0.4)
        .loan_interest_rate(0.05)
        .interest_treatment(InterestTreatment::Accrue)
        .loan(0, 800_000.0, 0.2)
        .loan(1, 450_000.0, 0.25)
        .committed_capital(400_000.0)
        .management_fee(0.015, FeeBasis::Invested)
        .origination_fee(0.01)
        .cash_reserve(5_000.0)
        .recycle_until(36)
        .leverage(LeverageEntry {
            month: 12,
            draw: 50_000.0,
            ..Default::default()
        })
        .waterfall_mode(WaterfallMode::WholeOfFund)
        .hurdle_rate(0.07)
        .carry(0.15)
        .catch_up(0.8)
        .carry_band(2.0, 0.25)
        .clawback(true, 1_000.0)
        .build()
        .unwrap();

    assert_eq!(config.fund.start_date, jiff::civil::date(2026, 7, 1));
    assert_eq!(config.fund.horizon_months, 96);
    assert_eq!(config.fund.granularity, Granularity::Monthly);
    assert_eq!(config.fund.committed_capital, Some(400_000.0));
    assert_eq!(config.committed_capital(), 400_000.0);
    assert_eq!(config.fund.fee_basis, FeeBasis::Invested);
    assert_eq!(config.fund.recycle_until_month, Some(36));
    assert_eq!(config.fund.leverage.len(), 1);

    assert_eq!(config.market.zones.len(), 2);
    assert_eq!(config.market.zones[1].migration_score, 0.4);
    assert_eq!(config.exits.interest_treatment, InterestTreatment::Accrue);

    assert_eq!(config.waterfall.mode, WaterfallMode::WholeOfFund);
    assert!(config.waterfall.multi_tier_enabled);
    assert_eq!(config.waterfall.residual_bands(), vec![(0.0, 0.15), (2.0, 0.25)]);
    assert_eq!(config.waterfall.clawback_threshold, 1_000.0);

    assert_eq!(config.loans[0].loan_size, 160_000.0);
    assert_eq!(config.loans[1].zone, ZoneId(1));
    assert_eq!(config.loans[1].interest_rate, 0.05);
}

#[test]
fn test_explicit_loans_advance_ids() {
    let config = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .with_loan(Loan {
            loan_id: LoanId(10),
            property_id: PropertyId(10),
            zone: ZoneId(0),
            suburb: None,
            origination_month: 0,
            loan_size: 100_000.0,
            ltv: 0.25,
            interest_rate: 0.0,
            term_months: 120,
            property_value_at_origination: 400_000.0,
        })
        .loan(0, 500_000.0, 0.2)
        .build()
        .unwrap();

    assert_eq!(config.loans[1].loan_id, LoanId(11));
    assert_eq!(config.loans[1].property_id, PropertyId(11));
}

#[test]
fn test_portfolio_required() {
    let result = SimulationBuilder::new().zone(0, 0.03, 0.1).build();
    assert_eq!(result, Err(ConfigError::EmptyPortfolio));
}

#[test]
fn test_loan_in_unconfigured_zone() {
    let result = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .loan(4, 500_000.0, 0.2)
        .build();
    assert_eq!(
        result,
        Err(ConfigError::UnknownZone {
            loan: LoanId(0),
            zone: ZoneId(4)
        })
    );
}

#[test]
fn test_inconsistent_correlation_rejected() {
    // Pairwise plausible, jointly impossible
    let result = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .zone(1, 0.03, 0.1)
        .zone(2, 0.03, 0.1)
        .correlation(vec![
            vec![1.0, 0.9, 0.9],
            vec![0.9, 1.0, -0.9],
            vec![0.9, -0.9, 1.0],
        ])
        .loan(0, 500_000.0, 0.2)
        .build();
    assert!(matches!(result, Err(ConfigError::NotPositiveSemiDefinite { .. })));

    let result = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .zone(1, 0.03, 0.1)
        .correlation(vec![vec![1.0]])
        .loan(0, 500_000.0, 0.2)
        .build();
    assert!(matches!(result, Err(ConfigError::CorrelationShape { zones: 2, .. })));
}

#[test]
fn test_rates_outside_unit_interval_rejected() {
    let result = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .appreciation_share(1.4)
        .loan(0, 500_000.0, 0.2)
        .build();
    assert!(matches!(
        result,
        Err(ConfigError::RateOutOfRange {
            field: "appreciation_share",
            ..
        })
    ));

    let result = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .exit_weights(0.0, 0.0, 0.0)
        .loan(0, 500_000.0, 0.2)
        .build();
    assert!(matches!(result, Err(ConfigError::TierWeights { .. })));
}

#[test]
fn test_exit_config_replaced_then_refined() {
    let exits = ExitConfig {
        recovery_rate: 0.6,
        foreclosure_time_months: 9,
        ..Default::default()
    };
    let config = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .exit_config(exits)
        .base_exit_rate(0.2)
        .loan(0, 500_000.0, 0.2)
        .build()
        .unwrap();
    assert_eq!(config.exits.recovery_rate, 0.6);
    assert_eq!(config.exits.foreclosure_time_months, 9);
    assert_eq!(config.exits.base_exit_rate, 0.2);
}

#[test]
fn test_term_shorter_than_minimum_hold_rejected() {
    let result = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .hold_period_years(3.0, 10.0)
        .loan_term(24)
        .loan(0, 500_000.0, 0.2)
        .build();
    assert!(matches!(result, Err(ConfigError::Invalid { ref field, .. }) if field == "term_months"));
}

#[test]
fn test_config_round_trips_through_json() {
    let config = SimulationBuilder::new()
        .zone(0, 0.03, 0.1)
        .tiered_appreciation(vec![0.0, 0.25], vec![0.2, 0.3])
        .loan(0, 500_000.0, 0.2)
        .build()
        .unwrap();
    let json = serde_json::to_string(&config).unwrap();
    let parsed: crate::config::SimulationConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}
