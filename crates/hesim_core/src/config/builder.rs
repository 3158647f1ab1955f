//! Simulation Builder
//!
//! The SimulationBuilder provides a fluent API for assembling a fund
//! configuration with automatic loan and property ID assignment.
//!
//! # Example
//!
//! ```ignore
//! use hesim_core::config::SimulationBuilder;
//! use hesim_core::model::Granularity;
//!
//! let config = SimulationBuilder::new()
//!     .start(2025, 1, 1)
//!     .horizon_years(8)
//!     .granularity(Granularity::Quarterly)
//!
//!     // Zones from the location-intelligence layer
//!     .zone(0, 0.04, 0.10)
//!     .zone(1, 0.02, 0.14)
//!     .uniform_correlation(0.5)
//!
//!     // Portfolio
//!     .loan_term(120)
//!     .loan(0, 650_000.0, 0.55)
//!     .loan(1, 480_000.0, 0.60)
//!
//!     // Fund terms
//!     .management_fee(0.02, FeeBasis::Committed)
//!     .hurdle_rate(0.08)
//!     .carry(0.20)
//!     .build()?;
//! ```

use jiff::civil::Date;

use super::SimulationConfig;
use super::exits::ExitConfig;
use super::fund::FeeBasis;
use super::market::{MacroConfig, PriceModel, VariationFactors, ZoneParams};
use super::waterfall::{CarryBand, WaterfallMode};
use crate::error::ConfigError;
use crate::model::{
    Granularity, InterestTreatment, LeverageEntry, Loan, LoanId, PropertyId, SuburbId, ZoneId,
};

/// Builder for fund simulations with automatic ID assignment
pub struct SimulationBuilder {
    config: SimulationConfig,
    next_loan_id: u32,

    // Defaults applied to loans added with `loan()`
    loan_term_months: u32,
    loan_interest_rate: f64,
    loan_origination_month: u32,
    loan_suburb: Option<SuburbId>,
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationBuilder {
    /// Create a new simulation builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SimulationConfig::default(),
            next_loan_id: 0,
            loan_term_months: 120,
            loan_interest_rate: 0.0,
            loan_origination_month: 0,
            loan_suburb: None,
        }
    }

    // =========================================================================
    // Fund timeline
    // =========================================================================

    /// Set the fund start date
    #[must_use]
    pub fn start_date(mut self, date: Date) -> Self {
        self.config.fund.start_date = date;
        self
    }

    /// Set the fund start date (convenience method)
    #[must_use]
    pub fn start(mut self, year: i16, month: i8, day: i8) -> Self {
        self.config.fund.start_date = jiff::civil::date(year, month, day);
        self
    }

    #[must_use]
    pub fn horizon_months(mut self, months: u32) -> Self {
        self.config.fund.horizon_months = months;
        self
    }

    #[must_use]
    pub fn horizon_years(self, years: u32) -> Self {
        self.horizon_months(years * 12)
    }

    #[must_use]
    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.config.fund.granularity = granularity;
        self
    }

    // =========================================================================
    // Market
    // =========================================================================

    /// Add a zone with its annual appreciation and volatility
    #[must_use]
    pub fn zone(mut self, zone: u16, annual_appreciation: f64, annual_volatility: f64) -> Self {
        self.config.market.zones.push(ZoneParams {
            zone: ZoneId(zone),
            annual_appreciation,
            annual_volatility,
            migration_score: 0.0,
        });
        self
    }

    /// Set the migration score of an already added zone
    #[must_use]
    pub fn migration_score(mut self, zone: u16, score: f64) -> Self {
        if let Some(params) = self
            .config
            .market
            .zones
            .iter_mut()
            .find(|z| z.zone == ZoneId(zone))
        {
            params.migration_score = score;
        }
        self
    }

    /// Zone x zone correlation matrix, in the order zones were added
    #[must_use]
    pub fn correlation(mut self, matrix: Vec<Vec<f64>>) -> Self {
        self.config.market.correlation = matrix;
        self
    }

    /// Same pairwise correlation between every pair of zones added so far
    #[must_use]
    pub fn uniform_correlation(mut self, rho: f64) -> Self {
        let n = self.config.market.zones.len();
        self.config.market.correlation = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { rho }).collect())
            .collect();
        self
    }

    #[must_use]
    pub fn price_model(mut self, model: PriceModel) -> Self {
        self.config.market.model = model;
        self
    }

    #[must_use]
    pub fn variation(mut self, suburb_volatility: f64, property_volatility: f64) -> Self {
        self.config.market.variation = VariationFactors {
            suburb_volatility,
            property_volatility,
        };
        self
    }

    #[must_use]
    pub fn economy(mut self, economy: MacroConfig) -> Self {
        self.config.market.economy = economy;
        self
    }

    // =========================================================================
    // Portfolio
    // =========================================================================

    /// Term applied to subsequently added loans
    #[must_use]
    pub fn loan_term(mut self, months: u32) -> Self {
        self.loan_term_months = months;
        self
    }

    /// Contractual rate applied to subsequently added loans
    #[must_use]
    pub fn loan_interest_rate(mut self, rate: f64) -> Self {
        self.loan_interest_rate = rate;
        self
    }

    /// Origination month applied to subsequently added loans
    #[must_use]
    pub fn originate_at(mut self, month: u32) -> Self {
        self.loan_origination_month = month;
        self
    }

    /// Suburb applied to subsequently added loans
    #[must_use]
    pub fn in_suburb(mut self, suburb: Option<u32>) -> Self {
        self.loan_suburb = suburb.map(SuburbId);
        self
    }

    /// Add a loan sized at `ltv` of the property value. Loan and property IDs
    /// are assigned sequentially.
    #[must_use]
    pub fn loan(mut self, zone: u16, property_value: f64, ltv: f64) -> Self {
        let id = self.next_loan_id;
        self.next_loan_id += 1;
        self.config.loans.push(Loan {
            loan_id: LoanId(id),
            property_id: PropertyId(id),
            zone: ZoneId(zone),
            suburb: self.loan_suburb,
            origination_month: self.loan_origination_month,
            loan_size: property_value * ltv,
            ltv,
            interest_rate: self.loan_interest_rate,
            term_months: self.loan_term_months,
            property_value_at_origination: property_value,
        });
        self
    }

    /// Add a fully specified loan
    #[must_use]
    pub fn with_loan(mut self, loan: Loan) -> Self {
        self.next_loan_id = self.next_loan_id.max(loan.loan_id.0 + 1);
        self.config.loans.push(loan);
        self
    }

    // =========================================================================
    // Exit behaviour
    // =========================================================================

    #[must_use]
    pub fn exit_config(mut self, exits: ExitConfig) -> Self {
        self.config.exits = exits;
        self
    }

    #[must_use]
    pub fn base_exit_rate(mut self, rate: f64) -> Self {
        self.config.exits.base_exit_rate = rate;
        self
    }

    #[must_use]
    pub fn hold_period_years(mut self, min: f64, max: f64) -> Self {
        self.config.exits.min_hold_period_years = min;
        self.config.exits.max_hold_period_years = max;
        self
    }

    #[must_use]
    pub fn exit_weights(mut self, sale: f64, refinance: f64, default: f64) -> Self {
        self.config.exits.sale_weight = sale;
        self.config.exits.refinance_weight = refinance;
        self.config.exits.default_weight = default;
        self
    }

    #[must_use]
    pub fn appreciation_share(mut self, share: f64) -> Self {
        self.config.exits.appreciation_share = share;
        self
    }

    /// Banded appreciation share; each threshold is the inclusive lower bound of its band
    #[must_use]
    pub fn tiered_appreciation(mut self, thresholds: Vec<f64>, shares: Vec<f64>) -> Self {
        self.config.exits.tiered_appreciation_thresholds = thresholds;
        self.config.exits.tiered_appreciation_shares = shares;
        self
    }

    #[must_use]
    pub fn life_event_probability(mut self, probability: f64) -> Self {
        self.config.exits.life_event_probability = probability;
        self
    }

    #[must_use]
    pub fn behavioral_correlation(mut self, rho: f64) -> Self {
        self.config.exits.behavioral_correlation = rho;
        self
    }

    #[must_use]
    pub fn stress_ltv(mut self, price_shock: f64, default_threshold: f64) -> Self {
        self.config.exits.stress_price_shock = price_shock;
        self.config.exits.stress_ltv_default_threshold = Some(default_threshold);
        self
    }

    #[must_use]
    pub fn interest_treatment(mut self, treatment: InterestTreatment) -> Self {
        self.config.exits.interest_treatment = treatment;
        self
    }

    // =========================================================================
    // Fund economics
    // =========================================================================

    #[must_use]
    pub fn committed_capital(mut self, amount: f64) -> Self {
        self.config.fund.committed_capital = Some(amount);
        self
    }

    #[must_use]
    pub fn management_fee(mut self, rate: f64, basis: FeeBasis) -> Self {
        self.config.fund.management_fee_rate = rate;
        self.config.fund.fee_basis = basis;
        self
    }

    #[must_use]
    pub fn origination_fee(mut self, rate: f64) -> Self {
        self.config.fund.origination_fee_rate = rate;
        self
    }

    #[must_use]
    pub fn fund_expenses(mut self, rate: f64) -> Self {
        self.config.fund.fund_expense_rate = rate;
        self
    }

    #[must_use]
    pub fn cash_reserve(mut self, amount: f64) -> Self {
        self.config.fund.cash_reserve = amount;
        self
    }

    #[must_use]
    pub fn recycle_until(mut self, month: u32) -> Self {
        self.config.fund.recycle_until_month = Some(month);
        self
    }

    /// Add one row of the leverage-facility schedule
    #[must_use]
    pub fn leverage(mut self, entry: LeverageEntry) -> Self {
        self.config.fund.leverage.push(entry);
        self
    }

    #[must_use]
    pub fn liquidate_at_horizon(mut self, liquidate: bool) -> Self {
        self.config.fund.liquidate_at_horizon = liquidate;
        self
    }

    // =========================================================================
    // Waterfall
    // =========================================================================

    #[must_use]
    pub fn waterfall_mode(mut self, mode: WaterfallMode) -> Self {
        self.config.waterfall.mode = mode;
        self
    }

    #[must_use]
    pub fn hurdle_rate(mut self, rate: f64) -> Self {
        self.config.waterfall.hurdle_rate = rate;
        self
    }

    #[must_use]
    pub fn carry(mut self, rate: f64) -> Self {
        self.config.waterfall.carried_interest_rate = rate;
        self
    }

    #[must_use]
    pub fn catch_up(mut self, rate: f64) -> Self {
        self.config.waterfall.catch_up_rate = rate;
        self
    }

    /// Add an escalating carry band; enables multi-tier carry
    #[must_use]
    pub fn carry_band(mut self, lp_multiple: f64, carried_interest_rate: f64) -> Self {
        self.config.waterfall.multi_tier_enabled = true;
        self.config.waterfall.carry_bands.push(CarryBand {
            lp_multiple,
            carried_interest_rate,
        });
        self
    }

    #[must_use]
    pub fn clawback(mut self, enabled: bool, threshold: f64) -> Self {
        self.config.waterfall.enable_clawback = enabled;
        self.config.waterfall.clawback_threshold = threshold;
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Validate and return the configuration
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without validation
    #[must_use]
    pub fn build_unchecked(self) -> SimulationConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_and_sizing() {
        let config = SimulationBuilder::new()
            .zone(0, 0.03, 0.1)
            .loan_term(84)
            .loan(0, 500_000.0, 0.6)
            .originate_at(6)
            .loan(0, 200_000.0, 0.5)
            .build()
            .unwrap();

        assert_eq!(config.loans.len(), 2);
        assert_eq!(config.loans[0].loan_id, LoanId(0));
        assert_eq!(config.loans[1].property_id, PropertyId(1));
        assert_eq!(config.loans[0].loan_size, 300_000.0);
        assert_eq!(config.loans[0].term_months, 84);
        assert_eq!(config.loans[0].origination_month, 0);
        assert_eq!(config.loans[1].origination_month, 6);
    }

    #[test]
    fn test_uniform_correlation() {
        let config = SimulationBuilder::new()
            .zone(0, 0.03, 0.1)
            .zone(1, 0.03, 0.1)
            .zone(2, 0.03, 0.1)
            .uniform_correlation(0.4)
            .build_unchecked();
        assert_eq!(config.market.correlation[0], vec![1.0, 0.4, 0.4]);
        assert_eq!(config.market.correlation[2][2], 1.0);
    }

    #[test]
    fn test_build_validates() {
        let result = SimulationBuilder::new()
            .zone(0, 0.03, 0.1)
            .zone(1, 0.03, 0.1)
            .correlation(vec![vec![1.0, 1.5], vec![1.5, 1.0]])
            .loan(0, 300_000.0, 0.5)
            .build();
        assert!(result.is_err());
    }
}
