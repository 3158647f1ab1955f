//! Simulation configuration
//!
//! The main configuration type is `SimulationConfig`, which contains everything
//! needed to simulate one fund: the loan portfolio, market assumptions, exit
//! behaviour, fund economics and the distribution waterfall.
//!
//! # Builder DSL
//!
//! ```ignore
//! use hesim_core::config::{SimulationBuilder, WaterfallMode};
//!
//! let config = SimulationBuilder::new()
//!     .start(2025, 1, 1)
//!     .horizon_years(10)
//!     .zone(0, 0.04, 0.10)
//!     .zone(1, 0.03, 0.12)
//!     .correlation(vec![vec![1.0, 0.6], vec![0.6, 1.0]])
//!     .loan(0, 500_000.0, 0.6)
//!     .loan(1, 420_000.0, 0.5)
//!     .hurdle_rate(0.08)
//!     .carry(0.20)
//!     .waterfall_mode(WaterfallMode::Periodic)
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Loan;

pub mod builder;
pub mod exits;
pub mod fund;
pub mod market;
pub mod waterfall;

pub use builder::SimulationBuilder;
pub use exits::ExitConfig;
pub use fund::{FeeBasis, FundConfig};
pub use market::{
    MacroConfig, MarketConfig, PriceModel, Regime, VariationFactors, ZoneParams, monthly_probability,
    monthly_rate,
};
pub use waterfall::{CarryBand, WaterfallConfig, WaterfallMode};

/// Complete configuration of one fund simulation
///
/// Shared read-only by every Monte Carlo path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Initial portfolio from the portfolio-construction layer
    pub loans: Vec<Loan>,
    pub market: MarketConfig,
    #[serde(default)]
    pub exits: ExitConfig,
    #[serde(default)]
    pub fund: FundConfig,
    #[serde(default)]
    pub waterfall: WaterfallConfig,
}

impl SimulationConfig {
    /// Committed capital, defaulting to the size of the initial portfolio
    #[must_use]
    pub fn committed_capital(&self) -> f64 {
        self.fund
            .committed_capital
            .unwrap_or_else(|| self.loans.iter().map(|l| l.loan_size).sum())
    }

    /// Check every constraint the engine relies on. Runs before any path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loans.is_empty() {
            return Err(ConfigError::EmptyPortfolio);
        }
        self.market.validate()?;
        self.exits.validate()?;
        self.fund.validate()?;
        self.waterfall.validate()?;

        let min_hold = self.exits.min_hold_months();
        let mut loan_ids = rustc_hash::FxHashSet::default();
        let mut property_ids = rustc_hash::FxHashSet::default();
        for loan in &self.loans {
            self.validate_loan(loan, min_hold)?;
            if !loan_ids.insert(loan.loan_id) {
                return Err(ConfigError::invalid(
                    "loans",
                    format!("duplicate loan id {:?}", loan.loan_id),
                ));
            }
            if !property_ids.insert(loan.property_id) {
                return Err(ConfigError::invalid(
                    "loans",
                    format!("property {:?} backs more than one loan", loan.property_id),
                ));
            }
        }
        Ok(())
    }

    /// Checks applied to every loan, including those originated by reinvestment
    pub(crate) fn validate_loan(&self, loan: &Loan, min_hold_months: u32) -> Result<(), ConfigError> {
        if self.market.zone_index(loan.zone).is_none() {
            return Err(ConfigError::UnknownZone {
                loan: loan.loan_id,
                zone: loan.zone,
            });
        }
        if !loan.loan_size.is_finite() || loan.loan_size <= 0.0 {
            return Err(ConfigError::invalid(
                "loan_size",
                format!("loan {:?} has size {}", loan.loan_id, loan.loan_size),
            ));
        }
        if !loan.property_value_at_origination.is_finite()
            || loan.property_value_at_origination <= 0.0
        {
            return Err(ConfigError::invalid(
                "property_value_at_origination",
                format!(
                    "loan {:?} has property value {}",
                    loan.loan_id, loan.property_value_at_origination
                ),
            ));
        }
        if !(loan.ltv > 0.0 && loan.ltv <= 1.0) {
            return Err(ConfigError::RateOutOfRange {
                field: "ltv",
                value: loan.ltv,
            });
        }
        if !loan.interest_rate.is_finite() || loan.interest_rate < 0.0 {
            return Err(ConfigError::invalid(
                "interest_rate",
                format!("loan {:?} has rate {}", loan.loan_id, loan.interest_rate),
            ));
        }
        if loan.term_months < min_hold_months.max(1) {
            return Err(ConfigError::invalid(
                "term_months",
                format!(
                    "loan {:?} term of {} months is shorter than the {min_hold_months}-month minimum hold",
                    loan.loan_id, loan.term_months
                ),
            ));
        }
        if loan.origination_month >= self.fund.horizon_months {
            return Err(ConfigError::invalid(
                "origination_month",
                format!(
                    "loan {:?} originates at month {}, at or after the horizon",
                    loan.loan_id, loan.origination_month
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoanId, PropertyId, ZoneId};

    fn config() -> SimulationConfig {
        SimulationBuilder::new()
            .zone(0, 0.03, 0.10)
            .loan(0, 500_000.0, 0.6)
            .loan(0, 400_000.0, 0.5)
            .build_unchecked()
    }

    #[test]
    fn test_valid_config() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.committed_capital(), 500_000.0);
    }

    #[test]
    fn test_empty_portfolio() {
        let config = SimulationConfig {
            loans: vec![],
            ..config()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPortfolio));
    }

    #[test]
    fn test_unknown_zone() {
        let mut config = config();
        config.loans[1].zone = ZoneId(9);
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownZone {
                loan: LoanId(1),
                zone: ZoneId(9)
            })
        );
    }

    #[test]
    fn test_duplicate_property() {
        let mut config = config();
        config.loans[1].property_id = PropertyId(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_zero_loan_size() {
        let mut config = config();
        config.loans[0].loan_size = 0.0;
        assert!(config.validate().is_err());
    }
}
