use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::market::check_rate;
use crate::error::ConfigError;
use crate::model::{Granularity, LeverageEntry};

/// Capital base on which the management fee is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeeBasis {
    #[default]
    Committed,
    /// Loan principal outstanding during the month
    Invested,
}

fn default_start_date() -> Date {
    jiff::civil::date(2025, 1, 1)
}

fn default_horizon_months() -> u32 {
    120
}

fn default_management_fee_rate() -> f64 {
    0.02
}

fn default_true() -> bool {
    true
}

/// Fund-level economics applied on top of loan cashflows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundConfig {
    #[serde(default = "default_start_date")]
    pub start_date: Date,
    /// Fund life; month 0 is the first funding month
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    #[serde(default)]
    pub granularity: Granularity,
    /// Defaults to the total size of the initial portfolio
    #[serde(default)]
    pub committed_capital: Option<f64>,
    /// Fee charged to the borrower at funding, as a fraction of loan size
    #[serde(default)]
    pub origination_fee_rate: f64,
    #[serde(default = "default_management_fee_rate")]
    pub management_fee_rate: f64,
    #[serde(default)]
    pub fee_basis: FeeBasis,
    /// Annual operating expenses as a fraction of committed capital
    #[serde(default)]
    pub fund_expense_rate: f64,
    /// Cash kept back from each distribution
    #[serde(default)]
    pub cash_reserve: f64,
    /// No distributions before this month while proceeds are being recycled
    #[serde(default)]
    pub recycle_until_month: Option<u32>,
    /// Draw/repayment/interest schedule from the leverage facility
    #[serde(default)]
    pub leverage: Vec<LeverageEntry>,
    /// Realize loans still held at the horizon at their mark value
    #[serde(default = "default_true")]
    pub liquidate_at_horizon: bool,
}

impl Default for FundConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            horizon_months: default_horizon_months(),
            granularity: Granularity::default(),
            committed_capital: None,
            origination_fee_rate: 0.0,
            management_fee_rate: default_management_fee_rate(),
            fee_basis: FeeBasis::default(),
            fund_expense_rate: 0.0,
            cash_reserve: 0.0,
            recycle_until_month: None,
            leverage: Vec::new(),
            liquidate_at_horizon: true,
        }
    }
}

impl FundConfig {
    /// Calendar date on which `period` begins
    #[must_use]
    pub fn period_start(&self, period: usize) -> Date {
        let months = period as i64 * i64::from(self.granularity.months_per_period());
        self.start_date
            .saturating_add(jiff::Span::new().months(months))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_months == 0 {
            return Err(ConfigError::invalid("horizon_months", "must be positive"));
        }
        check_rate("origination_fee_rate", self.origination_fee_rate)?;
        check_rate("management_fee_rate", self.management_fee_rate)?;
        check_rate("fund_expense_rate", self.fund_expense_rate)?;
        if let Some(committed) = self.committed_capital
            && (!committed.is_finite() || committed <= 0.0)
        {
            return Err(ConfigError::invalid(
                "committed_capital",
                format!("must be positive (got {committed})"),
            ));
        }
        if !self.cash_reserve.is_finite() || self.cash_reserve < 0.0 {
            return Err(ConfigError::invalid("cash_reserve", "must be non-negative"));
        }
        for entry in &self.leverage {
            if entry.month > self.horizon_months {
                return Err(ConfigError::invalid(
                    "leverage",
                    format!(
                        "entry at month {} is beyond the {}-month horizon",
                        entry.month, self.horizon_months
                    ),
                ));
            }
            if entry.draw < 0.0 || entry.repayment < 0.0 || entry.interest < 0.0 {
                return Err(ConfigError::invalid(
                    "leverage",
                    format!("entry at month {} has a negative amount", entry.month),
                ));
            }
        }
        Ok(())
    }
}
