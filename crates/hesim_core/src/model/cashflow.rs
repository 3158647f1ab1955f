use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// Reporting granularity of the fund cashflow statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Granularity {
    Monthly,
    #[default]
    Quarterly,
    Annual,
}

impl Granularity {
    #[must_use]
    pub fn months_per_period(self) -> u32 {
        match self {
            Granularity::Monthly => 1,
            Granularity::Quarterly => 3,
            Granularity::Annual => 12,
        }
    }

    #[must_use]
    pub fn periods_per_year(self) -> u32 {
        12 / self.months_per_period()
    }

    /// Period index containing fund month `month`
    #[must_use]
    pub fn period_of(self, month: u32) -> usize {
        (month / self.months_per_period()) as usize
    }

    /// Number of periods needed to cover months `0..=horizon_months`
    #[must_use]
    pub fn period_count(self, horizon_months: u32) -> usize {
        self.period_of(horizon_months) + 1
    }
}

/// One row of the fund cashflow statement.
///
/// Inflows to the fund are positive fields and outflows are stored as
/// positive magnitudes; `net_cashflow` applies the signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundPeriodCashflow {
    pub period: usize,
    pub period_start: Date,
    pub capital_calls: f64,
    pub loan_investments: f64,
    pub origination_fees: f64,
    pub principal_repayments: f64,
    pub interest_income: f64,
    pub appreciation_share: f64,
    /// Realized value of positions still held at the horizon (final period only)
    pub residual_realization: f64,
    pub management_fees: f64,
    pub fund_expenses: f64,
    pub leverage_draws: f64,
    pub leverage_repayments: f64,
    pub leverage_interest: f64,
    pub distributions: f64,
    pub net_cashflow: f64,
    pub cumulative_cashflow: f64,
    /// Cash held by the fund at period end
    pub cash_balance: f64,
}

impl FundPeriodCashflow {
    #[must_use]
    pub fn empty(period: usize, period_start: Date) -> Self {
        Self {
            period,
            period_start,
            capital_calls: 0.0,
            loan_investments: 0.0,
            origination_fees: 0.0,
            principal_repayments: 0.0,
            interest_income: 0.0,
            appreciation_share: 0.0,
            residual_realization: 0.0,
            management_fees: 0.0,
            fund_expenses: 0.0,
            leverage_draws: 0.0,
            leverage_repayments: 0.0,
            leverage_interest: 0.0,
            distributions: 0.0,
            net_cashflow: 0.0,
            cumulative_cashflow: 0.0,
            cash_balance: 0.0,
        }
    }

    /// Operating inflows before capital calls and distributions
    #[must_use]
    pub fn inflows(&self) -> f64 {
        self.origination_fees
            + self.principal_repayments
            + self.interest_income
            + self.appreciation_share
            + self.residual_realization
            + self.leverage_draws
    }

    /// Operating outflows before distributions
    #[must_use]
    pub fn outflows(&self) -> f64 {
        self.loan_investments
            + self.management_fees
            + self.fund_expenses
            + self.leverage_repayments
            + self.leverage_interest
    }

    /// Gross asset-level flow (loan investments out, loan proceeds in), used for fund IRR
    #[must_use]
    pub fn asset_flow(&self) -> f64 {
        self.principal_repayments
            + self.interest_income
            + self.appreciation_share
            + self.origination_fees
            + self.residual_realization
            - self.loan_investments
    }
}

/// Category of a loan-level cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanFlowKind {
    Investment,
    OriginationFee,
    Interest,
    Principal,
    AppreciationShare,
    Residual,
}

/// A single loan-level cash movement at a fund month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanFlow {
    pub month: u32,
    pub kind: LoanFlowKind,
    pub amount: f64,
}

/// One scheduled row from the leverage-facility collaborator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LeverageEntry {
    pub month: u32,
    #[serde(default)]
    pub draw: f64,
    #[serde(default)]
    pub repayment: f64,
    #[serde(default)]
    pub interest: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_periods() {
        assert_eq!(Granularity::Monthly.period_count(119), 120);
        assert_eq!(Granularity::Quarterly.period_count(119), 40);
        assert_eq!(Granularity::Quarterly.period_count(120), 41);
        assert_eq!(Granularity::Annual.period_of(11), 0);
        assert_eq!(Granularity::Annual.period_of(12), 1);
        assert_eq!(Granularity::Quarterly.periods_per_year(), 4);
    }

    #[test]
    fn test_row_totals() {
        let mut row = FundPeriodCashflow::empty(0, jiff::civil::date(2025, 1, 1));
        row.principal_repayments = 100.0;
        row.appreciation_share = 20.0;
        row.loan_investments = 50.0;
        row.management_fees = 5.0;
        assert_eq!(row.inflows(), 120.0);
        assert_eq!(row.outflows(), 55.0);
        assert_eq!(row.asset_flow(), 70.0);
    }
}
