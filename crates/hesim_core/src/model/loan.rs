use serde::{Deserialize, Serialize};

use super::ids::{LoanId, PropertyId, SuburbId, ZoneId};

/// A home-equity-share loan as originated by the portfolio-construction layer.
///
/// Loans are immutable once created; all lifecycle state lives in the path
/// that simulates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub property_id: PropertyId,
    pub zone: ZoneId,
    #[serde(default)]
    pub suburb: Option<SuburbId>,
    /// Fund month (0-based) in which the loan is funded
    #[serde(default)]
    pub origination_month: u32,
    pub loan_size: f64,
    pub ltv: f64,
    /// Annual contractual rate on the outstanding balance
    #[serde(default)]
    pub interest_rate: f64,
    pub term_months: u32,
    pub property_value_at_origination: f64,
}

impl Loan {
    /// Months elapsed since origination at fund month `month`
    #[must_use]
    pub fn elapsed(&self, month: u32) -> u32 {
        month.saturating_sub(self.origination_month)
    }
}

/// How contractual interest on a loan is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterestTreatment {
    /// Interest is paid in cash every month; the balance stays at the loan size.
    #[default]
    CashPay,
    /// Interest compounds monthly into the balance and is repaid at exit.
    Accrue,
}

impl InterestTreatment {
    /// Outstanding balance after `elapsed` months
    #[must_use]
    pub fn balance(self, loan: &Loan, elapsed: u32) -> f64 {
        match self {
            InterestTreatment::CashPay => loan.loan_size,
            InterestTreatment::Accrue => {
                loan.loan_size * (1.0 + loan.interest_rate / 12.0).powi(elapsed as i32)
            }
        }
    }

    /// Cash interest received in one month
    #[must_use]
    pub fn monthly_cash_interest(self, loan: &Loan) -> f64 {
        match self {
            InterestTreatment::CashPay => loan.loan_size * loan.interest_rate / 12.0,
            InterestTreatment::Accrue => 0.0,
        }
    }
}

/// A loan still outstanding when the fund horizon ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeldPosition {
    pub loan_id: LoanId,
    pub property_value: f64,
    /// Balance plus the appreciation share the fund would be owed on a sale today
    pub mark_value: f64,
}
