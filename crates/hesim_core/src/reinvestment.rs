//! Hook for recycling exit proceeds into new loans
//!
//! Loan-generation policy lives outside the engine. The exit simulator calls
//! the policy between months with the capital freed that month and the
//! current zone preferences, and adds whatever loans it returns.

use crate::error::PathError;
use crate::model::{Loan, LoanId, PropertyId, ZoneId};

/// Zone attractiveness and current exposure offered to the policy
#[derive(Debug, Clone, PartialEq)]
pub struct ZonePreference {
    pub zone: ZoneId,
    pub annual_appreciation: f64,
    pub migration_score: f64,
    /// Loan principal currently active in the zone
    pub exposure: f64,
}

/// What the policy is told between months
#[derive(Debug, Clone)]
pub struct ReinvestmentRequest<'a> {
    /// Month just simulated; new loans must originate after it
    pub month: u32,
    pub horizon_months: u32,
    /// Exit proceeds that settled this month
    pub freed_capital: f64,
    pub zone_preferences: &'a [ZonePreference],
    /// First unused loan id; ids handed back must not collide with existing loans
    pub next_loan_id: LoanId,
    pub next_property_id: PropertyId,
}

pub trait ReinvestmentPolicy: Send + Sync {
    fn reinvest(&self, request: &ReinvestmentRequest<'_>) -> Result<Vec<Loan>, PathError>;
}

/// Proceeds are never recycled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReinvestment;

impl ReinvestmentPolicy for NoReinvestment {
    fn reinvest(&self, _request: &ReinvestmentRequest<'_>) -> Result<Vec<Loan>, PathError> {
        Ok(Vec::new())
    }
}
