use serde::{Deserialize, Serialize};

use super::ids::LoanId;

/// Mechanism by which a loan terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitType {
    Sale,
    Refinance,
    Default,
    TermCompletion,
}

impl ExitType {
    pub const ALL: [ExitType; 4] = [
        ExitType::Sale,
        ExitType::Refinance,
        ExitType::Default,
        ExitType::TermCompletion,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ExitType::Sale => "sale",
            ExitType::Refinance => "refinance",
            ExitType::Default => "default",
            ExitType::TermCompletion => "term_completion",
        }
    }
}

/// What caused the exit to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitTrigger {
    /// Weighted hazard draw
    Hazard,
    /// Independent life-event overlay
    LifeEvent,
    /// Stressed loan-to-value breached its threshold
    StressLtv,
    /// Maximum hold period or contractual term reached
    MaxHold,
}

/// Terminal event of a loan on one simulated path. At most one per loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub loan_id: LoanId,
    pub exit_month: u32,
    /// Month in which the cash arrives (later than `exit_month` for foreclosures)
    pub settlement_month: u32,
    pub exit_type: ExitType,
    pub trigger: ExitTrigger,
    pub property_value_at_exit: f64,
    pub appreciation_share_amount: f64,
    /// Balance repaid (for defaults, the part of the recovery applied to principal)
    pub principal_returned: f64,
    /// Cash recovered through foreclosure; zero for non-default exits
    pub recovery_amount: f64,
    /// Shortfall of the recovery against the outstanding balance
    pub realized_loss: f64,
    pub total_return: f64,
    pub roi: f64,
    pub annualized_roi: f64,
}

impl ExitEvent {
    /// Months the loan was held before exit
    #[must_use]
    pub fn hold_months(&self, origination_month: u32) -> u32 {
        self.exit_month.saturating_sub(origination_month)
    }
}

/// Count of exits per type on one path or across paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCounts {
    pub sale: usize,
    pub refinance: usize,
    pub default: usize,
    pub term_completion: usize,
}

impl ExitCounts {
    pub fn record(&mut self, exit_type: ExitType) {
        match exit_type {
            ExitType::Sale => self.sale += 1,
            ExitType::Refinance => self.refinance += 1,
            ExitType::Default => self.default += 1,
            ExitType::TermCompletion => self.term_completion += 1,
        }
    }

    #[must_use]
    pub fn get(&self, exit_type: ExitType) -> usize {
        match exit_type {
            ExitType::Sale => self.sale,
            ExitType::Refinance => self.refinance,
            ExitType::Default => self.default,
            ExitType::TermCompletion => self.term_completion,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.sale + self.refinance + self.default + self.term_completion
    }

    pub fn merge(&mut self, other: &ExitCounts) {
        self.sale += other.sale;
        self.refinance += other.refinance;
        self.default += other.default;
        self.term_completion += other.term_completion;
    }

    #[must_use]
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ExitEvent>) -> Self {
        let mut counts = Self::default();
        for event in events {
            counts.record(event.exit_type);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_counts() {
        let mut counts = ExitCounts::default();
        counts.record(ExitType::Sale);
        counts.record(ExitType::Sale);
        counts.record(ExitType::Default);

        let mut other = ExitCounts::default();
        other.record(ExitType::TermCompletion);
        counts.merge(&other);

        assert_eq!(counts.get(ExitType::Sale), 2);
        assert_eq!(counts.get(ExitType::Refinance), 0);
        assert_eq!(counts.get(ExitType::Default), 1);
        assert_eq!(counts.get(ExitType::TermCompletion), 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_labels_are_distinct() {
        let labels: std::collections::HashSet<_> =
            ExitType::ALL.iter().map(|t| t.label()).collect();
        assert_eq!(labels.len(), 4);
    }
}
