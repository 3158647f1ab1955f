//! Fund cashflow statement
//!
//! Loan-level cash movements are derived independently per loan (in parallel
//! when enabled) and reduced into monthly totals in ascending loan-id order,
//! so floating-point sums do not depend on scheduling. The fund layer (fees,
//! leverage, capital calls, distributions) then runs sequentially month by
//! month and is rolled up into rows at the configured granularity.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::{FeeBasis, SimulationConfig};
use crate::error::{SimulationError, ensure_finite};
use crate::model::{
    ExitEvent, ExitType, FundPeriodCashflow, HeldPosition, InterestTreatment, Loan, LoanFlow,
    LoanFlowKind, LoanId,
};

/// All cash movements of one loan over the horizon
#[derive(Debug, Clone, PartialEq)]
pub struct LoanCashflows {
    pub loan_id: LoanId,
    pub flows: Vec<LoanFlow>,
}

impl LoanCashflows {
    /// Net cash to the fund across all flows (investment negative)
    #[must_use]
    pub fn net(&self) -> f64 {
        self.flows
            .iter()
            .map(|f| match f.kind {
                LoanFlowKind::Investment => -f.amount,
                _ => f.amount,
            })
            .sum()
    }
}

/// Monthly fund totals before fees, calls and distributions
#[derive(Debug, Clone, Default)]
struct MonthlyLedger {
    loan_investments: Vec<f64>,
    origination_fees: Vec<f64>,
    interest_income: Vec<f64>,
    principal_repayments: Vec<f64>,
    appreciation_share: Vec<f64>,
    residual_realization: Vec<f64>,
    /// Principal outstanding during each month, for invested-capital fees
    outstanding: Vec<f64>,
}

impl MonthlyLedger {
    fn new(months: usize) -> Self {
        Self {
            loan_investments: vec![0.0; months],
            origination_fees: vec![0.0; months],
            interest_income: vec![0.0; months],
            principal_repayments: vec![0.0; months],
            appreciation_share: vec![0.0; months],
            residual_realization: vec![0.0; months],
            outstanding: vec![0.0; months],
        }
    }

    fn post(&mut self, flow: &LoanFlow) {
        let m = flow.month as usize;
        let column = match flow.kind {
            LoanFlowKind::Investment => &mut self.loan_investments,
            LoanFlowKind::OriginationFee => &mut self.origination_fees,
            LoanFlowKind::Interest => &mut self.interest_income,
            LoanFlowKind::Principal => &mut self.principal_repayments,
            LoanFlowKind::AppreciationShare => &mut self.appreciation_share,
            LoanFlowKind::Residual => &mut self.residual_realization,
        };
        column[m] += flow.amount;
    }
}

pub struct CashflowAggregator<'a> {
    config: &'a SimulationConfig,
}

impl<'a> CashflowAggregator<'a> {
    #[must_use]
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self { config }
    }

    fn horizon(&self) -> u32 {
        self.config.fund.horizon_months
    }

    /// Cash movements of a single loan. Exits settle at their settlement
    /// month; positions still held at the horizon are realized at their mark
    /// when the fund liquidates.
    #[must_use]
    pub fn loan_cashflows(
        &self,
        loan: &Loan,
        exit: Option<&ExitEvent>,
        held: Option<&HeldPosition>,
    ) -> LoanCashflows {
        let horizon = self.horizon();
        let treatment = self.config.exits.interest_treatment;
        let mut flows = Vec::new();

        flows.push(LoanFlow {
            month: loan.origination_month,
            kind: LoanFlowKind::Investment,
            amount: loan.loan_size,
        });
        let fee = loan.loan_size * self.config.fund.origination_fee_rate;
        if fee > 0.0 {
            flows.push(LoanFlow {
                month: loan.origination_month,
                kind: LoanFlowKind::OriginationFee,
                amount: fee,
            });
        }

        let last_interest_month = exit.map_or(horizon, |e| e.exit_month);
        let monthly_interest = treatment.monthly_cash_interest(loan);
        if monthly_interest > 0.0 {
            for month in loan.origination_month + 1..=last_interest_month {
                flows.push(LoanFlow {
                    month,
                    kind: LoanFlowKind::Interest,
                    amount: monthly_interest,
                });
            }
        }

        if let Some(exit) = exit {
            let month = exit.settlement_month;
            match exit.exit_type {
                ExitType::Default => flows.push(LoanFlow {
                    month,
                    kind: LoanFlowKind::Principal,
                    amount: exit.recovery_amount,
                }),
                _ => {
                    let (principal, accrued) = match treatment {
                        InterestTreatment::Accrue => {
                            (loan.loan_size, exit.principal_returned - loan.loan_size)
                        }
                        InterestTreatment::CashPay => (exit.principal_returned, 0.0),
                    };
                    flows.push(LoanFlow {
                        month,
                        kind: LoanFlowKind::Principal,
                        amount: principal,
                    });
                    if accrued != 0.0 {
                        flows.push(LoanFlow {
                            month,
                            kind: LoanFlowKind::Interest,
                            amount: accrued,
                        });
                    }
                    if exit.appreciation_share_amount != 0.0 {
                        flows.push(LoanFlow {
                            month,
                            kind: LoanFlowKind::AppreciationShare,
                            amount: exit.appreciation_share_amount,
                        });
                    }
                }
            }
        } else if let Some(position) = held
            && self.config.fund.liquidate_at_horizon
        {
            flows.push(LoanFlow {
                month: horizon,
                kind: LoanFlowKind::Residual,
                amount: position.mark_value,
            });
        }

        LoanCashflows {
            loan_id: loan.loan_id,
            flows,
        }
    }

    /// Per-loan cashflows for the whole portfolio, sorted by loan id
    #[must_use]
    pub fn portfolio_cashflows(
        &self,
        loans: &[Loan],
        exits: &[ExitEvent],
        held: &[HeldPosition],
    ) -> Vec<LoanCashflows> {
        let exit_for = by_loan(exits, |e| e.loan_id);
        let held_for = by_loan(held, |h| h.loan_id);

        #[cfg(feature = "parallel")]
        let iter = loans.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = loans.iter();

        let mut cashflows: Vec<LoanCashflows> = iter
            .map(|loan| {
                self.loan_cashflows(
                    loan,
                    exit_for.get(&loan.loan_id).copied(),
                    held_for.get(&loan.loan_id).copied(),
                )
            })
            .collect();
        cashflows.sort_by_key(|c| c.loan_id);
        cashflows
    }

    /// Reduce loan events into the periodic fund cashflow statement
    pub fn aggregate(
        &self,
        loans: &[Loan],
        exits: &[ExitEvent],
        held: &[HeldPosition],
    ) -> Result<Vec<FundPeriodCashflow>, SimulationError> {
        let fund = &self.config.fund;
        let horizon = self.horizon();
        let months = horizon as usize + 1;

        // Fixed reduction order: ascending loan id
        let mut ledger = MonthlyLedger::new(months);
        for loan_flows in self.portfolio_cashflows(loans, exits, held) {
            for flow in &loan_flows.flows {
                if flow.month > horizon {
                    return Err(SimulationError::invariant(
                        "cashflow aggregation",
                        format!("loan {:?} has a flow after the horizon", loan_flows.loan_id),
                    ));
                }
                ledger.post(flow);
            }
        }

        let exit_for = by_loan(exits, |e| e.loan_id);
        let mut sorted_loans: Vec<&Loan> = loans.iter().collect();
        sorted_loans.sort_by_key(|l| l.loan_id);
        for loan in sorted_loans {
            let end = exit_for
                .get(&loan.loan_id)
                .map_or(horizon, |e| e.exit_month);
            for month in loan.origination_month + 1..=end {
                ledger.outstanding[month as usize] += loan.loan_size;
            }
        }

        let committed = self.config.committed_capital();
        let mpp = fund.granularity.months_per_period();
        let mut rows: Vec<FundPeriodCashflow> = (0..fund.granularity.period_count(horizon))
            .map(|p| FundPeriodCashflow::empty(p, fund.period_start(p)))
            .collect();

        let mut cash = 0.0;
        let mut called = 0.0;
        for m in 0..months {
            let month = m as u32;
            let row = &mut rows[fund.granularity.period_of(month)];

            let (management_fee, expenses) = if month == 0 {
                (0.0, 0.0)
            } else {
                let basis = match fund.fee_basis {
                    FeeBasis::Committed => committed,
                    FeeBasis::Invested => ledger.outstanding[m],
                };
                (
                    fund.management_fee_rate / 12.0 * basis,
                    fund.fund_expense_rate / 12.0 * committed,
                )
            };

            let (mut draws, mut repayments, mut leverage_interest) = (0.0, 0.0, 0.0);
            for entry in fund.leverage.iter().filter(|e| e.month == month) {
                draws += entry.draw;
                repayments += entry.repayment;
                leverage_interest += entry.interest;
            }

            let inflows = ledger.origination_fees[m]
                + ledger.interest_income[m]
                + ledger.principal_repayments[m]
                + ledger.appreciation_share[m]
                + ledger.residual_realization[m]
                + draws;
            let outflows =
                ledger.loan_investments[m] + management_fee + expenses + repayments + leverage_interest;

            cash += inflows - outflows;
            let mut call = 0.0;
            if cash < 0.0 {
                call = -cash;
                cash = 0.0;
                called += call;
            }

            let period_end = (month + 1) % mpp == 0 || month == horizon;
            let mut distribution = 0.0;
            if period_end {
                distribution = if month == horizon {
                    cash
                } else if fund.recycle_until_month.is_none_or(|until| month >= until) {
                    (cash - fund.cash_reserve).max(0.0)
                } else {
                    0.0
                };
                cash -= distribution;
            }

            row.capital_calls += call;
            row.loan_investments += ledger.loan_investments[m];
            row.origination_fees += ledger.origination_fees[m];
            row.principal_repayments += ledger.principal_repayments[m];
            row.interest_income += ledger.interest_income[m];
            row.appreciation_share += ledger.appreciation_share[m];
            row.residual_realization += ledger.residual_realization[m];
            row.management_fees += management_fee;
            row.fund_expenses += expenses;
            row.leverage_draws += draws;
            row.leverage_repayments += repayments;
            row.leverage_interest += leverage_interest;
            row.distributions += distribution;
            row.cash_balance = cash;
        }

        let mut cumulative = 0.0;
        for row in &mut rows {
            row.net_cashflow = ensure_finite(
                row.capital_calls + row.inflows() - row.outflows() - row.distributions,
                "net cashflow",
            )?;
            cumulative += row.net_cashflow;
            row.cumulative_cashflow = cumulative;
        }

        if called > committed * (1.0 + 1e-9) {
            tracing::debug!(called, committed, "capital calls exceeded committed capital");
        }
        Ok(rows)
    }
}

fn by_loan<T>(items: &[T], key: impl Fn(&T) -> LoanId) -> FxHashMap<LoanId, &T> {
    items.iter().map(|item| (key(item), item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationBuilder;
    use crate::model::{ExitTrigger, Granularity, LeverageEntry};

    fn config() -> SimulationConfig {
        SimulationBuilder::new()
            .horizon_months(24)
            .granularity(Granularity::Quarterly)
            .zone(0, 0.03, 0.10)
            .loan_interest_rate(0.06)
            .loan(0, 200_000.0, 0.5)
            .loan(0, 400_000.0, 0.5)
            .management_fee(0.0, FeeBasis::Committed)
            .build()
            .unwrap()
    }

    fn sale(loan_id: u32, month: u32, share: f64) -> ExitEvent {
        ExitEvent {
            loan_id: LoanId(loan_id),
            exit_month: month,
            settlement_month: month,
            exit_type: ExitType::Sale,
            trigger: ExitTrigger::Hazard,
            property_value_at_exit: 0.0,
            appreciation_share_amount: share,
            principal_returned: if loan_id == 0 { 100_000.0 } else { 200_000.0 },
            recovery_amount: 0.0,
            realized_loss: 0.0,
            total_return: 0.0,
            roi: 0.0,
            annualized_roi: 0.0,
        }
    }

    #[test]
    fn test_interest_stops_at_exit() {
        let config = config();
        let aggregator = CashflowAggregator::new(&config);
        let exit = sale(0, 12, 5_000.0);
        let flows = aggregator.loan_cashflows(&config.loans[0], Some(&exit), None);

        let interest: Vec<_> = flows
            .flows
            .iter()
            .filter(|f| f.kind == LoanFlowKind::Interest)
            .collect();
        assert_eq!(interest.len(), 12);
        assert!((interest[0].amount - 500.0).abs() < 1e-9);
        assert!((flows.net() - (6_000.0 + 5_000.0)).abs() < 1e-6);
    }

    #[test]
    fn test_cumulative_is_running_sum_and_cash_is_distributed() {
        let config = config();
        let aggregator = CashflowAggregator::new(&config);
        let exits = vec![sale(0, 7, 10_000.0), sale(1, 20, 30_000.0)];
        let rows = aggregator.aggregate(&config.loans, &exits, &[]).unwrap();

        assert_eq!(rows.len(), 9);
        let mut previous = 0.0;
        for row in &rows {
            assert!((row.cumulative_cashflow - (previous + row.net_cashflow)).abs() < 1e-9);
            previous = row.cumulative_cashflow;
        }

        // Both loans are funded by a call in the first quarter
        assert!((rows[0].capital_calls - 300_000.0).abs() < 1e-6);
        assert_eq!(rows[0].loan_investments, 300_000.0);

        // Everything is distributed by the end
        assert!(rows.last().unwrap().cash_balance.abs() < 1e-9);
        let distributed: f64 = rows.iter().map(|r| r.distributions).sum();
        let interest = 500.0 * 7.0 + 1_000.0 * 20.0;
        assert!((distributed - (300_000.0 + 40_000.0 + interest)).abs() < 1e-6);
    }

    #[test]
    fn test_exit_order_does_not_change_statement() {
        let config = config();
        let aggregator = CashflowAggregator::new(&config);
        let sorted = vec![sale(0, 7, 10_000.0), sale(1, 20, 30_000.0)];
        let reversed: Vec<ExitEvent> = sorted.iter().rev().cloned().collect();

        let a = aggregator.aggregate(&config.loans, &sorted, &[]).unwrap();
        let b = aggregator.aggregate(&config.loans, &reversed, &[]).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            aggregator.portfolio_cashflows(&config.loans, &reversed, &[]),
            aggregator.portfolio_cashflows(&config.loans, &sorted, &[])
        );
    }

    #[test]
    fn test_fees_trigger_capital_calls() {
        let mut config = config();
        config.fund.management_fee_rate = 0.02;
        config.loans.iter_mut().for_each(|l| l.interest_rate = 0.0);
        let aggregator = CashflowAggregator::new(&config);
        let rows = aggregator.aggregate(&config.loans, &[], &[]).unwrap();

        let fees: f64 = rows.iter().map(|r| r.management_fees).sum();
        assert!((fees - 0.02 / 12.0 * 300_000.0 * 24.0).abs() < 1e-6);
        let calls: f64 = rows.iter().map(|r| r.capital_calls).sum();
        assert!((calls - (300_000.0 + fees)).abs() < 1e-6);
    }

    #[test]
    fn test_leverage_rows_are_added_verbatim() {
        let mut config = config();
        config.fund.leverage = vec![
            LeverageEntry {
                month: 0,
                draw: 50_000.0,
                ..Default::default()
            },
            LeverageEntry {
                month: 24,
                repayment: 50_000.0,
                interest: 4_000.0,
                ..Default::default()
            },
        ];
        let aggregator = CashflowAggregator::new(&config);
        let rows = aggregator
            .aggregate(&config.loans, &[sale(0, 3, 0.0), sale(1, 3, 0.0)], &[])
            .unwrap();

        assert_eq!(rows[0].leverage_draws, 50_000.0);
        assert!((rows[0].capital_calls - 250_000.0).abs() < 1e-6);
        let last = rows.last().unwrap();
        assert_eq!(last.leverage_repayments, 50_000.0);
        assert_eq!(last.leverage_interest, 4_000.0);
    }

    #[test]
    fn test_recycling_withholds_distributions() {
        let mut config = config();
        config.fund.recycle_until_month = Some(12);
        let aggregator = CashflowAggregator::new(&config);
        let rows = aggregator
            .aggregate(&config.loans, &[sale(0, 4, 0.0)], &[])
            .unwrap();
        for row in &rows[..4] {
            assert_eq!(row.distributions, 0.0);
        }
        assert!(rows[4].distributions > 100_000.0);
    }
}
