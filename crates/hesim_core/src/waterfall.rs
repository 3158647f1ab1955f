//! Distribution waterfall
//!
//! Distributable cash flows through return of capital, preferred return, GP
//! catch-up and the residual split (with optional escalating carry bands).
//! Tier state carries forward period to period and is only ever mutated
//! sequentially. A junior tier receives cash only once every senior tier is
//! cumulatively satisfied; an unpaid entitlement is recorded as a shortfall.
//!
//! In [`WaterfallMode::WholeOfFund`] the GP-bearing tiers are held back:
//! cash beyond the LP tiers sits in escrow (still available to reopened
//! senior tiers) and is split once, in the final period.

use crate::config::{WaterfallConfig, WaterfallMode};
use crate::error::{SimulationError, ensure_finite};
use crate::model::{
    ClawbackLedger, FundPeriodCashflow, Granularity, PeriodAllocation, TierAllocation, TierKind,
    WaterfallResult, WaterfallTierState,
};

/// Running tier state of one fund
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallState {
    pub tiers: Vec<WaterfallTierState>,
    /// Cash awaiting the final split (whole-of-fund mode only)
    pub escrow: f64,
}

impl WaterfallState {
    fn new(kinds: &[TierKind]) -> Self {
        Self {
            tiers: kinds.iter().map(|&k| WaterfallTierState::new(k)).collect(),
            escrow: 0.0,
        }
    }

    #[must_use]
    pub fn tier(&self, kind: TierKind) -> Option<&WaterfallTierState> {
        self.tiers.iter().find(|t| t.tier == kind)
    }

    fn tier_mut(&mut self, kind: TierKind) -> Option<&mut WaterfallTierState> {
        self.tiers.iter_mut().find(|t| t.tier == kind)
    }

    fn returned(&self, kind: TierKind) -> f64 {
        self.tier(kind).map_or(0.0, |t| t.cumulative_returned)
    }

    #[must_use]
    pub fn contributed(&self) -> f64 {
        self.tiers.first().map_or(0.0, |t| t.cumulative_contributed)
    }

    /// Capital contributed but not yet returned
    #[must_use]
    pub fn unreturned_capital(&self) -> f64 {
        (self.contributed() - self.returned(TierKind::ReturnOfCapital)).max(0.0)
    }

    /// Preferred return accrued but not yet paid
    #[must_use]
    pub fn unpaid_preferred(&self) -> f64 {
        self.tier(TierKind::PreferredReturn).map_or(0.0, |t| {
            (t.cumulative_preferred_accrued - t.cumulative_returned).max(0.0)
        })
    }

    #[must_use]
    pub fn lp_total(&self) -> f64 {
        self.tiers.iter().map(|t| t.cumulative_to_lp).sum()
    }

    #[must_use]
    pub fn gp_total(&self) -> f64 {
        self.tiers.iter().map(|t| t.cumulative_carry_paid).sum()
    }

    /// Everything distributed above returned capital
    #[must_use]
    pub fn profit_distributed(&self) -> f64 {
        self.tiers
            .iter()
            .filter(|t| t.tier != TierKind::ReturnOfCapital)
            .map(|t| t.cumulative_returned)
            .sum()
    }

    fn contribute(&mut self, amount: f64) {
        for tier in &mut self.tiers {
            tier.cumulative_contributed += amount;
        }
    }

    fn pay(&mut self, kind: TierKind, to_lp: f64, to_gp: f64) {
        if let Some(tier) = self.tier_mut(kind) {
            tier.cumulative_to_lp += to_lp;
            tier.cumulative_carry_paid += to_gp;
            tier.cumulative_returned += to_lp + to_gp;
        }
    }
}

pub struct WaterfallEngine<'a> {
    config: &'a WaterfallConfig,
    mode: WaterfallMode,
    granularity: Granularity,
    /// Preferred return per cashflow period, compounded from the annual hurdle
    preferred_rate: f64,
    bands: Vec<(f64, f64)>,
    kinds: Vec<TierKind>,
}

impl<'a> WaterfallEngine<'a> {
    #[must_use]
    pub fn new(config: &'a WaterfallConfig, granularity: Granularity) -> Self {
        Self::with_mode(config, granularity, config.mode)
    }

    /// Engine evaluating in `mode` regardless of the configured one
    #[must_use]
    pub fn with_mode(config: &'a WaterfallConfig, granularity: Granularity, mode: WaterfallMode) -> Self {
        let periods_per_year = f64::from(granularity.periods_per_year());
        let bands = config.residual_bands();

        let mut kinds = vec![TierKind::ReturnOfCapital, TierKind::PreferredReturn];
        if config.catch_up_enabled() {
            kinds.push(TierKind::CatchUp);
        }
        kinds.extend((0..bands.len()).map(|band| TierKind::Residual { band }));

        Self {
            config,
            mode,
            granularity,
            preferred_rate: (1.0 + config.hurdle_rate).powf(1.0 / periods_per_year) - 1.0,
            bands,
            kinds,
        }
    }

    #[must_use]
    pub fn initial_state(&self) -> WaterfallState {
        WaterfallState::new(&self.kinds)
    }

    /// Accrue one period of preferred return, then record the period's
    /// contributions. Capital called in a period starts accruing the next.
    pub fn open_period(&self, state: &mut WaterfallState, contributions: f64) {
        let base = state.unreturned_capital() + state.unpaid_preferred();
        if let Some(tier) = state.tier_mut(TierKind::PreferredReturn) {
            tier.cumulative_preferred_accrued += base * self.preferred_rate;
        }
        state.contribute(contributions.max(0.0));
    }

    /// Cash the catch-up tier still needs to bring the GP to its carry share
    /// of profit distributed so far
    #[must_use]
    pub fn catch_up_need(&self, state: &WaterfallState) -> f64 {
        if !self.config.catch_up_enabled() {
            return 0.0;
        }
        let carry = self.config.carried_interest_rate;
        let target = carry * state.profit_distributed() - state.gp_total();
        (target / (self.config.catch_up_rate - carry)).max(0.0)
    }

    fn pay_senior(&self, state: &mut WaterfallState, cash: &mut f64, out: &mut Vec<TierAllocation>) {
        let capital = cash.min(state.unreturned_capital());
        state.pay(TierKind::ReturnOfCapital, capital, 0.0);
        *cash -= capital;
        out.push(TierAllocation {
            tier: TierKind::ReturnOfCapital,
            to_lp: capital,
            to_gp: 0.0,
            shortfall: state.unreturned_capital(),
        });

        let preferred = cash.min(state.unpaid_preferred());
        state.pay(TierKind::PreferredReturn, preferred, 0.0);
        *cash -= preferred;
        out.push(TierAllocation {
            tier: TierKind::PreferredReturn,
            to_lp: preferred,
            to_gp: 0.0,
            shortfall: state.unpaid_preferred(),
        });
    }

    fn pay_junior(&self, state: &mut WaterfallState, cash: &mut f64, out: &mut Vec<TierAllocation>) {
        if self.config.catch_up_enabled() {
            let amount = cash.min(self.catch_up_need(state));
            let to_gp = amount * self.config.catch_up_rate;
            let to_lp = amount - to_gp;
            state.pay(TierKind::CatchUp, to_lp, to_gp);
            *cash -= amount;
            out.push(TierAllocation {
                tier: TierKind::CatchUp,
                to_lp,
                to_gp,
                shortfall: self.catch_up_need(state),
            });
        }

        let contributed = state.contributed();
        for (band, &(_, rate)) in self.bands.iter().enumerate() {
            // Cash this band takes before LP distributions reach the next multiple
            let capacity = match self.bands.get(band + 1) {
                Some(&(next_multiple, _)) if contributed > 0.0 => {
                    ((next_multiple * contributed - state.lp_total()) / (1.0 - rate)).max(0.0)
                }
                _ => f64::INFINITY,
            };
            let amount = cash.min(capacity);
            let to_gp = amount * rate;
            let to_lp = amount - to_gp;
            let tier = TierKind::Residual { band };
            state.pay(tier, to_lp, to_gp);
            *cash -= amount;
            out.push(TierAllocation {
                tier,
                to_lp,
                to_gp,
                shortfall: 0.0,
            });
        }
    }

    fn held_back(&self, out: &mut Vec<TierAllocation>, state: &WaterfallState) {
        if self.config.catch_up_enabled() {
            out.push(TierAllocation {
                tier: TierKind::CatchUp,
                to_lp: 0.0,
                to_gp: 0.0,
                shortfall: self.catch_up_need(state),
            });
        }
        for band in 0..self.bands.len() {
            out.push(TierAllocation {
                tier: TierKind::Residual { band },
                to_lp: 0.0,
                to_gp: 0.0,
                shortfall: 0.0,
            });
        }
    }

    /// Allocate one evaluation point's distributable cash. Negative cash is
    /// treated as zero. `is_final` releases any escrow through the junior tiers.
    pub fn allocate(
        &self,
        state: &mut WaterfallState,
        period: usize,
        distributable: f64,
        is_final: bool,
    ) -> PeriodAllocation {
        if distributable < 0.0 {
            tracing::debug!(period, distributable, "negative distributable cash floored to zero");
        }
        let distributable = distributable.max(0.0);
        let mut allocations = Vec::with_capacity(self.kinds.len());

        let escrow_before = state.escrow;
        let mut cash = distributable + state.escrow;
        state.escrow = 0.0;

        self.pay_senior(state, &mut cash, &mut allocations);
        match self.mode {
            WaterfallMode::Periodic => self.pay_junior(state, &mut cash, &mut allocations),
            WaterfallMode::WholeOfFund if is_final => {
                self.pay_junior(state, &mut cash, &mut allocations)
            }
            WaterfallMode::WholeOfFund => {
                self.held_back(&mut allocations, state);
                state.escrow = cash;
                cash = 0.0;
            }
        }
        debug_assert!(cash.abs() <= 1e-6 * distributable.max(1.0));
        let escrowed = state.escrow - escrow_before;

        let allocated: f64 = allocations.iter().map(TierAllocation::total).sum();
        let residue = distributable - escrowed - allocated;
        if residue != 0.0 {
            // Most senior tier that received cash this period, else return of capital
            let index = allocations
                .iter()
                .position(|a| a.total() > 0.0)
                .unwrap_or(0);
            let target = &mut allocations[index];
            target.to_lp += residue;
            state.pay(target.tier, residue, 0.0);
        }

        PeriodAllocation {
            period,
            distributable,
            allocations,
            escrowed,
            residue,
        }
    }

    /// Run the waterfall over a fund's cashflow statement: capital calls are
    /// LP contributions, distributions are the distributable cash.
    pub fn run(&self, cashflows: &[FundPeriodCashflow]) -> Result<WaterfallResult, SimulationError> {
        let mut state = self.initial_state();
        let mut periods = Vec::with_capacity(cashflows.len());
        let last = cashflows.len().saturating_sub(1);

        for (index, row) in cashflows.iter().enumerate() {
            let calls = ensure_finite(row.capital_calls, "capital calls")?;
            let distributable = ensure_finite(row.distributions, "distributable cash")?;
            self.open_period(&mut state, calls);
            periods.push(self.allocate(&mut state, row.period, distributable, index == last));
        }

        let total_to_gp = state.gp_total();
        Ok(WaterfallResult {
            periods,
            total_contributed: state.contributed(),
            total_to_lp: state.lp_total(),
            total_to_gp,
            gp_carry: total_to_gp,
            clawback: ClawbackLedger {
                cumulative_carry_received_by_gp: total_to_gp,
                ..Default::default()
            },
            tiers: state.tiers,
        })
    }

    /// Carry the GP is entitled to on the fund's final realized profit: the
    /// carry a single whole-of-fund split would have paid.
    pub fn entitled_carry(&self, cashflows: &[FundPeriodCashflow]) -> Result<f64, SimulationError> {
        let whole = WaterfallEngine::with_mode(self.config, self.granularity, WaterfallMode::WholeOfFund);
        Ok(whole.run(cashflows)?.gp_carry)
    }

    /// Settle the clawback ledger against the entitled carry
    #[must_use]
    pub fn clawback(&self, carry_received: f64, entitled: f64) -> ClawbackLedger {
        let excess = carry_received - entitled;
        let clawback_amount = if self.config.enable_clawback && excess > self.config.clawback_threshold {
            excess
        } else {
            0.0
        };
        ClawbackLedger {
            cumulative_carry_received_by_gp: carry_received,
            entitled_carry_at_final_profit: entitled,
            clawback_amount,
        }
    }

    /// Full evaluation for one path: the waterfall plus the clawback ledger
    /// finalized at termination
    pub fn evaluate(&self, cashflows: &[FundPeriodCashflow]) -> Result<WaterfallResult, SimulationError> {
        let mut result = self.run(cashflows)?;
        let entitled = match self.mode {
            WaterfallMode::WholeOfFund => result.gp_carry,
            WaterfallMode::Periodic => self.entitled_carry(cashflows)?,
        };
        result.clawback = self.clawback(result.gp_carry, entitled);
        Ok(result)
    }
}
