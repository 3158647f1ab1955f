use serde::{Deserialize, Serialize};

/// Ordered waterfall tiers, most senior first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TierKind {
    ReturnOfCapital,
    PreferredReturn,
    CatchUp,
    /// Residual split; band 0 is the base carry rate, higher bands are the
    /// escalating multi-tier carry bands.
    Residual { band: usize },
}

impl TierKind {
    #[must_use]
    pub fn name(self) -> String {
        match self {
            TierKind::ReturnOfCapital => "return_of_capital".to_string(),
            TierKind::PreferredReturn => "preferred_return".to_string(),
            TierKind::CatchUp => "gp_catch_up".to_string(),
            TierKind::Residual { band: 0 } => "residual_split".to_string(),
            TierKind::Residual { band } => format!("carry_band_{band}"),
        }
    }
}

/// Running state of one tier, mutated sequentially across evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallTierState {
    pub tier: TierKind,
    pub name: String,
    /// LP capital contributed to date (the basis every tier is measured against)
    pub cumulative_contributed: f64,
    /// Cash paid out through this tier to date (LP + GP)
    pub cumulative_returned: f64,
    /// Preferred return accrued to date (preferred tier only)
    pub cumulative_preferred_accrued: f64,
    /// GP share paid through this tier to date
    pub cumulative_carry_paid: f64,
    /// LP share paid through this tier to date
    pub cumulative_to_lp: f64,
}

impl WaterfallTierState {
    #[must_use]
    pub fn new(tier: TierKind) -> Self {
        Self {
            tier,
            name: tier.name(),
            cumulative_contributed: 0.0,
            cumulative_returned: 0.0,
            cumulative_preferred_accrued: 0.0,
            cumulative_carry_paid: 0.0,
            cumulative_to_lp: 0.0,
        }
    }
}

/// Cash allocated to one tier in one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAllocation {
    pub tier: TierKind,
    pub to_lp: f64,
    pub to_gp: f64,
    /// Entitlement of this tier left unpaid after the evaluation
    pub shortfall: f64,
}

impl TierAllocation {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.to_lp + self.to_gp
    }
}

/// Result of allocating one evaluation point's distributable cash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAllocation {
    pub period: usize,
    pub distributable: f64,
    pub allocations: Vec<TierAllocation>,
    /// Net cash moved into escrow (negative when escrow is released)
    pub escrowed: f64,
    /// Rounding residue folded into the most senior open tier
    pub residue: f64,
}

impl PeriodAllocation {
    #[must_use]
    pub fn to_lp(&self) -> f64 {
        self.allocations.iter().map(|a| a.to_lp).sum()
    }

    #[must_use]
    pub fn to_gp(&self) -> f64 {
        self.allocations.iter().map(|a| a.to_gp).sum()
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.to_lp() + self.to_gp()
    }
}

/// GP clawback obligation, finalized once at fund termination
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClawbackLedger {
    pub cumulative_carry_received_by_gp: f64,
    pub entitled_carry_at_final_profit: f64,
    pub clawback_amount: f64,
}

/// Full output of the waterfall for one path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResult {
    pub periods: Vec<PeriodAllocation>,
    pub tiers: Vec<WaterfallTierState>,
    pub total_contributed: f64,
    pub total_to_lp: f64,
    pub total_to_gp: f64,
    /// GP carry before clawback
    pub gp_carry: f64,
    pub clawback: ClawbackLedger,
}

impl WaterfallResult {
    /// GP carry after repaying any clawback
    #[must_use]
    pub fn net_gp_carry(&self) -> f64 {
        self.gp_carry - self.clawback.clawback_amount
    }

    /// LP distributions after receiving any clawback
    #[must_use]
    pub fn net_to_lp(&self) -> f64 {
        self.total_to_lp + self.clawback.clawback_amount
    }

    /// LP multiple on invested capital, net of clawback
    #[must_use]
    pub fn lp_moic(&self) -> Option<f64> {
        (self.total_contributed > 0.0).then(|| self.net_to_lp() / self.total_contributed)
    }

    #[must_use]
    pub fn tier(&self, tier: TierKind) -> Option<&WaterfallTierState> {
        self.tiers.iter().find(|t| t.tier == tier)
    }
}
