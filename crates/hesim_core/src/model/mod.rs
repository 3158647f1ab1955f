mod cashflow;
mod exit_event;
mod ids;
mod loan;
mod macro_state;
mod price_path;
mod results;
mod waterfall;

pub use cashflow::{FundPeriodCashflow, Granularity, LeverageEntry, LoanFlow, LoanFlowKind};
pub use exit_event::{ExitCounts, ExitEvent, ExitTrigger, ExitType};
pub use ids::{LoanId, PropertyId, SuburbId, ZoneId};
pub use loan::{HeldPosition, InterestTreatment, Loan};
pub use macro_state::MacroState;
pub use price_path::PricePath;
pub use results::{
    DistributionStats, FailedPath, MonteCarloConfig, MonteCarloProgress, MonteCarloStats,
    MonteCarloSummary, PathResult, PathSummary, RiskMeasures,
};
pub use waterfall::{
    ClawbackLedger, PeriodAllocation, TierAllocation, TierKind, WaterfallResult,
    WaterfallTierState,
};
