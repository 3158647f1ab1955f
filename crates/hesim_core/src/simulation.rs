use crate::cashflows::CashflowAggregator;
use crate::config::SimulationConfig;
use crate::error::{ConfigError, SimulationError};
use crate::exits::{ExitEventSimulator, ExitSimulation};
use crate::model::{ExitCounts, FundPeriodCashflow, PathResult, PathSummary, WaterfallResult};
use crate::price_paths::PricePathEngine;
use crate::reinvestment::{NoReinvestment, ReinvestmentPolicy};
use crate::returns::{annual_irr, moic};
use crate::waterfall::WaterfallEngine;

/// Simulate a single path with no reinvestment
pub fn simulate(config: &SimulationConfig, seed: u64) -> Result<PathResult, SimulationError> {
    Pipeline::new(config)?.run(0, seed, &NoReinvestment)
}

/// Simulate a single path, recycling exit proceeds through `reinvestment`
pub fn simulate_with(
    config: &SimulationConfig,
    seed: u64,
    reinvestment: &dyn ReinvestmentPolicy,
) -> Result<PathResult, SimulationError> {
    Pipeline::new(config)?.run(0, seed, reinvestment)
}

/// The per-path pipeline: price paths, exits, cashflows, waterfall.
///
/// Building one validates the configuration and factors the correlation
/// matrix once; every path run through it shares that read-only state.
pub struct Pipeline<'a> {
    config: &'a SimulationConfig,
    engine: PricePathEngine<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = PricePathEngine::new(&config.market, config.fund.horizon_months)?;
        Ok(Self { config, engine })
    }

    pub fn run(
        &self,
        path_index: usize,
        seed: u64,
        reinvestment: &dyn ReinvestmentPolicy,
    ) -> Result<PathResult, SimulationError> {
        let config = self.config;
        let scenario = self.engine.scenario(seed)?;
        let loans = config.loans.clone();
        let price_paths = self.engine.generate(&scenario, &loans, seed)?;

        let exit_simulator = ExitEventSimulator::new(config, &self.engine)?;
        let ExitSimulation {
            loans,
            price_paths,
            exits,
            held,
        } = exit_simulator.simulate(&scenario, loans, price_paths, seed, reinvestment)?;

        let cashflows = CashflowAggregator::new(config).aggregate(&loans, &exits, &held)?;
        let waterfall =
            WaterfallEngine::new(&config.waterfall, config.fund.granularity).evaluate(&cashflows)?;

        let total_invested: f64 = loans.iter().map(|l| l.loan_size).sum();
        let summary = PathSummary {
            path_index,
            seed,
            lp_irr: annual_irr(&lp_flows(&cashflows, &waterfall), config.fund.granularity),
            fund_irr: annual_irr(
                &cashflows.iter().map(FundPeriodCashflow::asset_flow).collect::<Vec<_>>(),
                config.fund.granularity,
            ),
            lp_moic: waterfall.lp_moic(),
            portfolio_roi: portfolio_roi(&cashflows, total_invested),
            exit_counts: ExitCounts::from_events(&exits),
            loans_originated: loans.len(),
            total_invested,
            total_contributed: waterfall.total_contributed,
            total_to_lp: waterfall.net_to_lp(),
            total_to_gp: waterfall.total_to_gp,
            gp_carry: waterfall.net_gp_carry(),
            clawback: waterfall.clawback.clawback_amount,
            realized_losses: exits.iter().map(|e| e.realized_loss).sum(),
        };

        tracing::trace!(
            path_index,
            seed,
            exits = exits.len(),
            lp_moic = ?summary.lp_moic,
            "path complete"
        );

        Ok(PathResult {
            seed,
            loans,
            price_paths,
            macro_path: scenario.macro_path().to_vec(),
            exits,
            held,
            cashflows,
            waterfall,
            summary,
        })
    }
}

/// LP cashflow per period: distributions received less capital contributed.
/// Any clawback is repaid to the LPs in the final period.
fn lp_flows(cashflows: &[FundPeriodCashflow], waterfall: &WaterfallResult) -> Vec<f64> {
    let mut flows: Vec<f64> = cashflows
        .iter()
        .zip(&waterfall.periods)
        .map(|(row, period)| period.to_lp() - row.capital_calls)
        .collect();
    if let Some(last) = flows.last_mut() {
        *last += waterfall.clawback.clawback_amount;
    }
    flows
}

fn portfolio_roi(cashflows: &[FundPeriodCashflow], total_invested: f64) -> f64 {
    if total_invested <= 0.0 {
        return 0.0;
    }
    let proceeds: f64 = cashflows
        .iter()
        .map(|r| r.asset_flow() + r.loan_investments)
        .sum();
    moic(total_invested, proceeds).map_or(0.0, |m| m - 1.0)
}
