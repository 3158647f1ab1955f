//! Monthly exit hazard
//!
//! The hazard of a loan in a given month is the monthly base rate scaled by a
//! time factor, an overall macro factor, and the ratio of the adjusted to the
//! raw exit-type weights. Each type weight carries its own modifier: sale
//! responds to appreciation, refinance to rates and inflation, default to
//! recession.

use crate::config::{ExitConfig, monthly_probability};
use crate::model::{ExitType, MacroState};

/// Loan-specific inputs for one month
#[derive(Debug, Clone, Copy)]
pub struct HazardInputs {
    /// Months since origination
    pub elapsed: u32,
    /// Cumulative property appreciation since origination
    pub appreciation: f64,
    pub loan_rate: f64,
    pub migration_score: f64,
    pub macro_state: MacroState,
}

/// Exit probability for the month and the adjusted weight of each exit type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitHazard {
    pub probability: f64,
    pub sale: f64,
    pub refinance: f64,
    pub default: f64,
}

impl ExitHazard {
    /// Choose the exit type from the adjusted weights, renormalized, for a
    /// uniform draw `u` in `[0, 1)`
    #[must_use]
    pub fn pick_type(&self, u: f64) -> ExitType {
        let total = self.sale + self.refinance + self.default;
        if total <= 0.0 {
            return ExitType::Default;
        }
        let x = u * total;
        if x < self.sale {
            ExitType::Sale
        } else if x < self.sale + self.refinance {
            ExitType::Refinance
        } else {
            ExitType::Default
        }
    }
}

pub struct HazardModel<'a> {
    config: &'a ExitConfig,
    monthly_base: f64,
    min_hold: u32,
    max_hold: u32,
    raw_weight_sum: f64,
}

impl<'a> HazardModel<'a> {
    #[must_use]
    pub fn new(config: &'a ExitConfig) -> Self {
        Self {
            config,
            monthly_base: monthly_probability(config.base_exit_rate),
            min_hold: config.min_hold_months(),
            max_hold: config.max_hold_months(),
            raw_weight_sum: config.sale_weight + config.refinance_weight + config.default_weight,
        }
    }

    /// Rises quadratically from 1 at the minimum hold to
    /// `1 + time_hazard_acceleration` at the maximum hold
    #[must_use]
    pub fn time_factor(&self, elapsed: u32) -> f64 {
        let span = self.max_hold.saturating_sub(self.min_hold);
        let progress = if span == 0 {
            1.0
        } else {
            (f64::from(elapsed.saturating_sub(self.min_hold)) / f64::from(span)).clamp(0.0, 1.0)
        };
        1.0 + self.config.time_hazard_acceleration * progress * progress
    }

    /// Employment and migration shift applied to every exit type
    #[must_use]
    pub fn overall_factor(&self, inputs: &HazardInputs) -> f64 {
        let recession = if inputs.macro_state.recession { 1.0 } else { 0.0 };
        (1.0 + self.config.employment_sensitivity * recession
            + self.config.migration_sensitivity * inputs.migration_score)
            .max(0.0)
    }

    /// Type weights after their individual modifiers, as `[sale, refinance, default]`
    #[must_use]
    pub fn adjusted_weights(&self, inputs: &HazardInputs) -> [f64; 3] {
        let c = self.config;
        let sale = c.sale_weight * (1.0 + c.sale_appreciation_sensitivity * inputs.appreciation).max(0.0);

        let rate_gap = inputs.loan_rate - inputs.macro_state.market_rate;
        let mut refinance = c.refinance_weight * (c.refinance_interest_rate_sensitivity * rate_gap).exp();
        if inputs.macro_state.inflation_shock {
            refinance *= c.inflation_refinance_multiplier;
        }

        let mut default = c.default_weight;
        if inputs.macro_state.recession {
            default *= c.recession_default_multiplier;
        }
        [sale, refinance, default]
    }

    /// Hazard for the month. Before the minimum hold only default can fire.
    #[must_use]
    pub fn hazard(&self, inputs: &HazardInputs) -> ExitHazard {
        let [mut sale, mut refinance, mut default] = self.adjusted_weights(inputs);
        if inputs.elapsed < self.min_hold {
            sale = 0.0;
            refinance = 0.0;
            if !self.config.allow_default_before_min_hold {
                default = 0.0;
            }
        }

        let weight_ratio = (sale + refinance + default) / self.raw_weight_sum;
        let probability = (self.monthly_base
            * self.time_factor(inputs.elapsed)
            * self.overall_factor(inputs)
            * weight_ratio)
            .clamp(0.0, 1.0);

        ExitHazard {
            probability,
            sale,
            refinance,
            default,
        }
    }
}
