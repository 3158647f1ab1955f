//! Exit hazard and outcome assumptions

use serde::{Deserialize, Serialize};

use super::market::check_rate;
use crate::error::ConfigError;
use crate::model::InterestTreatment;

/// Parameters of the exit hazard model and of the cash outcome of each exit type.
///
/// Rates and probabilities are annual unless the field name says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Annual probability that an eligible loan exits
    pub base_exit_rate: f64,
    pub min_hold_period_years: f64,
    pub max_hold_period_years: f64,
    /// Growth of the hazard as the hold approaches its maximum
    pub time_hazard_acceleration: f64,

    pub sale_weight: f64,
    pub refinance_weight: f64,
    pub default_weight: f64,

    /// Sale hazard multiplier per unit of cumulative appreciation
    pub sale_appreciation_sensitivity: f64,
    /// Refinance hazard multiplier per unit of (loan rate - market rate), exponential
    pub refinance_interest_rate_sensitivity: f64,
    pub inflation_refinance_multiplier: f64,
    pub recession_default_multiplier: f64,
    /// Overall hazard shift while in recession
    pub employment_sensitivity: f64,
    /// Overall hazard shift per unit of zone migration score
    pub migration_sensitivity: f64,

    /// Annual probability of a household event that forces a sale
    pub life_event_probability: f64,
    /// Weight of the shared zone latent factor in exit timing, in `[0, 1]`
    pub behavioral_correlation: f64,

    /// Fund share of property appreciation
    pub appreciation_share: f64,
    /// Lower bounds of the appreciation bands, ascending
    pub tiered_appreciation_thresholds: Vec<f64>,
    /// Fund share earned inside each band
    pub tiered_appreciation_shares: Vec<f64>,
    /// Whether the fund participates in depreciation
    pub share_depreciation: bool,
    /// Fraction of the appreciation share still earned on a refinance
    pub refinance_appreciation_share_factor: f64,

    /// Share of the distressed value recovered on default
    pub recovery_rate: f64,
    /// Fraction of value lost to the foreclosure process
    pub foreclosure_cost: f64,
    /// Months between default and the recovery cash arriving
    pub foreclosure_time_months: u32,

    /// Property price decline used for the stressed loan-to-value
    pub stress_price_shock: f64,
    /// Stressed LTV above which a loan is forced into default
    pub stress_ltv_default_threshold: Option<f64>,

    pub interest_treatment: InterestTreatment,
    pub allow_default_before_min_hold: bool,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            base_exit_rate: 0.10,
            min_hold_period_years: 1.0,
            max_hold_period_years: 10.0,
            time_hazard_acceleration: 1.0,
            sale_weight: 0.70,
            refinance_weight: 0.25,
            default_weight: 0.05,
            sale_appreciation_sensitivity: 1.0,
            refinance_interest_rate_sensitivity: 10.0,
            inflation_refinance_multiplier: 1.25,
            recession_default_multiplier: 3.0,
            employment_sensitivity: 0.0,
            migration_sensitivity: 0.0,
            life_event_probability: 0.02,
            behavioral_correlation: 0.0,
            appreciation_share: 0.20,
            tiered_appreciation_thresholds: Vec::new(),
            tiered_appreciation_shares: Vec::new(),
            share_depreciation: false,
            refinance_appreciation_share_factor: 0.0,
            recovery_rate: 0.85,
            foreclosure_cost: 0.10,
            foreclosure_time_months: 6,
            stress_price_shock: 0.20,
            stress_ltv_default_threshold: None,
            interest_treatment: InterestTreatment::CashPay,
            allow_default_before_min_hold: true,
        }
    }
}

impl ExitConfig {
    #[must_use]
    pub fn min_hold_months(&self) -> u32 {
        (self.min_hold_period_years * 12.0).round() as u32
    }

    #[must_use]
    pub fn max_hold_months(&self) -> u32 {
        (self.max_hold_period_years * 12.0).round() as u32
    }

    /// Fund share applied to a given cumulative appreciation.
    ///
    /// Bands are inclusive at their lower threshold and exclusive at the next
    /// one; appreciation below the first threshold earns the flat share.
    #[must_use]
    pub fn share_for_appreciation(&self, appreciation: f64) -> f64 {
        self.tiered_appreciation_thresholds
            .iter()
            .zip(&self.tiered_appreciation_shares)
            .rev()
            .find(|(threshold, _)| appreciation >= **threshold)
            .map_or(self.appreciation_share, |(_, share)| *share)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("base_exit_rate", self.base_exit_rate)?;
        check_rate("life_event_probability", self.life_event_probability)?;
        check_rate("behavioral_correlation", self.behavioral_correlation)?;
        check_rate("appreciation_share", self.appreciation_share)?;
        check_rate("refinance_appreciation_share_factor", self.refinance_appreciation_share_factor)?;
        check_rate("recovery_rate", self.recovery_rate)?;
        check_rate("foreclosure_cost", self.foreclosure_cost)?;
        check_rate("stress_price_shock", self.stress_price_shock)?;
        if self.stress_price_shock >= 1.0 {
            return Err(ConfigError::invalid(
                "stress_price_shock",
                "a full price shock leaves no collateral value",
            ));
        }

        if self.min_hold_period_years < 0.0 || self.max_hold_period_years <= 0.0 {
            return Err(ConfigError::invalid(
                "hold_period",
                "hold periods must be positive",
            ));
        }
        if self.min_hold_months() > self.max_hold_months() {
            return Err(ConfigError::invalid(
                "hold_period",
                format!(
                    "min hold {} years exceeds max hold {} years",
                    self.min_hold_period_years, self.max_hold_period_years
                ),
            ));
        }
        if self.time_hazard_acceleration < 0.0 {
            return Err(ConfigError::invalid(
                "time_hazard_acceleration",
                "must be non-negative",
            ));
        }

        let weights = [self.sale_weight, self.refinance_weight, self.default_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::invalid(
                "exit weights",
                "sale, refinance and default weights must be non-negative",
            ));
        }
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return Err(ConfigError::TierWeights {
                tier: "exit type",
                sum,
            });
        }
        if self.inflation_refinance_multiplier < 0.0 || self.recession_default_multiplier < 0.0 {
            return Err(ConfigError::invalid(
                "macro multipliers",
                "must be non-negative",
            ));
        }

        if self.tiered_appreciation_thresholds.len() != self.tiered_appreciation_shares.len() {
            return Err(ConfigError::invalid(
                "tiered_appreciation",
                format!(
                    "{} thresholds but {} shares",
                    self.tiered_appreciation_thresholds.len(),
                    self.tiered_appreciation_shares.len()
                ),
            ));
        }
        if self
            .tiered_appreciation_thresholds
            .windows(2)
            .any(|w| w[1] <= w[0])
        {
            return Err(ConfigError::invalid(
                "tiered_appreciation_thresholds",
                "must be strictly ascending",
            ));
        }
        for share in &self.tiered_appreciation_shares {
            check_rate("tiered_appreciation_shares", *share)?;
        }

        if let Some(threshold) = self.stress_ltv_default_threshold
            && (!threshold.is_finite() || threshold <= 0.0)
        {
            return Err(ConfigError::invalid(
                "stress_ltv_default_threshold",
                format!("must be positive (got {threshold})"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiered() -> ExitConfig {
        ExitConfig {
            appreciation_share: 0.20,
            tiered_appreciation_thresholds: vec![0.25, 0.50],
            tiered_appreciation_shares: vec![0.25, 0.30],
            ..Default::default()
        }
    }

    #[test]
    fn test_band_lower_bound_is_inclusive() {
        let config = tiered();
        assert_eq!(config.share_for_appreciation(0.25), 0.25);
        assert_eq!(config.share_for_appreciation(0.50), 0.30);
    }

    #[test]
    fn test_band_upper_bound_is_exclusive() {
        let config = tiered();
        assert_eq!(config.share_for_appreciation(0.249_999), 0.20);
        assert_eq!(config.share_for_appreciation(0.499_999), 0.25);
        assert_eq!(config.share_for_appreciation(2.0), 0.30);
    }

    #[test]
    fn test_flat_share_without_bands() {
        let config = ExitConfig::default();
        assert_eq!(config.share_for_appreciation(0.8), 0.20);
    }

    #[test]
    fn test_validation() {
        assert!(ExitConfig::default().validate().is_ok());

        let bad_rate = ExitConfig {
            recovery_rate: 1.2,
            ..Default::default()
        };
        assert_eq!(
            bad_rate.validate(),
            Err(ConfigError::RateOutOfRange {
                field: "recovery_rate",
                value: 1.2
            })
        );

        let zero_weights = ExitConfig {
            sale_weight: 0.0,
            refinance_weight: 0.0,
            default_weight: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            zero_weights.validate(),
            Err(ConfigError::TierWeights { .. })
        ));

        let unsorted = ExitConfig {
            tiered_appreciation_thresholds: vec![0.5, 0.25],
            tiered_appreciation_shares: vec![0.25, 0.30],
            ..Default::default()
        };
        assert!(unsorted.validate().is_err());
    }
}
