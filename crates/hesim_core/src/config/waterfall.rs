use serde::{Deserialize, Serialize};

use super::market::check_rate;
use crate::error::ConfigError;

/// When GP-bearing tiers may receive cash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaterfallMode {
    /// Every period's distributions run through all tiers with running state
    /// (carry can be paid before the fund is fully realized).
    #[default]
    Periodic,
    /// Return of capital and preferred return are paid as cash arrives; cash
    /// beyond them is escrowed and split between LP and GP once, at termination.
    WholeOfFund,
}

/// Escalating carry applied once LP distributions reach a multiple of contributions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarryBand {
    pub lp_multiple: f64,
    pub carried_interest_rate: f64,
}

fn default_hurdle_rate() -> f64 {
    0.08
}

fn default_carried_interest_rate() -> f64 {
    0.20
}

fn default_catch_up_rate() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallConfig {
    #[serde(default)]
    pub mode: WaterfallMode,
    /// Annual preferred return, compounded at the cashflow granularity
    #[serde(default = "default_hurdle_rate")]
    pub hurdle_rate: f64,
    #[serde(default = "default_carried_interest_rate")]
    pub carried_interest_rate: f64,
    /// GP share of cash in the catch-up tier; 0 disables the tier
    #[serde(default = "default_catch_up_rate")]
    pub catch_up_rate: f64,
    #[serde(default)]
    pub multi_tier_enabled: bool,
    #[serde(default)]
    pub carry_bands: Vec<CarryBand>,
    #[serde(default = "default_true")]
    pub enable_clawback: bool,
    #[serde(default)]
    pub clawback_threshold: f64,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            mode: WaterfallMode::default(),
            hurdle_rate: default_hurdle_rate(),
            carried_interest_rate: default_carried_interest_rate(),
            catch_up_rate: default_catch_up_rate(),
            multi_tier_enabled: false,
            carry_bands: Vec::new(),
            enable_clawback: true,
            clawback_threshold: 0.0,
        }
    }
}

impl WaterfallConfig {
    #[must_use]
    pub fn catch_up_enabled(&self) -> bool {
        self.catch_up_rate > 0.0
    }

    /// Residual bands as `(lp_multiple threshold, carry rate)`, base band first
    #[must_use]
    pub fn residual_bands(&self) -> Vec<(f64, f64)> {
        let mut bands = vec![(0.0, self.carried_interest_rate)];
        if self.multi_tier_enabled {
            bands.extend(
                self.carry_bands
                    .iter()
                    .map(|b| (b.lp_multiple, b.carried_interest_rate)),
            );
        }
        bands
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hurdle_rate.is_finite() || self.hurdle_rate < 0.0 {
            return Err(ConfigError::invalid(
                "hurdle_rate",
                format!("must be non-negative (got {})", self.hurdle_rate),
            ));
        }
        check_rate("carried_interest_rate", self.carried_interest_rate)?;
        check_rate("catch_up_rate", self.catch_up_rate)?;
        if self.carried_interest_rate >= 1.0 {
            return Err(ConfigError::TierWeights {
                tier: "residual split",
                sum: self.carried_interest_rate,
            });
        }
        if self.catch_up_enabled() && self.catch_up_rate <= self.carried_interest_rate {
            return Err(ConfigError::invalid(
                "catch_up_rate",
                format!(
                    "{} can never catch the GP up to a {} carry",
                    self.catch_up_rate, self.carried_interest_rate
                ),
            ));
        }
        if self.clawback_threshold < 0.0 {
            return Err(ConfigError::invalid("clawback_threshold", "must be non-negative"));
        }
        if self.multi_tier_enabled {
            let mut previous = (1.0, self.carried_interest_rate);
            for band in &self.carry_bands {
                check_rate("carry_bands.carried_interest_rate", band.carried_interest_rate)?;
                if band.carried_interest_rate >= 1.0 {
                    return Err(ConfigError::TierWeights {
                        tier: "carry band",
                        sum: band.carried_interest_rate,
                    });
                }
                if band.lp_multiple <= previous.0 || band.carried_interest_rate < previous.1 {
                    return Err(ConfigError::invalid(
                        "carry_bands",
                        "multiples must ascend above 1.0 and carry rates must not decrease",
                    ));
                }
                previous = (band.lp_multiple, band.carried_interest_rate);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_up_must_exceed_carry() {
        let config = WaterfallConfig {
            catch_up_rate: 0.15,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let disabled = WaterfallConfig {
            catch_up_rate: 0.0,
            ..Default::default()
        };
        assert!(disabled.validate().is_ok());
        assert!(!disabled.catch_up_enabled());
    }

    #[test]
    fn test_residual_bands() {
        let config = WaterfallConfig {
            multi_tier_enabled: true,
            carry_bands: vec![
                CarryBand {
                    lp_multiple: 2.0,
                    carried_interest_rate: 0.25,
                },
                CarryBand {
                    lp_multiple: 3.0,
                    carried_interest_rate: 0.30,
                },
            ],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.residual_bands(), vec![(0.0, 0.20), (2.0, 0.25), (3.0, 0.30)]);

        let single = WaterfallConfig {
            multi_tier_enabled: false,
            ..config.clone()
        };
        assert_eq!(single.residual_bands(), vec![(0.0, 0.20)]);

        let descending = WaterfallConfig {
            carry_bands: vec![CarryBand {
                lp_multiple: 2.0,
                carried_interest_rate: 0.10,
            }],
            ..config
        };
        assert!(descending.validate().is_err());
    }
}
