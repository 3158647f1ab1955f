//! Market assumptions for the price-path generator
//!
//! Zone parameters and the zone correlation matrix come from the
//! location-intelligence layer; the price model and macro process are chosen
//! per run.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::ZoneId;

/// Convert an annual rate to the equivalent monthly compounding rate
#[must_use]
#[inline]
pub fn monthly_rate(annual: f64) -> f64 {
    (1.0 + annual).powf(1.0 / 12.0) - 1.0
}

/// Convert an annual event probability to a monthly probability
#[must_use]
#[inline]
pub fn monthly_probability(annual: f64) -> f64 {
    1.0 - (1.0 - annual.clamp(0.0, 1.0)).powf(1.0 / 12.0)
}

/// One state of a regime-switching price model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub name: String,
    /// Added to each zone's baseline appreciation while the regime is active
    pub annual_drift: f64,
    /// Annual volatility applied to every zone while the regime is active
    pub annual_volatility: f64,
    /// Whether the exit model should treat this regime as a recession
    #[serde(default)]
    pub recession: bool,
}

/// Monthly drift model for zone price indices
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PriceModel {
    /// Constant drift and volatility per zone
    #[default]
    Gbm,
    /// Ornstein-Uhlenbeck pull of the log zone index toward a long-run trend.
    /// - `speed`: annual reversion speed
    /// - `long_run_appreciation`: trend growth; falls back to the zone's own appreciation
    MeanReversion {
        speed: f64,
        #[serde(default)]
        long_run_appreciation: Option<f64>,
    },
    /// Discrete market regimes following a Markov chain.
    /// `transition[i][j]` is the monthly probability of moving from regime `i` to `j`.
    RegimeSwitching {
        regimes: Vec<Regime>,
        transition: Vec<Vec<f64>>,
        #[serde(default)]
        initial_regime: usize,
    },
    /// Drift modulated sinusoidally by the position in a multi-year cycle.
    /// - `initial_phase`: position in the cycle at month 0, in `[0, 1)`
    /// - `cycle_length_years`: length of one full cycle
    /// - `amplitude`: peak annual drift added at the top of the cycle
    CycleAware {
        initial_phase: f64,
        cycle_length_years: f64,
        amplitude: f64,
    },
}

impl PriceModel {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            PriceModel::Gbm => Ok(()),
            PriceModel::MeanReversion { speed, .. } => {
                if !speed.is_finite() || *speed < 0.0 {
                    return Err(ConfigError::invalid(
                        "price_model.speed",
                        format!("must be non-negative (got {speed})"),
                    ));
                }
                Ok(())
            }
            PriceModel::RegimeSwitching {
                regimes,
                transition,
                initial_regime,
            } => {
                if regimes.is_empty() {
                    return Err(ConfigError::invalid(
                        "price_model.regimes",
                        "at least one regime is required",
                    ));
                }
                if *initial_regime >= regimes.len() {
                    return Err(ConfigError::invalid(
                        "price_model.initial_regime",
                        format!("{initial_regime} is out of range for {} regimes", regimes.len()),
                    ));
                }
                if transition.len() != regimes.len() {
                    return Err(ConfigError::invalid(
                        "price_model.transition",
                        format!("expected {} rows, got {}", regimes.len(), transition.len()),
                    ));
                }
                for (i, row) in transition.iter().enumerate() {
                    if row.len() != regimes.len() {
                        return Err(ConfigError::invalid(
                            "price_model.transition",
                            format!("row {i} has {} entries, expected {}", row.len(), regimes.len()),
                        ));
                    }
                    if row.iter().any(|p| !(0.0..=1.0).contains(p)) {
                        return Err(ConfigError::invalid(
                            "price_model.transition",
                            format!("row {i} has a probability outside [0, 1]"),
                        ));
                    }
                    let sum: f64 = row.iter().sum();
                    if (sum - 1.0).abs() > 1e-9 {
                        return Err(ConfigError::invalid(
                            "price_model.transition",
                            format!("row {i} sums to {sum}, expected 1"),
                        ));
                    }
                }
                for regime in regimes {
                    if !regime.annual_volatility.is_finite() || regime.annual_volatility < 0.0 {
                        return Err(ConfigError::invalid(
                            "price_model.regimes",
                            format!("regime {} has a negative volatility", regime.name),
                        ));
                    }
                }
                Ok(())
            }
            PriceModel::CycleAware {
                initial_phase,
                cycle_length_years,
                ..
            } => {
                if !(0.0..1.0).contains(initial_phase) {
                    return Err(ConfigError::invalid(
                        "price_model.initial_phase",
                        format!("must lie in [0, 1) (got {initial_phase})"),
                    ));
                }
                if !cycle_length_years.is_finite() || *cycle_length_years <= 0.0 {
                    return Err(ConfigError::invalid(
                        "price_model.cycle_length_years",
                        "must be positive",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Zone-level appreciation parameters supplied by the location-intelligence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneParams {
    pub zone: ZoneId,
    pub annual_appreciation: f64,
    pub annual_volatility: f64,
    /// Net migration score; positive values raise exit activity
    #[serde(default)]
    pub migration_score: f64,
}

/// Idiosyncratic noise that decorrelates properties within a zone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariationFactors {
    /// Annual volatility shared by all properties in one suburb
    #[serde(default = "default_suburb_volatility")]
    pub suburb_volatility: f64,
    /// Annual volatility specific to each property
    #[serde(default = "default_property_volatility")]
    pub property_volatility: f64,
}

fn default_suburb_volatility() -> f64 {
    0.02
}

fn default_property_volatility() -> f64 {
    0.04
}

impl Default for VariationFactors {
    fn default() -> Self {
        Self {
            suburb_volatility: default_suburb_volatility(),
            property_volatility: default_property_volatility(),
        }
    }
}

/// Recession, mortgage-rate and inflation-shock processes feeding the exit model.
/// Probabilities are annual unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroConfig {
    #[serde(default = "default_recession_start")]
    pub recession_start_probability: f64,
    #[serde(default = "default_recession_end")]
    pub recession_end_probability: f64,
    #[serde(default = "default_rate")]
    pub initial_rate: f64,
    #[serde(default = "default_rate")]
    pub long_run_rate: f64,
    #[serde(default = "default_rate_reversion_speed")]
    pub rate_reversion_speed: f64,
    #[serde(default = "default_rate_volatility")]
    pub rate_volatility: f64,
    #[serde(default = "default_inflation_shock_probability")]
    pub inflation_shock_probability: f64,
    /// Monthly probability that an active inflation shock persists
    #[serde(default = "default_inflation_shock_persistence")]
    pub inflation_shock_persistence: f64,
}

fn default_recession_start() -> f64 {
    0.10
}

fn default_recession_end() -> f64 {
    0.60
}

fn default_rate() -> f64 {
    0.06
}

fn default_rate_reversion_speed() -> f64 {
    0.25
}

fn default_rate_volatility() -> f64 {
    0.01
}

fn default_inflation_shock_probability() -> f64 {
    0.05
}

fn default_inflation_shock_persistence() -> f64 {
    0.85
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            recession_start_probability: default_recession_start(),
            recession_end_probability: default_recession_end(),
            initial_rate: default_rate(),
            long_run_rate: default_rate(),
            rate_reversion_speed: default_rate_reversion_speed(),
            rate_volatility: default_rate_volatility(),
            inflation_shock_probability: default_inflation_shock_probability(),
            inflation_shock_persistence: default_inflation_shock_persistence(),
        }
    }
}

/// Everything the price-path engine needs besides the loans themselves
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub model: PriceModel,
    pub zones: Vec<ZoneParams>,
    /// Zone x zone correlation in the order of `zones`; empty means independent zones
    #[serde(default)]
    pub correlation: Vec<Vec<f64>>,
    #[serde(default)]
    pub variation: VariationFactors,
    #[serde(default)]
    pub economy: MacroConfig,
}

impl MarketConfig {
    /// Position of `zone` in `zones`
    #[must_use]
    pub fn zone_index(&self, zone: ZoneId) -> Option<usize> {
        self.zones.iter().position(|z| z.zone == zone)
    }

    /// The configured correlation matrix, or the identity when none is given
    #[must_use]
    pub fn correlation_or_identity(&self) -> Vec<Vec<f64>> {
        if self.correlation.is_empty() {
            let n = self.zones.len();
            (0..n)
                .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                .collect()
        } else {
            self.correlation.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zones.is_empty() {
            return Err(ConfigError::invalid("market.zones", "at least one zone is required"));
        }
        for (i, zone) in self.zones.iter().enumerate() {
            if self.zones[..i].iter().any(|z| z.zone == zone.zone) {
                return Err(ConfigError::invalid(
                    "market.zones",
                    format!("zone {:?} is listed twice", zone.zone),
                ));
            }
            if !zone.annual_volatility.is_finite() || zone.annual_volatility < 0.0 {
                return Err(ConfigError::invalid(
                    "market.zones.annual_volatility",
                    format!("zone {:?} has volatility {}", zone.zone, zone.annual_volatility),
                ));
            }
            if !zone.annual_appreciation.is_finite() || zone.annual_appreciation <= -1.0 {
                return Err(ConfigError::invalid(
                    "market.zones.annual_appreciation",
                    format!("zone {:?} has appreciation {}", zone.zone, zone.annual_appreciation),
                ));
            }
        }
        if self.variation.suburb_volatility < 0.0 || self.variation.property_volatility < 0.0 {
            return Err(ConfigError::invalid(
                "market.variation",
                "volatilities must be non-negative",
            ));
        }
        check_rate("economy.recession_start_probability", self.economy.recession_start_probability)?;
        check_rate("economy.recession_end_probability", self.economy.recession_end_probability)?;
        check_rate("economy.inflation_shock_probability", self.economy.inflation_shock_probability)?;
        check_rate("economy.inflation_shock_persistence", self.economy.inflation_shock_persistence)?;
        if self.economy.rate_volatility < 0.0 || self.economy.rate_reversion_speed < 0.0 {
            return Err(ConfigError::invalid(
                "economy",
                "rate volatility and reversion speed must be non-negative",
            ));
        }
        self.model.validate()?;
        crate::correlation::cholesky(&self.correlation_or_identity(), self.zones.len())?;
        Ok(())
    }
}

pub(crate) fn check_rate(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RateOutOfRange { field, value })
    }
}
