//! Correlated property price paths
//!
//! Generation happens in two stages. `PricePathEngine::scenario` draws the
//! market-wide state for every month of the horizon: one correlated shock per
//! zone, the macro state, and the zone-level behavioural factors used by the
//! exit model. Every property in a zone reads the same monthly zone return
//! from the scenario. Property paths are then generated independently, each
//! from its own seeded stream, layering suburb and property noise on top of
//! the zone return.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rustc_hash::FxHashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{MarketConfig, PriceModel, monthly_probability, monthly_rate};
use crate::correlation::{CholeskyFactor, cholesky};
use crate::error::{ConfigError, SimulationError, ensure_finite};
use crate::model::{Loan, MacroState, PricePath, SuburbId, ZoneId};
use crate::seeding::{Stream, stream_rng};

/// Market-wide draws for one path, shared read-only by every property and loan
#[derive(Debug, Clone)]
pub struct MarketScenario {
    /// `zone_returns[m][z]`: return of zone `z` from month `m - 1` to `m` (row 0 is zero)
    zone_returns: Vec<Vec<f64>>,
    /// `zone_latent[m][z]`: standard-normal behavioural factor of zone `z` in month `m`
    zone_latent: Vec<Vec<f64>>,
    macro_path: Vec<MacroState>,
}

impl MarketScenario {
    #[must_use]
    pub fn zone_return(&self, month: u32, zone: usize) -> f64 {
        self.zone_returns[month as usize][zone]
    }

    #[must_use]
    pub fn zone_latent(&self, month: u32, zone: usize) -> f64 {
        self.zone_latent[month as usize][zone]
    }

    #[must_use]
    pub fn macro_at(&self, month: u32) -> MacroState {
        self.macro_path[month as usize]
    }

    #[must_use]
    pub fn macro_path(&self) -> &[MacroState] {
        &self.macro_path
    }
}

/// Per-zone state carried between months by path-dependent models
#[derive(Debug, Clone, Copy)]
struct ZoneTrack {
    log_index: f64,
}

pub struct PricePathEngine<'a> {
    market: &'a MarketConfig,
    factor: CholeskyFactor,
    zone_index: FxHashMap<ZoneId, usize>,
    horizon: u32,
}

impl<'a> PricePathEngine<'a> {
    /// Validate the correlation matrix and prepare the engine. Fails before
    /// any path is generated.
    pub fn new(market: &'a MarketConfig, horizon_months: u32) -> Result<Self, ConfigError> {
        let factor = cholesky(&market.correlation_or_identity(), market.zones.len())?;
        let zone_index = market
            .zones
            .iter()
            .enumerate()
            .map(|(i, z)| (z.zone, i))
            .collect();
        Ok(Self {
            market,
            factor,
            zone_index,
            horizon: horizon_months,
        })
    }

    #[must_use]
    pub fn zone_index(&self, zone: ZoneId) -> Option<usize> {
        self.zone_index.get(&zone).copied()
    }

    #[must_use]
    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Draw the market scenario for one path
    pub fn scenario(&self, seed: u64) -> Result<MarketScenario, SimulationError> {
        let mut rng = stream_rng(seed, Stream::Market, 0);
        let zones = &self.market.zones;
        let n = zones.len();
        let months = self.horizon as usize + 1;
        let economy = &self.market.economy;

        let mut zone_returns = Vec::with_capacity(months);
        let mut zone_latent = Vec::with_capacity(months);
        let mut macro_path = Vec::with_capacity(months);

        let initial_regime = match &self.market.model {
            PriceModel::RegimeSwitching { initial_regime, .. } => *initial_regime,
            _ => 0,
        };
        let mut state = MacroState {
            recession: self.regime_is_recession(initial_regime),
            market_rate: economy.initial_rate,
            inflation_shock: false,
            regime: initial_regime,
        };
        zone_returns.push(vec![0.0; n]);
        zone_latent.push(vec![0.0; n]);
        macro_path.push(state);

        let mut tracks = vec![ZoneTrack { log_index: 0.0 }; n];
        let mut independent = vec![0.0; n];
        let mut correlated = vec![0.0; n];

        let recession_start = monthly_probability(economy.recession_start_probability);
        let recession_end = monthly_probability(economy.recession_end_probability);
        let inflation_start = monthly_probability(economy.inflation_shock_probability);

        for month in 1..months {
            state = self.next_macro_state(&mut rng, state, recession_start, recession_end, inflation_start);

            for z in independent.iter_mut() {
                *z = StandardNormal.sample(&mut rng);
            }
            self.factor.correlate_into(&independent, &mut correlated);

            let mut returns = Vec::with_capacity(n);
            for (z, params) in zones.iter().enumerate() {
                let (drift, annual_vol) = self.monthly_drift(month as u32, &tracks[z], params, &state);
                let r = drift + correlated[z] * annual_vol / 12f64.sqrt();
                let r = ensure_finite(r, "zone return")?;
                tracks[z].log_index += (1.0 + r).max(1e-9).ln();
                returns.push(r);
            }
            zone_returns.push(returns);

            let latent = (0..n)
                .map(|_| StandardNormal.sample(&mut rng))
                .collect::<Vec<f64>>();
            zone_latent.push(latent);
            macro_path.push(state);
        }

        Ok(MarketScenario {
            zone_returns,
            zone_latent,
            macro_path,
        })
    }

    fn regime_is_recession(&self, regime: usize) -> bool {
        match &self.market.model {
            PriceModel::RegimeSwitching { regimes, .. } => {
                regimes.get(regime).is_some_and(|r| r.recession)
            }
            _ => false,
        }
    }

    fn next_macro_state<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        previous: MacroState,
        recession_start: f64,
        recession_end: f64,
        inflation_start: f64,
    ) -> MacroState {
        let economy = &self.market.economy;

        // Regime and recession
        let (regime, recession) = match &self.market.model {
            PriceModel::RegimeSwitching { transition, .. } => {
                let u: f64 = rng.random();
                let row = &transition[previous.regime];
                let mut cumulative = 0.0;
                let mut next = row.len() - 1;
                for (j, p) in row.iter().enumerate() {
                    cumulative += p;
                    if u < cumulative {
                        next = j;
                        break;
                    }
                }
                (next, self.regime_is_recession(next))
            }
            _ => {
                let u: f64 = rng.random();
                let recession = if previous.recession {
                    u >= recession_end
                } else {
                    u < recession_start
                };
                (0, recession)
            }
        };

        // Discrete Vasicek mortgage rate
        let z: f64 = StandardNormal.sample(rng);
        let market_rate = (previous.market_rate
            + economy.rate_reversion_speed / 12.0 * (economy.long_run_rate - previous.market_rate)
            + economy.rate_volatility / 12f64.sqrt() * z)
            .max(0.0);

        let u: f64 = rng.random();
        let inflation_shock = if previous.inflation_shock {
            u < economy.inflation_shock_persistence
        } else {
            u < inflation_start
        };

        MacroState {
            recession,
            market_rate,
            inflation_shock,
            regime,
        }
    }

    /// Monthly drift and annual volatility of one zone for `month`
    fn monthly_drift(
        &self,
        month: u32,
        track: &ZoneTrack,
        params: &crate::config::ZoneParams,
        state: &MacroState,
    ) -> (f64, f64) {
        match &self.market.model {
            PriceModel::Gbm => (monthly_rate(params.annual_appreciation), params.annual_volatility),
            PriceModel::MeanReversion {
                speed,
                long_run_appreciation,
            } => {
                let trend = long_run_appreciation.unwrap_or(params.annual_appreciation);
                let trend_log = f64::from(month - 1) / 12.0 * (1.0 + trend).ln();
                let gap = trend_log - track.log_index;
                (monthly_rate(trend) + speed / 12.0 * gap, params.annual_volatility)
            }
            PriceModel::RegimeSwitching { regimes, .. } => {
                let regime = &regimes[state.regime];
                let annual = (params.annual_appreciation + regime.annual_drift).max(-0.99);
                (monthly_rate(annual), regime.annual_volatility)
            }
            PriceModel::CycleAware {
                initial_phase,
                cycle_length_years,
                amplitude,
            } => {
                let phase = (initial_phase + f64::from(month) / (12.0 * cycle_length_years)).fract();
                let cyclical = amplitude * (2.0 * std::f64::consts::PI * phase).sin() / 12.0;
                (monthly_rate(params.annual_appreciation) + cyclical, params.annual_volatility)
            }
        }
    }

    /// Suburb noise for months `0..=horizon`, identical for every property in the suburb
    fn suburb_noise(&self, seed: u64, suburb: SuburbId) -> Vec<f64> {
        let sd = self.market.variation.suburb_volatility / 12f64.sqrt();
        let mut rng = stream_rng(seed, Stream::Suburb, u64::from(suburb.0));
        let mut noise = Vec::with_capacity(self.horizon as usize + 1);
        noise.push(0.0);
        for _ in 1..=self.horizon {
            let z: f64 = StandardNormal.sample(&mut rng);
            noise.push(sd * z);
        }
        noise
    }

    /// Monthly value series for the property behind `loan`, from its
    /// origination month to the horizon
    pub fn property_path(
        &self,
        scenario: &MarketScenario,
        loan: &Loan,
        seed: u64,
    ) -> Result<PricePath, SimulationError> {
        let zone = self.zone_index(loan.zone).ok_or_else(|| {
            SimulationError::invariant("price path", format!("loan {:?} has unknown zone", loan.loan_id))
        })?;
        if loan.property_value_at_origination < 0.0 {
            return Err(SimulationError::invariant(
                "price path",
                format!("property {:?} has a negative value", loan.property_id),
            ));
        }

        let suburb = loan.suburb.map(|s| self.suburb_noise(seed, s));
        let property_sd = self.market.variation.property_volatility / 12f64.sqrt();
        let mut rng = stream_rng(seed, Stream::Property, u64::from(loan.property_id.0));

        let start = loan.origination_month.min(self.horizon);
        let mut values = Vec::with_capacity((self.horizon - start) as usize + 1);
        let mut value = loan.property_value_at_origination;
        values.push(value);
        for month in start + 1..=self.horizon {
            let eps: f64 = StandardNormal.sample(&mut rng);
            let suburb_shock = suburb.as_ref().map_or(0.0, |s| s[month as usize]);
            let r = scenario.zone_return(month, zone) + suburb_shock + property_sd * eps;
            value = ensure_finite((value * (1.0 + r)).max(0.0), "property value")?;
            values.push(value);
        }

        Ok(PricePath {
            property_id: loan.property_id,
            start_month: start,
            values,
        })
    }

    /// Paths for every loan, in input order. Properties are independent once
    /// the scenario is drawn, so this runs in parallel when enabled.
    pub fn generate(
        &self,
        scenario: &MarketScenario,
        loans: &[Loan],
        seed: u64,
    ) -> Result<Vec<PricePath>, SimulationError> {
        #[cfg(feature = "parallel")]
        let iter = loans.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = loans.iter();

        iter.map(|loan| self.property_path(scenario, loan, seed))
            .collect()
    }
}
