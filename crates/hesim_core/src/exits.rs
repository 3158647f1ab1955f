//! Exit event simulation
//!
//! Steps every active loan through the fund horizon month by month and
//! decides whether it exits, how, and with what cash outcome. Within a month
//! loans are independent given the market scenario, so decisions run in
//! parallel; each loan draws from its own seeded stream. Precedence within a
//! month is stress default, then term completion, then a life event, then the
//! weighted hazard draw.

use rand::Rng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal};
use rustc_hash::FxHashSet;
use statrs::distribution::{ContinuousCDF, Normal};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{ExitConfig, SimulationConfig, monthly_probability};
use crate::error::{ConfigError, PathError, SimulationError, ensure_finite};
use crate::hazard::{HazardInputs, HazardModel};
use crate::model::{
    ExitEvent, ExitTrigger, ExitType, HeldPosition, Loan, LoanId, PricePath, PropertyId,
};
use crate::price_paths::{MarketScenario, PricePathEngine};
use crate::reinvestment::{ReinvestmentPolicy, ReinvestmentRequest, ZonePreference};
use crate::seeding::{Stream, stream_rng};

/// Everything the exit stage produces for one path
#[derive(Debug, Clone)]
pub struct ExitSimulation {
    /// Initial and reinvested loans, in origination order
    pub loans: Vec<Loan>,
    /// Price path of each loan's property, aligned with `loans`
    pub price_paths: Vec<PricePath>,
    /// Exits sorted by loan id
    pub exits: Vec<ExitEvent>,
    /// Loans still active at the horizon, sorted by loan id
    pub held: Vec<HeldPosition>,
}

/// Per-loan mutable state while the loan is active
struct ActiveLoan {
    index: usize,
    zone: usize,
    /// Elapsed months at which the loan is forced to complete
    forced_elapsed: u32,
    rng: SmallRng,
}

pub struct ExitEventSimulator<'a> {
    config: &'a SimulationConfig,
    exits: &'a ExitConfig,
    engine: &'a PricePathEngine<'a>,
    hazard: HazardModel<'a>,
    standard_normal: Normal,
    life_event_monthly: f64,
    min_hold: u32,
    max_hold: u32,
}

impl<'a> ExitEventSimulator<'a> {
    pub fn new(
        config: &'a SimulationConfig,
        engine: &'a PricePathEngine<'a>,
    ) -> Result<Self, ConfigError> {
        let standard_normal = Normal::new(0.0, 1.0)
            .map_err(|e| ConfigError::invalid("standard normal", e.to_string()))?;
        Ok(Self {
            config,
            exits: &config.exits,
            engine,
            hazard: HazardModel::new(&config.exits),
            standard_normal,
            life_event_monthly: monthly_probability(config.exits.life_event_probability),
            min_hold: config.exits.min_hold_months(),
            max_hold: config.exits.max_hold_months(),
        })
    }

    fn horizon(&self) -> u32 {
        self.engine.horizon()
    }

    /// Run the exit model over the horizon for `loans` and their price paths
    pub fn simulate(
        &self,
        scenario: &MarketScenario,
        loans: Vec<Loan>,
        price_paths: Vec<PricePath>,
        seed: u64,
        reinvestment: &dyn ReinvestmentPolicy,
    ) -> Result<ExitSimulation, SimulationError> {
        let horizon = self.horizon();
        let mut loans = loans;
        let mut price_paths = price_paths;
        let mut active = loans
            .iter()
            .enumerate()
            .map(|(index, loan)| self.activate(loan, index, seed))
            .collect::<Result<Vec<_>, _>>()?;

        let mut loan_ids: FxHashSet<LoanId> = loans.iter().map(|l| l.loan_id).collect();
        let mut property_ids: FxHashSet<PropertyId> = loans.iter().map(|l| l.property_id).collect();
        let mut proceeds_by_month = vec![0.0; horizon as usize + 1];
        let mut exits = Vec::new();

        for month in 1..=horizon {
            let decisions = {
                let loans = &loans;
                let price_paths = &price_paths;

                #[cfg(feature = "parallel")]
                let iter = active.par_iter_mut();
                #[cfg(not(feature = "parallel"))]
                let iter = active.iter_mut();

                iter.map(|slot| {
                    self.decide(
                        &loans[slot.index],
                        &price_paths[slot.index],
                        slot,
                        month,
                        scenario,
                    )
                })
                .collect::<Result<Vec<_>, SimulationError>>()?
            };

            let mut exited = vec![false; active.len()];
            for (i, decision) in decisions.into_iter().enumerate() {
                let Some((exit_type, trigger)) = decision else {
                    continue;
                };
                let index = active[i].index;
                let value = price_value(&price_paths[index], month)?;
                let event = self.outcome(&loans[index], exit_type, trigger, month, value)?;
                proceeds_by_month[event.settlement_month as usize] += event.total_return;
                exits.push(event);
                exited[i] = true;
            }
            let mut flags = exited.into_iter();
            active.retain(|_| !flags.next().unwrap_or(false));

            let freed_capital = proceeds_by_month[month as usize];
            if freed_capital > 0.0 && month < horizon {
                let new_loans = self.request_reinvestment(
                    month,
                    freed_capital,
                    &loans,
                    &active,
                    &loan_ids,
                    &property_ids,
                    reinvestment,
                )?;
                for loan in new_loans {
                    loan_ids.insert(loan.loan_id);
                    property_ids.insert(loan.property_id);
                    let path = self.engine.property_path(scenario, &loan, seed)?;
                    let index = loans.len();
                    active.push(self.activate(&loan, index, seed)?);
                    loans.push(loan);
                    price_paths.push(path);
                }
            }
        }

        let mut held = Vec::with_capacity(active.len());
        for slot in &active {
            let loan = &loans[slot.index];
            let value = price_value(&price_paths[slot.index], horizon)?;
            held.push(self.held_position(loan, value)?);
        }

        exits.sort_by_key(|e| e.loan_id);
        held.sort_by_key(|h| h.loan_id);

        Ok(ExitSimulation {
            loans,
            price_paths,
            exits,
            held,
        })
    }

    fn activate(&self, loan: &Loan, index: usize, seed: u64) -> Result<ActiveLoan, SimulationError> {
        let zone = self.engine.zone_index(loan.zone).ok_or_else(|| {
            SimulationError::invariant("exit simulation", format!("loan {:?} has unknown zone", loan.loan_id))
        })?;
        Ok(ActiveLoan {
            index,
            zone,
            forced_elapsed: self.max_hold.min(loan.term_months),
            rng: stream_rng(seed, Stream::Loan, u64::from(loan.loan_id.0)),
        })
    }

    /// Decide whether `loan` exits in `month`
    fn decide(
        &self,
        loan: &Loan,
        path: &PricePath,
        slot: &mut ActiveLoan,
        month: u32,
        scenario: &MarketScenario,
    ) -> Result<Option<(ExitType, ExitTrigger)>, SimulationError> {
        if month <= loan.origination_month {
            return Ok(None);
        }
        let elapsed = loan.elapsed(month);
        let value = price_value(path, month)?;

        // Draw everything up front so the stream advances identically every month
        let life_draw: f64 = slot.rng.random();
        let idiosyncratic: f64 = StandardNormal.sample(&mut slot.rng);
        let type_draw: f64 = slot.rng.random();

        if let Some(threshold) = self.exits.stress_ltv_default_threshold {
            let balance = self.exits.interest_treatment.balance(loan, elapsed);
            let stressed_value = value * (1.0 - self.exits.stress_price_shock);
            let stress_ltv = if stressed_value > 0.0 {
                balance / stressed_value
            } else {
                f64::INFINITY
            };
            if stress_ltv > threshold {
                return Ok(Some((ExitType::Default, ExitTrigger::StressLtv)));
            }
        }

        if elapsed >= slot.forced_elapsed {
            return Ok(Some((ExitType::TermCompletion, ExitTrigger::MaxHold)));
        }

        if elapsed >= self.min_hold && life_draw < self.life_event_monthly {
            return Ok(Some((ExitType::Sale, ExitTrigger::LifeEvent)));
        }

        let state = scenario.macro_at(month);
        let inputs = HazardInputs {
            elapsed,
            appreciation: value / loan.property_value_at_origination - 1.0,
            loan_rate: loan.interest_rate,
            migration_score: self.config.market.zones[slot.zone].migration_score,
            macro_state: state,
        };
        let hazard = self.hazard.hazard(&inputs);
        if hazard.probability <= 0.0 {
            return Ok(None);
        }

        let fires = if hazard.probability >= 1.0 {
            true
        } else {
            // One-factor Gaussian copula: the marginal exit probability is
            // unchanged, exits cluster within a zone as the weight rises.
            let rho = self.exits.behavioral_correlation;
            let latent = rho.sqrt() * scenario.zone_latent(month, slot.zone)
                + (1.0 - rho).sqrt() * idiosyncratic;
            latent < self.standard_normal.inverse_cdf(hazard.probability)
        };

        Ok(fires.then(|| (hazard.pick_type(type_draw), ExitTrigger::Hazard)))
    }

    /// Appreciation share owed to the fund at a given property value
    fn appreciation_share(&self, loan: &Loan, value: f64) -> f64 {
        let appreciation = value / loan.property_value_at_origination - 1.0;
        if appreciation < 0.0 && !self.exits.share_depreciation {
            return 0.0;
        }
        appreciation * loan.property_value_at_origination * self.exits.share_for_appreciation(appreciation)
    }

    /// Cash outcome of an exit
    pub fn outcome(
        &self,
        loan: &Loan,
        exit_type: ExitType,
        trigger: ExitTrigger,
        month: u32,
        value: f64,
    ) -> Result<ExitEvent, SimulationError> {
        if loan.loan_size <= 0.0 {
            return Err(SimulationError::invariant(
                "exit outcome",
                format!("loan {:?} has a zero loan amount", loan.loan_id),
            ));
        }
        if value < 0.0 {
            return Err(SimulationError::invariant(
                "exit outcome",
                format!("negative property value {value} for loan {:?}", loan.loan_id),
            ));
        }

        let hold = loan.elapsed(month);
        let balance = self.exits.interest_treatment.balance(loan, hold);
        let mut settlement_month = month;
        let (share, principal, recovery, loss, total) = match exit_type {
            ExitType::Sale | ExitType::TermCompletion => {
                let share = self.appreciation_share(loan, value);
                (share, balance, 0.0, (-share).max(0.0), balance + share)
            }
            ExitType::Refinance => {
                let share =
                    self.appreciation_share(loan, value) * self.exits.refinance_appreciation_share_factor;
                (share, balance, 0.0, (-share).max(0.0), balance + share)
            }
            ExitType::Default => {
                let distressed = value * (1.0 - self.exits.foreclosure_cost);
                let recovered = distressed * self.exits.recovery_rate;
                settlement_month = (month + self.exits.foreclosure_time_months).min(self.horizon());
                (
                    0.0,
                    recovered.min(balance),
                    recovered,
                    (balance - recovered).max(0.0),
                    recovered,
                )
            }
        };

        let total_return = ensure_finite(total, "exit total return")?;
        let roi = total_return / loan.loan_size - 1.0;
        Ok(ExitEvent {
            loan_id: loan.loan_id,
            exit_month: month,
            settlement_month,
            exit_type,
            trigger,
            property_value_at_exit: value,
            appreciation_share_amount: share,
            principal_returned: principal,
            recovery_amount: recovery,
            realized_loss: loss,
            total_return,
            roi,
            annualized_roi: annualize(roi, hold),
        })
    }

    /// Mark of a loan still outstanding at the horizon: balance plus the
    /// appreciation share a sale would earn
    fn held_position(&self, loan: &Loan, value: f64) -> Result<HeldPosition, SimulationError> {
        let balance = self
            .exits
            .interest_treatment
            .balance(loan, loan.elapsed(self.horizon()));
        let mark_value = ensure_finite(
            (balance + self.appreciation_share(loan, value)).max(0.0),
            "held position mark",
        )?;
        Ok(HeldPosition {
            loan_id: loan.loan_id,
            property_value: value,
            mark_value,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn request_reinvestment(
        &self,
        month: u32,
        freed_capital: f64,
        loans: &[Loan],
        active: &[ActiveLoan],
        loan_ids: &FxHashSet<LoanId>,
        property_ids: &FxHashSet<PropertyId>,
        policy: &dyn ReinvestmentPolicy,
    ) -> Result<Vec<Loan>, SimulationError> {
        let zone_preferences: Vec<ZonePreference> = self
            .config
            .market
            .zones
            .iter()
            .enumerate()
            .map(|(z, params)| ZonePreference {
                zone: params.zone,
                annual_appreciation: params.annual_appreciation,
                migration_score: params.migration_score,
                exposure: active
                    .iter()
                    .filter(|slot| slot.zone == z)
                    .map(|slot| loans[slot.index].loan_size)
                    .sum(),
            })
            .collect();

        let request = ReinvestmentRequest {
            month,
            horizon_months: self.horizon(),
            freed_capital,
            zone_preferences: &zone_preferences,
            next_loan_id: LoanId(loan_ids.iter().map(|id| id.0 + 1).max().unwrap_or(0)),
            next_property_id: PropertyId(property_ids.iter().map(|id| id.0 + 1).max().unwrap_or(0)),
        };
        let new_loans = policy.reinvest(&request)?;

        let mut seen_loans = FxHashSet::default();
        let mut seen_properties = FxHashSet::default();
        for loan in &new_loans {
            if loan.origination_month <= month {
                return Err(PathError::Reinvestment(format!(
                    "loan {:?} originates at month {}, not after month {month}",
                    loan.loan_id, loan.origination_month
                ))
                .into());
            }
            if loan_ids.contains(&loan.loan_id) || !seen_loans.insert(loan.loan_id) {
                return Err(PathError::Reinvestment(format!("duplicate loan id {:?}", loan.loan_id)).into());
            }
            if property_ids.contains(&loan.property_id) || !seen_properties.insert(loan.property_id) {
                return Err(PathError::Reinvestment(format!(
                    "property {:?} already backs a loan",
                    loan.property_id
                ))
                .into());
            }
            self.config
                .validate_loan(loan, self.min_hold)
                .map_err(|e| PathError::Reinvestment(e.to_string()))?;
        }
        if !new_loans.is_empty() {
            tracing::debug!(month, count = new_loans.len(), freed_capital, "reinvested exit proceeds");
        }
        Ok(new_loans)
    }
}

fn price_value(path: &PricePath, month: u32) -> Result<f64, SimulationError> {
    path.value_at(month).ok_or_else(|| {
        SimulationError::invariant(
            "exit simulation",
            format!("price path of {:?} does not cover month {month}", path.property_id),
        )
    })
}

/// `(1 + roi)^(12 / hold_months) - 1`; a total loss annualizes to -100%
#[must_use]
pub fn annualize(roi: f64, hold_months: u32) -> f64 {
    if hold_months == 0 {
        return roi;
    }
    if roi <= -1.0 {
        return -1.0;
    }
    (1.0 + roi).powf(12.0 / f64::from(hold_months)) - 1.0
}
