//! Path return metrics: IRR and multiples
//!
//! IRR solves NPV = 0 per cashflow period with Newton-Raphson and falls back
//! to bisection when Newton leaves the bracket or stalls. A series without a
//! sign change has no IRR; callers count those paths instead of imputing one.

use crate::model::Granularity;

const TOLERANCE: f64 = 1e-10;
const MAX_NEWTON_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
/// Per-period rate bracket searched by the fallback
const LOWER_RATE: f64 = -0.9999;
const UPPER_RATE: f64 = 10.0;

/// Net present value at a per-period rate; flows are at periods 0, 1, 2, ...
#[must_use]
pub fn npv(rate: f64, cash_flows: &[f64]) -> f64 {
    let one_plus_r = 1.0 + rate;
    let mut discount = 1.0;
    let mut total = 0.0;
    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        total += cf / discount;
    }
    total
}

fn npv_and_derivative(rate: f64, cash_flows: &[f64]) -> (f64, f64) {
    let one_plus_r = 1.0 + rate;
    let mut value = 0.0;
    let mut derivative = 0.0;
    let mut discount = 1.0;
    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        value += cf / discount;
        derivative -= t as f64 * cf / (discount * one_plus_r);
    }
    (value, derivative)
}

fn has_sign_change(cash_flows: &[f64]) -> bool {
    let positive = cash_flows.iter().any(|&cf| cf > 0.0);
    let negative = cash_flows.iter().any(|&cf| cf < 0.0);
    positive && negative
}

/// Per-period internal rate of return, `None` when undefined
#[must_use]
pub fn irr(cash_flows: &[f64]) -> Option<f64> {
    if cash_flows.len() < 2 || !has_sign_change(cash_flows) {
        return None;
    }
    if cash_flows.iter().any(|cf| !cf.is_finite()) {
        return None;
    }

    let mut rate = 0.01;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (value, derivative) = npv_and_derivative(rate, cash_flows);
        if value.abs() < TOLERANCE {
            return Some(rate);
        }
        if derivative == 0.0 || !derivative.is_finite() {
            break;
        }
        let next = rate - value / derivative;
        if !(LOWER_RATE..=UPPER_RATE).contains(&next) {
            break;
        }
        if (next - rate).abs() < TOLERANCE {
            return Some(next);
        }
        rate = next;
    }

    bisect(cash_flows)
}

fn bisect(cash_flows: &[f64]) -> Option<f64> {
    let (mut low, mut high) = (LOWER_RATE, UPPER_RATE);
    let mut low_value = npv(low, cash_flows);
    if low_value.signum() == npv(high, cash_flows).signum() {
        return None;
    }
    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = 0.5 * (low + high);
        let value = npv(mid, cash_flows);
        if value.abs() < TOLERANCE || (high - low) < TOLERANCE {
            return Some(mid);
        }
        if value.signum() == low_value.signum() {
            low = mid;
            low_value = value;
        } else {
            high = mid;
        }
    }
    Some(0.5 * (low + high))
}

/// Annualize a per-period rate
#[must_use]
pub fn annualize_rate(periodic: f64, granularity: Granularity) -> f64 {
    (1.0 + periodic).powi(granularity.periods_per_year() as i32) - 1.0
}

/// Annualized IRR of a periodic cashflow series
#[must_use]
pub fn annual_irr(cash_flows: &[f64], granularity: Granularity) -> Option<f64> {
    irr(cash_flows).map(|r| annualize_rate(r, granularity))
}

/// Multiple on invested capital, `None` without invested capital
#[must_use]
pub fn moic(invested: f64, returned: f64) -> Option<f64> {
    (invested > 0.0).then(|| returned / invested)
}
