//! Cross-path statistics: moments, percentiles and tail risk

use crate::model::{
    DistributionStats, ExitCounts, ExitType, MonteCarloStats, PathSummary, RiskMeasures,
};

/// Linear-interpolated quantile of ascending-sorted values, `p` in `[0, 1]`
#[must_use]
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Moments and requested percentiles; non-finite values are ignored
#[must_use]
pub fn describe(values: &[f64], percentiles: &[f64]) -> DistributionStats {
    let sorted = sorted_finite(values);
    let count = sorted.len();
    if count == 0 {
        return DistributionStats::default();
    }

    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std_dev = if count > 1 {
        let variance =
            sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    DistributionStats {
        count,
        mean,
        std_dev,
        min: sorted[0],
        max: sorted[count - 1],
        percentiles: percentiles
            .iter()
            .map(|&p| (p, quantile(&sorted, p)))
            .collect(),
    }
}

/// Value at risk and expected shortfall of a return distribution, as
/// positive losses. The tail is every observation at or below the
/// `1 - confidence` quantile.
#[must_use]
pub fn risk_measures(values: &[f64], confidence: f64) -> Option<RiskMeasures> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return None;
    }
    let cutoff = quantile(&sorted, 1.0 - confidence);
    let tail: Vec<f64> = sorted.iter().copied().take_while(|&v| v <= cutoff).collect();
    let tail_mean = if tail.is_empty() {
        cutoff
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    };
    Some(RiskMeasures {
        confidence,
        var: -cutoff,
        cvar: -tail_mean,
    })
}

/// Aggregate statistics over successful path summaries
#[must_use]
pub fn aggregate(paths: &[PathSummary], percentiles: &[f64], confidence_levels: &[f64]) -> MonteCarloStats {
    let lp_irr: Vec<f64> = paths.iter().filter_map(|p| p.lp_irr).collect();
    let fund_irr: Vec<f64> = paths.iter().filter_map(|p| p.fund_irr).collect();
    let lp_moic: Vec<f64> = paths.iter().filter_map(|p| p.lp_moic).collect();
    let roi: Vec<f64> = paths.iter().map(|p| p.portfolio_roi).collect();
    let carry: Vec<f64> = paths.iter().map(|p| p.gp_carry).collect();
    let clawback: Vec<f64> = paths.iter().map(|p| p.clawback).collect();

    let mut exit_counts = ExitCounts::default();
    for path in paths {
        exit_counts.merge(&path.exit_counts);
    }
    let total_exits = exit_counts.total();
    let exit_distribution = ExitType::ALL
        .iter()
        .map(|&t| {
            let share = if total_exits == 0 {
                0.0
            } else {
                exit_counts.get(t) as f64 / total_exits as f64
            };
            (t, share)
        })
        .collect();

    let risk = |values: &[f64]| -> Vec<RiskMeasures> {
        confidence_levels
            .iter()
            .filter_map(|&c| risk_measures(values, c))
            .collect()
    };

    MonteCarloStats {
        lp_irr: describe(&lp_irr, percentiles),
        fund_irr: describe(&fund_irr, percentiles),
        lp_moic: describe(&lp_moic, percentiles),
        portfolio_roi: describe(&roi, percentiles),
        gp_carry: describe(&carry, percentiles),
        clawback: describe(&clawback, percentiles),
        lp_irr_risk: risk(&lp_irr),
        portfolio_roi_risk: risk(&roi),
        exit_counts,
        exit_distribution,
        undefined_irr_paths: paths.len() - lp_irr.len(),
    }
}
