//! Plain-text reports for single paths and Monte Carlo runs

use std::fmt::Write;

use hesim_core::model::{
    DistributionStats, ExitCounts, ExitType, MonteCarloSummary, PathResult, RiskMeasures,
};

/// Format a currency value without cents, with thousands separators
pub fn format_currency(value: f64) -> String {
    let dollars = (value.abs().round() as i64).to_string();
    let mut result = String::new();
    for (i, c) in dollars.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    let dollars: String = result.chars().rev().collect();

    if value < 0.0 && dollars != "0" {
        format!("-${dollars}")
    } else {
        format!("${dollars}")
    }
}

/// Format a currency value in compact form (e.g., $2.1M, $450K, $50)
pub fn format_compact_currency(value: f64) -> String {
    let abs_value = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };

    if abs_value >= 1_000_000.0 {
        format!("{sign}${:.1}M", abs_value / 1_000_000.0)
    } else if abs_value >= 1_000.0 {
        format!("{sign}${:.0}K", abs_value / 1_000.0)
    } else {
        format!("{sign}${abs_value:.0}")
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn format_optional(value: Option<f64>, format: fn(f64) -> String) -> String {
    value.map_or_else(|| "n/a".to_string(), format)
}

fn format_multiple(value: f64) -> String {
    format!("{value:.2}x")
}

fn exit_line(counts: &ExitCounts) -> String {
    ExitType::ALL
        .iter()
        .map(|&t| format!("{} {}", t.label(), counts.get(t)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Mean months from origination to exit over the loans that exited
fn average_hold_months(result: &PathResult) -> Option<f64> {
    let holds: Vec<u32> = result
        .loans
        .iter()
        .filter_map(|loan| {
            result
                .exit_for(loan.loan_id)
                .map(|exit| exit.hold_months(loan.origination_month))
        })
        .collect();
    (!holds.is_empty())
        .then(|| holds.iter().map(|&h| f64::from(h)).sum::<f64>() / holds.len() as f64)
}

/// Summary and cashflow statement of one simulated path
pub fn render_path_report(result: &PathResult) -> String {
    let summary = &result.summary;
    let waterfall = &result.waterfall;
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "Path seed {}", summary.seed);
    let _ = writeln!(
        out,
        "Loans: {} originated, {} exited, {} held at horizon",
        summary.loans_originated,
        result.exits.len(),
        result.held.len()
    );
    let _ = writeln!(out, "Exits: {}", exit_line(&summary.exit_counts));
    let _ = writeln!(
        out,
        "Average hold: {}",
        format_optional(average_hold_months(result), |m| format!("{m:.1} months"))
    );
    let _ = writeln!(
        out,
        "LP IRR {}  Fund IRR {}  LP MOIC {}  Portfolio ROI {}",
        format_optional(summary.lp_irr, format_percentage),
        format_optional(summary.fund_irr, format_percentage),
        format_optional(summary.lp_moic, format_multiple),
        format_percentage(summary.portfolio_roi),
    );
    let _ = writeln!(
        out,
        "Contributed {}  To LPs {}  To GP {}  Clawback {}  Realized losses {}",
        format_currency(waterfall.total_contributed),
        format_currency(summary.total_to_lp),
        format_currency(summary.total_to_gp),
        format_currency(summary.clawback),
        format_currency(summary.realized_losses),
    );

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>6}  {:<10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        "Period", "Start", "Calls", "Invested", "Proceeds", "Fees", "Distrib.", "Cash"
    );
    for row in &result.cashflows {
        let proceeds = row.principal_repayments
            + row.interest_income
            + row.appreciation_share
            + row.residual_realization;
        let fees = row.management_fees + row.fund_expenses;
        let _ = writeln!(
            out,
            "{:>6}  {:<10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
            row.period,
            row.period_start.to_string(),
            format_compact_currency(row.capital_calls),
            format_compact_currency(row.loan_investments),
            format_compact_currency(proceeds),
            format_compact_currency(fees),
            format_compact_currency(row.distributions),
            format_compact_currency(row.cash_balance),
        );
    }
    out
}

fn stats_row(out: &mut String, name: &str, stats: &DistributionStats, format: fn(f64) -> String) {
    if stats.count == 0 {
        let _ = writeln!(out, "{name:<16}  {:>10}", "n/a");
        return;
    }
    let pct = |p: f64| format_optional(stats.percentile(p), format);
    let _ = writeln!(
        out,
        "{name:<16}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        format(stats.mean),
        pct(0.05),
        pct(0.50),
        pct(0.95),
        format(stats.std_dev),
    );
}

fn risk_rows(out: &mut String, name: &str, risks: &[RiskMeasures]) {
    for risk in risks {
        let _ = writeln!(
            out,
            "{name} at {:.0}%: VaR {}  CVaR {}",
            risk.confidence * 100.0,
            format_percentage(risk.var),
            format_percentage(risk.cvar),
        );
    }
}

/// Distribution summary of a Monte Carlo run
pub fn render_monte_carlo_report(summary: &MonteCarloSummary) -> String {
    let stats = &summary.stats;
    let mut out = String::new();

    let _ = writeln!(out, "Master seed {}", summary.master_seed);
    let _ = writeln!(
        out,
        "Paths: {} of {} completed, {} failed, {} retried{}",
        summary.completed_paths(),
        summary.requested_paths,
        summary.failed_paths.len(),
        summary.retried_paths,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    if stats.undefined_irr_paths > 0 {
        let _ = writeln!(out, "Paths without a defined LP IRR: {}", stats.undefined_irr_paths);
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<16}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        "Metric", "Mean", "P5", "P50", "P95", "Std dev"
    );
    stats_row(&mut out, "LP IRR", &stats.lp_irr, format_percentage);
    stats_row(&mut out, "Fund IRR", &stats.fund_irr, format_percentage);
    stats_row(&mut out, "LP MOIC", &stats.lp_moic, format_multiple);
    stats_row(&mut out, "Portfolio ROI", &stats.portfolio_roi, format_percentage);
    stats_row(&mut out, "GP carry", &stats.gp_carry, format_compact_currency);
    stats_row(&mut out, "Clawback", &stats.clawback, format_compact_currency);

    let _ = writeln!(out);
    risk_rows(&mut out, "LP IRR", &stats.lp_irr_risk);
    risk_rows(&mut out, "Portfolio ROI", &stats.portfolio_roi_risk);

    let _ = writeln!(out);
    let _ = writeln!(out, "Exit mix ({} exits)", stats.exit_counts.total());
    for (exit_type, share) in &stats.exit_distribution {
        let _ = writeln!(out, "  {:<16} {}", exit_type.label(), format_percentage(*share));
    }

    if !summary.failed_paths.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed paths:");
        for failed in &summary.failed_paths {
            let _ = writeln!(out, "  #{} (seed {}): {}", failed.path_index, failed.seed, failed.error);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hesim_core::config::SimulationBuilder;
    use hesim_core::model::MonteCarloConfig;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1_234_567.4), "$1,234,567");
        assert_eq!(format_currency(-950.0), "-$950");
        assert_eq!(format_currency(-0.2), "$0");
        assert_eq!(format_compact_currency(2_140_000.0), "$2.1M");
        assert_eq!(format_compact_currency(-45_000.0), "-$45K");
        assert_eq!(format_percentage(0.0812), "8.12%");
    }

    fn config() -> hesim_core::SimulationConfig {
        SimulationBuilder::new()
            .horizon_years(5)
            .zone(0, 0.04, 0.10)
            .loan_interest_rate(0.04)
            .loan(0, 600_000.0, 0.2)
            .loan(0, 450_000.0, 0.25)
            .build()
            .unwrap()
    }

    #[test]
    fn test_path_report_lists_every_period() {
        let result = hesim_core::simulate(&config(), 9).unwrap();
        let report = render_path_report(&result);
        assert!(report.starts_with("Path seed 9"));
        assert!(report.contains("LP IRR"));
        // Header line plus one line per quarter
        let table_lines = report.lines().skip_while(|l| !l.contains("Period")).count();
        assert_eq!(table_lines, 1 + result.cashflows.len());
    }

    #[test]
    fn test_path_report_shows_average_hold() {
        let config = SimulationBuilder::new()
            .horizon_years(5)
            .zone(0, 0.04, 0.10)
            .base_exit_rate(0.0)
            .life_event_probability(0.0)
            .hold_period_years(1.0, 3.0)
            .loan(0, 600_000.0, 0.2)
            .originate_at(12)
            .loan(0, 450_000.0, 0.25)
            .build()
            .unwrap();
        let result = hesim_core::simulate(&config, 3).unwrap();
        assert_eq!(result.exits.len(), 2);
        assert!(render_path_report(&result).contains("Average hold: 36.0 months"));
    }

    #[test]
    fn test_monte_carlo_report() {
        let mc = MonteCarloConfig {
            iterations: 20,
            seed: Some(4),
            ..Default::default()
        };
        let summary = hesim_core::monte_carlo_simulate(&config(), &mc).unwrap();
        let report = render_monte_carlo_report(&summary);
        assert!(report.contains("Paths: 20 of 20 completed"));
        assert!(report.contains("Portfolio ROI at 95%: VaR"));
        assert!(report.contains("Exit mix"));
        assert!(!report.contains("Failed paths"));
    }
}
