use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use hesim::report::{render_monte_carlo_report, render_path_report};
use hesim::scenario::write_json;
use hesim::{Scenario, init_logging, load_scenario, save_scenario};
use hesim_core::model::MonteCarloProgress;
use hesim_core::{monte_carlo_simulate_with_progress, simulate};

#[derive(Parser, Debug)]
#[command(name = "hesim")]
#[command(about = "Monte Carlo simulator for home-equity-share funds")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an example scenario file
    Init {
        /// Destination; `.json` writes JSON, anything else YAML
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check a scenario file without simulating
    Validate { scenario: PathBuf },
    /// Simulate a single path and print its cashflow statement
    Run {
        scenario: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run the Monte Carlo simulation configured in the scenario
    MonteCarlo {
        scenario: PathBuf,
        /// Override the number of paths
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
        /// Override the master seed
        #[arg(short, long)]
        seed: Option<u64>,
        /// Worker threads (0 = available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Abandon remaining paths after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Also write the full result as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref(), &cli.log_level)?;

    match cli.command {
        Command::Init { path, force } => init(&path, force),
        Command::Validate { scenario } => {
            let scenario = load_scenario(&scenario)?;
            println!(
                "ok: {} loans across {} zones over {} months",
                scenario.simulation.loans.len(),
                scenario.simulation.market.zones.len(),
                scenario.simulation.fund.horizon_months
            );
            Ok(())
        }
        Command::Run {
            scenario,
            seed,
            output,
        } => {
            let scenario = load_scenario(&scenario)?;
            let result = simulate(&scenario.simulation, seed)?;
            print!("{}", render_path_report(&result));
            if let Some(path) = output.json {
                write_json(&path, &result)?;
            }
            Ok(())
        }
        Command::MonteCarlo {
            scenario,
            iterations,
            seed,
            workers,
            timeout_ms,
            output,
        } => {
            let Scenario {
                simulation,
                mut monte_carlo,
            } = load_scenario(&scenario)?;
            if let Some(iterations) = iterations {
                monte_carlo.iterations = iterations;
            }
            if seed.is_some() {
                monte_carlo.seed = seed;
            }
            if let Some(workers) = workers {
                monte_carlo.workers = workers;
            }
            if timeout_ms.is_some() {
                monte_carlo.max_duration_ms = timeout_ms;
            }

            let progress = MonteCarloProgress::new();
            let done = AtomicBool::new(false);
            let total = monte_carlo.iterations;
            let summary = thread::scope(|s| {
                s.spawn(|| report_progress(&progress, &done, total));
                let summary = monte_carlo_simulate_with_progress(&simulation, &monte_carlo, &progress);
                done.store(true, Ordering::SeqCst);
                summary
            })?;

            print!("{}", render_monte_carlo_report(&summary));
            if let Some(path) = output.json {
                write_json(&path, &summary)?;
            }
            Ok(())
        }
    }
}

fn init(path: &Path, force: bool) -> color_eyre::Result<()> {
    if path.exists() && !force {
        color_eyre::eyre::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    save_scenario(path, &Scenario::example())
        .wrap_err_with(|| format!("writing example scenario to {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn report_progress(progress: &MonteCarloProgress, done: &AtomicBool, total: usize) {
    let mut last = 0;
    while !done.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(250));
        let finished = progress.completed() + progress.failed();
        if finished != last && finished < total {
            tracing::info!(current = finished, total, "Monte Carlo progress");
            last = finished;
        }
    }
}
