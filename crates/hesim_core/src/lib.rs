//! Home-equity-share fund simulation library
//!
//! This crate simulates a fund that lends against residential property in
//! exchange for a share of appreciation. A simulated path:
//! - Draws correlated zone-level price paths with suburb and property noise
//! - Runs a monthly hazard model deciding when and how each loan exits
//!   (sale, refinance, default, term completion)
//! - Reduces loan events into a periodic fund cashflow statement
//! - Allocates distributions to LPs and the GP through a tiered waterfall
//!   with catch-up and clawback
//!
//! The Monte Carlo orchestrator repeats the pipeline over many seeded paths
//! and aggregates return distributions and tail risk.
//!
//! # Builder DSL
//!
//! ```ignore
//! use hesim_core::config::SimulationBuilder;
//! use hesim_core::model::MonteCarloConfig;
//!
//! let config = SimulationBuilder::new()
//!     .start(2025, 1, 1)
//!     .horizon_years(10)
//!     .zone(0, 0.04, 0.10)
//!     .zone(1, 0.03, 0.08)
//!     .uniform_correlation(0.6)
//!     .loan_interest_rate(0.05)
//!     .loan(0, 750_000.0, 0.15)
//!     .loan(1, 520_000.0, 0.20)
//!     .appreciation_share(0.25)
//!     .hurdle_rate(0.08)
//!     .carry(0.20)
//!     .build()?;
//!
//! let summary = hesim_core::monte_carlo_simulate(
//!     &config,
//!     &MonteCarloConfig { iterations: 1_000, seed: Some(42), ..Default::default() },
//! )?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod cashflows;
pub mod correlation;
pub mod error;
pub mod exits;
pub mod hazard;
pub mod monte_carlo;
pub mod price_paths;
pub mod reinvestment;
pub mod returns;
pub mod seeding;
pub mod simulation;
pub mod stats;
pub mod waterfall;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::{SimulationBuilder, SimulationConfig};
pub use error::{ConfigError, PathError, SimulationError};
pub use monte_carlo::{
    MonteCarloOrchestrator, monte_carlo_simulate, monte_carlo_simulate_with_progress,
};
pub use reinvestment::{NoReinvestment, ReinvestmentPolicy, ReinvestmentRequest};
pub use simulation::{Pipeline, simulate, simulate_with};
