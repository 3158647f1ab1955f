//! Command-line front end for the home-equity-share fund simulator
//!
//! Scenario files are loaded and validated here, simulations are handed to
//! `hesim_core`, and results are rendered as text reports or written as JSON.

pub mod logging;
pub mod report;
pub mod scenario;

pub use logging::init_logging;
pub use scenario::{Scenario, ScenarioError, ScenarioFormat, load_scenario, save_scenario};
