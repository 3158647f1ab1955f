//! Scenario files
//!
//! A scenario bundles the fund configuration with its Monte Carlo settings.
//! YAML is the default format; files ending in `.json` are read and written
//! as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use hesim_core::config::{FeeBasis, PriceModel, SimulationBuilder, SimulationConfig};
use hesim_core::error::ConfigError;
use hesim_core::model::{InterestTreatment, MonteCarloConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize scenario: {0}")]
    Serialize(String),

    #[error("invalid scenario: {0}")]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFormat {
    Yaml,
    Json,
}

impl ScenarioFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ScenarioFormat::Json,
            _ => ScenarioFormat::Yaml,
        }
    }
}

impl Scenario {
    pub fn parse(content: &str, format: ScenarioFormat) -> Result<Self, String> {
        match format {
            ScenarioFormat::Yaml => serde_saphyr::from_str(content).map_err(|e| e.to_string()),
            ScenarioFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }

    pub fn render(&self, format: ScenarioFormat) -> Result<String, ScenarioError> {
        match format {
            ScenarioFormat::Yaml => {
                serde_saphyr::to_string(self).map_err(|e| ScenarioError::Serialize(e.to_string()))
            }
            ScenarioFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ScenarioError::Serialize(e.to_string())),
        }
    }

    /// Starter scenario written by `hesim init`
    pub fn example() -> Self {
        let simulation = SimulationBuilder::new()
            .start(2025, 1, 1)
            .horizon_years(10)
            .zone(0, 0.045, 0.11)
            .zone(1, 0.035, 0.09)
            .zone(2, 0.030, 0.08)
            .correlation(vec![
                vec![1.0, 0.6, 0.4],
                vec![0.6, 1.0, 0.5],
                vec![0.4, 0.5, 1.0],
            ])
            .price_model(PriceModel::Gbm)
            .variation(0.03, 0.05)
            .loan_interest_rate(0.04)
            .interest_treatment(InterestTreatment::CashPay)
            .in_suburb(Some(1))
            .loan(0, 850_000.0, 0.20)
            .loan(0, 720_000.0, 0.25)
            .in_suburb(None)
            .loan(1, 610_000.0, 0.20)
            .loan(1, 540_000.0, 0.30)
            .originate_at(6)
            .loan(2, 480_000.0, 0.25)
            .loan(2, 930_000.0, 0.15)
            .appreciation_share(0.25)
            .management_fee(0.02, FeeBasis::Committed)
            .origination_fee(0.01)
            .hurdle_rate(0.08)
            .carry(0.20)
            .build_unchecked();

        Self {
            simulation,
            monte_carlo: MonteCarloConfig {
                iterations: 2_000,
                seed: Some(42),
                ..Default::default()
            },
        }
    }
}

/// Read, parse and validate a scenario file
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let scenario = Scenario::parse(&content, ScenarioFormat::from_path(path)).map_err(|message| {
        ScenarioError::Parse {
            path: path.to_path_buf(),
            message,
        }
    })?;
    scenario.simulation.validate()?;
    tracing::debug!(
        path = %path.display(),
        loans = scenario.simulation.loans.len(),
        zones = scenario.simulation.market.zones.len(),
        "loaded scenario"
    );
    Ok(scenario)
}

pub fn save_scenario(path: &Path, scenario: &Scenario) -> Result<(), ScenarioError> {
    let content = scenario.render(ScenarioFormat::from_path(path))?;
    write_file(path, &content)
}

/// Write any serializable result as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ScenarioError> {
    let content =
        serde_json::to_string_pretty(value).map_err(|e| ScenarioError::Serialize(e.to_string()))?;
    write_file(path, &content)
}

fn write_file(path: &Path, content: &str) -> Result<(), ScenarioError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ScenarioError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })
}
