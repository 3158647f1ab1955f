use serde::{Deserialize, Serialize};

/// Economy-wide conditions for one month of a simulated path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroState {
    pub recession: bool,
    /// Prevailing annual mortgage rate
    pub market_rate: f64,
    pub inflation_shock: bool,
    /// Index of the price regime in force (0 for single-regime models)
    pub regime: usize,
}

impl Default for MacroState {
    fn default() -> Self {
        Self {
            recession: false,
            market_rate: 0.06,
            inflation_shock: false,
            regime: 0,
        }
    }
}
