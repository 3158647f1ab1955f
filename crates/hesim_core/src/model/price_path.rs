use serde::{Deserialize, Serialize};

use super::ids::PropertyId;

/// Monthly value series for one property, starting at its origination month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePath {
    pub property_id: PropertyId,
    pub start_month: u32,
    /// `values[i]` is the value at fund month `start_month + i`
    pub values: Vec<f64>,
}

impl PricePath {
    /// Value at fund month `month`, if the path covers it
    #[must_use]
    pub fn value_at(&self, month: u32) -> Option<f64> {
        let offset = month.checked_sub(self.start_month)?;
        self.values.get(offset as usize).copied()
    }

    /// Last month covered by the path
    #[must_use]
    pub fn end_month(&self) -> u32 {
        self.start_month + self.values.len().saturating_sub(1) as u32
    }

    /// Simple month-over-month returns (zero where the prior value is zero)
    #[must_use]
    pub fn monthly_returns(&self) -> Vec<f64> {
        self.values
            .windows(2)
            .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
            .collect()
    }

    /// Iterate `(month, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (self.start_month + i as u32, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_returns() {
        let path = PricePath {
            property_id: PropertyId(7),
            start_month: 3,
            values: vec![100.0, 110.0, 99.0],
        };
        assert_eq!(path.value_at(2), None);
        assert_eq!(path.value_at(3), Some(100.0));
        assert_eq!(path.value_at(5), Some(99.0));
        assert_eq!(path.value_at(6), None);
        assert_eq!(path.end_month(), 5);

        let returns = path.monthly_returns();
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] + 0.10).abs() < 1e-12);

        let months: Vec<u32> = path.iter().map(|(m, _)| m).collect();
        assert_eq!(months, vec![3, 4, 5]);
    }
}
