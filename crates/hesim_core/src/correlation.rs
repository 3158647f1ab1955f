//! Zone correlation matrix validation and Cholesky factorization

use crate::error::ConfigError;

/// Pivots this far below zero are treated as numerical noise on a
/// semi-definite matrix rather than as a genuinely indefinite one.
const PSD_TOLERANCE: f64 = 1e-10;

/// Lower-triangular factor `L` with `L * L^T` equal to the correlation matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    lower: Vec<Vec<f64>>,
}

impl CholeskyFactor {
    /// Map independent standard normals onto correlated ones
    pub fn correlate_into(&self, independent: &[f64], out: &mut [f64]) {
        for (i, row) in self.lower.iter().enumerate() {
            out[i] = row
                .iter()
                .zip(independent)
                .take(i + 1)
                .map(|(l, z)| l * z)
                .sum();
        }
    }
}

/// Validate a zone correlation matrix and factor it.
///
/// The matrix must be `zones x zones`, symmetric, with a unit diagonal and
/// entries in `[-1, 1]`. Semi-definite matrices are accepted: a zero pivot
/// zeroes the corresponding factor column.
pub fn cholesky(matrix: &[Vec<f64>], zones: usize) -> Result<CholeskyFactor, ConfigError> {
    let n = matrix.len();
    if n != zones || matrix.iter().any(|row| row.len() != n) {
        return Err(ConfigError::CorrelationShape {
            rows: n,
            cols: matrix.iter().map(Vec::len).max().unwrap_or(0),
            zones,
        });
    }

    for i in 0..n {
        if (matrix[i][i] - 1.0).abs() > 1e-12 {
            return Err(ConfigError::invalid(
                "correlation",
                format!("diagonal entry {i} is {}, expected 1", matrix[i][i]),
            ));
        }
        for j in 0..i {
            let value = matrix[i][j];
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(
                    "correlation",
                    format!("entry ({i}, {j}) = {value} lies outside [-1, 1]"),
                ));
            }
            if (value - matrix[j][i]).abs() > 1e-12 {
                return Err(ConfigError::invalid(
                    "correlation",
                    format!("matrix is not symmetric at ({i}, {j})"),
                ));
            }
        }
    }

    let mut lower = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| lower[i][k] * lower[j][k]).sum();

            if i == j {
                let pivot = matrix[i][i] - sum;
                if pivot < -PSD_TOLERANCE {
                    return Err(ConfigError::NotPositiveSemiDefinite { row: i, pivot });
                }
                lower[i][j] = pivot.max(0.0).sqrt();
            } else if lower[j][j] < 1e-12 {
                // Zero pivot: row j is a combination of earlier rows. The entry
                // must then already be reproduced by the earlier columns.
                if (matrix[i][j] - sum).abs() > 1e-8 {
                    return Err(ConfigError::NotPositiveSemiDefinite {
                        row: i,
                        pivot: matrix[i][j] - sum,
                    });
                }
                lower[i][j] = 0.0;
            } else {
                lower[i][j] = (matrix[i][j] - sum) / lower[j][j];
            }
        }
    }

    Ok(CholeskyFactor { lower })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(factor: &CholeskyFactor) -> Vec<Vec<f64>> {
        let l = &factor.lower;
        let n = l.len();
        (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| (0..n).map(|k| l[i][k] * l[j][k]).sum())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_factor_reproduces_matrix() {
        let matrix = vec![
            vec![1.0, 0.6, 0.3],
            vec![0.6, 1.0, 0.5],
            vec![0.3, 0.5, 1.0],
        ];
        let factor = cholesky(&matrix, 3).unwrap();
        let back = reconstruct(&factor);
        for i in 0..3 {
            for j in 0..3 {
                assert!((back[i][j] - matrix[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_perfectly_correlated_is_semi_definite() {
        let matrix = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let factor = cholesky(&matrix, 2).unwrap();
        let mut out = [0.0; 2];
        factor.correlate_into(&[0.7, -2.0], &mut out);
        assert!((out[0] - 0.7).abs() < 1e-12);
        assert!((out[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_indefinite_matrix_is_rejected() {
        let matrix = vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ];
        assert!(matches!(
            cholesky(&matrix, 3),
            Err(ConfigError::NotPositiveSemiDefinite { .. })
        ));
    }

    #[test]
    fn test_shape_and_range_checks() {
        let matrix = vec![vec![1.0, 0.2], vec![0.2, 1.0]];
        assert_eq!(
            cholesky(&matrix, 3),
            Err(ConfigError::CorrelationShape {
                rows: 2,
                cols: 2,
                zones: 3
            })
        );

        let out_of_range = vec![vec![1.0, 1.5], vec![1.5, 1.0]];
        assert!(matches!(
            cholesky(&out_of_range, 2),
            Err(ConfigError::Invalid { .. })
        ));

        let asymmetric = vec![vec![1.0, 0.2], vec![0.3, 1.0]];
        assert!(cholesky(&asymmetric, 2).is_err());
    }
}
