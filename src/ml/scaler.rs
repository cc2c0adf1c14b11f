// ============================================================
// Layer 5 — Standard Scaler
// ============================================================
// Per-column z-score normalisation: (x - mean) / scale.
//
// scale is the population standard deviation (divide by n). A
// column with zero variance gets scale 1.0 so it maps to 0
// instead of dividing by zero; clothing indicators that never
// appear in the log hit this case.
//
// The fitted parameters are persisted next to the reducer models
// (see infra::normalization) so inference applies exactly the
// transformation training saw.

use anyhow::{ensure, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean:  Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on row-major data. Every row must have the same width.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        ensure!(!rows.is_empty(), "cannot fit a scaler on an empty table");
        let d = rows[0].len();
        ensure!(rows.iter().all(|r| r.len() == d), "ragged rows in scaler input");

        let n = rows.len() as f64;
        let mut mean = vec![0.0; d];
        for r in rows {
            for (m, v) in mean.iter_mut().zip(r) {
                *m += v / n;
            }
        }
        let mut var = vec![0.0; d];
        for r in rows {
            for j in 0..d {
                var[j] += (r[j] - mean[j]).powi(2) / n;
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let s = v.sqrt();
                if s > f64::EPSILON { s } else { 1.0 }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_population_std() {
        let rows = vec![vec![0.0, 5.0], vec![2.0, 5.0]];
        let s = StandardScaler::fit(&rows).unwrap();
        assert_eq!(s.mean, vec![1.0, 5.0]);
        // population std of {0, 2} is 1
        assert_eq!(s.scale, vec![1.0, 1.0]);
        assert_eq!(s.transform_row(&[2.0, 5.0]), vec![1.0, 0.0]);
    }

    #[test]
    fn test_transformed_columns_are_standardised() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (i % 2) as f64]).collect();
        let s = StandardScaler::fit(&rows).unwrap();
        let z = s.transform(&rows);
        for j in 0..2 {
            let col: Vec<f64> = z.iter().map(|r| r[j]).collect();
            let m = col.iter().sum::<f64>() / 10.0;
            let v = col.iter().map(|x| (x - m).powi(2)).sum::<f64>() / 10.0;
            assert!(m.abs() < 1e-12);
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(StandardScaler::fit(&[]).is_err());
    }
}
