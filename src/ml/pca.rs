// ============================================================
// Layer 5 — Principal Component Analysis
// ============================================================
// Single-component PCA via eigen-decomposition of the sample
// covariance matrix (nalgebra's SymmetricEigen).
//
// projection(x) = (x - mean) · component
//
// The component is a unit vector; its sign is arbitrary until the
// reducer orients it against the expected insulation weights and
// calls `flip_sign`.

use anyhow::{ensure, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::domain::traits::Projector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub mean:      Vec<f64>,
    pub component: Vec<f64>,
    /// Variance along the component
    pub explained_variance: f64,
    /// Share of total variance the component captures
    pub explained_variance_ratio: f64,
}

impl Pca {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        ensure!(!rows.is_empty(), "cannot fit PCA on an empty table");
        let n = rows.len();
        let d = rows[0].len();
        ensure!(d > 0, "PCA needs at least one column");

        let data = DMatrix::from_fn(n, d, |i, j| rows[i][j]);
        let mean: Vec<f64> = (0..d).map(|j| data.column(j).mean()).collect();
        let mut centered = data;
        for j in 0..d {
            let m = mean[j];
            centered.column_mut(j).apply(|v| *v -= m);
        }

        let denom = (n.max(2) - 1) as f64;
        let cov = centered.transpose() * &centered / denom;
        let eig = SymmetricEigen::new(cov);

        let (best, &top) = eig
            .eigenvalues
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| anyhow::anyhow!("empty eigen-decomposition"))?;
        let total: f64 = eig.eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let component: Vec<f64> = eig.eigenvectors.column(best).iter().copied().collect();

        Ok(Self {
            mean,
            component,
            explained_variance: top.max(0.0),
            explained_variance_ratio: if total > 0.0 { top.max(0.0) / total } else { 0.0 },
        })
    }
}

impl Projector for Pca {
    fn input_dim(&self) -> usize {
        self.mean.len()
    }

    fn project(&self, row: &[f64]) -> f64 {
        row.iter()
            .zip(&self.mean)
            .zip(&self.component)
            .map(|((x, m), c)| (x - m) * c)
            .sum()
    }

    fn flip_sign(&mut self) {
        self.component.iter_mut().for_each(|c| *c = -*c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_follows_dominant_direction() {
        // points spread along (1, 1)
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let t = i as f64;
                vec![t, t + if i % 2 == 0 { 0.1 } else { -0.1 }]
            })
            .collect();
        let pca = Pca::fit(&rows).unwrap();
        let c = &pca.component;
        let norm = (c[0] * c[0] + c[1] * c[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!((c[0].abs() - c[1].abs()).abs() < 0.05);
        assert!(pca.explained_variance_ratio > 0.99);
    }

    #[test]
    fn test_projection_is_centered_and_flips() {
        let rows = vec![vec![0.0, 0.0], vec![2.0, 0.0], vec![4.0, 0.0]];
        let mut pca = Pca::fit(&rows).unwrap();
        let proj = pca.project_all(&rows);
        assert!(proj.iter().sum::<f64>().abs() < 1e-9);
        let before = pca.project(&[4.0, 0.0]);
        pca.flip_sign();
        assert!((pca.project(&[4.0, 0.0]) + before).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(Pca::fit(&[]).is_err());
    }
}
