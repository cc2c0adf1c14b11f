// ============================================================
// Layer 5 — Clothing Feature Reducer
// ============================================================
// Collapses the clothing indicator columns into two latent
// insulation values:
//
//   upper (7 columns) ─ scaler ─ autoencoder bottleneck ─► upr_clo
//   lower (5 columns) ─ scaler ─ PCA, 1 component      ─► lwr_clo
//
// Neither method knows which direction means "warmer", so each
// output is checked against a reference score (the raw indicators
// dotted with hand-assigned clo weights). If the Pearson r is
// negative the projector's sign is flipped in place; the stored
// model then already produces the corrected value.
//
// Everything else in the cleaned table passes through unchanged.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::table::FeatureTable;
use crate::domain::{
    record::Field,
    schema::{self, LOWER_CLOTHING, UPPER_CLOTHING},
    traits::Projector,
};
use crate::ml::{
    autoencoder::{train_autoencoder, AutoencoderTraining, DenseEncoder},
    pca::Pca,
    scaler::StandardScaler,
    stats::{dot, pearson},
};

/// How a projector was oriented against its reference score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignCorrection {
    /// Pearson r after correction; 0 when undefined
    pub correlation: f64,
    pub flipped:     bool,
}

/// Flip `projector` if its output on `scaled` anti-correlates with
/// `reference`. An undefined correlation counts as 0 and is left alone.
pub fn orient<P: Projector>(projector: &mut P, scaled: &[Vec<f64>], reference: &[f64]) -> SignCorrection {
    let r = pearson(&projector.project_all(scaled), reference).unwrap_or(0.0);
    if r < 0.0 {
        projector.flip_sign();
        SignCorrection { correlation: -r, flipped: true }
    } else {
        SignCorrection { correlation: r, flipped: false }
    }
}

/// Fitted reducer: everything needed to turn raw clothing
/// indicators into `upr_clo` / `lwr_clo`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClothingReducer {
    pub upper_scaler: StandardScaler,
    pub lower_scaler: StandardScaler,
    pub encoder:      DenseEncoder,
    pub pca:          Pca,
}

/// A freshly fitted reducer plus what training observed.
#[derive(Debug, Clone)]
pub struct ReducerFit {
    pub reducer:    ClothingReducer,
    pub upper:      SignCorrection,
    pub lower:      SignCorrection,
    pub epoch_loss: Vec<f64>,
}

impl ClothingReducer {
    pub fn fit(cleaned: &FeatureTable, training: &AutoencoderTraining) -> Result<ReducerFit> {
        let upper_raw = cleaned
            .select(&schema::names(&UPPER_CLOTHING))
            .context("cleaned table lacks upper clothing columns")?
            .rows;
        let lower_raw = cleaned
            .select(&schema::names(&LOWER_CLOTHING))
            .context("cleaned table lacks lower clothing columns")?
            .rows;

        let upper_scaler = StandardScaler::fit(&upper_raw)?;
        let lower_scaler = StandardScaler::fit(&lower_raw)?;
        let upper_scaled = upper_scaler.transform(&upper_raw);
        let lower_scaled = lower_scaler.transform(&lower_raw);

        // ── Upper: autoencoder ────────────────────────────────────────────────
        let trained = train_autoencoder(&upper_scaled, training)?;
        let mut encoder = trained.encoder;
        let upper_ref = reference_scores(&upper_raw, &UPPER_CLOTHING);
        let upper = orient(&mut encoder, &upper_scaled, &upper_ref);

        // ── Lower: PCA ────────────────────────────────────────────────────────
        let mut pca = Pca::fit(&lower_scaled)?;
        let lower_ref = reference_scores(&lower_raw, &LOWER_CLOTHING);
        let lower = orient(&mut pca, &lower_scaled, &lower_ref);

        tracing::info!(
            "Upper insulation r={:.3}{}, lower insulation r={:.3}{} (explained variance {:.1}%)",
            upper.correlation,
            if upper.flipped { " (flipped)" } else { "" },
            lower.correlation,
            if lower.flipped { " (flipped)" } else { "" },
            pca.explained_variance_ratio * 100.0,
        );

        Ok(ReducerFit {
            reducer: ClothingReducer { upper_scaler, lower_scaler, encoder, pca },
            upper,
            lower,
            epoch_loss: trained.epoch_loss,
        })
    }

    /// upr_clo for one row of raw upper indicators (UPPER_CLOTHING order)
    pub fn upper_value(&self, raw: &[f64]) -> f64 {
        self.encoder.project(&self.upper_scaler.transform_row(raw))
    }

    /// lwr_clo for one row of raw lower indicators (LOWER_CLOTHING order)
    pub fn lower_value(&self, raw: &[f64]) -> f64 {
        self.pca.project(&self.lower_scaler.transform_row(raw))
    }

    /// Both insulation values, reading indicators through `value_of`
    pub fn insulation(&self, value_of: impl Fn(Field) -> f64) -> (f64, f64) {
        let upper: Vec<f64> = UPPER_CLOTHING.iter().map(|&f| value_of(f)).collect();
        let lower: Vec<f64> = LOWER_CLOTHING.iter().map(|&f| value_of(f)).collect();
        (self.upper_value(&upper), self.lower_value(&lower))
    }

    /// The computed table: insulation values followed by the
    /// non-clothing columns of `cleaned`.
    pub fn compute_table(&self, cleaned: &FeatureTable) -> Result<FeatureTable> {
        let upper = cleaned.select(&schema::names(&UPPER_CLOTHING))?;
        let lower = cleaned.select(&schema::names(&LOWER_CLOTHING))?;
        let rest  = cleaned.select(&schema::names(&schema::CONDITIONS))?;

        let rows = upper
            .rows
            .iter()
            .zip(&lower.rows)
            .zip(&rest.rows)
            .map(|((u, l), r)| {
                let mut row = vec![self.upper_value(u), self.lower_value(l)];
                row.extend_from_slice(r);
                row
            })
            .collect();
        FeatureTable::new(schema::computed_columns(), rows)
    }
}

fn reference_scores(raw: &[Vec<f64>], fields: &[Field]) -> Vec<f64> {
    let weights = schema::expected_clo_weights(fields);
    raw.iter().map(|r| dot(r, &weights)).collect()
}
