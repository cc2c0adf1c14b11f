// ============================================================
// Layer 2 — ReduceUseCase
// ============================================================
// Fits the clothing reducer on the cleaned table and persists
// everything inference needs to reproduce upr_clo / lwr_clo:
//
//   Step 1: Load cleaned_data.csv             (Layer 4 - data)
//   Step 2: Fit scalers, autoencoder, PCA     (Layer 5 - ml::reducer)
//   Step 3: Save clothing_encoder and clothing_pca, each with its
//           scaler in the same version dir   (Layer 6 - infra)
//   Step 4: Write computed_data.csv           (Layer 4 - data)
//
// A scaler only ever moves together with its model: the pointer
// advances after both files are on disk.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use super::{data_path, CLEANED_FILE, COMPUTED_FILE};
use crate::data::table::FeatureTable;
use crate::domain::{
    artifact::{ModelKind, ModelMetadata},
    schema::{self, LOWER_CLOTHING, LOWER_INSULATION, UPPER_CLOTHING, UPPER_INSULATION},
    traits::Persistable,
};
use crate::infra::{
    artifact_store::ArtifactStore,
    metrics::{MetricsLogger, RunMetrics},
    normalization::SCALER_FILE,
};
use crate::ml::{
    autoencoder::{AutoencoderTraining, DenseEncoder},
    pca::Pca,
    reducer::{ClothingReducer, SignCorrection},
    scaler::StandardScaler,
};

pub const ENCODER_MODEL: &str = "clothing_encoder";
pub const PCA_MODEL:     &str = "clothing_pca";

// ─── Reduce Configuration ────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceConfig {
    pub data_dir:    String,
    pub models_dir:  String,
    pub autoencoder: AutoencoderTraining,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            data_dir:    "data".to_string(),
            models_dir:  "models".to_string(),
            autoencoder: AutoencoderTraining::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReduceReport {
    pub rows:            usize,
    pub upper:           SignCorrection,
    pub lower:           SignCorrection,
    pub encoder_version: String,
    pub pca_version:     String,
    pub final_loss:      Option<f64>,
}

// ─── ReduceUseCase ───────────────────────────────────────────────────────────
pub struct ReduceUseCase {
    config: ReduceConfig,
}

impl ReduceUseCase {
    pub fn new(config: ReduceConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ReduceReport> {
        let cfg = &self.config;
        let models_dir = Path::new(&cfg.models_dir);

        // ── Step 1: Load the cleaned table ───────────────────────────────────
        let cleaned_path = data_path(&cfg.data_dir, CLEANED_FILE);
        let cleaned = FeatureTable::read_csv(&cleaned_path)?;
        ensure!(!cleaned.is_empty(), "'{}' has no rows; run `parse` first", cleaned_path.display());
        tracing::info!("Loaded {} cleaned rows", cleaned.len());

        // ── Step 2: Fit ──────────────────────────────────────────────────────
        let fit = ClothingReducer::fit(&cleaned, &cfg.autoencoder)?;
        let reducer = &fit.reducer;

        // ── Step 3: Models + scalers ─────────────────────────────────────────
        let store  = ArtifactStore::new(models_dir)?;
        let logger = MetricsLogger::new(models_dir)?;

        let mut meta = ModelMetadata::new(UPPER_INSULATION, ModelKind::Encoder, schema::names(&UPPER_CLOTHING));
        meta.correlation  = Some(fit.upper.correlation);
        meta.sign_flipped = Some(fit.upper.flipped);
        meta.best_params  = Some(serde_json::to_value(&cfg.autoencoder)?);
        meta.n_train      = cleaned.len();
        let encoder_version = store.save_with(ENCODER_MODEL, &reducer.encoder, &mut meta, |dir| {
            reducer.upper_scaler.save(&dir.join(SCALER_FILE))
        })?;
        logger.log(&RunMetrics::from_metadata(ENCODER_MODEL, &meta))?;

        let mut meta = ModelMetadata::new(LOWER_INSULATION, ModelKind::Pca, schema::names(&LOWER_CLOTHING));
        meta.correlation  = Some(fit.lower.correlation);
        meta.sign_flipped = Some(fit.lower.flipped);
        meta.best_params  = Some(serde_json::json!({
            "n_components": 1,
            "explained_variance_ratio": reducer.pca.explained_variance_ratio,
        }));
        meta.n_train      = cleaned.len();
        let pca_version = store.save_with(PCA_MODEL, &reducer.pca, &mut meta, |dir| {
            reducer.lower_scaler.save(&dir.join(SCALER_FILE))
        })?;
        logger.log(&RunMetrics::from_metadata(PCA_MODEL, &meta))?;

        // ── Step 4: Computed table ───────────────────────────────────────────
        let computed = reducer.compute_table(&cleaned)?;
        let computed_path = data_path(&cfg.data_dir, COMPUTED_FILE);
        computed.write_csv(&computed_path)?;
        tracing::info!("Wrote {} computed rows to '{}'", computed.len(), computed_path.display());

        let final_loss = fit.epoch_loss.last().copied();
        if let Some(loss) = final_loss {
            tracing::info!("Autoencoder final reconstruction loss {:.6}", loss);
        }

        Ok(ReduceReport {
            rows: cleaned.len(),
            upper: fit.upper,
            lower: fit.lower,
            encoder_version,
            pca_version,
            final_loss,
        })
    }
}

/// Latest encoder and PCA versions, by model name. Empty when the
/// reducer was never fitted.
pub fn reducer_versions(models_dir: &Path) -> BTreeMap<String, String> {
    let store = ArtifactStore::open(models_dir);
    [ENCODER_MODEL, PCA_MODEL]
        .into_iter()
        .filter_map(|name| store.latest_version(name).ok().map(|v| (name.to_string(), v)))
        .collect()
}

/// Rebuild the reducer from the latest persisted encoder and PCA,
/// each with the scaler stored in its own version directory.
pub fn load_reducer(models_dir: &Path) -> Result<ClothingReducer> {
    let store = ArtifactStore::open(models_dir);
    let (encoder, meta): (DenseEncoder, _) = store.load(ENCODER_MODEL)?;
    let upper_scaler = StandardScaler::load(&store.version_dir(ENCODER_MODEL, &meta.version).join(SCALER_FILE))
        .context("upper clothing scaler")?;
    let (pca, meta): (Pca, _) = store.load(PCA_MODEL)?;
    let lower_scaler = StandardScaler::load(&store.version_dir(PCA_MODEL, &meta.version).join(SCALER_FILE))
        .context("lower clothing scaler")?;

    ensure!(
        upper_scaler.dim() == UPPER_CLOTHING.len() && lower_scaler.dim() == LOWER_CLOTHING.len(),
        "scaler dimensions do not match the clothing columns"
    );
    ensure!(
        encoder.layers.first().map(|l| l.input_dim()) == Some(UPPER_CLOTHING.len()),
        "encoder expects a different number of upper clothing columns"
    );
    ensure!(pca.component.len() == LOWER_CLOTHING.len(), "PCA expects a different number of lower clothing columns");

    Ok(ClothingReducer { upper_scaler, lower_scaler, encoder, pca })
}
