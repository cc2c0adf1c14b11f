// ============================================================
// Layer 2 — ExportUseCase
// ============================================================
// Converts the latest version of each persisted model to ONNX and
// stores it beside the model as model.onnx.
//
// The model type recorded in model_meta.json decides how the
// stored body is read and which graph is built. The encoder and
// PCA graphs start with the standardisation step, so they take
// raw clothing indicators.
//
// A model that has not been trained yet is skipped with a warning.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::reduce_use_case::{ENCODER_MODEL, PCA_MODEL};
use super::train_use_case::TrainTarget;
use crate::domain::{artifact::ModelKind, traits::Persistable};
use crate::infra::{
    artifact_store::{ArtifactStore, ONNX_FILE},
    normalization::SCALER_FILE,
    onnx,
};
use crate::ml::{
    autoencoder::DenseEncoder,
    forest::{RandomForestClassifier, RandomForestRegressor},
    pca::Pca,
    scaler::StandardScaler,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub models_dir: String,
    /// Model names to export
    pub models:     Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            models:     default_models(),
        }
    }
}

/// The three forests plus both reducer models
pub fn default_models() -> Vec<String> {
    TrainTarget::ALL
        .iter()
        .map(|t| t.model_name())
        .chain([ENCODER_MODEL, PCA_MODEL])
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub model:   String,
    pub version: String,
    pub path:    PathBuf,
    pub bytes:   usize,
}

pub struct ExportUseCase {
    config: ExportConfig,
}

impl ExportUseCase {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<ExportReport>> {
        let models_dir = Path::new(&self.config.models_dir);
        let store = ArtifactStore::open(models_dir);

        let mut reports = Vec::new();
        for name in &self.config.models {
            if store.latest_version(name).is_err() {
                tracing::warn!("Skipping '{}': no persisted version", name);
                continue;
            }
            let report = export_model(&store, name)?;
            tracing::info!("Exported '{}' {} ({} bytes) to '{}'", name, report.version, report.bytes, report.path.display());
            reports.push(report);
        }
        ensure!(!reports.is_empty(), "No models to export under '{}'", models_dir.display());
        Ok(reports)
    }
}

/// Write model.onnx for the latest version of `name`.
pub fn export_model(store: &ArtifactStore, name: &str) -> Result<ExportReport> {
    let meta = store.load_metadata(name)?;
    let version = meta.version.clone();

    let bytes = match meta.model_type {
        ModelKind::Classifier => {
            let (model, _): (RandomForestClassifier, _) = store.load_version(name, &version)?;
            onnx::classifier_to_onnx(&model)
        }
        ModelKind::Regressor | ModelKind::MultiOutputRegressor => {
            let (model, _): (RandomForestRegressor, _) = store.load_version(name, &version)?;
            onnx::regressor_to_onnx(&model)
        }
        ModelKind::Encoder => {
            let (encoder, _): (DenseEncoder, _) = store.load_version(name, &version)?;
            let scaler = StandardScaler::load(&store.version_dir(name, &version).join(SCALER_FILE))?;
            onnx::encoder_to_onnx(&encoder, &scaler)
        }
        ModelKind::Pca => {
            let (pca, _): (Pca, _) = store.load_version(name, &version)?;
            let scaler = StandardScaler::load(&store.version_dir(name, &version).join(SCALER_FILE))?;
            onnx::pca_to_onnx(&pca, &scaler)
        }
    };

    let path = store.write_attachment(name, &version, ONNX_FILE, &bytes)?;
    Ok(ExportReport { model: name.to_string(), version, path, bytes: bytes.len() })
}
