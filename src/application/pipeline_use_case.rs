// ============================================================
// Layer 2 — PipelineUseCase
// ============================================================
// Runs every batch stage in order with one shared configuration:
//
//   parse → reduce → train → export
//
// A failing stage stops the pipeline; earlier stages keep what
// they wrote.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{
    export_use_case::{default_models, ExportConfig, ExportUseCase},
    parse_use_case::{ParseConfig, ParseUseCase},
    reduce_use_case::{ReduceConfig, ReduceUseCase},
    train_use_case::{TrainConfig, TrainTarget, TrainUseCase},
};
use crate::ml::autoencoder::AutoencoderTraining;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_dir:    String,
    pub models_dir:  String,
    pub clear_notes: bool,
    pub autoencoder: AutoencoderTraining,
    pub targets:     Vec<TrainTarget>,
    pub seed:        u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir:    "data".to_string(),
            models_dir:  "models".to_string(),
            clear_notes: false,
            autoencoder: AutoencoderTraining::default(),
            targets:     TrainTarget::ALL.to_vec(),
            seed:        42,
        }
    }
}

impl PipelineConfig {
    pub fn parse(&self) -> ParseConfig {
        ParseConfig {
            data_dir:    self.data_dir.clone(),
            clear_notes: self.clear_notes,
            ..ParseConfig::default()
        }
    }

    pub fn reduce(&self) -> ReduceConfig {
        ReduceConfig {
            data_dir:    self.data_dir.clone(),
            models_dir:  self.models_dir.clone(),
            autoencoder: self.autoencoder.clone(),
        }
    }

    pub fn train(&self) -> TrainConfig {
        TrainConfig {
            data_dir:   self.data_dir.clone(),
            models_dir: self.models_dir.clone(),
            targets:    self.targets.clone(),
            seed:       self.seed,
        }
    }

    pub fn export(&self) -> ExportConfig {
        ExportConfig {
            models_dir: self.models_dir.clone(),
            models:     default_models(),
        }
    }
}

pub struct PipelineUseCase {
    config: PipelineConfig,
}

impl PipelineUseCase {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        tracing::info!("── parse ──");
        let parsed = ParseUseCase::new(cfg.parse()).execute().context("parse stage failed")?;
        tracing::info!("{} records parsed, {} ingested", parsed.parsed, parsed.ingested);

        tracing::info!("── reduce ──");
        ReduceUseCase::new(cfg.reduce()).execute().context("reduce stage failed")?;

        tracing::info!("── train ──");
        TrainUseCase::new(cfg.train()).execute().context("train stage failed")?;

        tracing::info!("── export ──");
        let exported = ExportUseCase::new(cfg.export()).execute().context("export stage failed")?;
        tracing::info!("Pipeline complete; {} models exported", exported.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{fixtures, RAW_NOTES_FILE};
    use crate::infra::artifact_store::{ArtifactStore, ONNX_FILE};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_pipeline_end_to_end() {
        let dir  = tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join(RAW_NOTES_FILE), fixtures::NOTES).unwrap();

        let cfg = PipelineConfig {
            data_dir:    data.to_string_lossy().into_owned(),
            models_dir:  dir.path().join("models").to_string_lossy().into_owned(),
            clear_notes: true,
            autoencoder: AutoencoderTraining { epochs: 5, ..AutoencoderTraining::default() },
            ..PipelineConfig::default()
        };
        PipelineUseCase::new(cfg).execute().unwrap();

        let store = ArtifactStore::open(dir.path().join("models"));
        for name in default_models() {
            let v = store.latest_version(&name).unwrap();
            assert!(store.version_dir(&name, &v).join(ONNX_FILE).is_file(), "{name}");
        }
        assert_eq!(fs::read_to_string(data.join(RAW_NOTES_FILE)).unwrap(), "");
    }

    #[test]
    fn test_stage_configs_share_directories() {
        let cfg = PipelineConfig { seed: 9, ..PipelineConfig::default() };
        assert_eq!(cfg.train().seed, 9);
        assert_eq!(cfg.reduce().models_dir, cfg.export().models_dir);
        assert_eq!(cfg.parse().data_dir, cfg.train().data_dir);
    }
}
