// ============================================================
// Layer 1 — Service Context
// ============================================================
// Shared read-only state for the HTTP handlers, built once before
// the server starts:
//
//   feels     — classifier + metadata
//   hr        — regressor + metadata
//   clothing  — multi-output regressor + metadata
//   reducer   — scalers + encoder + PCA, used to derive
//               upr_clo / lwr_clo from raw clothing indicators
//
// Each slot loads independently. A slot that fails to load is
// logged and left empty; its endpoint answers 503 while the
// others keep working.

use anyhow::{bail, Result};
use serde::de::DeserializeOwned;
use std::{collections::BTreeMap, path::Path};

use crate::application::{
    reduce_use_case::{load_reducer, reducer_versions},
    train_use_case::TrainTarget,
};
use crate::domain::artifact::ModelMetadata;
use crate::infra::artifact_store::ArtifactStore;
use crate::ml::{
    forest::{RandomForestClassifier, RandomForestRegressor},
    reducer::ClothingReducer,
};

/// A model together with the metadata it was saved with.
#[derive(Debug, Clone)]
pub struct LoadedModel<M> {
    pub model: M,
    pub meta:  ModelMetadata,
}

#[derive(Debug, Default)]
pub struct ServiceContext {
    pub feels:    Option<LoadedModel<RandomForestClassifier>>,
    pub hr:       Option<LoadedModel<RandomForestRegressor>>,
    pub clothing: Option<LoadedModel<RandomForestRegressor>>,
    pub reducer:  Option<ClothingReducer>,
}

impl ServiceContext {
    /// Load every slot from `models_dir`. Only a models path that
    /// exists but is not a directory is an error.
    pub fn load(models_dir: &Path) -> Result<Self> {
        if models_dir.exists() && !models_dir.is_dir() {
            bail!("'{}' is not a directory", models_dir.display());
        }
        if !models_dir.exists() {
            tracing::warn!("Models directory '{}' does not exist; every endpoint will answer 503", models_dir.display());
        }

        let store = ArtifactStore::open(models_dir);
        let ctx = Self {
            feels:    slot(&store, TrainTarget::Feels.model_name(), RandomForestClassifier::n_features),
            hr:       slot(&store, TrainTarget::Hr.model_name(), RandomForestRegressor::n_features),
            clothing: slot(&store, TrainTarget::Clothing.model_name(), RandomForestRegressor::n_features),
            reducer:  match load_reducer(models_dir) {
                Ok(r) => {
                    tracing::info!("Loaded clothing reducer");
                    Some(r)
                }
                Err(e) => {
                    tracing::warn!("Clothing reducer unavailable: {e:#}");
                    None
                }
            },
        };
        ctx.check_reducer_versions(&reducer_versions(models_dir));
        Ok(ctx)
    }

    /// Warn for every loaded model trained on other reducer versions
    /// than the ones now serving. Returns the names of those models.
    pub fn check_reducer_versions(&self, serving: &BTreeMap<String, String>) -> Vec<&'static str> {
        let metas = [
            (TrainTarget::Feels.model_name(),    self.feels.as_ref().map(|m| &m.meta)),
            (TrainTarget::Hr.model_name(),       self.hr.as_ref().map(|m| &m.meta)),
            (TrainTarget::Clothing.model_name(), self.clothing.as_ref().map(|m| &m.meta)),
        ];
        metas
            .into_iter()
            .filter_map(|(name, meta)| {
                let meta = meta?;
                if meta.input_models.is_empty() || &meta.input_models == serving {
                    return None;
                }
                tracing::warn!(
                    "'{}' was trained on reducer {:?} but {:?} is loaded",
                    name, meta.input_models, serving
                );
                Some(name)
            })
            .collect()
    }

    /// Loaded version per model; `None` for empty slots
    pub fn versions(&self) -> BTreeMap<&'static str, Option<String>> {
        BTreeMap::from([
            (TrainTarget::Feels.model_name(),    self.feels.as_ref().map(|m| m.meta.version.clone())),
            (TrainTarget::Hr.model_name(),       self.hr.as_ref().map(|m| m.meta.version.clone())),
            (TrainTarget::Clothing.model_name(), self.clothing.as_ref().map(|m| m.meta.version.clone())),
        ])
    }
}

/// Load one model. A model whose width disagrees with its stored
/// feature order is rejected, since inputs could not be lined up.
fn slot<M: DeserializeOwned>(store: &ArtifactStore, name: &str, width: fn(&M) -> usize) -> Option<LoadedModel<M>> {
    match store.load::<M>(name) {
        Ok((model, meta)) if width(&model) != meta.feature_names.len() => {
            tracing::warn!(
                "Model '{}' expects {} features but its metadata lists {}",
                name, width(&model), meta.feature_names.len()
            );
            None
        }
        Ok((model, meta)) => {
            tracing::info!("Loaded '{}' version {}", name, meta.version);
            Some(LoadedModel { model, meta })
        }
        Err(e) => {
            tracing::warn!("Model '{}' unavailable: {e:#}", name);
            None
        }
    }
}
