// ============================================================
// Layer 3 — Model Artifact Metadata
// ============================================================
// The JSON document stored next to every persisted model
// (model_meta.json). It records what the model predicts, how it
// scored, and the exact feature order it was trained on; the
// inference service relies on that order to line up its inputs.
//
// Fields that do not apply to a model kind are omitted from the
// JSON rather than written as null.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Classifier,
    Regressor,
    MultiOutputRegressor,
    Encoder,
    Pca,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Classifier           => "classifier",
            ModelKind::Regressor            => "regressor",
            ModelKind::MultiOutputRegressor => "multi_output_regressor",
            ModelKind::Encoder              => "encoder",
            ModelKind::Pca                  => "pca",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Filled in by the artifact store when the model is saved
    #[serde(default)]
    pub version:    String,
    pub target:     String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_columns: Vec<String>,
    pub model_type: ModelKind,
    /// RFC 3339
    pub timestamp:  String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy:  Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2_score:  Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_r2_score: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub individual_r2_scores: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_score:  Option<f64>,

    pub feature_names: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_importances: BTreeMap<String, f64>,
    /// Class code (as a string) → label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub class_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_params: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation:  Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_flipped: Option<bool>,
    /// Versions of the reducer models whose outputs this model was
    /// trained on (model name → version)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_models: BTreeMap<String, String>,

    #[serde(default)]
    pub n_train: usize,
    #[serde(default)]
    pub n_test:  usize,
}

impl ModelMetadata {
    /// Bare metadata; callers fill in the scores that apply.
    pub fn new(target: impl Into<String>, model_type: ModelKind, feature_names: Vec<String>) -> Self {
        Self {
            version: String::new(),
            target: target.into(),
            target_columns: Vec::new(),
            model_type,
            timestamp: chrono::Local::now().to_rfc3339(),
            accuracy: None,
            r2_score: None,
            combined_r2_score: None,
            individual_r2_scores: BTreeMap::new(),
            cv_score: None,
            feature_names,
            feature_importances: BTreeMap::new(),
            class_mapping: BTreeMap::new(),
            best_params: None,
            correlation: None,
            sign_flipped: None,
            input_models: BTreeMap::new(),
            n_train: 0,
            n_test: 0,
        }
    }
}
