// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Trains one random forest per prediction target on the computed
// feature table:
//
//   Step 1: Load computed_data.csv           (Layer 4 - data)
//   Step 2: Split features / target columns
//   Step 3: Train / test split               (Layer 4 - data::splitter)
//   Step 4: Grid search with K-fold CV       (Layer 5 - ml::grid_search)
//   Step 5: Refit the best parameters on the training split
//   Step 6: Score on the held-out split
//   Step 7: Save model + metadata            (Layer 6 - infra)
//
// Targets:
//   feels    — classifier, comfort label 0..3
//   hr       — regressor, heart rate
//   clothing — multi-output regressor, [upr_clo, lwr_clo]
//
// Every column of the table that is not a target is a feature;
// the resulting order is stored as `feature_names`.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use super::{data_path, reduce_use_case::reducer_versions, COMPUTED_FILE};
use crate::data::{splitter::train_test_split, table::FeatureTable};
use crate::domain::{
    artifact::{ModelKind, ModelMetadata},
    record::{ComfortLabel, Field},
    schema::{LOWER_INSULATION, UPPER_INSULATION},
};
use crate::infra::{
    artifact_store::ArtifactStore,
    metrics::{MetricsLogger, RunMetrics},
};
use crate::ml::{
    forest::{RandomForestClassifier, RandomForestRegressor},
    grid_search::{grid_search, ParamGrid, SearchData},
    stats::{accuracy, r2_multi},
};

/// Below this many training rows the small grid replaces the job's own.
pub const SMALL_DATA_ROWS: usize = 20;

// ─── Targets & Jobs ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainTarget {
    Feels,
    Hr,
    Clothing,
}

impl TrainTarget {
    pub const ALL: [TrainTarget; 3] = [TrainTarget::Feels, TrainTarget::Hr, TrainTarget::Clothing];

    /// Name of the persisted model
    pub fn model_name(self) -> &'static str {
        match self {
            TrainTarget::Feels    => "feels",
            TrainTarget::Hr       => "hr",
            TrainTarget::Clothing => "clothing",
        }
    }

    pub fn job(self) -> TrainJob {
        match self {
            TrainTarget::Feels => TrainJob {
                name:      self.model_name().to_string(),
                targets:   vec![Field::Feels.name().to_string()],
                task:      Task::Classification,
                grid:      ParamGrid {
                    n_estimators:      vec![50, 100, 200],
                    max_depth:         vec![None, Some(10), Some(20)],
                    min_samples_split: vec![],
                    min_samples_leaf:  vec![],
                },
                test_size: 0.25,
            },
            TrainTarget::Hr => TrainJob {
                name:      self.model_name().to_string(),
                targets:   vec![Field::Hr.name().to_string()],
                task:      Task::Regression,
                grid:      ParamGrid {
                    n_estimators:      vec![100, 200, 300],
                    max_depth:         vec![None, Some(15), Some(30)],
                    min_samples_split: vec![],
                    min_samples_leaf:  vec![1, 2, 4],
                },
                test_size: 0.2,
            },
            TrainTarget::Clothing => TrainJob {
                name:      self.model_name().to_string(),
                targets:   vec![UPPER_INSULATION.to_string(), LOWER_INSULATION.to_string()],
                task:      Task::Regression,
                grid:      ParamGrid {
                    n_estimators:      vec![100, 150, 200],
                    max_depth:         vec![Some(10), Some(20), None],
                    min_samples_split: vec![2, 5, 10],
                    min_samples_leaf:  vec![],
                },
                test_size: 0.25,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Classification,
    Regression,
}

/// Everything needed to train one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainJob {
    pub name:      String,
    pub targets:   Vec<String>,
    pub task:      Task,
    pub grid:      ParamGrid,
    pub test_size: f64,
}

pub fn small_grid() -> ParamGrid {
    ParamGrid {
        n_estimators:      vec![10, 50],
        max_depth:         vec![None, Some(5)],
        min_samples_split: vec![],
        min_samples_leaf:  vec![],
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:   String,
    pub models_dir: String,
    pub targets:    Vec<TrainTarget>,
    /// Seeds the split, the CV folds and the forests
    pub seed:       u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:   "data".to_string(),
            models_dir: "models".to_string(),
            targets:    TrainTarget::ALL.to_vec(),
            seed:       42,
        }
    }
}

// ─── Fitted Output ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub enum FittedModel {
    Classifier(RandomForestClassifier),
    Regressor(RandomForestRegressor),
}

#[derive(Debug, Clone)]
pub struct FittedJob {
    pub model: FittedModel,
    pub meta:  ModelMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub model:      String,
    pub version:    String,
    pub metric:     String,
    pub test_score: f64,
    pub cv_score:   Option<f64>,
}

// ─── TrainUseCase ────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<TrainReport>> {
        let cfg = &self.config;

        // ── Step 1: Load the computed table ──────────────────────────────────
        let path  = data_path(&cfg.data_dir, COMPUTED_FILE);
        let table = FeatureTable::read_csv(&path)?;
        tracing::info!("Loaded {} rows from '{}'", table.len(), path.display());

        let store  = ArtifactStore::new(Path::new(&cfg.models_dir))?;
        let logger = MetricsLogger::new(store.root())?;
        // upr_clo / lwr_clo in the table come from these reducer versions
        let inputs = reducer_versions(store.root());
        if inputs.is_empty() {
            tracing::warn!("No clothing reducer under '{}'; input versions not recorded", store.root().display());
        }

        let mut reports = Vec::with_capacity(cfg.targets.len());
        for target in &cfg.targets {
            let job = target.job();
            tracing::info!("Training '{}' on {:?}", job.name, job.targets);

            // ── Steps 2-6 ────────────────────────────────────────────────────
            let FittedJob { model, mut meta } = fit_job(&table, &job, cfg.seed)?;
            meta.input_models = inputs.clone();

            // ── Step 7: Persist ──────────────────────────────────────────────
            let version = match &model {
                FittedModel::Classifier(m) => store.save(&job.name, m, &mut meta)?,
                FittedModel::Regressor(m)  => store.save(&job.name, m, &mut meta)?,
            };
            let row = RunMetrics::from_metadata(&job.name, &meta);
            logger.log(&row)?;
            tracing::info!("'{}' {} = {:.4} (cv {:.4})", job.name, row.metric, row.test_score, row.cv_score.unwrap_or(f64::NAN));

            reports.push(TrainReport {
                model:      job.name,
                version,
                metric:     row.metric,
                test_score: row.test_score,
                cv_score:   row.cv_score,
            });
        }
        tracing::info!("Run log: '{}'", logger.csv_path().display());
        Ok(reports)
    }
}

/// Split, search, refit and score one job. Nothing is written.
pub fn fit_job(table: &FeatureTable, job: &TrainJob, seed: u64) -> Result<FittedJob> {
    // ── Step 2: features vs targets ──────────────────────────────────────────
    let y_table  = table.select(&job.targets)?;
    let features = table.without(&job.targets);
    ensure!(!features.columns.is_empty(), "'{}' has no feature columns", job.name);
    ensure!(table.len() >= 4, "'{}' needs at least 4 rows, got {}", job.name, table.len());

    // ── Step 3: split ────────────────────────────────────────────────────────
    let (train_idx, test_idx) = train_test_split(table.len(), job.test_size, seed);
    let x_train = features.take_rows(&train_idx).rows;
    let x_test  = features.take_rows(&test_idx).rows;
    let y_train = y_table.take_rows(&train_idx).rows;
    let y_test  = y_table.take_rows(&test_idx).rows;

    let grid = if x_train.len() < SMALL_DATA_ROWS {
        tracing::info!("Only {} training rows; using the small grid", x_train.len());
        small_grid()
    } else {
        job.grid.clone()
    };

    let kind = match (job.task, job.targets.len()) {
        (Task::Classification, _) => ModelKind::Classifier,
        (Task::Regression, 1)     => ModelKind::Regressor,
        (Task::Regression, _)     => ModelKind::MultiOutputRegressor,
    };
    let mut meta = ModelMetadata::new(job.targets.join(","), kind, features.columns.clone());
    if job.targets.len() > 1 {
        meta.target_columns = job.targets.clone();
    }
    meta.n_train = x_train.len();
    meta.n_test  = x_test.len();

    // ── Steps 4-6 ────────────────────────────────────────────────────────────
    let (model, importances) = match job.task {
        Task::Classification => {
            let y_train = labels(&y_train);
            let y_test  = labels(&y_test);
            let search  = grid_search(&SearchData::Classification { x: &x_train, y: &y_train }, &grid, seed)?;
            let model   = RandomForestClassifier::fit(&x_train, &y_train, &search.best_params)?;
            let pred    = model.predict(&x_test)?;

            meta.accuracy    = Some(accuracy(&y_test, &pred));
            meta.cv_score    = Some(search.best_score);
            meta.best_params = Some(serde_json::to_value(&search.best_params)?);
            meta.class_mapping = model
                .classes
                .iter()
                .map(|&c| {
                    let label = ComfortLabel::from_code(c).map(|l| l.as_str().to_string());
                    (c.to_string(), label.unwrap_or_else(|| c.to_string()))
                })
                .collect();
            let importances = model.feature_importances().to_vec();
            (FittedModel::Classifier(model), importances)
        }
        Task::Regression => {
            let search = grid_search(&SearchData::Regression { x: &x_train, y: &y_train }, &grid, seed)?;
            let model  = RandomForestRegressor::fit(&x_train, &y_train, &search.best_params)?;
            let pred   = model.predict(&x_test)?;
            let (per_target, combined) = r2_multi(&y_test, &pred);

            if job.targets.len() == 1 {
                meta.r2_score = Some(combined);
            } else {
                meta.combined_r2_score = Some(combined);
                meta.individual_r2_scores = job.targets.iter().cloned().zip(per_target).collect();
            }
            meta.cv_score    = Some(search.best_score);
            meta.best_params = Some(serde_json::to_value(&search.best_params)?);
            let importances = model.feature_importances().to_vec();
            (FittedModel::Regressor(model), importances)
        }
    };

    meta.feature_importances = features
        .columns
        .iter()
        .cloned()
        .zip(importances)
        .collect::<BTreeMap<_, _>>();

    Ok(FittedJob { model, meta })
}

fn labels(rows: &[Vec<f64>]) -> Vec<i32> {
    rows.iter().map(|r| r[0].round() as i32).collect()
}
