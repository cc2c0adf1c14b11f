// ============================================================
// Layer 5 — Exhaustive Grid Search
// ============================================================
// Tries every combination of a hyperparameter grid with K-fold
// cross-validation and keeps the one with the best mean score:
//
//   classification → accuracy
//   regression     → R², averaged uniformly over outputs
//
// Candidates are visited in a fixed order (n_estimators varies
// fastest) and a later candidate must score strictly higher to
// replace the current best, so ties go to the earlier one.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::splitter::{k_fold, Fold};
use crate::ml::{
    forest::{ForestParams, RandomForestClassifier, RandomForestRegressor},
    stats::{accuracy, r2_multi},
};

/// Upper bound on the number of CV folds
pub const MAX_FOLDS: usize = 5;

// ─── ParamGrid ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators:      Vec<usize>,
    pub max_depth:         Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf:  Vec<usize>,
}

impl ParamGrid {
    /// Every combination, as concrete forest parameters
    pub fn candidates(&self, seed: u64) -> Vec<ForestParams> {
        let or_default = |v: &Vec<usize>, d: usize| if v.is_empty() { vec![d] } else { v.clone() };
        let depths = if self.max_depth.is_empty() { vec![None] } else { self.max_depth.clone() };
        let leaves = or_default(&self.min_samples_leaf, 1);
        let splits = or_default(&self.min_samples_split, 2);
        let trees  = or_default(&self.n_estimators, 100);

        let mut out = Vec::with_capacity(depths.len() * leaves.len() * splits.len() * trees.len());
        for &max_depth in &depths {
            for &min_samples_leaf in &leaves {
                for &min_samples_split in &splits {
                    for &n_estimators in &trees {
                        out.push(ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            seed,
                        });
                    }
                }
            }
        }
        out
    }

    /// Number of combinations; an empty axis counts as its default
    pub fn size(&self) -> usize {
        self.n_estimators.len().max(1)
            * self.max_depth.len().max(1)
            * self.min_samples_split.len().max(1)
            * self.min_samples_leaf.len().max(1)
    }
}

// ─── Data ─────────────────────────────────────────────────────────────────────
/// Training rows and targets for one search.
pub enum SearchData<'a> {
    Classification { x: &'a [Vec<f64>], y: &'a [i32] },
    Regression     { x: &'a [Vec<f64>], y: &'a [Vec<f64>] },
}

impl<'a> SearchData<'a> {
    fn len(&self) -> usize {
        match self {
            SearchData::Classification { x, .. } | SearchData::Regression { x, .. } => x.len(),
        }
    }

    /// Fit on the fold's training rows and score on its validation rows
    fn score_fold(&self, params: &ForestParams, fold: &Fold) -> Result<f64> {
        match self {
            SearchData::Classification { x, y } => {
                let (tx, ty) = (pick(x, &fold.train), pick(y, &fold.train));
                let (vx, vy) = (pick(x, &fold.validation), pick(y, &fold.validation));
                let model = RandomForestClassifier::fit(&tx, &ty, params)?;
                let pred  = model.predict(&vx)?;
                Ok(accuracy(&vy, &pred))
            }
            SearchData::Regression { x, y } => {
                let (tx, ty) = (pick(x, &fold.train), pick(y, &fold.train));
                let (vx, vy) = (pick(x, &fold.validation), pick(y, &fold.validation));
                let model = RandomForestRegressor::fit(&tx, &ty, params)?;
                let pred  = model.predict(&vx)?;
                Ok(r2_multi(&vy, &pred).1)
            }
        }
    }
}

fn pick<T: Clone>(v: &[T], idx: &[usize]) -> Vec<T> {
    idx.iter().map(|&i| v[i].clone()).collect()
}

// ─── Search ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params:     ForestParams,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub best_params: ForestParams,
    pub best_score:  f64,
    pub folds:       usize,
    pub scores:      Vec<CandidateScore>,
}

pub fn grid_search(data: &SearchData<'_>, grid: &ParamGrid, seed: u64) -> Result<GridSearchResult> {
    ensure!(data.len() >= 2, "grid search needs at least two rows, got {}", data.len());
    let k = MAX_FOLDS.min(data.len());
    let folds = k_fold(data.len(), k, seed);
    let candidates = grid.candidates(seed);
    tracing::info!("Grid search: {} candidates × {} folds", candidates.len(), k);

    let mut scores: Vec<CandidateScore> = Vec::with_capacity(candidates.len());
    let mut best: Option<usize> = None;

    for params in candidates {
        let mut total = 0.0;
        for fold in &folds {
            total += data.score_fold(&params, fold)?;
        }
        let mean_score = total / folds.len() as f64;
        tracing::debug!("  {:?} → {:.4}", params, mean_score);

        if best.map_or(true, |b| mean_score > scores[b].mean_score) {
            best = Some(scores.len());
        }
        scores.push(CandidateScore { params, mean_score });
    }

    let best = best.ok_or_else(|| anyhow::anyhow!("empty parameter grid"))?;
    let winner = scores[best].clone();
    tracing::info!(
        "Best CV score {:.4} with n_estimators={} max_depth={:?} min_samples_split={} min_samples_leaf={}",
        winner.mean_score,
        winner.params.n_estimators,
        winner.params.max_depth,
        winner.params.min_samples_split,
        winner.params.min_samples_leaf,
    );

    Ok(GridSearchResult {
        best_params: winner.params,
        best_score:  winner.mean_score,
        folds:       k,
        scores,
    })
}
