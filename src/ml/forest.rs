// ============================================================
// Layer 5 — Random Forests
// ============================================================
// Bagged ensembles of CART trees:
//
//   RandomForestClassifier  Gini splits, sqrt(n_features) tried per
//                           node, probabilities averaged over trees
//   RandomForestRegressor   MSE splits, every feature tried per node,
//                           any number of outputs, means averaged
//
// Every tree sees a bootstrap sample (n draws with replacement).
// A master StdRng seeded from `seed` hands each tree its own seed,
// so the same data and parameters always grow the same forest.
//
// Feature importances are the impurity decreases summed per
// feature, normalised within each tree, averaged over trees and
// normalised again so they sum to 1.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ml::tree::{Criterion, DecisionTree, MaxFeatures, TreeParams};

// ─── Hyperparameters ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators:      usize,
    /// `None` grows trees until leaves are pure
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub seed:              u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators:      100,
            max_depth:         None,
            min_samples_split: 2,
            min_samples_leaf:  1,
            seed:              42,
        }
    }
}

impl ForestParams {
    fn tree_params(&self, criterion: Criterion, max_features: MaxFeatures) -> TreeParams {
        TreeParams {
            criterion,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features,
        }
    }
}

// ─── Shared Ensemble ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub trees:               Vec<DecisionTree>,
    pub n_features:          usize,
    pub n_outputs:           usize,
    pub feature_importances: Vec<f64>,
}

impl Ensemble {
    fn fit(x: &[Vec<f64>], targets: &[Vec<f64>], params: &ForestParams, tree: TreeParams) -> Result<Self> {
        ensure!(!x.is_empty(), "cannot fit a forest on zero rows");
        ensure!(x.len() == targets.len(), "feature and target row counts differ");
        ensure!(params.n_estimators > 0, "n_estimators must be positive");

        let n          = x.len();
        let n_features = x[0].len();
        let n_outputs  = targets[0].len();
        let mut master = StdRng::seed_from_u64(params.seed);
        let mut trees  = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(master.gen());
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let (t, imp) = DecisionTree::fit(x, targets, bootstrap, &tree, &mut rng);

            let total: f64 = imp.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&imp) {
                    *acc += v / total;
                }
            }
            trees.push(t);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(Self { trees, n_features, n_outputs, feature_importances: importances })
    }

    /// Leaf values averaged over all trees
    fn average(&self, row: &[f64]) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_outputs];
        for t in &self.trees {
            for (a, v) in acc.iter_mut().zip(t.leaf_value(row)) {
                *a += v;
            }
        }
        let k = self.trees.len().max(1) as f64;
        acc.into_iter().map(|v| v / k).collect()
    }

    fn check_width(&self, rows: &[Vec<f64>]) -> Result<()> {
        if let Some(r) = rows.iter().find(|r| r.len() != self.n_features) {
            anyhow::bail!("expected {} features, got {}", self.n_features, r.len());
        }
        Ok(())
    }
}

// ─── Classifier ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    /// Distinct labels seen in training, ascending; output column order
    pub classes:  Vec<i32>,
    pub params:   ForestParams,
    pub ensemble: Ensemble,
}

impl RandomForestClassifier {
    pub fn fit(x: &[Vec<f64>], y: &[i32], params: &ForestParams) -> Result<Self> {
        let classes: Vec<i32> = y.iter().copied().collect::<std::collections::BTreeSet<_>>().into_iter().collect();
        let index: BTreeMap<i32, usize> = classes.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let targets: Vec<Vec<f64>> = y
            .iter()
            .map(|c| {
                let mut one_hot = vec![0.0; classes.len()];
                one_hot[index[c]] = 1.0;
                one_hot
            })
            .collect();

        let tree = params.tree_params(Criterion::Gini, MaxFeatures::Sqrt);
        let ensemble = Ensemble::fit(x, &targets, params, tree)?;
        Ok(Self { classes, params: params.clone(), ensemble })
    }

    /// [n_rows][n_classes] class probabilities, columns ordered as `classes`
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.ensemble.check_width(x)?;
        Ok(x.iter().map(|r| self.ensemble.average(r)).collect())
    }

    /// Most probable label per row; the lower label wins ties.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<i32>> {
        Ok(self
            .predict_proba(x)?
            .iter()
            .map(|p| self.classes[argmax(p)])
            .collect())
    }

    pub fn n_features(&self) -> usize {
        self.ensemble.n_features
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.ensemble.feature_importances
    }
}

fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, x) in v.iter().enumerate() {
        if *x > v[best] {
            best = i;
        }
    }
    best
}

// ─── Regressor ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub params:   ForestParams,
    pub ensemble: Ensemble,
}

impl RandomForestRegressor {
    /// `y` is row-major: one Vec per row holding every output.
    pub fn fit(x: &[Vec<f64>], y: &[Vec<f64>], params: &ForestParams) -> Result<Self> {
        ensure!(y.iter().all(|r| !r.is_empty()), "regression targets need at least one output");
        let tree = params.tree_params(Criterion::Mse, MaxFeatures::All);
        let ensemble = Ensemble::fit(x, y, params, tree)?;
        Ok(Self { params: params.clone(), ensemble })
    }

    /// Convenience for a single output column
    pub fn fit_single(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self> {
        let y: Vec<Vec<f64>> = y.iter().map(|v| vec![*v]).collect();
        Self::fit(x, &y, params)
    }

    /// [n_rows][n_outputs]
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.ensemble.check_width(x)?;
        Ok(x.iter().map(|r| self.ensemble.average(r)).collect())
    }

    pub fn n_outputs(&self) -> usize {
        self.ensemble.n_outputs
    }

    pub fn n_features(&self) -> usize {
        self.ensemble.n_features
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.ensemble.feature_importances
    }
}
