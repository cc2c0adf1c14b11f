// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// All numerical code lives here. Burn is only imported by
// autoencoder.rs; nalgebra only by pca.rs.
//
//   stats.rs       — Pearson r, R², accuracy
//   scaler.rs      — z-score standardisation
//   autoencoder.rs — bottleneck autoencoder (Burn, NdArray backend)
//                    and its framework-free extracted encoder
//   pca.rs         — single-component PCA
//   reducer.rs     — clothing indicators → upr_clo / lwr_clo,
//                    with sign correction against expected clo
//   tree.rs        — CART decision tree (Gini / MSE)
//   forest.rs      — bagged random forests, classifier and
//                    multi-output regressor
//   grid_search.rs — exhaustive hyperparameter search with K-fold CV
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Regression and classification metrics
pub mod stats;

/// Per-column standardisation
pub mod scaler;

/// Bottleneck autoencoder for the upper clothing columns
pub mod autoencoder;

/// One-component principal component analysis
pub mod pca;

/// Fits and applies the clothing feature reduction
pub mod reducer;

/// Decision tree learner used by the forests
pub mod tree;

/// Random forest classifier and regressor
pub mod forest;

/// Grid search with cross-validation
pub mod grid_search;
