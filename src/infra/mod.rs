// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence and export concerns shared by several use cases:
//
//   artifact_store.rs — Versioned model directories
//                       model.json + model_meta.json per version,
//                       latest_version.txt replaced atomically so
//                       readers always see a consistent pair.
//
//   normalization.rs  — Scaler parameters in SafeTensors format
//                       so inference standardises clothing
//                       indicators exactly as training did.
//
//   onnx.rs           — ONNX export
//                       Tree ensembles, the dense encoder and PCA
//                       written as protobuf ModelProto bytes.
//
//   metrics.rs        — Training run log
//                       One CSV row per persisted model.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Versioned model + metadata storage
pub mod artifact_store;

/// StandardScaler persistence (SafeTensors)
pub mod normalization;

/// ONNX serialisation of trained models
pub mod onnx;

/// Per-run CSV log of model scores
pub mod metrics;
