// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw log text to numeric tables:
//
//   raw_data.txt
//       │
//       ▼
//   NoteParser        → one Record per non-empty line
//       │
//       ▼
//   table             → extracted_data.csv / cleaned_data.csv
//       │
//       ▼
//   FeatureTable      → named f64 columns for the ML layer
//       │
//       ▼
//   splitter          → seeded train/test split and K folds
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Rule-table parser for free-text activity notes
pub mod parser;

/// CSV persistence for Records and numeric feature tables
pub mod table;

/// Seeded train/test split and K-fold cross-validation indices
pub mod splitter;
