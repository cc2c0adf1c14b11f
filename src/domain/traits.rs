// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams the application layer programs against:
//
//   NoteSource  — where raw log text comes from
//                 (a text file today; stdin or an upload later)
//   Projector   — maps one normalised clothing row to a single
//                 insulation scalar (encoder or PCA)
//   Persistable — state that round-trips through a directory
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

// ─── NoteSource ───────────────────────────────────────────────────────────────
/// Any component that can produce raw, line-oriented log text.
pub trait NoteSource {
    /// Read all pending notes. An empty string means nothing to parse.
    fn read_notes(&self) -> Result<String>;

    /// Discard notes that have been consumed.
    fn clear(&self) -> Result<()>;
}

// ─── Projector ────────────────────────────────────────────────────────────────
/// Reduces a standardised feature row to one latent value.
pub trait Projector {
    /// Number of inputs expected per row
    fn input_dim(&self) -> usize;

    /// Project a single row. `row.len()` must equal `input_dim()`.
    fn project(&self, row: &[f64]) -> f64;

    /// Project every row of a batch
    fn project_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.project(r)).collect()
    }

    /// Negate the output so it correlates positively with a reference
    fn flip_sign(&mut self);
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved to and restored from a file.
pub trait Persistable: Sized {
    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>;
}
