// ============================================================
// Layer 2 — ParseUseCase
// ============================================================
// Turns the raw notes file into records and folds them into the
// cumulative cleaned table:
//
//   Step 1: Read raw notes             (NoteSource)
//   Step 2: Parse into Records         (Layer 4 - data::parser)
//   Step 3: Write extracted_data.csv   (Layer 4 - data::table)
//   Step 4: Log preview + summary
//   Step 5: Append to cleaned_data.csv and reset the staging file
//
// Step 5 reads the staging file back rather than reusing the
// in-memory records, so rows staged by an earlier run that was
// stopped before ingesting are picked up too.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use super::{data_path, CLEANED_FILE, EXTRACTED_FILE, RAW_NOTES_FILE};
use crate::data::{
    parser::NoteParser,
    table::{append_records, read_records, write_records, FeatureTable},
};
use crate::domain::traits::NoteSource;

// ─── Parse Configuration ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    pub data_dir:     String,
    /// Rows shown in the logged preview
    pub preview_rows: usize,
    /// Append the extracted rows to the cleaned table
    pub ingest:       bool,
    /// Empty the raw notes file once its rows are ingested
    pub clear_notes:  bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            data_dir:     "data".to_string(),
            preview_rows: 5,
            ingest:       true,
            clear_notes:  false,
        }
    }
}

// ─── FileNoteSource ──────────────────────────────────────────────────────────
/// Notes kept in a plain text file.
pub struct FileNoteSource {
    path: PathBuf,
}

impl FileNoteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl NoteSource for FileNoteSource {
    fn read_notes(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read notes from '{}'", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        fs::write(&self.path, "")
            .with_context(|| format!("Cannot clear '{}'", self.path.display()))
    }
}

/// What a parse run did
#[derive(Debug, Clone, PartialEq)]
pub struct ParseReport {
    pub parsed:   usize,
    pub ingested: usize,
}

// ─── ParseUseCase ────────────────────────────────────────────────────────────
pub struct ParseUseCase {
    config: ParseConfig,
}

impl ParseUseCase {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    /// Parse the notes file in the data directory.
    pub fn execute(&self) -> Result<ParseReport> {
        let source = FileNoteSource::new(data_path(&self.config.data_dir, RAW_NOTES_FILE));
        self.run(&source)
    }

    /// Parse notes from any source.
    pub fn run(&self, source: &impl NoteSource) -> Result<ParseReport> {
        let cfg = &self.config;
        let extracted = data_path(&cfg.data_dir, EXTRACTED_FILE);

        // ── Steps 1-3: read, parse, stage ────────────────────────────────────
        let notes = source.read_notes()?;
        tracing::info!("Read {} words of notes", notes.split_whitespace().count());

        let parser  = NoteParser::new()?;
        let records = parser.parse_notes(&notes);
        write_records(&extracted, &records)?;
        tracing::info!("Parsed {} records into '{}'", records.len(), extracted.display());

        // ── Step 4: report ───────────────────────────────────────────────────
        if records.is_empty() {
            tracing::warn!("No records found in the notes");
        } else {
            let table = FeatureTable::from_records(&records);
            tracing::info!("Preview:\n{}", table.preview(cfg.preview_rows));
            for column in table.summary() {
                tracing::info!("{column}");
            }
        }

        // ── Step 5: ingest ───────────────────────────────────────────────────
        let ingested = if cfg.ingest { self.ingest()? } else { 0 };
        if ingested > 0 && cfg.clear_notes {
            source.clear()?;
            tracing::info!("Cleared consumed notes");
        }

        Ok(ParseReport { parsed: records.len(), ingested })
    }

    /// Move every staged row into the cleaned table. Returns the
    /// number of rows appended.
    pub fn ingest(&self) -> Result<usize> {
        let extracted = data_path(&self.config.data_dir, EXTRACTED_FILE);
        let cleaned   = data_path(&self.config.data_dir, CLEANED_FILE);

        let staged = if extracted.exists() { read_records(&extracted)? } else { Vec::new() };
        if staged.is_empty() {
            tracing::info!("No staged rows to append");
            return Ok(0);
        }

        append_records(&cleaned, &staged)?;
        write_records(&extracted, &[])?;
        tracing::info!("Appended {} rows to '{}'", staged.len(), cleaned.display());
        Ok(staged.len())
    }
}
