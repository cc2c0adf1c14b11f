// ============================================================
// Layer 4 — Feature Tables
// ============================================================
// CSV persistence for parsed records and for the numeric tables
// derived from them.
//
//   write_records / read_records / append_records
//       Typed access to the 20-column record table. The header
//       comes from the Record's serde field order, so the column
//       order on disk is always the canonical one.
//
//   FeatureTable
//       An untyped numeric table (named columns, f64 rows) used
//       by the reducer and the trainer, which need to select and
//       drop columns by name.
//
// Reference: csv crate documentation (Serde support)

use anyhow::{bail, Context, Result};
use std::{
    collections::BTreeMap,
    fmt::Write as _,
    fs::{self, OpenOptions},
    path::Path,
};

use crate::domain::record::Record;

// ─── Record Tables ────────────────────────────────────────────────────────────

/// Overwrite `path` with a header plus one row per record.
pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    if records.is_empty() {
        // serde only emits the header alongside the first row
        wtr.write_record(crate::domain::record::Field::names())?;
    }
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    tracing::debug!("Wrote {} records to '{}'", records.len(), path.display());
    Ok(())
}

/// Read every record from `path`.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<Record>().enumerate() {
        let rec = row.with_context(|| format!("Bad row {} in '{}'", i + 1, path.display()))?;
        out.push(rec);
    }
    Ok(out)
}

/// Append records, writing the header only for a new or empty file.
pub fn append_records(path: &Path, records: &[Record]) -> Result<()> {
    ensure_parent(path)?;
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open '{}' for append", path.display()))?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    if needs_header && records.is_empty() {
        wtr.write_record(crate::domain::record::Field::names())?;
    }
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
    }
    Ok(())
}

// ─── FeatureTable ─────────────────────────────────────────────────────────────
/// Named numeric columns over row-major f64 data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            bail!("row {i} has {} values, expected {}", r.len(), columns.len());
        }
        Ok(Self { columns, rows })
    }

    pub fn from_records(records: &[Record]) -> Self {
        Self {
            columns: crate::domain::record::Field::names()
                .into_iter()
                .map(String::from)
                .collect(),
            rows: records
                .iter()
                .map(|r| r.values().into_iter().map(f64::from).collect())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let row = rec
                .iter()
                .map(|v| v.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("Non-numeric value in row {} of '{}'", i + 1, path.display()))?;
            rows.push(row);
        }
        Self::new(columns, rows)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("Column '{name}' not found"))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.index_of(name)?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// A new table holding only `names`, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<FeatureTable> {
        let idx: Vec<usize> = names
            .iter()
            .map(|n| self.index_of(n.as_ref()))
            .collect::<Result<_>>()?;
        Ok(FeatureTable {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows:    self.rows.iter().map(|r| idx.iter().map(|&i| r[i]).collect()).collect(),
        })
    }

    /// A new table with `names` dropped. Unknown names are ignored.
    pub fn without<S: AsRef<str>>(&self, names: &[S]) -> FeatureTable {
        let keep: Vec<&String> = self
            .columns
            .iter()
            .filter(|c| !names.iter().any(|n| n.as_ref() == c.as_str()))
            .collect();
        // every kept name exists, so select cannot fail
        self.select(&keep).unwrap_or_default()
    }

    /// Rows picked by index, in the given order
    pub fn take_rows(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self.columns.clone(),
            rows:    indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    // ─── Reporting ────────────────────────────────────────────────────────────

    /// The first `n` rows, formatted as an aligned text grid.
    pub fn preview(&self, n: usize) -> String {
        let width = self.columns.iter().map(|c| c.len()).max().unwrap_or(0).max(6);
        let mut out = String::new();
        for c in &self.columns {
            let _ = write!(out, "{c:>width$} ");
        }
        out.push('\n');
        for row in self.rows.iter().take(n) {
            for v in row {
                let _ = write!(out, "{v:>width$} ");
            }
            out.push('\n');
        }
        out
    }

    /// Per-column statistics plus value counts for integer-valued
    /// columns with few distinct values.
    pub fn summary(&self) -> Vec<ColumnSummary> {
        (0..self.columns.len())
            .map(|j| {
                let values: Vec<f64> = self.rows.iter().map(|r| r[j]).collect();
                ColumnSummary::of(&self.columns[j], &values)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name:  String,
    pub count: usize,
    pub mean:  f64,
    pub std:   f64,
    pub min:   f64,
    pub max:   f64,
    /// Present for categorical columns (at most this many distinct integers)
    pub value_counts: Option<BTreeMap<i64, usize>>,
}

const MAX_CATEGORIES: usize = 10;

impl ColumnSummary {
    fn of(name: &str, values: &[f64]) -> Self {
        let count = values.len();
        let n     = count.max(1) as f64;
        let mean  = values.iter().sum::<f64>() / n;
        // sample std, as pandas' describe reports it
        let std = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut counts = BTreeMap::new();
        let integral = values.iter().all(|v| v.fract() == 0.0);
        if integral {
            for v in values {
                *counts.entry(*v as i64).or_insert(0usize) += 1;
            }
        }
        let value_counts = (integral && counts.len() <= MAX_CATEGORIES).then_some(counts);

        Self { name: name.to_string(), count, mean, std, min, max, value_counts }
    }
}

impl std::fmt::Display for ColumnSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<10} count={:<5} mean={:>8.3} std={:>8.3} min={:>7.2} max={:>7.2}",
            self.name, self.count, self.mean, self.std, self.min, self.max
        )?;
        if let Some(vc) = &self.value_counts {
            let parts: Vec<String> = vc.iter().map(|(k, v)| format!("{k}:{v}")).collect();
            write!(f, " values=[{}]", parts.join(" "))?;
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Vec<Record> {
        let mut a = Record::default();
        a.t_cot = 1;
        a.temp  = -17;
        a.hr    = 110;
        let mut b = Record::default();
        b.t_poly = 1;
        b.feels  = 2;
        vec![a, b]
    }

    #[test]
    fn test_records_roundtrip_and_header_order() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("nested/extracted.csv");
        write_records(&path, &sample()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, crate::domain::record::Field::names().join(","));

        assert_eq!(read_records(&path).unwrap(), sample());
    }

    #[test]
    fn test_write_overwrites() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("t.csv");
        write_records(&path, &sample()).unwrap();
        write_records(&path, &sample()[..1]).unwrap();
        assert_eq!(read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_write_keeps_header() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("t.csv");
        write_records(&path, &[]).unwrap();
        assert!(read_records(&path).unwrap().is_empty());
        assert!(fs::read_to_string(&path).unwrap().starts_with("t_dress,"));
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        append_records(&path, &sample()).unwrap();
        append_records(&path, &sample()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("t_dress").count(), 1);
        assert_eq!(read_records(&path).unwrap().len(), 4);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(read_records(&dir.path().join("absent.csv")).is_err());
        assert!(FeatureTable::read_csv(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn test_feature_table_select_without() {
        let t = FeatureTable::from_records(&sample());
        let s = t.select(&["hr", "temp"]).unwrap();
        assert_eq!(s.columns, vec!["hr", "temp"]);
        assert_eq!(s.rows[0], vec![110.0, -17.0]);

        let w = t.without(&["feels", "nope"]);
        assert_eq!(w.columns.len(), 19);
        assert!(!w.columns.contains(&"feels".to_string()));

        assert!(t.select(&["missing"]).is_err());
        assert_eq!(t.column("feels").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_feature_table_csv_roundtrip() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("computed.csv");
        let t = FeatureTable::new(
            vec!["upr_clo".into(), "hr".into()],
            vec![vec![0.25, 110.0], vec![-1.5, 90.0]],
        )
        .unwrap();
        t.write_csv(&path).unwrap();
        assert_eq!(FeatureTable::read_csv(&path).unwrap(), t);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(FeatureTable::new(vec!["a".into()], vec![vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_summary_and_preview() {
        let t = FeatureTable::from_records(&sample());
        let summary = t.summary();
        let feels = summary.iter().find(|s| s.name == "feels").unwrap();
        assert_eq!(feels.count, 2);
        assert!((feels.mean - 1.5).abs() < 1e-12);
        let vc = feels.value_counts.as_ref().unwrap();
        assert_eq!(vc.get(&1), Some(&1));
        assert_eq!(vc.get(&2), Some(&1));

        let preview = t.preview(1);
        assert_eq!(preview.lines().count(), 2);
        assert!(preview.contains("t_dress"));
    }
}
