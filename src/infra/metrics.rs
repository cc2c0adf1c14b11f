// ============================================================
// Layer 6 — Training Run Log
// ============================================================
// Appends one CSV row per persisted model so successive runs can
// be compared without opening every model_meta.json.
//
// Output file: models/training_runs.csv
//
// Example CSV output:
//   timestamp,model,version,metric,cv_score,test_score,n_train,n_test
//   2025-01-14T10:15:00+01:00,feels,20250114_101500,accuracy,0.812500,0.833333,36,12
//   2025-01-14T10:15:02+01:00,hr,20250114_101502,r2,0.402100,0.377700,38,10
//   2025-01-14T10:14:41+01:00,clothing_pca,20250114_101441,correlation,,0.981200,48,0
//
// cv_score is left empty for models that were not grid-searched.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::artifact::ModelMetadata;

pub const RUN_LOG_FILE: &str = "training_runs.csv";
const HEADER: &str = "timestamp,model,version,metric,cv_score,test_score,n_train,n_test";

/// One row of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub timestamp:  String,
    pub model:      String,
    pub version:    String,
    /// accuracy | r2 | correlation
    pub metric:     String,
    pub cv_score:   Option<f64>,
    pub test_score: f64,
    pub n_train:    usize,
    pub n_test:     usize,
}

impl RunMetrics {
    /// Build a row from the metadata the artifact store just saved.
    pub fn from_metadata(model: &str, meta: &ModelMetadata) -> Self {
        let (metric, test_score) = if let Some(a) = meta.accuracy {
            ("accuracy", a)
        } else if let Some(r) = meta.combined_r2_score.or(meta.r2_score) {
            ("r2", r)
        } else {
            ("correlation", meta.correlation.unwrap_or(0.0))
        };
        Self {
            timestamp:  meta.timestamp.clone(),
            model:      model.to_string(),
            version:    meta.version.clone(),
            metric:     metric.to_string(),
            cv_score:   meta.cv_score,
            test_score,
            n_train:    meta.n_train,
            n_test:     meta.n_test,
        }
    }
}

/// Appends run rows to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file doesn't exist yet.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        let csv_path = dir.join(RUN_LOG_FILE);

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created run log '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &RunMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let cv = m.cv_score.map(|s| format!("{s:.6}")).unwrap_or_default();
        writeln!(
            f,
            "{},{},{},{},{},{:.6},{},{}",
            m.timestamp, m.model, m.version, m.metric, cv, m.test_score, m.n_train, m.n_test,
        )?;

        tracing::debug!("Logged {} {} {}={:.4}", m.model, m.version, m.metric, m.test_score);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::ModelKind;
    use tempfile::tempdir;

    #[test]
    fn test_metric_follows_model_kind() {
        let mut meta = ModelMetadata::new("feels", ModelKind::Classifier, vec![]);
        meta.accuracy = Some(0.75);
        meta.cv_score = Some(0.5);
        let row = RunMetrics::from_metadata("feels", &meta);
        assert_eq!(row.metric, "accuracy");
        assert_eq!(row.test_score, 0.75);

        let mut meta = ModelMetadata::new("clothing", ModelKind::MultiOutputRegressor, vec![]);
        meta.combined_r2_score = Some(0.25);
        assert_eq!(RunMetrics::from_metadata("clothing", &meta).metric, "r2");

        let mut meta = ModelMetadata::new("clothing_pca", ModelKind::Pca, vec![]);
        meta.correlation = Some(0.9);
        let row = RunMetrics::from_metadata("clothing_pca", &meta);
        assert_eq!((row.metric.as_str(), row.cv_score), ("correlation", None));
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir = tempdir().unwrap();
        let mut meta = ModelMetadata::new("hr", ModelKind::Regressor, vec![]);
        meta.r2_score = Some(0.5);
        meta.version = "v1".into();
        let row = RunMetrics::from_metadata("hr", &meta);

        MetricsLogger::new(dir.path()).unwrap().log(&row).unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&row).unwrap();

        let text = fs::read_to_string(dir.path().join(RUN_LOG_FILE)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].ends_with(",hr,v1,r2,,0.500000,0,0"));
    }
}
