// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Saves and restores versioned models with their metadata.
//
// What gets saved per version:
//   1. model.json       — the serialised estimator
//   2. model_meta.json  — scores, feature order, parameters
//   3. model.onnx       — portable graph (written by `export`)
//
// File layout:
//   models/
//     feels/
//       20250114_101500/
//         model.json
//         model_meta.json
//         model.onnx
//         scaler.safetensors (reducer models only)
//       latest_version.txt   ← names the active version
//     hr/ ...
//
// A version directory is complete before the pointer moves to
// it, and the pointer itself is replaced by writing a temp file
// and renaming it over the old one. A reader that follows the
// pointer therefore always finds a matching model/metadata pair.
//
// Version tags are local timestamps (%Y%m%d_%H%M%S). When a tag
// would not sort after the current latest one (two saves in the
// same second, or a clock step backwards) a `_<n>` suffix is
// added, so tags strictly increase.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::artifact::ModelMetadata;

pub const MODEL_FILE:    &str = "model.json";
pub const META_FILE:     &str = "model_meta.json";
pub const ONNX_FILE:     &str = "model.onnx";
pub const LATEST_FILE:   &str = "latest_version.txt";

/// Manages versioned model directories under one root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create the store, creating the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Cannot create models directory '{}'", root.display()))?;
        Ok(Self { root })
    }

    /// Open an existing store without touching the filesystem.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        self.model_dir(name).join(version)
    }

    /// Persist `model` and `meta` as a new version and point
    /// `latest_version.txt` at it. Returns the version tag.
    pub fn save<M: Serialize>(&self, name: &str, model: &M, meta: &mut ModelMetadata) -> Result<String> {
        self.save_with(name, model, meta, |_| Ok(()))
    }

    /// Like `save`, but `extra` may write more files into the new
    /// version directory before the pointer moves. If it fails the
    /// pointer stays on the previous version.
    pub fn save_with<M, F>(&self, name: &str, model: &M, meta: &mut ModelMetadata, extra: F) -> Result<String>
    where
        M: Serialize,
        F: FnOnce(&Path) -> Result<()>,
    {
        let version = self.next_version(name)?;
        let dir = self.version_dir(name, &version);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        meta.version = version.clone();
        write_json(&dir.join(MODEL_FILE), model)?;
        write_json(&dir.join(META_FILE), meta)?;
        extra(&dir).with_context(|| format!("Cannot complete '{}' version {version}", name))?;

        self.set_latest(name, &version)?;
        tracing::info!("Saved model '{}' version {} to '{}'", name, version, dir.display());
        Ok(version)
    }

    /// Load the model and metadata the latest pointer names.
    pub fn load<M: DeserializeOwned>(&self, name: &str) -> Result<(M, ModelMetadata)> {
        let version = self.latest_version(name)?;
        self.load_version(name, &version)
    }

    pub fn load_version<M: DeserializeOwned>(&self, name: &str, version: &str) -> Result<(M, ModelMetadata)> {
        let dir = self.version_dir(name, version);
        let model = read_json(&dir.join(MODEL_FILE))?;
        let meta  = read_json(&dir.join(META_FILE))?;
        tracing::debug!("Loaded model '{}' version {}", name, version);
        Ok((model, meta))
    }

    /// Metadata of the latest version, without deserialising the model.
    pub fn load_metadata(&self, name: &str) -> Result<ModelMetadata> {
        let version = self.latest_version(name)?;
        read_json(&self.version_dir(name, &version).join(META_FILE))
    }

    /// Store an extra file (e.g. the ONNX graph) inside a version directory.
    pub fn write_attachment(&self, name: &str, version: &str, file: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.version_dir(name, version);
        if !dir.is_dir() {
            bail!("Version '{version}' of model '{name}' does not exist");
        }
        let path = dir.join(file);
        fs::write(&path, bytes).with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(path)
    }

    /// Read latest_version.txt. Errors if the model was never saved.
    pub fn latest_version(&self, name: &str) -> Result<String> {
        let path = self.model_dir(name).join(LATEST_FILE);
        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you trained '{name}' first?", path.display())
        })?;
        let v = s.trim().to_string();
        if v.is_empty() {
            bail!("'{}' is empty", path.display());
        }
        Ok(v)
    }

    fn set_latest(&self, name: &str, version: &str) -> Result<()> {
        let dir  = self.model_dir(name);
        let tmp  = dir.join(format!("{LATEST_FILE}.tmp"));
        let dest = dir.join(LATEST_FILE);
        fs::write(&tmp, version).with_context(|| format!("Cannot write '{}'", tmp.display()))?;
        fs::rename(&tmp, &dest).with_context(|| format!("Cannot replace '{}'", dest.display()))?;
        Ok(())
    }

    /// A fresh tag that sorts after every existing version of `name`.
    pub fn next_version(&self, name: &str) -> Result<String> {
        let stamp  = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let latest = self.latest_version(name).ok();
        let mut tag = next_tag(&stamp, latest.as_deref());
        // a stale pointer must never let us overwrite a directory
        while self.version_dir(name, &tag).exists() {
            tag = next_tag(&tag, Some(&tag));
        }
        Ok(tag)
    }
}

/// Split `base[_n]` into its base and suffix (0 when absent).
fn split_tag(tag: &str) -> (&str, u32) {
    // base tags contain exactly one underscore: YYYYmmdd_HHMMSS
    match tag.match_indices('_').nth(1) {
        Some((i, _)) => (&tag[..i], tag[i + 1..].parse().unwrap_or(0)),
        None         => (tag, 0),
    }
}

pub fn compare_tags(a: &str, b: &str) -> Ordering {
    let (ab, an) = split_tag(a);
    let (bb, bn) = split_tag(b);
    ab.cmp(bb).then(an.cmp(&bn))
}

fn next_tag(stamp: &str, latest: Option<&str>) -> String {
    match latest {
        Some(l) if compare_tags(stamp, l) != Ordering::Greater => {
            let (base, n) = split_tag(l);
            format!("{base}_{}", n + 1)
        }
        _ => stamp.to_string(),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::ModelKind;
    use tempfile::tempdir;

    fn meta() -> ModelMetadata {
        ModelMetadata::new("hr", ModelKind::Regressor, vec!["temp".into(), "sun".into()])
    }

    #[test]
    fn test_save_then_load_latest() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let mut m = meta();
        let v = store.save("hr", &vec![1.0, 2.0], &mut m).unwrap();
        assert_eq!(m.version, v);
        assert_eq!(store.latest_version("hr").unwrap(), v);

        let (model, loaded): (Vec<f64>, ModelMetadata) = store.load("hr").unwrap();
        assert_eq!(model, vec![1.0, 2.0]);
        assert_eq!(loaded, m);
        assert!(store.version_dir("hr", &v).join(META_FILE).is_file());
        assert!(!store.model_dir("hr").join("latest_version.txt.tmp").exists());
    }

    #[test]
    fn test_versions_strictly_increase_and_old_ones_survive() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let mut versions = Vec::new();
        for i in 0..3 {
            versions.push(store.save("feels", &i, &mut meta()).unwrap());
        }
        for w in versions.windows(2) {
            assert_eq!(compare_tags(&w[1], &w[0]), Ordering::Greater, "{versions:?}");
        }
        let (first, _): (i32, ModelMetadata) = store.load_version("feels", &versions[0]).unwrap();
        assert_eq!(first, 0);
        let (latest, _): (i32, ModelMetadata) = store.load("feels").unwrap();
        assert_eq!(latest, 2);
    }

    #[test]
    fn test_tag_ordering_and_suffixes() {
        assert_eq!(next_tag("20250101_120000", None), "20250101_120000");
        assert_eq!(next_tag("20250101_120001", Some("20250101_120000")), "20250101_120001");
        assert_eq!(next_tag("20250101_120000", Some("20250101_120000")), "20250101_120000_1");
        assert_eq!(next_tag("20250101_120000", Some("20250101_120000_9")), "20250101_120000_10");
        // clock stepped back
        assert_eq!(next_tag("20240101_000000", Some("20250101_120000")), "20250101_120000_1");
        assert_eq!(compare_tags("20250101_120000_10", "20250101_120000_9"), Ordering::Greater);
    }

    #[test]
    fn test_missing_model_reports_error() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        assert!(store.latest_version("feels").is_err());
        assert!(store.load::<i32>("feels").is_err());
        assert!(store.write_attachment("feels", "nope", ONNX_FILE, b"x").is_err());
    }

    #[test]
    fn test_failed_extra_file_keeps_previous_pointer() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let v1 = store.save_with("pca", &1, &mut meta(), |d| Ok(fs::write(d.join("extra.bin"), [1])?)).unwrap();
        assert!(store.version_dir("pca", &v1).join("extra.bin").is_file());

        let failed = store.save_with("pca", &2, &mut meta(), |_| anyhow::bail!("disk full"));
        assert!(failed.is_err());
        assert_eq!(store.latest_version("pca").unwrap(), v1);
        let (model, _): (i32, ModelMetadata) = store.load("pca").unwrap();
        assert_eq!(model, 1);
    }

    #[test]
    fn test_attachment_written_into_version_dir() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let v = store.save("hr", &1, &mut meta()).unwrap();
        let path = store.write_attachment("hr", &v, ONNX_FILE, &[8, 9]).unwrap();
        assert_eq!(fs::read(path).unwrap(), vec![8, 9]);
    }
}
