// ============================================================
// Layer 6 — Normalization Parameter Store
// ============================================================
// Persists fitted StandardScalers in SafeTensors format. Each
// scaler is stored inside the version directory of the model it
// feeds, so a model and its scaler are always saved, pointed at
// and rolled back together:
//
//   models/clothing_encoder/<version>/scaler.safetensors
//   models/clothing_pca/<version>/scaler.safetensors
//
// Each file holds two f64 tensors of shape [n_features]:
//   "mean"  — per-column mean
//   "scale" — per-column population std (1.0 for constant columns)
//
// f64 keeps the stored parameters bit-identical to the ones the
// computed table was built with.

use anyhow::{ensure, Context, Result};
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::{fs, path::Path};

use crate::domain::traits::Persistable;
use crate::ml::scaler::StandardScaler;

pub const SCALER_FILE: &str = "scaler.safetensors";

impl Persistable for StandardScaler {
    fn save(&self, path: &Path) -> Result<()> {
        let n = self.dim();
        let mean:  Vec<u8> = self.mean.iter().flat_map(|v| v.to_le_bytes()).collect();
        let scale: Vec<u8> = self.scale.iter().flat_map(|v| v.to_le_bytes()).collect();

        let tensors = vec![
            ("mean",  TensorView::new(Dtype::F64, vec![n], &mean)?),
            ("scale", TensorView::new(Dtype::F64, vec![n], &scale)?),
        ];
        let bytes = safetensors::serialize(tensors, &None)
            .context("Cannot serialise scaler parameters")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)
            .with_context(|| format!("Cannot write scaler to '{}'", path.display()))?;
        tracing::debug!("Saved scaler ({} features) to '{}'", n, path.display());
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read scaler from '{}'", path.display()))?;
        let st = SafeTensors::deserialize(&bytes)
            .with_context(|| format!("'{}' is not a SafeTensors file", path.display()))?;

        let mean  = read_f64(&st, "mean")?;
        let scale = read_f64(&st, "scale")?;
        ensure!(mean.len() == scale.len(), "scaler mean/scale length mismatch");
        Ok(StandardScaler { mean, scale })
    }
}

fn read_f64(st: &SafeTensors<'_>, name: &str) -> Result<Vec<f64>> {
    let view = st
        .tensor(name)
        .with_context(|| format!("missing tensor '{name}'"))?;
    ensure!(view.dtype() == Dtype::F64, "tensor '{name}' is not f64");
    Ok(view
        .data()
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect())
}
