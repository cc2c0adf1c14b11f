// ============================================================
// Layer 5 — Bottleneck Autoencoder (Burn)
// ============================================================
// Learns a one-number summary of the upper-body clothing columns.
//
// Architecture (default sizes):
//
//   input 7 → 32 → 16 → 8 → 4 → [1] → 4 → 8 → 16 → 32 → 7
//            └──── encoder ─────┘     └──── decoder ─────┘
//
//   - ReLU after every hidden layer
//   - the bottleneck and the reconstruction are linear
//   - loss: mean squared reconstruction error
//
// Only the encoder half is kept after training. It is copied out
// of the Burn tensors into plain f64 weights (DenseEncoder) so
// inference, persistence and ONNX export never touch Burn.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    nn::{
        loss::{MseLoss, Reduction},
        Linear, LinearConfig,
    },
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation::relu, TensorData},
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::traits::Projector;

type TrainBackend = Autodiff<NdArray>;

// ─── Model ────────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct AutoencoderConfig {
    pub input_dim:  usize,
    /// Widths of the hidden layers between input and bottleneck
    pub hidden:     Vec<usize>,
    #[config(default = 1)]
    pub latent_dim: usize,
}

impl AutoencoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Autoencoder<B> {
        // encoder widths: input, hidden..., latent
        let mut widths = vec![self.input_dim];
        widths.extend(&self.hidden);
        widths.push(self.latent_dim);

        let encoder = widths
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).init(device))
            .collect();
        let decoder = widths
            .iter()
            .rev()
            .collect::<Vec<_>>()
            .windows(2)
            .map(|w| LinearConfig::new(*w[0], *w[1]).init(device))
            .collect();

        Autoencoder { encoder, decoder }
    }
}

#[derive(Module, Debug)]
pub struct Autoencoder<B: Backend> {
    pub encoder: Vec<Linear<B>>,
    pub decoder: Vec<Linear<B>>,
}

impl<B: Backend> Autoencoder<B> {
    /// [batch, input_dim] → [batch, latent_dim]
    pub fn encode(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        run_stack(&self.encoder, x)
    }

    /// [batch, input_dim] → reconstruction [batch, input_dim]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        run_stack(&self.decoder, self.encode(x))
    }
}

/// ReLU between layers, none after the last.
fn run_stack<B: Backend>(layers: &[Linear<B>], mut x: Tensor<B, 2>) -> Tensor<B, 2> {
    let last = layers.len().saturating_sub(1);
    for (i, layer) in layers.iter().enumerate() {
        x = layer.forward(x);
        if i < last {
            x = relu(x);
        }
    }
    x
}

// ─── Training ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoencoderTraining {
    pub hidden:     Vec<usize>,
    pub epochs:     usize,
    pub batch_size: usize,
    pub lr:         f64,
    pub seed:       u64,
}

impl Default for AutoencoderTraining {
    fn default() -> Self {
        Self {
            hidden:     vec![32, 16, 8, 4],
            epochs:     300,
            batch_size: 16,
            lr:         5e-4,
            seed:       42,
        }
    }
}

/// Result of a training run: the extracted encoder and the mean
/// reconstruction loss of every epoch.
#[derive(Debug, Clone)]
pub struct TrainedEncoder {
    pub encoder:     DenseEncoder,
    pub epoch_loss:  Vec<f64>,
}

/// Train on standardised rows and return the encoder half.
pub fn train_autoencoder(rows: &[Vec<f64>], cfg: &AutoencoderTraining) -> Result<TrainedEncoder> {
    ensure!(!rows.is_empty(), "no rows to train the autoencoder on");
    ensure!(cfg.batch_size > 0, "batch size must be positive");
    let d = rows[0].len();

    let device = NdArrayDevice::default();
    TrainBackend::seed(cfg.seed);

    let mut model: Autoencoder<TrainBackend> =
        AutoencoderConfig::new(d, cfg.hidden.clone()).init(&device);
    tracing::info!(
        "Autoencoder ready: {} → {:?} → 1, {} rows, {} epochs",
        d, cfg.hidden, rows.len(), cfg.epochs
    );

    let mut optim = AdamConfig::new().init();
    let mut rng   = StdRng::seed_from_u64(cfg.seed);
    let mut order: Vec<usize> = (0..rows.len()).collect();
    let mut epoch_loss = Vec::with_capacity(cfg.epochs);

    for epoch in 1..=cfg.epochs {
        order.shuffle(&mut rng);
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for chunk in order.chunks(cfg.batch_size) {
            let x = to_tensor::<TrainBackend>(chunk.iter().map(|&i| &rows[i]), chunk.len(), d, &device);
            let recon = model.forward(x.clone());
            let loss  = MseLoss::new().forward(recon, x, Reduction::Mean);

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg = loss_sum / batches.max(1) as f64;
        epoch_loss.push(avg);
        if epoch == 1 || epoch % 50 == 0 || epoch == cfg.epochs {
            tracing::info!("Autoencoder epoch {:>3}/{} | loss={:.6}", epoch, cfg.epochs, avg);
        }
    }

    Ok(TrainedEncoder { encoder: DenseEncoder::from_layers(&model.encoder)?, epoch_loss })
}

fn to_tensor<'a, B: Backend>(
    rows:   impl Iterator<Item = &'a Vec<f64>>,
    n:      usize,
    d:      usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.flat_map(|r| r.iter().map(|&v| v as f32)).collect();
    Tensor::<B, 2>::from_data(TensorData::new(flat, [n, d]), device)
}

// ─── Extracted Encoder ────────────────────────────────────────────────────────

/// One fully connected layer: `y = W x + b`, optionally ReLU'd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// [out][in]
    pub weight: Vec<Vec<f64>>,
    pub bias:   Vec<f64>,
    pub relu:   bool,
}

impl DenseLayer {
    pub fn input_dim(&self) -> usize {
        self.weight.first().map(Vec::len).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.weight.len()
    }

    fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.weight
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| {
                let y = w.iter().zip(x).map(|(a, v)| a * v).sum::<f64>() + b;
                if self.relu { y.max(0.0) } else { y }
            })
            .collect()
    }
}

/// Framework-free copy of the trained encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseEncoder {
    pub layers: Vec<DenseLayer>,
}

impl DenseEncoder {
    /// Copy weights out of Burn linear layers.
    pub fn from_layers<B: Backend>(layers: &[Linear<B>]) -> Result<Self> {
        let last = layers.len().saturating_sub(1);
        let mut out = Vec::with_capacity(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            // Burn stores weights as [d_in, d_out]
            let [d_in, d_out] = layer.weight.val().dims();
            let flat = tensor_values(layer.weight.val())?;
            let weight = (0..d_out)
                .map(|o| (0..d_in).map(|k| flat[k * d_out + o]).collect())
                .collect();
            let bias = match &layer.bias {
                Some(b) => tensor_values(b.val())?,
                None    => vec![0.0; d_out],
            };
            out.push(DenseLayer { weight, bias, relu: i < last });
        }
        Ok(Self { layers: out })
    }

    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.layers.iter().fold(x.to_vec(), |acc, l| l.forward(&acc))
    }
}

fn tensor_values<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f64>> {
    let v = t
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))?;
    Ok(v.into_iter().map(f64::from).collect())
}

impl Projector for DenseEncoder {
    fn input_dim(&self) -> usize {
        self.layers.first().map(DenseLayer::input_dim).unwrap_or(0)
    }

    fn project(&self, row: &[f64]) -> f64 {
        self.forward(row).first().copied().unwrap_or(0.0)
    }

    /// Negating the linear bottleneck layer negates the output.
    fn flip_sign(&mut self) {
        if let Some(last) = self.layers.last_mut() {
            last.weight.iter_mut().flatten().for_each(|w| *w = -*w);
            last.bias.iter_mut().for_each(|b| *b = -*b);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn toy_rows() -> Vec<Vec<f64>> {
        (0..24)
            .map(|i| {
                let on = (i % 3) as f64;
                vec![on, 1.0 - on / 2.0, (i % 2) as f64]
            })
            .collect()
    }

    #[test]
    fn test_shapes() {
        let device = NdArrayDevice::default();
        let model: Autoencoder<NdArray> = AutoencoderConfig::new(7, vec![32, 16, 8, 4]).init(&device);
        assert_eq!(model.encoder.len(), 5);
        assert_eq!(model.decoder.len(), 5);

        let x = Tensor::<NdArray, 2>::zeros([3, 7], &device);
        assert_eq!(model.encode(x.clone()).dims(), [3, 1]);
        assert_eq!(model.forward(x).dims(), [3, 7]);
    }

    #[test]
    fn test_dense_copy_matches_burn_encoder() {
        let device = NdArrayDevice::default();
        let model: Autoencoder<NdArray> = AutoencoderConfig::new(3, vec![5, 2]).init(&device);
        let dense = DenseEncoder::from_layers(&model.encoder).unwrap();
        assert_eq!(dense.input_dim(), 3);

        let rows = toy_rows();
        let x = to_tensor::<NdArray>(rows.iter(), rows.len(), 3, &device);
        let burn_out = tensor_values(model.encode(x)).unwrap();
        for (row, expected) in rows.iter().zip(burn_out) {
            assert!((dense.project(row) - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_training_reduces_loss() {
        let cfg = AutoencoderTraining {
            hidden: vec![8, 4],
            epochs: 60,
            batch_size: 8,
            lr: 1e-2,
            seed: 42,
        };
        let trained = train_autoencoder(&toy_rows(), &cfg).unwrap();
        assert_eq!(trained.epoch_loss.len(), 60);
        let first = trained.epoch_loss[0];
        let last  = *trained.epoch_loss.last().unwrap();
        assert!(last < first, "loss did not drop: {first} → {last}");
        assert_eq!(trained.encoder.layers.len(), 3);
        assert!(!trained.encoder.layers[2].relu);
    }

    #[test]
    fn test_flip_sign_negates_output() {
        let mut enc = DenseEncoder {
            layers: vec![
                DenseLayer { weight: vec![vec![1.0, 0.0], vec![0.0, 1.0]], bias: vec![0.0, 0.0], relu: true },
                DenseLayer { weight: vec![vec![2.0, -1.0]], bias: vec![0.5], relu: false },
            ],
        };
        let x = [1.0, 3.0];
        let before = enc.project(&x);
        assert_eq!(before, 2.0 - 3.0 + 0.5);
        enc.flip_sign();
        assert_eq!(enc.project(&x), -before);
    }

    #[test]
    fn test_rejects_empty_rows() {
        assert!(train_autoencoder(&[], &AutoencoderTraining::default()).is_err());
    }
}
