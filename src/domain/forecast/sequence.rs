//! Two-layer LSTM sequence model.
//!
//! Network: LSTM(hidden_1, full sequence) → LSTM(hidden_2, last state) →
//! Dense(dense) → Dense(1), built on burn's ndarray backend and trained on
//! min-max scaled closes with MSE loss and Adam. Forecasts are
//! autoregressive: each prediction is appended to the input window for the
//! next step.

use std::sync::Mutex;

use burn::module::{AutodiffModule, Module};
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Linear, LinearConfig, Lstm, LstmConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::domain::error::ModelError;

type InferBackend = NdArray<f32>;
type TrainBackend = Autodiff<InferBackend>;

/// The ndarray backend keeps one global RNG; seeding and weight
/// initialisation must not interleave across threads.
static INIT_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceConfig {
    pub look_back: usize,
    pub min_training_pairs: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub hidden_1: usize,
    pub hidden_2: usize,
    pub dense: usize,
    pub learning_rate: f64,
    /// Fixed seed for weight init and shuffling. `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        SequenceConfig {
            look_back: 60,
            min_training_pairs: 10,
            epochs: 25,
            batch_size: 32,
            patience: 5,
            hidden_1: 50,
            hidden_2: 50,
            dense: 25,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

impl SequenceConfig {
    pub fn min_points(&self) -> usize {
        self.look_back + self.min_training_pairs
    }
}

pub fn forecast(
    closes: &[f64],
    days: usize,
    config: &SequenceConfig,
) -> Result<Vec<f64>, ModelError> {
    if config.look_back == 0 {
        return Err(ModelError::fit("look_back must be at least 1"));
    }
    let need = config.min_points();
    if closes.len() < need {
        return Err(ModelError::InsufficientData {
            have: closes.len(),
            need,
        });
    }

    let scaler = MinMaxScaler::fit(closes).ok_or_else(|| ModelError::fit("closes contain non-finite values"))?;
    let scaled = scaler.transform(closes);

    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::debug!(seed, points = closes.len(), "training sequence model");

    let device = NdArrayDevice::default();
    let trained = train(&scaled, config, seed, &device)?;
    let model = trained.model.valid();

    let mut window = scaled[scaled.len() - config.look_back..].to_vec();
    let mut out = Vec::with_capacity(days);
    for _ in 0..days {
        let next = predict_next(&model, &window, &device)?;
        if !next.is_finite() {
            return Err(ModelError::fit("sequence model produced a non-finite value"));
        }
        out.push(scaler.inverse(next));
        window.rotate_left(1);
        if let Some(last) = window.last_mut() {
            *last = next;
        }
    }
    Ok(out)
}

#[derive(Module, Debug)]
struct PriceLstm<B: Backend> {
    lstm_1: Lstm<B>,
    lstm_2: Lstm<B>,
    dense_1: Linear<B>,
    dense_2: Linear<B>,
}

impl<B: Backend> PriceLstm<B> {
    fn new(config: &SequenceConfig, device: &B::Device) -> Self {
        let hidden_1 = config.hidden_1.max(1);
        let hidden_2 = config.hidden_2.max(1);
        let dense = config.dense.max(1);
        PriceLstm {
            lstm_1: LstmConfig::new(1, hidden_1, true).init(device),
            lstm_2: LstmConfig::new(hidden_1, hidden_2, true).init(device),
            dense_1: LinearConfig::new(hidden_2, dense).init(device),
            dense_2: LinearConfig::new(dense, 1).init(device),
        }
    }

    /// `[batch, look_back, 1]` windows to `[batch, 1]` next values.
    fn forward(&self, windows: Tensor<B, 3>) -> Tensor<B, 2> {
        let (sequence, _) = self.lstm_1.forward(windows, None);
        let (_, last) = self.lstm_2.forward(sequence, None);
        let x = self.dense_1.forward(last.hidden);
        self.dense_2.forward(x)
    }
}

struct Training {
    model: PriceLstm<TrainBackend>,
    /// Mean training loss of each completed epoch.
    losses: Vec<f64>,
}

fn windows_tensor<B: Backend>(values: Vec<f32>, count: usize, look_back: usize, device: &B::Device) -> Tensor<B, 3> {
    Tensor::from_data(TensorData::new(values, [count, look_back, 1]), device)
}

/// Seeds the backend and materialises every weight under the init lock,
/// so the initial network depends only on `seed`.
fn init_model(config: &SequenceConfig, seed: u64, device: &NdArrayDevice) -> PriceLstm<TrainBackend> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    TrainBackend::seed(seed);
    let model = PriceLstm::<TrainBackend>::new(config, device);
    // Parameters are created lazily; one pass forces them while seeded.
    let warmup = windows_tensor::<TrainBackend>(vec![0.0; config.look_back], 1, config.look_back, device);
    let _ = model.forward(warmup);
    model
}

fn train(scaled: &[f64], config: &SequenceConfig, seed: u64, device: &NdArrayDevice) -> Result<Training, ModelError> {
    let look_back = config.look_back;
    let pairs = scaled.len() - look_back;
    let batch_size = config.batch_size.max(1);

    let mut model = init_model(config, seed, device);
    let mut optim = AdamConfig::new()
        .with_epsilon(1e-7)
        .init::<TrainBackend, PriceLstm<TrainBackend>>();
    let loss_fn = MseLoss::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..pairs).collect();

    let mut losses = Vec::with_capacity(config.epochs);
    let mut best = f64::INFINITY;
    let mut stale = 0;
    for epoch in 0..config.epochs {
        order.shuffle(&mut rng);
        let mut total = 0.0;
        for batch in order.chunks(batch_size) {
            let mut inputs = Vec::with_capacity(batch.len() * look_back);
            let mut targets = Vec::with_capacity(batch.len());
            for &start in batch {
                inputs.extend(scaled[start..start + look_back].iter().map(|&v| v as f32));
                targets.push(scaled[start + look_back] as f32);
            }
            let inputs = windows_tensor::<TrainBackend>(inputs, batch.len(), look_back, device);
            let targets = Tensor::<TrainBackend, 2>::from_data(TensorData::new(targets, [batch.len(), 1]), device);

            let loss = loss_fn.forward(model.forward(inputs), targets, Reduction::Mean);
            total += loss.clone().into_scalar().elem::<f64>() * batch.len() as f64;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);
        }

        let loss = total / pairs as f64;
        if !loss.is_finite() {
            return Err(ModelError::fit(format!("training loss diverged at epoch {}", epoch + 1)));
        }
        tracing::debug!(epoch = epoch + 1, loss, "sequence model epoch");
        losses.push(loss);

        if loss < best {
            best = loss;
            stale = 0;
        } else {
            stale += 1;
            if stale >= config.patience {
                tracing::debug!(epoch = epoch + 1, "early stop");
                break;
            }
        }
    }
    Ok(Training { model, losses })
}

fn predict_next(model: &PriceLstm<InferBackend>, window: &[f64], device: &NdArrayDevice) -> Result<f64, ModelError> {
    let values = window.iter().map(|&v| v as f32).collect();
    let input = windows_tensor::<InferBackend>(values, 1, window.len(), device);
    let output = model
        .forward(input)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ModelError::fit(format!("reading sequence model output: {e:?}")))?;
    output
        .first()
        .map(|&v| f64::from(v))
        .ok_or_else(|| ModelError::fit("sequence model returned no output"))
}

/// Maps a series onto [0, 1]. A constant series maps to all zeros.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    /// `None` for an empty or non-finite series.
    pub fn fit(data: &[f64]) -> Option<Self> {
        if data.is_empty() || data.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if max > min { max - min } else { 1.0 };
        Some(MinMaxScaler { min, range })
    }

    pub fn transform(&self, data: &[f64]) -> Vec<f64> {
        data.iter().map(|v| (v - self.min) / self.range).collect()
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.range + self.min
    }
}
