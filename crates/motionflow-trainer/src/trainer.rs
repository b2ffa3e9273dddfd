//! Training loop for the gesture classifier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{loss, AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use oorandom::Rand64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use motionflow_core::artifact::{HISTORY_FILE, LEARNING_RATE};
use motionflow_core::{
    load_dataset, resolve_pattern, LabelVocabulary, ModelConfig, ModelManifest, MotionflowError,
    SequenceDataset, LABELS_FILE,
};

use crate::callbacks::{default_callbacks, CallbackAction, EpochMetrics, TrainingCallback};
use crate::data::{shuffle, split_indices, TensorDataset};
use crate::model::{weights_path, GestureClassifier};

/// Knobs of a single `fit` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    /// Shuffle the pool before splitting and the training order every epoch.
    pub shuffle: bool,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            validation_split: 0.2,
            shuffle: true,
            seed: 42,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.epochs > 0, "epochs must be at least 1");
        anyhow::ensure!(self.batch_size > 0, "batch size must be at least 1");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.validation_split),
            "validation split must be in [0, 1), got {}",
            self.validation_split
        );
        Ok(())
    }
}

/// Why training ended before the requested epoch count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStop {
    pub epoch: usize,
    pub callback: String,
    pub restored_best: bool,
}

/// Per-epoch record of a training run, written as `history.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    pub stopped_early: Option<EarlyStop>,
}

impl TrainingHistory {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

pub struct Trainer {
    varmap: VarMap,
    model: GestureClassifier,
    device: Device,
}

impl Trainer {
    /// Builds a freshly initialized classifier for `config`.
    pub fn new(config: ModelConfig, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = GestureClassifier::new(config, vb)?;
        info!(
            time_steps = config.time_steps,
            features = config.feature_width,
            classes = config.class_count,
            parameters = parameter_count(&varmap),
            "model built"
        );
        Ok(Self {
            varmap,
            model,
            device,
        })
    }

    pub fn model(&self) -> &GestureClassifier {
        &self.model
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Fits the model, polling `callbacks` after every epoch.
    pub fn fit(
        &mut self,
        dataset: &SequenceDataset,
        options: &FitOptions,
        callbacks: &mut [Box<dyn TrainingCallback>],
    ) -> Result<TrainingHistory> {
        options.validate()?;

        let tensors = TensorDataset::from_dataset(dataset, &self.device)?;
        let split = split_indices(
            dataset.sample_count(),
            options.validation_split,
            options.shuffle,
            options.seed,
        );
        anyhow::ensure!(!split.train.is_empty(), "no samples left for training");
        info!(
            train = split.train.len(),
            validation = split.validation.len(),
            "split dataset"
        );

        let mut optimizer = AdamW::new(
            self.varmap.all_vars(),
            ParamsAdamW {
                lr: LEARNING_RATE,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;
        let mut rng = Rand64::new(u128::from(options.seed));
        let mut history = TrainingHistory::default();
        let mut best_weights: Option<HashMap<String, Tensor>> = None;

        for epoch in 1..=options.epochs {
            let learning_rate = optimizer.learning_rate();

            let mut order = split.train.clone();
            if options.shuffle {
                shuffle(&mut order, &mut rng);
            }
            let (loss, accuracy) =
                self.run_epoch(&tensors, &order, options.batch_size, Some(&mut optimizer))?;

            let (val_loss, val_accuracy) = if split.validation.is_empty() {
                (None, None)
            } else {
                let (l, a) =
                    self.run_epoch(&tensors, &split.validation, options.batch_size, None)?;
                (Some(l), Some(a))
            };

            let metrics = EpochMetrics {
                epoch,
                loss,
                accuracy,
                val_loss,
                val_accuracy,
                learning_rate,
            };
            info!(
                "epoch {}/{} - loss: {:.4} - accuracy: {:.4}{}",
                epoch,
                options.epochs,
                loss,
                accuracy,
                match (val_loss, val_accuracy) {
                    (Some(l), Some(a)) => format!(" - val_loss: {l:.4} - val_accuracy: {a:.4}"),
                    _ => String::new(),
                }
            );
            history.epochs.push(metrics.clone());

            let mut stop = None;
            for callback in callbacks.iter_mut() {
                match callback.on_epoch_end(&metrics) {
                    CallbackAction::Continue => {}
                    CallbackAction::SaveBest => {
                        best_weights = Some(snapshot(&self.varmap)?);
                    }
                    CallbackAction::SetLearningRate(lr) => optimizer.set_learning_rate(lr),
                    CallbackAction::Stop { restore_best } => {
                        stop = Some((callback.name(), restore_best));
                    }
                }
            }

            if let Some((name, restore_best)) = stop {
                let restored_best = match (&best_weights, restore_best) {
                    (Some(weights), true) => {
                        restore(&self.varmap, weights)?;
                        info!("restored best weights");
                        true
                    }
                    _ => false,
                };
                history.stopped_early = Some(EarlyStop {
                    epoch,
                    callback: name.to_string(),
                    restored_best,
                });
                break;
            }
        }

        Ok(history)
    }

    /// One pass over `indices`. Trains when an optimizer is given, otherwise
    /// evaluates with dropout disabled. Returns sample-weighted mean loss and
    /// accuracy.
    fn run_epoch(
        &self,
        tensors: &TensorDataset,
        indices: &[usize],
        batch_size: usize,
        mut optimizer: Option<&mut AdamW>,
    ) -> Result<(f32, f32)> {
        let train = optimizer.is_some();
        let mut loss_sum = 0f32;
        let mut correct = 0f32;

        for (step, chunk) in indices.chunks(batch_size).enumerate() {
            let (xs, ys) = tensors.batch(chunk)?;
            let logits = self.model.forward_t(&xs, train)?;
            let batch_loss = loss::cross_entropy(&logits, &ys)?;

            if let Some(optimizer) = optimizer.as_deref_mut() {
                optimizer.backward_step(&batch_loss)?;
            }

            let batch_loss = batch_loss.to_scalar::<f32>()?;
            debug!(step, loss = batch_loss, train, "batch");
            loss_sum += batch_loss * chunk.len() as f32;
            correct += count_correct(&logits, &ys)?;
        }

        let n = indices.len().max(1) as f32;
        Ok((loss_sum / n, correct / n))
    }

    /// Writes weights, manifest, labels and history into `dir`.
    pub fn save_model(
        &self,
        dir: &Path,
        vocabulary: &LabelVocabulary,
        history: &TrainingHistory,
    ) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        self.varmap.save(weights_path(dir))?;
        ModelManifest::for_config(self.model.config()).save(dir)?;
        vocabulary.save(&dir.join(LABELS_FILE))?;
        history.save(&dir.join(HISTORY_FILE))?;

        info!(path = %dir.display(), "model saved");
        Ok(())
    }
}

fn count_correct(logits: &Tensor, targets: &Tensor) -> candle_core::Result<f32> {
    logits
        .argmax(D::Minus1)?
        .eq(targets)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()
}

fn parameter_count(varmap: &VarMap) -> usize {
    varmap.all_vars().iter().map(|v| v.elem_count()).sum()
}

fn snapshot(varmap: &VarMap) -> Result<HashMap<String, Tensor>> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| anyhow::anyhow!("variable map lock poisoned"))?;
    vars.iter()
        .map(|(name, var)| Ok((name.clone(), var.as_tensor().copy()?)))
        .collect()
}

fn restore(varmap: &VarMap, weights: &HashMap<String, Tensor>) -> Result<()> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| anyhow::anyhow!("variable map lock poisoned"))?;
    for (name, var) in vars.iter() {
        if let Some(tensor) = weights.get(name) {
            var.set(tensor)?;
        }
    }
    Ok(())
}

/// Everything the `train` binary needs to run end to end.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    /// Glob pattern of dataset files.
    pub data: String,
    pub output: PathBuf,
    pub fit: FitOptions,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            data: "data/raw/*.json".to_string(),
            output: PathBuf::from("models/saved_model"),
            fit: FitOptions::default(),
        }
    }
}

/// Outcome of [`run_training`].
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub output: PathBuf,
    pub labels: Vec<String>,
    pub sample_count: usize,
    pub history: TrainingHistory,
}

impl TrainingReport {
    pub fn final_metrics(&self) -> Option<&EpochMetrics> {
        self.history.last()
    }
}

/// Resolves the dataset, trains with the default callbacks and persists the
/// model directory. Every input problem is reported before a model is built.
pub fn run_training(options: &TrainingOptions) -> Result<TrainingReport> {
    options.fit.validate()?;

    let files = resolve_pattern(&options.data)?;
    if files.is_empty() {
        return Err(MotionflowError::NoMatchingFiles {
            pattern: options.data.clone(),
        }
        .into());
    }
    info!(files = files.len(), pattern = %options.data, "found dataset files");

    let dataset = load_dataset(&files)?;
    for (label, count) in dataset.class_counts() {
        info!(label, count, "class");
    }

    let labels = dataset.vocabulary().labels().to_vec();
    if labels.len() < 2 {
        return Err(MotionflowError::InsufficientClasses { labels }.into());
    }

    let config = ModelConfig::new(dataset.time_steps(), dataset.feature_width(), labels.len());
    let mut trainer = Trainer::new(config, Device::Cpu)?;
    let mut callbacks = default_callbacks();
    let history = trainer.fit(&dataset, &options.fit, &mut callbacks)?;

    trainer.save_model(&options.output, dataset.vocabulary(), &history)?;

    Ok(TrainingReport {
        output: options.output.clone(),
        labels,
        sample_count: dataset.sample_count(),
        history,
    })
}
