//! Epoch-level training policies.
//!
//! Callbacks never drive the loop themselves. After every epoch the trainer
//! hands each one the epoch's [`EpochMetrics`] and applies whatever
//! [`CallbackAction`] it returns.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Metrics observed at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number.
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
    /// Learning rate used during this epoch.
    pub learning_rate: f64,
}

impl EpochMetrics {
    /// Validation loss, or training loss when there is no validation set.
    pub fn monitored_loss(&self) -> f32 {
        self.val_loss.unwrap_or(self.loss)
    }
}

/// What a callback asks the training loop to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallbackAction {
    Continue,
    /// The current weights are the best seen so far.
    SaveBest,
    /// End training; optionally roll back to the last `SaveBest` weights.
    Stop { restore_best: bool },
    SetLearningRate(f64),
}

pub trait TrainingCallback {
    fn name(&self) -> &'static str;

    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> CallbackAction;
}

/// Stops when the monitored loss has not improved for `patience` epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    restore_best_weights: bool,
    best: f32,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            min_delta: 0.0,
            restore_best_weights: true,
            best: f32::INFINITY,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn with_min_delta(mut self, min_delta: f32) -> Self {
        self.min_delta = min_delta;
        self
    }

    pub fn with_restore_best_weights(mut self, restore: bool) -> Self {
        self.restore_best_weights = restore;
        self
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

impl TrainingCallback for EarlyStopping {
    fn name(&self) -> &'static str {
        "early_stopping"
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> CallbackAction {
        let current = metrics.monitored_loss();
        if current < self.best - self.min_delta {
            self.best = current;
            self.best_epoch = Some(metrics.epoch);
            self.wait = 0;
            return if self.restore_best_weights {
                CallbackAction::SaveBest
            } else {
                CallbackAction::Continue
            };
        }

        self.wait += 1;
        if self.wait >= self.patience {
            info!(
                epoch = metrics.epoch,
                best_epoch = self.best_epoch,
                best_loss = self.best,
                "early stopping"
            );
            return CallbackAction::Stop {
                restore_best: self.restore_best_weights,
            };
        }
        CallbackAction::Continue
    }
}

/// Multiplies the learning rate by `factor` after `patience` epochs without
/// improvement, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f32,
    best: f32,
    wait: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            min_delta: 1e-4,
            best: f32::INFINITY,
            wait: 0,
        }
    }

    pub fn with_min_delta(mut self, min_delta: f32) -> Self {
        self.min_delta = min_delta;
        self
    }
}

impl TrainingCallback for ReduceLrOnPlateau {
    fn name(&self) -> &'static str {
        "reduce_lr_on_plateau"
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> CallbackAction {
        let current = metrics.monitored_loss();
        if current < self.best - self.min_delta {
            self.best = current;
            self.wait = 0;
            return CallbackAction::Continue;
        }

        self.wait += 1;
        if self.wait < self.patience {
            return CallbackAction::Continue;
        }

        self.wait = 0;
        if metrics.learning_rate > self.min_lr {
            let new_lr = (metrics.learning_rate * self.factor).max(self.min_lr);
            info!(
                epoch = metrics.epoch,
                from = metrics.learning_rate,
                to = new_lr,
                "reducing learning rate"
            );
            return CallbackAction::SetLearningRate(new_lr);
        }
        CallbackAction::Continue
    }
}

/// Early stopping (patience 10, restore best) and LR halving (patience 5,
/// floor 1e-6), both on validation loss.
pub fn default_callbacks() -> Vec<Box<dyn TrainingCallback>> {
    vec![
        Box::new(EarlyStopping::new(10)),
        Box::new(ReduceLrOnPlateau::new(0.5, 5, 1e-6)),
    ]
}
