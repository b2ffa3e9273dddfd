//! # MotionFlow Trainer
//!
//! Fits the fixed two-layer LSTM gesture classifier on a recorder dataset and
//! writes a model directory (`model.safetensors`, `config.json`,
//! `labels.json`, `history.json`) for the exporter to pick up.

pub mod callbacks;
pub mod data;
pub mod model;
pub mod trainer;

pub use callbacks::{
    default_callbacks, CallbackAction, EarlyStopping, EpochMetrics, ReduceLrOnPlateau,
    TrainingCallback,
};
pub use model::GestureClassifier;
pub use trainer::{
    run_training, FitOptions, Trainer, TrainingHistory, TrainingOptions, TrainingReport,
};
