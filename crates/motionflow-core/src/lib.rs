//! # MotionFlow Core
//!
//! Shared building blocks of the gesture training pipeline: the recorder
//! dataset format, the label vocabulary, and the model directory layout that
//! the trainer writes and the exporter reads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use motionflow_core::dataset::{load_dataset, resolve_pattern};
//!
//! let files = resolve_pattern("data/raw/*.json").unwrap();
//! let dataset = load_dataset(&files).unwrap();
//! println!("{:?} {:?}", dataset.shape(), dataset.vocabulary().labels());
//! ```
pub mod artifact;
pub mod dataset;
pub mod error;
pub mod labels;
pub mod logging;

// Re-export primary API
pub use artifact::{LayerSpec, ModelConfig, ModelManifest};
pub use dataset::{
    load_dataset, resolve_pattern, Sample, SequenceDataset, DATASET_FORMAT, FEATURE_WIDTH,
};
pub use error::{MotionflowError, Result};
pub use labels::{LabelVocabulary, LABELS_FILE};
