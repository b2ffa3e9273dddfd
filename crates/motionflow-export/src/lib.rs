//! # MotionFlow Export
//!
//! Turns a trainer model directory into a browser layers model: a Keras-style
//! `model.json` topology plus `group1-shard*.bin` weight files, with the label
//! file copied alongside.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use motionflow_export::{export_model, ExportOptions};
//!
//! let report = export_model(
//!     Path::new("models/saved_model"),
//!     Path::new("../frontend/public/models/dynamic_gesture"),
//!     &ExportOptions::default(),
//! )
//! .unwrap();
//! println!("{}", report.model_json.display());
//! ```

pub mod exporter;
pub mod topology;
pub mod weights;

pub use exporter::{export_model, ExportOptions, ExportReport, MODEL_JSON};
pub use weights::DEFAULT_SHARD_SIZE_BYTES;
