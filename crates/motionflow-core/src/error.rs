use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading datasets or handling model directories.
#[derive(Debug, Error)]
pub enum MotionflowError {
    /// A file or directory could not be read or written.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The path involved in the failed operation.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or serialized.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        /// The offending document.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The dataset glob pattern is malformed.
    #[error("invalid dataset pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The dataset glob pattern matched no files.
    #[error("no dataset files match {pattern:?}; record some gestures first")]
    NoMatchingFiles { pattern: String },

    /// No accepted file contributed a sample.
    #[error("no valid samples found in any dataset file")]
    EmptyDataset,

    /// Training needs at least two distinct labels.
    #[error("need at least 2 gesture classes to train, found {}: {labels:?}", .labels.len())]
    InsufficientClasses { labels: Vec<String> },

    /// A frame does not carry exactly one landmark vector.
    #[error(
        "{}sample {sample} frame {frame}: expected {expected} values, found {found}",
        location(.path)
    )]
    InvalidFrameWidth {
        /// Dataset file the sample came from, when it was loaded from disk.
        path: Option<PathBuf>,
        sample: usize,
        frame: usize,
        expected: usize,
        found: usize,
    },

    /// Samples disagree on sequence length and cannot be stacked.
    #[error(
        "{}sample {sample} has {found} frames but earlier samples have {expected}; \
         all sequences must share one length",
        location(.path)
    )]
    InconsistentSequenceLength {
        path: Option<PathBuf>,
        sample: usize,
        expected: usize,
        found: usize,
    },

    /// A sample has no frames.
    #[error("{}sample {sample} has an empty sequence", location(.path))]
    EmptySequence { path: Option<PathBuf>, sample: usize },

    /// A label was looked up that the vocabulary does not contain.
    #[error("label {0:?} is not part of the vocabulary")]
    UnknownLabel(String),

    /// The model directory to export does not exist.
    #[error("model not found at {}; run training first: train --output {}", .path.display(), .path.display())]
    ModelNotFound { path: PathBuf },

    /// The model manifest is inconsistent with itself or its weights.
    #[error("invalid model manifest: {0}")]
    InvalidManifest(String),

    /// The weights file could not be decoded.
    #[error("safetensors error: {0}")]
    Safetensors(String),

    /// A layer or activation is not available in the browser runtime.
    #[error("unsupported op for web export: {0}")]
    UnsupportedOp(String),

    /// A stored tensor does not have the shape its layer requires.
    #[error("weight {name} has shape {found:?}, expected {expected:?}")]
    WeightShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

impl MotionflowError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a JSON error with the document it happened in.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// `"<path>: "` prefix for sample errors, empty for in-memory samples.
fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!("{}: ", p.display()))
        .unwrap_or_default()
}

/// Result type alias for MotionFlow operations.
pub type Result<T> = std::result::Result<T, MotionflowError>;
