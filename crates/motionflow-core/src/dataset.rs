//! # Dataset Loading
//!
//! Reads recorder JSON files, keeps the ones tagged with [`DATASET_FORMAT`],
//! and stacks their samples into a row-major `(N, T, 63)` array with integer
//! class targets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MotionflowError, Result};
use crate::labels::LabelVocabulary;

/// Format tag every accepted dataset file must carry.
pub const DATASET_FORMAT: &str = "motionflow.dynamic_gesture.v1";

/// Hand landmarks tracked per frame.
pub const NUM_LANDMARKS: usize = 21;

/// Spatial coordinates per landmark (x, y, z).
pub const COORDS_PER_LANDMARK: usize = 3;

/// Scalars in one frame vector.
pub const FEATURE_WIDTH: usize = NUM_LANDMARKS * COORDS_PER_LANDMARK;

/// One recorded gesture: a label and its per-frame landmark vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub label: String,
    pub sequence: Vec<Vec<f32>>,
}

impl Sample {
    pub fn new(label: impl Into<String>, sequence: Vec<Vec<f32>>) -> Self {
        Self {
            label: label.into(),
            sequence,
        }
    }
}

#[derive(Deserialize)]
struct DatasetBody {
    #[serde(default)]
    samples: Vec<Sample>,
}

/// Outcome of parsing one dataset document.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// The format tag matched; these are the file's samples.
    Accepted(Vec<Sample>),
    /// The format tag was missing or different.
    Rejected { format: Option<String> },
}

/// Parses a dataset document, checking the format tag before the samples.
pub fn parse_document(source: &str) -> serde_json::Result<Document> {
    let value: serde_json::Value = serde_json::from_str(source)?;

    let format = value.get("format").and_then(serde_json::Value::as_str);
    if format != Some(DATASET_FORMAT) {
        return Ok(Document::Rejected {
            format: format.map(str::to_string),
        });
    }

    let body: DatasetBody = serde_json::from_value(value)?;
    Ok(Document::Accepted(body.samples))
}

/// Expands a glob pattern into the sorted list of matching regular files.
pub fn resolve_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|e| MotionflowError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable glob entry"),
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reads every file and pools the samples of those with a matching tag.
/// Files with another tag are skipped with a warning.
///
/// Each accepted sample is shape-checked against the first one, so a bad
/// sample is reported with its file and its index inside that file.
pub fn load_samples<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Sample>> {
    let mut pool: Vec<Sample> = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| MotionflowError::io(path, e))?;
        match parse_document(&source).map_err(|e| MotionflowError::json(path, e))? {
            Document::Accepted(samples) => {
                let time_steps = pool
                    .first()
                    .or(samples.first())
                    .map_or(0, |s| s.sequence.len());
                for (idx, sample) in samples.iter().enumerate() {
                    check_sample(sample, time_steps, Some(path), idx)?;
                }
                debug!(path = %path.display(), samples = samples.len(), "loaded dataset file");
                pool.extend(samples);
            }
            Document::Rejected { format } => {
                warn!(
                    path = %path.display(),
                    found = format.as_deref().unwrap_or("<missing>"),
                    expected = DATASET_FORMAT,
                    "skipping dataset file with unexpected format"
                );
            }
        }
    }

    Ok(pool)
}

/// Checks one sample against the shared sequence length and frame width.
fn check_sample(
    sample: &Sample,
    time_steps: usize,
    path: Option<&Path>,
    index: usize,
) -> Result<()> {
    let origin = || path.map(Path::to_path_buf);

    if sample.sequence.is_empty() {
        return Err(MotionflowError::EmptySequence {
            path: origin(),
            sample: index,
        });
    }
    if sample.sequence.len() != time_steps {
        return Err(MotionflowError::InconsistentSequenceLength {
            path: origin(),
            sample: index,
            expected: time_steps,
            found: sample.sequence.len(),
        });
    }
    if let Some((frame, values)) = sample
        .sequence
        .iter()
        .enumerate()
        .find(|(_, values)| values.len() != FEATURE_WIDTH)
    {
        return Err(MotionflowError::InvalidFrameWidth {
            path: origin(),
            sample: index,
            frame,
            expected: FEATURE_WIDTH,
            found: values.len(),
        });
    }
    Ok(())
}

/// Loads and stacks every accepted sample from `paths`.
pub fn load_dataset<P: AsRef<Path>>(paths: &[P]) -> Result<SequenceDataset> {
    let samples = load_samples(paths)?;
    let dataset = SequenceDataset::from_samples(samples)?;
    info!(
        samples = dataset.sample_count(),
        time_steps = dataset.time_steps(),
        classes = dataset.vocabulary().len(),
        "dataset loaded"
    );
    Ok(dataset)
}

/// Stacked training data.
///
/// `sequences` is row-major with shape `(sample_count, time_steps,
/// feature_width)`; `targets[i]` is the class index of sample `i` in
/// `vocabulary`.
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    sequences: Vec<f32>,
    targets: Vec<u32>,
    vocabulary: LabelVocabulary,
    sample_count: usize,
    time_steps: usize,
    feature_width: usize,
}

impl SequenceDataset {
    /// Validates shapes, derives the vocabulary and flattens the samples.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(MotionflowError::EmptyDataset);
        };
        let time_steps = first.sequence.len();

        for (idx, sample) in samples.iter().enumerate() {
            check_sample(sample, time_steps, None, idx)?;
        }

        let vocabulary = LabelVocabulary::from_labels(samples.iter().map(|s| s.label.as_str()));

        let sample_count = samples.len();
        let mut sequences = Vec::with_capacity(sample_count * time_steps * FEATURE_WIDTH);
        let mut targets = Vec::with_capacity(sample_count);
        for sample in samples {
            targets.push(vocabulary.index_of(&sample.label)?);
            for frame in sample.sequence {
                sequences.extend(frame);
            }
        }

        Ok(Self {
            sequences,
            targets,
            vocabulary,
            sample_count,
            time_steps,
            feature_width: FEATURE_WIDTH,
        })
    }

    pub fn sequences(&self) -> &[f32] {
        &self.sequences
    }

    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    /// `(sample_count, time_steps, feature_width)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.sample_count, self.time_steps, self.feature_width)
    }

    /// Flattened `(time_steps, feature_width)` block of one sample.
    pub fn sample(&self, index: usize) -> Option<&[f32]> {
        let stride = self.time_steps * self.feature_width;
        let start = index.checked_mul(stride)?;
        self.sequences.get(start..start + stride)
    }

    /// Number of samples per label, in class-index order.
    pub fn class_counts(&self) -> Vec<(&str, usize)> {
        let mut counts = vec![0usize; self.vocabulary.len()];
        for &target in &self.targets {
            counts[target as usize] += 1;
        }
        self.vocabulary
            .labels()
            .iter()
            .map(String::as_str)
            .zip(counts)
            .collect()
    }
}
