//! Model directory → browser layers-model conversion.

use std::path::{Path, PathBuf};

use motionflow_core::{
    LabelVocabulary, ModelManifest, MotionflowError, Result, LABELS_FILE,
};
use safetensors::SafeTensors;
use serde_json::json;
use tracing::{debug, info};

use crate::topology::{check_ops, model_topology, plan_layers};
use crate::weights::{convert_layers, write_shards, WeightSpec, DEFAULT_SHARD_SIZE_BYTES};

/// Topology + weights manifest file in the export directory.
pub const MODEL_JSON: &str = "model.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Drop training-only layers from the exported graph.
    pub strip_debug_ops: bool,
    /// Skip the browser op compatibility check.
    pub skip_op_check: bool,
    pub shard_size_bytes: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            strip_debug_ops: true,
            skip_op_check: false,
            shard_size_bytes: DEFAULT_SHARD_SIZE_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub model_json: PathBuf,
    pub shards: Vec<PathBuf>,
    pub exported_layers: Vec<String>,
    pub stripped_layers: Vec<String>,
    /// Labels copied next to the model, if the input had a label file.
    pub labels: Option<Vec<String>>,
}

/// Converts the model directory `input` into a layers model under `output`.
///
/// Everything is read and converted before the first write, so a missing or
/// broken input leaves `output` untouched.
pub fn export_model(input: &Path, output: &Path, options: &ExportOptions) -> Result<ExportReport> {
    if !input.exists() {
        return Err(MotionflowError::ModelNotFound {
            path: input.to_path_buf(),
        });
    }

    let manifest = ModelManifest::load(input)?;
    let weights_path = input.join(&manifest.weights);
    let raw = std::fs::read(&weights_path).map_err(|e| MotionflowError::io(&weights_path, e))?;
    let tensors = SafeTensors::deserialize(&raw)
        .map_err(|e| MotionflowError::Safetensors(format!("{}: {e}", weights_path.display())))?;

    let (layers, stripped_layers) = plan_layers(&manifest.layers, options.strip_debug_ops);
    if !stripped_layers.is_empty() {
        debug!(layers = ?stripped_layers, "stripped training-only layers");
    }
    if !options.skip_op_check {
        check_ops(&layers)?;
    }

    let weights = convert_layers(&tensors, &manifest.config, &layers)?;

    let labels_src = input.join(LABELS_FILE);
    let vocabulary = if labels_src.is_file() {
        let vocabulary = LabelVocabulary::load(&labels_src)?;
        if vocabulary.len() != manifest.config.class_count {
            return Err(MotionflowError::InvalidManifest(format!(
                "{} lists {} labels but the model has {} classes",
                labels_src.display(),
                vocabulary.len(),
                manifest.config.class_count
            )));
        }
        Some(vocabulary)
    } else {
        None
    };

    std::fs::create_dir_all(output).map_err(|e| MotionflowError::io(output, e))?;

    let shards = write_shards(&weights, output, options.shard_size_bytes)?;
    let shard_names: Vec<String> = shards
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    let specs: Vec<WeightSpec> = weights.iter().map(WeightSpec::from).collect();

    let mut model_json = json!({
        "format": "layers-model",
        "generatedBy": concat!("motionflow-export ", env!("CARGO_PKG_VERSION")),
        "convertedBy": concat!("motionflow-export ", env!("CARGO_PKG_VERSION")),
        "modelTopology": model_topology(&manifest.config, &layers),
        "weightsManifest": [{ "paths": shard_names, "weights": specs }],
    });
    if let Some(vocabulary) = &vocabulary {
        model_json["userDefinedMetadata"] = json!({
            "labels": vocabulary.labels(),
            "timeSteps": manifest.config.time_steps,
            "featureWidth": manifest.config.feature_width,
        });
    }

    let model_json_path = output.join(MODEL_JSON);
    let content = serde_json::to_string_pretty(&model_json)
        .map_err(|e| MotionflowError::json(&model_json_path, e))?;
    std::fs::write(&model_json_path, content)
        .map_err(|e| MotionflowError::io(&model_json_path, e))?;
    info!(path = %model_json_path.display(), shards = shards.len(), "layers model written");

    let labels = match vocabulary {
        Some(vocabulary) => {
            let labels_dst = output.join(LABELS_FILE);
            std::fs::copy(&labels_src, &labels_dst)
                .map_err(|e| MotionflowError::io(&labels_dst, e))?;
            info!(path = %labels_dst.display(), "labels copied");
            Some(vocabulary.labels().to_vec())
        }
        None => None,
    };

    Ok(ExportReport {
        model_json: model_json_path,
        shards,
        exported_layers: layers.iter().map(|l| l.name().to_string()).collect(),
        stripped_layers,
        labels,
    })
}
