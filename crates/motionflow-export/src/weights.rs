//! Weight conversion from the trainer's safetensors layout to the web layout.
//!
//! The trainer stores PyTorch-style tensors (`weight` as `(out, in)`, LSTM
//! input and recurrent biases kept apart). The web runtime expects Keras-style
//! kernels `(in, out)` and a single LSTM bias. Gate order `i, f, c, o` is the
//! same on both sides, so only transposes and the bias sum are needed.

use std::path::{Path, PathBuf};

use motionflow_core::artifact::{dense_tensor_names, lstm_tensor_names, LayerSpec, ModelConfig};
use motionflow_core::{MotionflowError, Result};
use safetensors::{Dtype, SafeTensors};
use serde::Serialize;
use tracing::debug;

/// Default shard size, matching the usual 4 MiB web weight shards.
pub const DEFAULT_SHARD_SIZE_BYTES: usize = 4 * 1024 * 1024;

/// One converted tensor, ready to be written to a shard.
#[derive(Debug, Clone, PartialEq)]
pub struct WebWeight {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Entry of the `weightsManifest` in `model.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: &'static str,
}

impl From<&WebWeight> for WeightSpec {
    fn from(weight: &WebWeight) -> Self {
        Self {
            name: weight.name.clone(),
            shape: weight.shape.clone(),
            dtype: "float32",
        }
    }
}

/// Reads an f32 tensor and checks its shape.
pub fn read_tensor(tensors: &SafeTensors<'_>, name: &str, expected: &[usize]) -> Result<Vec<f32>> {
    let view = tensors
        .tensor(name)
        .map_err(|e| MotionflowError::Safetensors(format!("{name}: {e}")))?;

    if view.dtype() != Dtype::F32 {
        return Err(MotionflowError::Safetensors(format!(
            "{name}: expected F32, found {:?}",
            view.dtype()
        )));
    }
    if view.shape() != expected {
        return Err(MotionflowError::WeightShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            found: view.shape().to_vec(),
        });
    }

    Ok(view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Row-major transpose of a `(rows, cols)` matrix.
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0f32; data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

/// Converts the weights of `layers` in order, tracking each layer's input
/// width starting from the model's feature width.
pub fn convert_layers(
    tensors: &SafeTensors<'_>,
    config: &ModelConfig,
    layers: &[&LayerSpec],
) -> Result<Vec<WebWeight>> {
    let mut weights = Vec::new();
    let mut input_dim = config.feature_width;
    let mut output_units = None;

    for layer in layers {
        match layer {
            LayerSpec::Lstm { name, units, .. } => {
                let [w_ih, w_hh, b_ih, b_hh] = lstm_tensor_names(name);
                let gates = 4 * units;

                let w_ih = read_tensor(tensors, &w_ih, &[gates, input_dim])?;
                let w_hh = read_tensor(tensors, &w_hh, &[gates, *units])?;
                let b_ih = read_tensor(tensors, &b_ih, &[gates])?;
                let b_hh = read_tensor(tensors, &b_hh, &[gates])?;

                weights.push(WebWeight {
                    name: format!("{name}/kernel"),
                    shape: vec![input_dim, gates],
                    data: transpose(&w_ih, gates, input_dim),
                });
                weights.push(WebWeight {
                    name: format!("{name}/recurrent_kernel"),
                    shape: vec![*units, gates],
                    data: transpose(&w_hh, gates, *units),
                });
                weights.push(WebWeight {
                    name: format!("{name}/bias"),
                    shape: vec![gates],
                    data: b_ih.iter().zip(&b_hh).map(|(a, b)| a + b).collect(),
                });

                input_dim = *units;
                output_units = Some(*units);
            }
            LayerSpec::Dense { name, units, .. } => {
                let [weight, bias] = dense_tensor_names(name);
                let w = read_tensor(tensors, &weight, &[*units, input_dim])?;
                let b = read_tensor(tensors, &bias, &[*units])?;

                weights.push(WebWeight {
                    name: format!("{name}/kernel"),
                    shape: vec![input_dim, *units],
                    data: transpose(&w, *units, input_dim),
                });
                weights.push(WebWeight {
                    name: format!("{name}/bias"),
                    shape: vec![*units],
                    data: b,
                });

                input_dim = *units;
                output_units = Some(*units);
            }
            LayerSpec::Dropout { .. } => {}
        }
    }

    if output_units != Some(config.class_count) {
        return Err(MotionflowError::InvalidManifest(format!(
            "final layer has {output_units:?} units but the model has {} classes",
            config.class_count
        )));
    }
    Ok(weights)
}

const SHARD_PREFIX: &str = "group1-shard";

/// Shard files of an earlier export, e.g. `group1-shard3of4.bin`.
fn is_shard_file(name: &str) -> bool {
    name.starts_with(SHARD_PREFIX) && name.ends_with(".bin")
}

/// Deletes shards left in `dir` by a previous export.
fn remove_stale_shards(dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| MotionflowError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| MotionflowError::io(dir, e))?.path();
        let stale = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_shard_file);
        if stale {
            std::fs::remove_file(&path).map_err(|e| MotionflowError::io(&path, e))?;
            debug!(path = %path.display(), "removed stale shard");
        }
    }
    Ok(())
}

/// Concatenates the weights as little-endian f32 and writes them as
/// `group1-shard{i}of{n}.bin` files no larger than `shard_size` bytes.
/// Shards from an earlier export into `dir` are removed first.
pub fn write_shards(weights: &[WebWeight], dir: &Path, shard_size: usize) -> Result<Vec<PathBuf>> {
    remove_stale_shards(dir)?;

    let bytes: Vec<u8> = weights
        .iter()
        .flat_map(|w| w.data.iter().flat_map(|v| v.to_le_bytes()))
        .collect();

    let mut chunks: Vec<&[u8]> = bytes.chunks(shard_size.max(1)).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let total = chunks.len();
    let mut paths = Vec::with_capacity(total);

    for (idx, chunk) in chunks.iter().enumerate() {
        let path = dir.join(format!("{SHARD_PREFIX}{}of{}.bin", idx + 1, total));
        std::fs::write(&path, chunk).map_err(|e| MotionflowError::io(&path, e))?;
        paths.push(path);
    }
    Ok(paths)
}
