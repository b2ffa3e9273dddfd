//! # Model Directory Layout
//!
//! Shared description of what the trainer writes and the exporter reads: the
//! fixed classifier architecture, the dimensions inferred from the dataset,
//! and the on-disk manifest tying tensor names to layers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MotionflowError, Result};

/// Manifest file inside a model directory.
pub const MANIFEST_FILE: &str = "config.json";

/// Weights file inside a model directory.
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Per-epoch training record inside a model directory.
pub const HISTORY_FILE: &str = "history.json";

/// Bumped whenever the manifest layout changes.
pub const MANIFEST_VERSION: u32 = 1;

pub const LSTM1_UNITS: usize = 64;
pub const LSTM2_UNITS: usize = 32;
pub const DENSE_UNITS: usize = 32;
pub const DROPOUT_RATE: f32 = 0.3;
pub const LEARNING_RATE: f64 = 1e-3;

/// Layer names, also used as tensor-name prefixes in the weights file.
pub const LSTM1: &str = "lstm1";
pub const DROPOUT1: &str = "dropout1";
pub const LSTM2: &str = "lstm2";
pub const DROPOUT2: &str = "dropout2";
pub const DENSE: &str = "dense";
pub const HEAD: &str = "head";

/// Dimensions inferred from the loaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub time_steps: usize,
    pub feature_width: usize,
    pub class_count: usize,
}

impl ModelConfig {
    pub fn new(time_steps: usize, feature_width: usize, class_count: usize) -> Self {
        Self {
            time_steps,
            feature_width,
            class_count,
        }
    }

    /// The fixed layer stack sized for these dimensions.
    pub fn layers(&self) -> Vec<LayerSpec> {
        vec![
            LayerSpec::Lstm {
                name: LSTM1.into(),
                units: LSTM1_UNITS,
                return_sequences: true,
            },
            LayerSpec::Dropout {
                name: DROPOUT1.into(),
                rate: DROPOUT_RATE,
            },
            LayerSpec::Lstm {
                name: LSTM2.into(),
                units: LSTM2_UNITS,
                return_sequences: false,
            },
            LayerSpec::Dropout {
                name: DROPOUT2.into(),
                rate: DROPOUT_RATE,
            },
            LayerSpec::Dense {
                name: DENSE.into(),
                units: DENSE_UNITS,
                activation: "relu".into(),
            },
            LayerSpec::Dense {
                name: HEAD.into(),
                units: self.class_count,
                activation: "softmax".into(),
            },
        ]
    }
}

/// One layer of the sequential classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    Lstm {
        name: String,
        units: usize,
        return_sequences: bool,
    },
    Dropout {
        name: String,
        rate: f32,
    },
    Dense {
        name: String,
        units: usize,
        activation: String,
    },
}

impl LayerSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Lstm { name, .. } | Self::Dropout { name, .. } | Self::Dense { name, .. } => {
                name
            }
        }
    }

    /// Whether the layer only matters while training.
    pub fn is_training_only(&self) -> bool {
        matches!(self, Self::Dropout { .. })
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    pub config: ModelConfig,
    pub layers: Vec<LayerSpec>,
    pub weights: String,
}

impl ModelManifest {
    pub fn for_config(config: ModelConfig) -> Self {
        Self {
            version: MANIFEST_VERSION,
            config,
            layers: config.layers(),
            weights: WEIGHTS_FILE.to_string(),
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let json =
            serde_json::to_string_pretty(self).map_err(|e| MotionflowError::json(&path, e))?;
        std::fs::write(&path, json).map_err(|e| MotionflowError::io(&path, e))
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| MotionflowError::io(&path, e))?;
        let manifest: Self =
            serde_json::from_str(&content).map_err(|e| MotionflowError::json(&path, e))?;

        if manifest.version != MANIFEST_VERSION {
            return Err(MotionflowError::InvalidManifest(format!(
                "unsupported manifest version {} (expected {MANIFEST_VERSION})",
                manifest.version
            )));
        }
        Ok(manifest)
    }
}

/// Safetensors names of an LSTM layer's parameters: `(w_ih, w_hh, b_ih, b_hh)`.
pub fn lstm_tensor_names(layer: &str) -> [String; 4] {
    [
        format!("{layer}.weight_ih_l0"),
        format!("{layer}.weight_hh_l0"),
        format!("{layer}.bias_ih_l0"),
        format!("{layer}.bias_hh_l0"),
    ]
}

/// Safetensors names of a dense layer's parameters: `(weight, bias)`.
pub fn dense_tensor_names(layer: &str) -> [String; 2] {
    [format!("{layer}.weight"), format!("{layer}.bias")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_architecture() {
        let layers = ModelConfig::new(30, 63, 4).layers();
        assert_eq!(layers.len(), 6);
        assert_eq!(
            layers[0],
            LayerSpec::Lstm {
                name: "lstm1".into(),
                units: 64,
                return_sequences: true
            }
        );
        assert!(layers[1].is_training_only());
        assert_eq!(
            layers[5],
            LayerSpec::Dense {
                name: "head".into(),
                units: 4,
                activation: "softmax".into()
            }
        );
    }

    #[test]
    fn manifest_json_is_tagged() {
        let manifest = ModelManifest::for_config(ModelConfig::new(20, 63, 2));
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["config"]["time_steps"], 20);
        assert_eq!(json["layers"][0]["kind"], "lstm");
        assert_eq!(json["layers"][1]["kind"], "dropout");
        assert_eq!(json["weights"], WEIGHTS_FILE);
    }

    #[test]
    fn manifest_round_trip_through_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ModelManifest::for_config(ModelConfig::new(20, 63, 3));
        manifest.save(dir.path()).unwrap();
        assert_eq!(ModelManifest::load(dir.path()).unwrap(), manifest);
    }

    #[test]
    fn manifest_version_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = ModelManifest::for_config(ModelConfig::new(20, 63, 3));
        manifest.version = 99;
        manifest.save(dir.path()).unwrap();
        assert!(matches!(
            ModelManifest::load(dir.path()),
            Err(MotionflowError::InvalidManifest(_))
        ));
    }

    #[test]
    fn tensor_names_match_candle_layout() {
        let [w_ih, w_hh, b_ih, b_hh] = lstm_tensor_names("lstm2");
        assert_eq!(w_ih, "lstm2.weight_ih_l0");
        assert_eq!(w_hh, "lstm2.weight_hh_l0");
        assert_eq!(b_ih, "lstm2.bias_ih_l0");
        assert_eq!(b_hh, "lstm2.bias_hh_l0");
        assert_eq!(dense_tensor_names("head"), ["head.weight", "head.bias"]);
    }
}
