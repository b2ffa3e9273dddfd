//! # Web Topology
//!
//! Maps manifest layers onto the Keras-style JSON topology that browser
//! layers-model loaders understand, and checks that every op is supported
//! there.

use motionflow_core::artifact::{LayerSpec, ModelConfig};
use motionflow_core::{MotionflowError, Result};
use serde_json::{json, Value};

/// Layer classes the browser runtime can execute.
pub const SUPPORTED_LAYERS: &[&str] = &["LSTM", "Dense", "Dropout"];

/// Activations the browser runtime can execute.
pub const SUPPORTED_ACTIVATIONS: &[&str] = &["linear", "relu", "sigmoid", "softmax", "tanh"];

/// Keras class name of a layer.
pub fn class_name(layer: &LayerSpec) -> &'static str {
    match layer {
        LayerSpec::Lstm { .. } => "LSTM",
        LayerSpec::Dropout { .. } => "Dropout",
        LayerSpec::Dense { .. } => "Dense",
    }
}

/// Layers that make it into the exported graph. With `strip_debug_ops`,
/// training-only layers are dropped since they are identities at inference.
pub fn plan_layers(layers: &[LayerSpec], strip_debug_ops: bool) -> (Vec<&LayerSpec>, Vec<String>) {
    let mut kept = Vec::with_capacity(layers.len());
    let mut stripped = Vec::new();
    for layer in layers {
        if strip_debug_ops && layer.is_training_only() {
            stripped.push(layer.name().to_string());
        } else {
            kept.push(layer);
        }
    }
    (kept, stripped)
}

/// Rejects layers or activations the browser runtime lacks.
pub fn check_ops(layers: &[&LayerSpec]) -> Result<()> {
    for layer in layers {
        let class = class_name(layer);
        if !SUPPORTED_LAYERS.contains(&class) {
            return Err(MotionflowError::UnsupportedOp(format!(
                "layer {} of class {class}",
                layer.name()
            )));
        }
        if let LayerSpec::Dense { name, activation, .. } = layer {
            if !SUPPORTED_ACTIVATIONS.contains(&activation.as_str()) {
                return Err(MotionflowError::UnsupportedOp(format!(
                    "activation {activation:?} in layer {name}"
                )));
            }
        }
    }
    Ok(())
}

fn layer_config(layer: &LayerSpec) -> Value {
    match layer {
        LayerSpec::Lstm {
            name,
            units,
            return_sequences,
        } => json!({
            "name": name,
            "trainable": true,
            "dtype": "float32",
            "units": units,
            "activation": "tanh",
            "recurrent_activation": "sigmoid",
            "use_bias": true,
            "unit_forget_bias": true,
            "return_sequences": return_sequences,
            "return_state": false,
            "go_backwards": false,
            "stateful": false,
            "unroll": false,
            "dropout": 0.0,
            "recurrent_dropout": 0.0,
            "implementation": 2,
        }),
        LayerSpec::Dropout { name, rate } => json!({
            "name": name,
            "trainable": true,
            "dtype": "float32",
            "rate": rate,
        }),
        LayerSpec::Dense {
            name,
            units,
            activation,
        } => json!({
            "name": name,
            "trainable": true,
            "dtype": "float32",
            "units": units,
            "activation": activation,
            "use_bias": true,
        }),
    }
}

/// `Sequential` topology for the given layers; the first layer carries the
/// `(batch, time_steps, feature_width)` input shape.
pub fn model_topology(config: &ModelConfig, layers: &[&LayerSpec]) -> Value {
    let layers: Vec<Value> = layers
        .iter()
        .enumerate()
        .map(|(idx, layer)| {
            let mut config_json = layer_config(layer);
            if idx == 0 {
                config_json["batch_input_shape"] =
                    json!([null, config.time_steps, config.feature_width]);
            }
            json!({ "class_name": class_name(layer), "config": config_json })
        })
        .collect();

    json!({
        "class_name": "Sequential",
        "config": { "name": "dynamic_gesture", "layers": layers },
        "keras_version": "tfjs-layers 4.0.0",
        "backend": "tensor_flow.js",
    })
}
