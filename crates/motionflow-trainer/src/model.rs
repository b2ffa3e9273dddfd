//! Recurrent gesture classifier.
//! Two stacked LSTMs with dropout, a ReLU bottleneck and a softmax head.

use std::path::Path;

use anyhow::Context;
use candle_core::{DType, Device, Result, Tensor, D};
use candle_nn::rnn::{lstm, LSTMConfig, LSTM, RNN};
use candle_nn::{linear, ops, Dropout, Linear, Module, VarBuilder, VarMap};
use motionflow_core::artifact::{
    ModelManifest, DENSE, DENSE_UNITS, DROPOUT_RATE, HEAD, LSTM1, LSTM1_UNITS, LSTM2, LSTM2_UNITS,
    WEIGHTS_FILE,
};
use motionflow_core::{LabelVocabulary, ModelConfig, LABELS_FILE};

pub struct GestureClassifier {
    lstm1: LSTM,
    dropout1: Dropout,
    lstm2: LSTM,
    dropout2: Dropout,
    dense: Linear,
    head: Linear,
    config: ModelConfig,
}

impl GestureClassifier {
    /// Creates the layers under `vb`, named after the manifest layer names.
    pub fn new(config: ModelConfig, vb: VarBuilder) -> Result<Self> {
        let lstm1 = lstm(
            config.feature_width,
            LSTM1_UNITS,
            LSTMConfig::default(),
            vb.pp(LSTM1),
        )?;
        let lstm2 = lstm(LSTM1_UNITS, LSTM2_UNITS, LSTMConfig::default(), vb.pp(LSTM2))?;
        let dense = linear(LSTM2_UNITS, DENSE_UNITS, vb.pp(DENSE))?;
        let head = linear(DENSE_UNITS, config.class_count, vb.pp(HEAD))?;

        Ok(Self {
            lstm1,
            dropout1: Dropout::new(DROPOUT_RATE),
            lstm2,
            dropout2: Dropout::new(DROPOUT_RATE),
            dense,
            head,
            config,
        })
    }

    /// Rebuilds a trained classifier from a model directory.
    pub fn load(dir: &Path, device: &Device) -> anyhow::Result<(Self, LabelVocabulary)> {
        let manifest = ModelManifest::load(dir)?;
        let vocabulary = LabelVocabulary::load(&dir.join(LABELS_FILE))?;
        anyhow::ensure!(
            vocabulary.len() == manifest.config.class_count,
            "{} lists {} labels but the model has {} classes",
            LABELS_FILE,
            vocabulary.len(),
            manifest.config.class_count
        );

        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = Self::new(manifest.config, vb)?;
        let weights = dir.join(&manifest.weights);
        varmap
            .load(&weights)
            .with_context(|| format!("failed to load weights from {}", weights.display()))?;

        Ok((model, vocabulary))
    }

    pub fn config(&self) -> ModelConfig {
        self.config
    }

    /// Class logits `(batch, class_count)` for inputs `(batch, time_steps, feature_width)`.
    /// Dropout is only active when `train` is set.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let states = self.lstm1.seq(xs)?;
        let xs = self.lstm1.states_to_tensor(&states)?;
        let xs = self.dropout1.forward(&xs, train)?;

        let states = self.lstm2.seq(&xs)?;
        let last = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("input sequence has no frames".into()))?;
        let xs = self.dropout2.forward(last.h(), train)?;

        let xs = self.dense.forward(&xs)?.relu()?;
        self.head.forward(&xs)
    }

    /// Class probabilities in inference mode.
    pub fn predict_proba(&self, xs: &Tensor) -> Result<Tensor> {
        ops::softmax(&self.forward_t(xs, false)?, D::Minus1)
    }

    /// Most likely class index per sample.
    pub fn predict(&self, xs: &Tensor) -> Result<Vec<u32>> {
        self.forward_t(xs, false)?.argmax(D::Minus1)?.to_vec1()
    }
}

/// Default location of the weights inside a model directory.
pub fn weights_path(dir: &Path) -> std::path::PathBuf {
    dir.join(WEIGHTS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(config: ModelConfig) -> (VarMap, GestureClassifier) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = GestureClassifier::new(config, vb).unwrap();
        (varmap, model)
    }

    #[test]
    fn output_layer_matches_class_count() {
        let (varmap, model) = build(ModelConfig::new(30, 63, 4));

        let xs = Tensor::zeros((2, 30, 63), DType::F32, &Device::Cpu).unwrap();
        let logits = model.forward_t(&xs, false).unwrap();
        assert_eq!(logits.dims(), &[2, 4]);

        let vars = varmap.data().lock().unwrap();
        assert_eq!(vars["head.weight"].as_tensor().dims(), &[4, 32]);
        assert_eq!(vars["head.bias"].as_tensor().dims(), &[4]);
        assert_eq!(vars["lstm1.weight_ih_l0"].as_tensor().dims(), &[4 * 64, 63]);
        assert_eq!(vars["lstm2.weight_hh_l0"].as_tensor().dims(), &[4 * 32, 32]);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (_varmap, model) = build(ModelConfig::new(12, 63, 3));
        let xs = Tensor::randn(0f32, 1.0, (5, 12, 63), &Device::Cpu).unwrap();
        let probs = model.predict_proba(&xs).unwrap();
        let sums: Vec<f32> = probs.sum(D::Minus1).unwrap().to_vec1().unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-4, "sum={sum}");
        }
        assert_eq!(model.predict(&xs).unwrap().len(), 5);
    }

    #[test]
    fn inference_is_deterministic() {
        let (_varmap, model) = build(ModelConfig::new(8, 63, 2));
        let xs = Tensor::randn(0f32, 1.0, (3, 8, 63), &Device::Cpu).unwrap();
        let a: Vec<Vec<f32>> = model.forward_t(&xs, false).unwrap().to_vec2().unwrap();
        let b: Vec<Vec<f32>> = model.forward_t(&xs, false).unwrap().to_vec2().unwrap();
        assert_eq!(a, b);
    }
}
