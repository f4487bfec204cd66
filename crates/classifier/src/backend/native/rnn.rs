use super::{Architecture, to_scores};
use crate::backend::{Predictor, TensorInput, modality_mismatch};
use crate::error::{InferenceError, LoadError};
use crate::preprocessing::STROKE_FEATURES;
use crate::variant::{Device, ModelVariant};
use crate::weights::ParamSpec;
use candle_core::{IndexOp, Module, Tensor};
use candle_nn::rnn::{LSTM, LSTMConfig, RNN, lstm};
use candle_nn::{Linear, VarBuilder, linear};
use ndarray::Array2;

const HIDDEN: usize = 128;
const LAYERS: usize = 2;

/// Stroke-sequence classifier.
///
/// Each `[dx, dy, pen]` step is embedded to 128 features, run through a
/// two-layer LSTM, and the deepest layer's state after the last real step is
/// projected to class scores.
pub struct SketchRnn {
    embedding: Linear,
    lstm: Vec<LSTM>,
    classifier: Linear,
    class_count: usize,
}

impl SketchRnn {
    /// Scores for a padded `[batch, time, 3]` batch; sample `b` is read up to
    /// `lengths[b]` steps.
    fn logits(&self, strokes: &Tensor, lengths: &[usize]) -> candle_core::Result<Tensor> {
        let mut x = self.embedding.forward(strokes)?;
        let mut states = Vec::new();
        for layer in &self.lstm {
            states = layer.seq(&x)?;
            x = layer.states_to_tensor(&states)?;
        }

        // Later steps never feed back into earlier ones, so the state at
        // `length - 1` ignores whatever padding follows it.
        let last = lengths
            .iter()
            .enumerate()
            .map(|(b, &length)| states[length - 1].h().i(b))
            .collect::<candle_core::Result<Vec<_>>>()?;

        self.classifier.forward(&Tensor::stack(&last, 0)?)
    }
}

impl Architecture for SketchRnn {
    const VARIANT: ModelVariant = ModelVariant::Sequence;

    fn param_specs(class_count: usize) -> Vec<ParamSpec> {
        let mut specs = vec![
            ParamSpec::new("embedding.weight", &[HIDDEN, STROKE_FEATURES], STROKE_FEATURES),
            ParamSpec::new("embedding.bias", &[HIDDEN], STROKE_FEATURES),
        ];

        for layer in 0..LAYERS {
            // LSTM weights are all scaled by the hidden size.
            specs.push(ParamSpec::new(
                format!("lstm.weight_ih_l{layer}"),
                &[4 * HIDDEN, HIDDEN],
                HIDDEN,
            ));
            specs.push(ParamSpec::new(
                format!("lstm.weight_hh_l{layer}"),
                &[4 * HIDDEN, HIDDEN],
                HIDDEN,
            ));
            specs.push(ParamSpec::new(format!("lstm.bias_ih_l{layer}"), &[4 * HIDDEN], HIDDEN));
            specs.push(ParamSpec::new(format!("lstm.bias_hh_l{layer}"), &[4 * HIDDEN], HIDDEN));
        }

        specs.push(ParamSpec::new("classifier.1.weight", &[class_count, HIDDEN], HIDDEN));
        specs.push(ParamSpec::new("classifier.1.bias", &[class_count], HIDDEN));
        specs
    }

    fn from_var_builder(vb: VarBuilder, class_count: usize) -> Result<Self, LoadError> {
        let embedding = linear(STROKE_FEATURES, HIDDEN, vb.pp("embedding"))?;

        // candle names stacked layers `weight_ih_l{k}` like torch.nn.LSTM.
        let lstm = (0..LAYERS)
            .map(|layer_idx| {
                let config = LSTMConfig {
                    layer_idx,
                    ..Default::default()
                };
                lstm(HIDDEN, HIDDEN, config, vb.pp("lstm"))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;

        let classifier = linear(HIDDEN, class_count, vb.pp("classifier.1"))?;

        Ok(Self {
            embedding,
            lstm,
            classifier,
            class_count,
        })
    }
}

impl Predictor for SketchRnn {
    fn variant(&self) -> ModelVariant {
        Self::VARIANT
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn forward(&self, input: &TensorInput) -> Result<Array2<f32>, InferenceError> {
        let TensorInput::Sequence {
            strokes, lengths, ..
        } = input
        else {
            return Err(modality_mismatch(Self::VARIANT, input));
        };

        let (batch, steps, features) = strokes.dim();
        if features != STROKE_FEATURES {
            return Err(InferenceError::Dimension(format!(
                "sequence model expects {STROKE_FEATURES} features per step, got {features}"
            )));
        }
        if lengths.len() != batch {
            return Err(InferenceError::Dimension(format!(
                "{} lengths for a batch of {}",
                lengths.len(),
                batch
            )));
        }
        for (b, &length) in lengths.iter().enumerate() {
            if length == 0 || length > steps {
                return Err(InferenceError::Dimension(format!(
                    "sample {b} has length {length}, padded sequence has {steps} steps"
                )));
            }
        }

        let strokes = Tensor::from_iter(strokes.iter().copied(), &candle_core::Device::Cpu)?
            .reshape((batch, steps, STROKE_FEATURES))?;
        to_scores(&self.logits(&strokes, lengths)?)
    }
}
