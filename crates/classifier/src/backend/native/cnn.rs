use super::{Architecture, to_scores};
use crate::backend::{Predictor, TensorInput, modality_mismatch};
use crate::error::{InferenceError, LoadError};
use crate::preprocessing::GRID_SIZE;
use crate::variant::{Device, ModelVariant};
use crate::weights::ParamSpec;
use candle_core::{Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder, conv2d, linear};
use ndarray::Array2;

const KERNEL: usize = 3;
const HIDDEN: usize = 128;
const FLAT_FEATURES: usize = 64 * 7 * 7;

/// `(state_dict prefix, in_channels, out_channels)` of each convolution.
/// Indices skip the ReLU/pool slots of the original sequential block.
const CONVS: [(&str, usize, usize); 4] = [
    ("conv_blocks.0", 1, 8),
    ("conv_blocks.2", 8, 16),
    ("conv_blocks.5", 16, 32),
    ("conv_blocks.7", 32, 64),
];
const FC_HIDDEN: &str = "fc_block.1";
const FC_OUT: &str = "fc_block.4";

/// Grid-input classifier.
///
/// Four 3x3 convolutions (1→8→16, pool, →32→64, pool) followed by a
/// 3136→128→classes head. Dropout is inactive at inference and has no layer.
pub struct SketchCnn {
    convs: Vec<Conv2d>,
    fc_hidden: Linear,
    fc_out: Linear,
    class_count: usize,
}

impl SketchCnn {
    fn logits(&self, pixels: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.convs[0].forward(pixels)?.relu()?;
        let x = self.convs[1].forward(&x)?.relu()?.max_pool2d(2)?;

        let x = self.convs[2].forward(&x)?.relu()?;
        let x = self.convs[3].forward(&x)?.relu()?.max_pool2d(2)?;

        // NCHW flatten matches the channel-major order of the trained head.
        let x = x.flatten_from(1)?;
        let x = self.fc_hidden.forward(&x)?.relu()?;
        self.fc_out.forward(&x)
    }
}

impl Architecture for SketchCnn {
    const VARIANT: ModelVariant = ModelVariant::Grid;

    fn param_specs(class_count: usize) -> Vec<ParamSpec> {
        let mut specs = Vec::with_capacity(2 * CONVS.len() + 4);
        for (prefix, in_ch, out_ch) in CONVS {
            let fan_in = in_ch * KERNEL * KERNEL;
            specs.push(ParamSpec::new(
                format!("{prefix}.weight"),
                &[out_ch, in_ch, KERNEL, KERNEL],
                fan_in,
            ));
            specs.push(ParamSpec::new(format!("{prefix}.bias"), &[out_ch], fan_in));
        }

        specs.push(ParamSpec::new(
            format!("{FC_HIDDEN}.weight"),
            &[HIDDEN, FLAT_FEATURES],
            FLAT_FEATURES,
        ));
        specs.push(ParamSpec::new(format!("{FC_HIDDEN}.bias"), &[HIDDEN], FLAT_FEATURES));
        specs.push(ParamSpec::new(
            format!("{FC_OUT}.weight"),
            &[class_count, HIDDEN],
            HIDDEN,
        ));
        specs.push(ParamSpec::new(format!("{FC_OUT}.bias"), &[class_count], HIDDEN));
        specs
    }

    fn from_var_builder(vb: VarBuilder, class_count: usize) -> Result<Self, LoadError> {
        let same_padding = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };

        let convs = CONVS
            .iter()
            .map(|&(prefix, in_ch, out_ch)| {
                conv2d(in_ch, out_ch, KERNEL, same_padding, vb.pp(prefix))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;

        let fc_hidden = linear(FLAT_FEATURES, HIDDEN, vb.pp(FC_HIDDEN))?;
        let fc_out = linear(HIDDEN, class_count, vb.pp(FC_OUT))?;

        Ok(Self {
            convs,
            fc_hidden,
            fc_out,
            class_count,
        })
    }
}

impl Predictor for SketchCnn {
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
        let TensorInput::Grid { pixels, .. } = input else {
            return Err(modality_mismatch(Self::VARIANT, input));
        };

        let (batch, channels, height, width) = pixels.dim();
        if channels != 1 || height != GRID_SIZE || width != GRID_SIZE {
            return Err(InferenceError::Dimension(format!(
                "grid model expects [N, 1, {GRID_SIZE}, {GRID_SIZE}], got {:?}",
                pixels.shape()
            )));
        }

        let pixels = Tensor::from_iter(pixels.iter().copied(), &candle_core::Device::Cpu)?
            .reshape((batch, 1, GRID_SIZE, GRID_SIZE))?;
        to_scores(&self.logits(&pixels)?)
    }
}
