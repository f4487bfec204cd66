use crate::error::InferenceError;
use crate::variant::{Device, Modality, ModelVariant};
use ndarray::{Array2, Array3, Array4};
use serde::Deserialize;

pub mod native;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Which runtime executes the model graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Built-in `candle-nn` layers, weights from safetensors.
    #[default]
    Native,
    /// ONNX Runtime, weights baked into `.onnx` graphs.
    Onnx,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Onnx => "onnx",
        }
    }

    /// Artifact file extension for this backend.
    pub fn extension(&self) -> &'static str {
        match self {
            BackendKind::Native => "safetensors",
            BackendKind::Onnx => "onnx",
        }
    }
}

/// Model-ready tensors, tagged with the device they live on.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorInput {
    /// `[batch, 1, 28, 28]`
    Grid { pixels: Array4<f32>, device: Device },
    /// `[batch, time, 3]` plus the true length of every sample; steps past
    /// a sample's length are padding.
    Sequence {
        strokes: Array3<f32>,
        lengths: Vec<usize>,
        device: Device,
    },
}

impl TensorInput {
    pub fn modality(&self) -> Modality {
        match self {
            TensorInput::Grid { .. } => Modality::Grid,
            TensorInput::Sequence { .. } => Modality::Sequence,
        }
    }

    pub fn device(&self) -> Device {
        match self {
            TensorInput::Grid { device, .. } | TensorInput::Sequence { device, .. } => *device,
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            TensorInput::Grid { pixels, .. } => pixels.dim().0,
            TensorInput::Sequence { strokes, .. } => strokes.dim().0,
        }
    }
}

/// A weight-loaded model in inference mode.
///
/// `forward` borrows immutably: one instance can serve concurrent requests.
pub trait Predictor: Send + Sync {
    fn variant(&self) -> ModelVariant;

    fn device(&self) -> Device;

    fn class_count(&self) -> usize;

    /// Raw class scores, `[batch, class_count]`.
    fn forward(&self, input: &TensorInput) -> Result<Array2<f32>, InferenceError>;
}

/// Error for an input whose modality the predictor cannot consume.
pub(crate) fn modality_mismatch(variant: ModelVariant, input: &TensorInput) -> InferenceError {
    InferenceError::ModalityMismatch {
        variant,
        expected: variant.modality(),
        got: input.modality(),
    }
}

/// Run one zero-valued sample through a freshly loaded predictor.
///
/// Graphs loaded as opaque files only reveal their input names and output
/// width when executed; a mismatch has to fail loading, not the first request.
#[cfg(any(feature = "ort-backend", test))]
pub(crate) fn verify_contract(predictor: &dyn Predictor) -> Result<(), crate::error::LoadError> {
    use crate::error::LoadError;
    use crate::preprocessing::{GRID_SIZE, STROKE_FEATURES};

    let device = predictor.device();
    let sample = match predictor.variant().modality() {
        Modality::Grid => TensorInput::Grid {
            pixels: Array4::zeros((1, 1, GRID_SIZE, GRID_SIZE)),
            device,
        },
        Modality::Sequence => TensorInput::Sequence {
            strokes: Array3::zeros((1, 1, STROKE_FEATURES)),
            lengths: vec![1],
            device,
        },
    };

    let logits = predictor
        .forward(&sample)
        .map_err(|source| LoadError::Contract {
            variant: predictor.variant(),
            source,
        })?;

    let expected = [1, predictor.class_count()];
    if logits.shape() != expected.as_slice() {
        return Err(LoadError::ShapeMismatch {
            name: "logits".to_string(),
            expected: expected.to_vec(),
            found: logits.shape().to_vec(),
        });
    }

    tracing::debug!(variant = %predictor.variant(), "Model output contract verified");
    Ok(())
}
