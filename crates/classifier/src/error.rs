use crate::variant::{Device, Modality, ModelVariant};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed or incomplete client payloads. Always a 4xx.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Missing 'pixels' or 'sequence' in request")]
    MissingInput,

    #[error("Request must contain only one of 'pixels' or 'sequence'")]
    AmbiguousInput,

    #[error("Expected {expected} pixel values for a 28x28 grid, got {got}")]
    PixelCount { expected: usize, got: usize },

    #[error("Sequence must contain at least one stroke step")]
    EmptySequence,

    #[error("Sequence step {index} has {got} values, expected [dx, dy, pen_state]")]
    StrokeShape { index: usize, got: usize },

    #[error("Non-finite value in '{field}' at position {index}")]
    NonFinite { field: &'static str, index: usize },

    #[error("Unknown model '{0}'")]
    UnknownModel(String),
}

/// Failures while turning a weight artifact into a ready predictor.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Weight artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read weight artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt weight artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to write weight artifact {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("Parameter '{name}' missing from artifact")]
    MissingParameter { name: String },

    #[error("Unexpected parameter '{name}' in artifact")]
    UnexpectedParameter { name: String },

    #[error("Parameter '{name}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Parameter '{name}' has unsupported dtype {dtype}")]
    UnsupportedDtype { name: String, dtype: String },

    #[error("Failed to build model tensors: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Device {device} is not supported by the {backend} backend")]
    UnsupportedDevice {
        device: Device,
        backend: &'static str,
    },

    #[error("Backend '{0}' is not compiled into this build")]
    BackendUnavailable(&'static str),

    #[error("Model {variant} does not honour the input/output contract: {source}")]
    Contract {
        variant: ModelVariant,
        #[source]
        source: InferenceError,
    },

    #[error("Model {0} was not loaded at startup")]
    NotLoaded(ModelVariant),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),
}

/// Errors raised by a forward pass.
///
/// Everything except `ModalityMismatch` means two components disagree about
/// shapes or placement, which is a deployment defect rather than bad input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Model {variant} expects {expected} input, got {got}")]
    ModalityMismatch {
        variant: ModelVariant,
        expected: Modality,
        got: Modality,
    },

    #[error("Input tensor is on {input} but model is on {model}")]
    DeviceMismatch { model: Device, input: Device },

    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    #[error("Backend failure: {0}")]
    Backend(String),
}

impl From<ndarray::ShapeError> for InferenceError {
    fn from(e: ndarray::ShapeError) -> Self {
        InferenceError::Dimension(e.to_string())
    }
}

impl From<candle_core::Error> for InferenceError {
    fn from(e: candle_core::Error) -> Self {
        InferenceError::Backend(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Class registry must contain at least one label")]
    Empty,

    #[error("Duplicate class label '{0}'")]
    DuplicateLabel(String),
}

/// Top-level error of the classification pipeline.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ClassifierError {
    /// Whether the caller is at fault (maps to a 4xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClassifierError::Input(_)
                | ClassifierError::Inference(InferenceError::ModalityMismatch { .. })
        )
    }

    /// Short machine-readable outcome, used as a metric attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierError::Input(_) => "invalid_input",
            ClassifierError::Load(_) => "load_error",
            ClassifierError::Inference(InferenceError::ModalityMismatch { .. }) => {
                "modality_mismatch"
            }
            ClassifierError::Inference(_) => "inference_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Tensor};

    #[test]
    fn test_error_display_formatting() {
        assert_eq!(
            InputError::MissingInput.to_string(),
            "Missing 'pixels' or 'sequence' in request"
        );
        assert_eq!(
            InputError::PixelCount {
                expected: 784,
                got: 700
            }
            .to_string(),
            "Expected 784 pixel values for a 28x28 grid, got 700"
        );

        let err = LoadError::ShapeMismatch {
            name: "fc_block.1.weight".to_string(),
            expected: vec![128, 3136],
            found: vec![128, 100],
        };
        assert_eq!(
            err.to_string(),
            "Parameter 'fc_block.1.weight' has shape [128, 100], expected [128, 3136]"
        );

        let err = LoadError::NotFound {
            path: PathBuf::from("/models/model1.safetensors"),
        };
        assert_eq!(
            err.to_string(),
            "Weight artifact not found: /models/model1.safetensors"
        );
    }

    #[test]
    fn test_client_error_classification() {
        let err: ClassifierError = InputError::EmptySequence.into();
        assert!(err.is_client_error());
        assert_eq!(err.kind(), "invalid_input");

        let err: ClassifierError = InferenceError::ModalityMismatch {
            variant: ModelVariant::Grid,
            expected: Modality::Grid,
            got: Modality::Sequence,
        }
        .into();
        assert!(err.is_client_error(), "Wrong modality for the model is caller error");

        let err: ClassifierError = InferenceError::DeviceMismatch {
            model: Device::Cpu,
            input: Device::Cuda(0),
        }
        .into();
        assert!(!err.is_client_error(), "Device mismatch is an internal defect");

        let err: ClassifierError = LoadError::NotLoaded(ModelVariant::Sequence).into();
        assert!(!err.is_client_error());
        assert_eq!(err.kind(), "load_error");
    }

    #[test]
    fn test_shape_error_conversion() {
        let shape_err = ndarray::Array1::<f32>::zeros(5)
            .into_shape_with_order((2, 2))
            .unwrap_err();
        let err: InferenceError = shape_err.into();
        assert!(matches!(err, InferenceError::Dimension(_)));

        let candle_err = Tensor::zeros(4, DType::F32, &candle_core::Device::Cpu)
            .and_then(|t| t.reshape((3, 2)))
            .unwrap_err();
        let err: InferenceError = candle_err.into();
        assert!(matches!(err, InferenceError::Backend(_)));
    }
}
