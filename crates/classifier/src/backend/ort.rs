use super::{Predictor, TensorInput, modality_mismatch, verify_contract};
use crate::error::{InferenceError, LoadError};
use crate::variant::{Device, ModelVariant};
use ndarray::{Array1, Array2, Ix2};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;
use std::sync::Mutex;

fn ort_load_err(e: impl std::fmt::Display) -> LoadError {
    LoadError::Ort(e.to_string())
}

fn ort_infer_err(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Backend(e.to_string())
}

/// ONNX graph for one variant.
///
/// Graph contract: the grid model takes `pixels` `[N,1,28,28]`, the sequence
/// model takes `strokes` `[N,T,3]` and `lengths` `[N]` (i64); both emit
/// `logits` `[N, classes]`.
pub struct OrtPredictor {
    // `Session::run` needs exclusive access.
    session: Mutex<Session>,
    variant: ModelVariant,
    device: Device,
    class_count: usize,
}

impl OrtPredictor {
    pub fn load(
        path: &Path,
        variant: ModelVariant,
        device: Device,
        class_count: usize,
    ) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()
            .map_err(ort_load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_load_err)?
            .with_intra_threads(4)
            .map_err(ort_load_err)?;

        match device {
            Device::Cuda(ordinal) => {
                tracing::info!(ordinal, "Initializing ONNX Runtime with CUDA execution provider");
                builder = builder
                    .with_execution_providers([
                        ort::execution_providers::CUDAExecutionProvider::default()
                            .with_device_id(ordinal as i32)
                            .build()
                            .error_on_failure(),
                    ])
                    .map_err(ort_load_err)?;
            }
            Device::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path).map_err(ort_load_err)?;
        let predictor = Self {
            session: Mutex::new(session),
            variant,
            device,
            class_count,
        };
        verify_contract(&predictor)?;

        tracing::info!(variant = %variant, path = %path.display(), "ONNX model loaded");
        Ok(predictor)
    }
}

impl Predictor for OrtPredictor {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn device(&self) -> Device {
        self.device
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn forward(&self, input: &TensorInput) -> Result<Array2<f32>, InferenceError> {
        if input.modality() != self.variant.modality() {
            return Err(modality_mismatch(self.variant, input));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Backend("session lock poisoned".to_string()))?;

        let outputs = match input {
            TensorInput::Grid { pixels, .. } => session
                .run(ort::inputs![
                    "pixels" => TensorRef::from_array_view(pixels.view()).map_err(ort_infer_err)?
                ])
                .map_err(ort_infer_err)?,
            TensorInput::Sequence {
                strokes, lengths, ..
            } => {
                let lengths: Array1<i64> = lengths.iter().map(|&l| l as i64).collect();
                session
                    .run(ort::inputs![
                        "strokes" => TensorRef::from_array_view(strokes.view()).map_err(ort_infer_err)?,
                        "lengths" => TensorRef::from_array_view(lengths.view()).map_err(ort_infer_err)?
                    ])
                    .map_err(ort_infer_err)?
            }
        };

        let logits = outputs["logits"]
            .try_extract_array::<f32>()
            .map_err(ort_infer_err)?
            .into_owned()
            .into_dimensionality::<Ix2>()?;

        Ok(logits)
    }
}
