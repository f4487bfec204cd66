use crate::backend::TensorInput;
use crate::error::InputError;
use crate::variant::{Device, Modality};
use common::span;
use ndarray::{Array3, Array4, s};
use serde::{Deserialize, Serialize};

pub const GRID_SIZE: usize = 28;
pub const PIXEL_COUNT: usize = GRID_SIZE * GRID_SIZE;
/// `[dx, dy, pen_state]`
pub const STROKE_FEATURES: usize = 3;

/// Body of a prediction request.
///
/// `null` and a missing key are treated the same for every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Vec<Vec<f32>>>,
}

impl PredictRequest {
    pub fn grid(pixels: Vec<f32>) -> Self {
        Self {
            pixels: Some(pixels),
            ..Default::default()
        }
    }

    pub fn sequence(sequence: Vec<Vec<f32>>) -> Self {
        Self {
            sequence: Some(sequence),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Validate a request and build the tensor its modality calls for.
///
/// All shape checks happen here so that bad input never reaches a model.
pub fn normalize(
    request: &PredictRequest,
    device: Device,
) -> Result<(TensorInput, Modality), InputError> {
    let _s = span!("normalize");

    match (&request.pixels, &request.sequence) {
        (Some(_), Some(_)) => Err(InputError::AmbiguousInput),
        (None, None) => Err(InputError::MissingInput),
        (Some(pixels), None) => Ok((grid_tensor(pixels, device)?, Modality::Grid)),
        (None, Some(sequence)) => Ok((sequence_tensor(sequence, device)?, Modality::Sequence)),
    }
}

fn grid_tensor(pixels: &[f32], device: Device) -> Result<TensorInput, InputError> {
    if pixels.len() != PIXEL_COUNT {
        return Err(InputError::PixelCount {
            expected: PIXEL_COUNT,
            got: pixels.len(),
        });
    }
    if let Some(index) = pixels.iter().position(|v| !v.is_finite()) {
        return Err(InputError::NonFinite {
            field: "pixels",
            index,
        });
    }

    let pixels = Array4::from_shape_fn((1, 1, GRID_SIZE, GRID_SIZE), |(_, _, y, x)| {
        pixels[y * GRID_SIZE + x]
    });

    tracing::trace!(shape = ?pixels.shape(), "Built grid tensor");
    Ok(TensorInput::Grid { pixels, device })
}

fn sequence_tensor(sequence: &[Vec<f32>], device: Device) -> Result<TensorInput, InputError> {
    if sequence.is_empty() {
        return Err(InputError::EmptySequence);
    }

    for (index, step) in sequence.iter().enumerate() {
        if step.len() != STROKE_FEATURES {
            return Err(InputError::StrokeShape {
                index,
                got: step.len(),
            });
        }
        if !step.iter().all(|v| v.is_finite()) {
            return Err(InputError::NonFinite {
                field: "sequence",
                index,
            });
        }
    }

    let length = sequence.len();
    let strokes = Array3::from_shape_fn((1, length, STROKE_FEATURES), |(_, t, f)| sequence[t][f]);

    tracing::trace!(length, "Built sequence tensor");
    Ok(TensorInput::Sequence {
        strokes,
        lengths: vec![length],
        device,
    })
}

/// Pad a `[batch, time, features]` tensor to `target_len` steps with `fill`.
///
/// Returns a copy unchanged when it is already at least that long. Recorded
/// lengths are unaffected, so the padding is invisible to the sequence model.
pub fn pad_sequence(strokes: &Array3<f32>, target_len: usize, fill: f32) -> Array3<f32> {
    let (batch, steps, features) = strokes.dim();
    if target_len <= steps {
        return strokes.clone();
    }

    let mut padded = Array3::<f32>::from_elem((batch, target_len, features), fill);
    padded.slice_mut(s![.., ..steps, ..]).assign(strokes);
    padded
}
