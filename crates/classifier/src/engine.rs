use crate::backend::{Predictor, TensorInput, modality_mismatch};
use crate::error::InferenceError;
use ndarray::{Array1, ArrayView1};

/// Softmax output for one sample: non-negative, sums to 1, one entry per class.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector(Array1<f32>);

impl ProbabilityVector {
    pub fn from_logits(logits: ArrayView1<f32>) -> Self {
        Self(softmax(logits))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        // Always built from an owned, contiguous array.
        self.0.as_slice().unwrap_or(&[])
    }

    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.0.view()
    }
}

/// Numerically stable softmax: the max logit is subtracted before `exp`.
pub fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    let exps = logits.mapv(|v| (v - max).exp());
    let sum = exps.sum();
    exps / sum
}

/// Run one sample through `predictor` and turn its scores into probabilities.
///
/// The input's modality and device must match the predictor, and the batch
/// must hold exactly one sample.
pub fn infer(
    predictor: &dyn Predictor,
    input: &TensorInput,
) -> Result<ProbabilityVector, InferenceError> {
    let _s = tracing::info_span!("model_inference", variant = %predictor.variant()).entered();

    if input.modality() != predictor.variant().modality() {
        return Err(modality_mismatch(predictor.variant(), input));
    }
    if input.device() != predictor.device() {
        return Err(InferenceError::DeviceMismatch {
            model: predictor.device(),
            input: input.device(),
        });
    }
    if input.batch_size() != 1 {
        return Err(InferenceError::Dimension(format!(
            "expected a single sample, got a batch of {}",
            input.batch_size()
        )));
    }

    let logits = predictor.forward(input)?;
    let expected = (1, predictor.class_count());
    if logits.dim() != expected {
        return Err(InferenceError::Dimension(format!(
            "model returned scores of shape {:?}, expected {:?}",
            logits.dim(),
            expected
        )));
    }

    Ok(ProbabilityVector::from_logits(logits.row(0)))
}
