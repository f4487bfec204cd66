pub mod cnn;
pub mod rnn;

pub use cnn::SketchCnn;
pub use rnn::SketchRnn;

use crate::backend::Predictor;
use crate::error::{InferenceError, LoadError};
use crate::variant::ModelVariant;
use crate::weights::{ParamSpec, ParamStore};
use candle_core::Tensor;
use candle_nn::VarBuilder;
use ndarray::Array2;

/// A native architecture that can be rebuilt from a parameter set.
pub trait Architecture: Predictor + Sized {
    const VARIANT: ModelVariant;

    /// Every parameter the architecture owns, in `state_dict` naming.
    fn param_specs(class_count: usize) -> Vec<ParamSpec>;

    /// Build the layers from parameters that already passed [`ParamStore::check`].
    fn from_var_builder(vb: VarBuilder, class_count: usize) -> Result<Self, LoadError>;

    /// Freshly initialized parameters, as a newly constructed model would have.
    fn init_params(class_count: usize, seed: u64) -> Result<ParamStore, LoadError> {
        ParamStore::init(&Self::param_specs(class_count), seed)
    }

    /// Validate `params` against the architecture and build the model.
    fn load(params: ParamStore, class_count: usize) -> Result<Self, LoadError> {
        params.check(&Self::param_specs(class_count))?;
        Self::from_var_builder(params.into_var_builder(), class_count)
    }
}

/// Copy `[batch, classes]` scores off a candle tensor.
fn to_scores(logits: &Tensor) -> Result<Array2<f32>, InferenceError> {
    let (batch, classes) = logits.dims2()?;
    let values = logits.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array2::from_shape_vec((batch, classes), values)?)
}
