pub mod backend;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod postprocessing;
pub mod preprocessing;
pub mod registry;
pub mod service;
pub mod variant;
pub mod weights;

// Re-export commonly used types for convenience
pub use backend::{BackendKind, Predictor, TensorInput};
pub use cache::LoadStrategy;
pub use config::ClassifierConfig;
pub use error::{ClassifierError, InferenceError, InputError, LoadError};
pub use postprocessing::{Prediction, RankedResult};
pub use preprocessing::PredictRequest;
pub use registry::ClassRegistry;
pub use service::ClassifierService;
pub use variant::{Device, Modality, ModelVariant};
