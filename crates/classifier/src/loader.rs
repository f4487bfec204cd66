use crate::backend::native::{Architecture, SketchCnn, SketchRnn};
use crate::backend::{BackendKind, Predictor};
use crate::config::ClassifierConfig;
use crate::error::LoadError;
use crate::variant::{Device, ModelVariant};
use crate::weights::ParamStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Artifact file stem of each variant, e.g. `models/model1.safetensors`.
fn artifact_stem(variant: ModelVariant) -> &'static str {
    variant.id()
}

/// Turns weight artifacts on disk into ready predictors.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    weights_dir: PathBuf,
    device: Device,
    backend: BackendKind,
}

impl ModelLoader {
    pub fn new(weights_dir: impl Into<PathBuf>, device: Device, backend: BackendKind) -> Self {
        Self {
            weights_dir: weights_dir.into(),
            device,
            backend,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(&config.weights_dir, config.device, config.backend)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn weights_dir(&self) -> &Path {
        &self.weights_dir
    }

    pub fn artifact_path(&self, variant: ModelVariant) -> PathBuf {
        self.weights_dir
            .join(artifact_stem(variant))
            .with_extension(self.backend.extension())
    }

    /// Load `variant` onto the configured device in inference mode.
    pub fn load(
        &self,
        variant: ModelVariant,
        class_count: usize,
    ) -> Result<Arc<dyn Predictor>, LoadError> {
        let path = self.artifact_path(variant);
        let _s = tracing::info_span!(
            "load_model",
            variant = %variant,
            backend = self.backend.as_str(),
            device = %self.device
        )
        .entered();

        let start = Instant::now();
        let predictor = match self.backend {
            BackendKind::Native => self.load_native(&path, variant, class_count)?,
            BackendKind::Onnx => self.load_onnx(&path, variant, class_count)?,
        };

        tracing::info!(
            path = %path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded"
        );
        Ok(predictor)
    }

    fn load_native(
        &self,
        path: &Path,
        variant: ModelVariant,
        class_count: usize,
    ) -> Result<Arc<dyn Predictor>, LoadError> {
        if self.device != Device::Cpu {
            return Err(LoadError::UnsupportedDevice {
                device: self.device,
                backend: BackendKind::Native.as_str(),
            });
        }

        let params = ParamStore::load(path)?;
        let predictor: Arc<dyn Predictor> = match variant {
            ModelVariant::Grid => Arc::new(SketchCnn::load(params, class_count)?),
            ModelVariant::Sequence => Arc::new(SketchRnn::load(params, class_count)?),
        };
        Ok(predictor)
    }

    #[cfg(feature = "ort-backend")]
    fn load_onnx(
        &self,
        path: &Path,
        variant: ModelVariant,
        class_count: usize,
    ) -> Result<Arc<dyn Predictor>, LoadError> {
        let predictor =
            crate::backend::ort::OrtPredictor::load(path, variant, self.device, class_count)?;
        Ok(Arc::new(predictor))
    }

    #[cfg(not(feature = "ort-backend"))]
    fn load_onnx(
        &self,
        _path: &Path,
        _variant: ModelVariant,
        _class_count: usize,
    ) -> Result<Arc<dyn Predictor>, LoadError> {
        Err(LoadError::BackendUnavailable(BackendKind::Onnx.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_artifact<A: Architecture>(dir: &Path, seed: u64) {
        let loader = ModelLoader::new(dir, Device::Cpu, BackendKind::Native);
        A::init_params(20, seed)
            .unwrap()
            .save(&loader.artifact_path(A::VARIANT))
            .unwrap();
    }

    #[test]
    fn test_artifact_path() {
        let loader = ModelLoader::new("models", Device::Cpu, BackendKind::Native);
        assert_eq!(
            loader.artifact_path(ModelVariant::Grid),
            PathBuf::from("models/model1.safetensors")
        );

        let loader = ModelLoader::new("models", Device::Cpu, BackendKind::Onnx);
        assert_eq!(
            loader.artifact_path(ModelVariant::Sequence),
            PathBuf::from("models/model2.onnx")
        );
    }

    #[test]
    fn test_load_both_variants() {
        let dir = tempdir().unwrap();
        write_artifact::<SketchCnn>(dir.path(), 1);
        write_artifact::<SketchRnn>(dir.path(), 2);

        let loader = ModelLoader::new(dir.path(), Device::Cpu, BackendKind::Native);
        for variant in ModelVariant::ALL {
            let predictor = loader.load(variant, 20).unwrap();
            assert_eq!(predictor.variant(), variant);
            assert_eq!(predictor.class_count(), 20);
            assert_eq!(predictor.device(), Device::Cpu);
        }
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempdir().unwrap();
        let loader = ModelLoader::new(dir.path(), Device::Cpu, BackendKind::Native);
        let err = loader.load(ModelVariant::Grid, 20).err().unwrap();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn test_artifact_for_wrong_architecture_is_rejected() {
        let dir = tempdir().unwrap();
        let loader = ModelLoader::new(dir.path(), Device::Cpu, BackendKind::Native);
        // Sequence weights saved under the grid model's name.
        SketchRnn::init_params(20, 1)
            .unwrap()
            .save(&loader.artifact_path(ModelVariant::Grid))
            .unwrap();

        let err = loader.load(ModelVariant::Grid, 20).err().unwrap();
        assert!(matches!(err, LoadError::MissingParameter { .. }));
    }

    #[test]
    fn test_class_count_must_match_artifact() {
        let dir = tempdir().unwrap();
        write_artifact::<SketchCnn>(dir.path(), 1);
        let loader = ModelLoader::new(dir.path(), Device::Cpu, BackendKind::Native);

        let err = loader.load(ModelVariant::Grid, 10).err().unwrap();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_native_backend_is_cpu_only() {
        let dir = tempdir().unwrap();
        write_artifact::<SketchCnn>(dir.path(), 1);
        let loader = ModelLoader::new(dir.path(), Device::Cuda(0), BackendKind::Native);

        let err = loader.load(ModelVariant::Grid, 20).err().unwrap();
        assert!(matches!(err, LoadError::UnsupportedDevice { .. }));
    }

    #[cfg(not(feature = "ort-backend"))]
    #[test]
    fn test_onnx_backend_requires_feature() {
        let loader = ModelLoader::new("models", Device::Cpu, BackendKind::Onnx);
        let err = loader.load(ModelVariant::Grid, 20).err().unwrap();
        assert!(matches!(err, LoadError::BackendUnavailable("onnx")));
    }
}
