use crate::backend::BackendKind;
use crate::cache::LoadStrategy;
use crate::variant::Device;
use serde::Deserialize;
use std::path::PathBuf;

/// Classifier settings, usually nested under the service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Directory holding `model1.*` and `model2.*`.
    pub weights_dir: PathBuf,
    pub device: Device,
    pub backend: BackendKind,
    pub load_strategy: LoadStrategy,
    /// Reject unknown model selectors instead of falling back to the
    /// sequence model.
    pub strict_model_selection: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights_dir: PathBuf::from("models"),
            device: Device::Cpu,
            backend: BackendKind::Native,
            load_strategy: LoadStrategy::Eager,
            strict_model_selection: false,
        }
    }
}

impl ClassifierConfig {
    pub fn with_weights_dir(mut self, weights_dir: impl Into<PathBuf>) -> Self {
        self.weights_dir = weights_dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{"weights_dir": "/srv/weights", "device": "cuda:1"}"#)
                .unwrap();

        assert_eq!(config.weights_dir, PathBuf::from("/srv/weights"));
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.backend, BackendKind::Native);
        assert_eq!(config.load_strategy, LoadStrategy::Eager);
        assert!(!config.strict_model_selection);
    }

    #[test]
    fn test_enum_fields_parse() {
        let config: ClassifierConfig = serde_json::from_str(
            r#"{"backend": "onnx", "load_strategy": "per_request", "strict_model_selection": true}"#,
        )
        .unwrap();

        assert_eq!(config.weights_dir, PathBuf::from("models"));
        assert_eq!(config.backend, BackendKind::Onnx);
        assert_eq!(config.load_strategy, LoadStrategy::PerRequest);
        assert!(config.strict_model_selection);
    }

    #[test]
    fn test_invalid_device_is_rejected() {
        let result = serde_json::from_str::<ClassifierConfig>(r#"{"device": "tpu"}"#);
        assert!(result.is_err());
    }
}
