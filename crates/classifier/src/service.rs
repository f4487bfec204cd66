use crate::backend::{Predictor, TensorInput};
use crate::cache::PredictorCache;
use crate::config::ClassifierConfig;
use crate::engine;
use crate::error::{ClassifierError, InferenceError, LoadError};
use crate::loader::ModelLoader;
use crate::postprocessing::{RankedResult, rank};
use crate::preprocessing::{PredictRequest, normalize};
use crate::registry::ClassRegistry;
use crate::variant::{Device, Modality, ModelVariant};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use std::time::Instant;

const LOGGED_TOP: usize = 5;

struct Metrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> Metrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.001, 0.002, 0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 1.0, 2.0,
    ];
    let duration = meter
        .f64_histogram("classifier_request_duration_seconds")
        .with_description("Time to classify one request (normalize + infer + rank)")
        .with_unit("s")
        .with_boundaries(latency_buckets.to_vec())
        .build();
    let requests = meter
        .u64_counter("classifier_requests_total")
        .with_description("Classification requests by variant and outcome")
        .build();

    Metrics { duration, requests }
}

/// A request that passed validation and is bound to a variant.
struct Prepared {
    input: TensorInput,
    variant: ModelVariant,
}

/// End-to-end classification: validate, pick a model, infer, rank.
///
/// Stateless per request; safe to share behind an `Arc` across threads.
pub struct ClassifierService {
    cache: PredictorCache,
    registry: ClassRegistry,
    device: Device,
    strict_model_selection: bool,
    metrics: Metrics,
}

impl ClassifierService {
    /// Build from configuration, loading models according to its strategy.
    pub fn new(config: &ClassifierConfig, registry: ClassRegistry) -> Result<Self, LoadError> {
        tracing::info!(
            weights_dir = %config.weights_dir.display(),
            backend = config.backend.as_str(),
            device = %config.device,
            load_strategy = ?config.load_strategy,
            classes = registry.len(),
            "Classifier service starting"
        );

        let loader = ModelLoader::from_config(config);
        let cache = PredictorCache::build(config.load_strategy, loader, registry.len())?;

        Ok(Self {
            cache,
            registry,
            device: config.device,
            strict_model_selection: config.strict_model_selection,
            metrics: init_metrics("classifier"),
        })
    }

    /// Build over already-loaded predictors.
    pub fn with_predictors(
        predictors: impl IntoIterator<Item = Arc<dyn Predictor>>,
        registry: ClassRegistry,
        device: Device,
        strict_model_selection: bool,
    ) -> Self {
        Self {
            cache: PredictorCache::from_predictors(predictors, registry.len()),
            registry,
            device,
            strict_model_selection,
            metrics: init_metrics("classifier"),
        }
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Classify one drawing into a ranked list over every registry label.
    pub fn predict(&self, request: &PredictRequest) -> Result<RankedResult, ClassifierError> {
        let span = tracing::info_span!(
            "classify",
            variant = tracing::field::Empty,
            modality = tracing::field::Empty
        );
        let _enter = span.enter();
        let start = Instant::now();

        let mut variant = "unresolved";
        let result = self.prepare(request).and_then(|prepared| {
            variant = prepared.variant.id();
            span.record("variant", variant);
            span.record("modality", prepared.input.modality().as_str());
            self.execute(prepared)
        });

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        let attributes = [
            KeyValue::new("variant", variant),
            KeyValue::new("outcome", outcome),
        ];
        self.metrics
            .duration
            .record(start.elapsed().as_secs_f64(), &attributes);
        self.metrics.requests.add(1, &attributes);

        if let Err(e) = &result {
            if e.is_client_error() {
                tracing::debug!(error = %e, "Rejected request");
            } else {
                tracing::error!(error = %e, "Classification failed");
            }
        }

        result
    }

    fn prepare(&self, request: &PredictRequest) -> Result<Prepared, ClassifierError> {
        let (input, modality) = normalize(request, self.device)?;
        let variant = ModelVariant::resolve(
            request.model.as_deref(),
            modality,
            self.strict_model_selection,
        )?;

        // Rejected here so a mismatched request never touches a model.
        if variant.modality() != modality {
            return Err(mismatch(variant, modality).into());
        }

        Ok(Prepared { input, variant })
    }

    fn execute(&self, prepared: Prepared) -> Result<RankedResult, ClassifierError> {
        let predictor = self.cache.acquire(prepared.variant)?;
        let probs = engine::infer(predictor.as_ref(), &prepared.input)?;

        if probs.len() != self.registry.len() {
            return Err(InferenceError::Dimension(format!(
                "model produced {} probabilities for {} classes",
                probs.len(),
                self.registry.len()
            ))
            .into());
        }

        let ranked = rank(&probs, &self.registry);
        tracing::debug!(
            variant = %prepared.variant,
            top = ?ranked
                .top(LOGGED_TOP)
                .iter()
                .map(|p| (p.label.as_str(), p.confidence))
                .collect::<Vec<_>>(),
            "Classified drawing"
        );

        Ok(ranked)
    }
}

fn mismatch(variant: ModelVariant, got: Modality) -> InferenceError {
    InferenceError::ModalityMismatch {
        variant,
        expected: variant.modality(),
        got,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::native::{Architecture, SketchCnn, SketchRnn};
    use crate::error::InputError;
    use crate::preprocessing::PIXEL_COUNT;

    fn service(strict: bool) -> ClassifierService {
        let cnn: Arc<dyn Predictor> =
            Arc::new(SketchCnn::load(SketchCnn::init_params(20, 11).unwrap(), 20).unwrap());
        let rnn: Arc<dyn Predictor> =
            Arc::new(SketchRnn::load(SketchRnn::init_params(20, 12).unwrap(), 20).unwrap());
        ClassifierService::with_predictors(
            [cnn, rnn],
            ClassRegistry::default(),
            Device::Cpu,
            strict,
        )
    }

    fn strokes() -> Vec<Vec<f32>> {
        vec![vec![0.0, 0.0, 1.0], vec![5.0, 3.0, 0.0], vec![-2.0, 4.0, 1.0]]
    }

    #[test]
    fn test_predict_grid_returns_all_classes() {
        let result = service(false)
            .predict(&PredictRequest::grid(vec![0.5; PIXEL_COUNT]).with_model("model1"))
            .unwrap();

        assert_eq!(result.len(), 20);
        let confidences: Vec<f32> = result.iter().map(|p| p.confidence).collect();
        assert!(
            confidences.windows(2).all(|w| w[0] >= w[1]),
            "Sorted descending"
        );
        let total: f32 = confidences.iter().sum();
        assert!((total - 1.0).abs() < 20.0 * 0.00005 + 1e-4);
    }

    #[test]
    fn test_predict_without_model_follows_payload() {
        let svc = service(false);
        let auto = svc.predict(&PredictRequest::sequence(strokes())).unwrap();
        let explicit = svc
            .predict(&PredictRequest::sequence(strokes()).with_model("model2"))
            .unwrap();
        assert_eq!(auto, explicit);
    }

    #[test]
    fn test_unknown_model_falls_back_to_sequence() {
        let svc = service(false);
        let fallback = svc
            .predict(&PredictRequest::sequence(strokes()).with_model("model99"))
            .unwrap();
        let explicit = svc
            .predict(&PredictRequest::sequence(strokes()).with_model("model2"))
            .unwrap();
        assert_eq!(fallback, explicit);

        let err = svc
            .predict(&PredictRequest::grid(vec![0.0; PIXEL_COUNT]).with_model("model99"))
            .unwrap_err();
        assert!(err.is_client_error(), "Grid payload cannot feed the fallback");
    }

    #[test]
    fn test_strict_selection_rejects_unknown_model() {
        let err = service(true)
            .predict(&PredictRequest::sequence(strokes()).with_model("model99"))
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::Input(InputError::UnknownModel(ref m)) if m == "model99"
        ));
    }

    #[test]
    fn test_modality_mismatch_is_client_error() {
        let err = service(false)
            .predict(&PredictRequest::sequence(strokes()).with_model("model1"))
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::Inference(InferenceError::ModalityMismatch {
                variant: ModelVariant::Grid,
                ..
            })
        ));
        assert!(err.is_client_error());
        assert_eq!(err.kind(), "modality_mismatch");
    }

    #[test]
    fn test_invalid_input_is_client_error() {
        let err = service(false)
            .predict(&PredictRequest::grid(vec![0.0; 700]))
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::Input(InputError::PixelCount { got: 700, .. })
        ));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_unloaded_variant_is_server_error() {
        let cnn: Arc<dyn Predictor> =
            Arc::new(SketchCnn::load(SketchCnn::init_params(20, 1).unwrap(), 20).unwrap());
        let svc =
            ClassifierService::with_predictors([cnn], ClassRegistry::default(), Device::Cpu, false);

        let err = svc
            .predict(&PredictRequest::sequence(strokes()))
            .unwrap_err();
        assert!(matches!(err, ClassifierError::Load(LoadError::NotLoaded(_))));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_registry_size_must_match_model() {
        let cnn: Arc<dyn Predictor> =
            Arc::new(SketchCnn::load(SketchCnn::init_params(3, 1).unwrap(), 3).unwrap());
        let svc = ClassifierService::with_predictors(
            [cnn],
            ClassRegistry::default(),
            Device::Cpu,
            false,
        );

        let err = svc
            .predict(&PredictRequest::grid(vec![0.0; PIXEL_COUNT]))
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::Inference(InferenceError::Dimension(_))
        ));
    }
}
