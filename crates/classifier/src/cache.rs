use crate::backend::Predictor;
use crate::error::LoadError;
use crate::loader::ModelLoader;
use crate::variant::ModelVariant;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// When weight artifacts are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Load every variant once at startup and share it across requests.
    #[default]
    Eager,
    /// Reload the selected variant from disk on every request.
    PerRequest,
}

enum Source {
    Loaded(HashMap<ModelVariant, Arc<dyn Predictor>>),
    Disk(ModelLoader),
}

/// Hands out a ready predictor per variant.
pub struct PredictorCache {
    source: Source,
    class_count: usize,
}

impl PredictorCache {
    /// With [`LoadStrategy::Eager`] every artifact must load, so a broken
    /// deployment fails at startup instead of on the first request.
    pub fn build(
        strategy: LoadStrategy,
        loader: ModelLoader,
        class_count: usize,
    ) -> Result<Self, LoadError> {
        let source = match strategy {
            LoadStrategy::Eager => {
                let mut predictors = HashMap::with_capacity(ModelVariant::ALL.len());
                for variant in ModelVariant::ALL {
                    predictors.insert(variant, loader.load(variant, class_count)?);
                }
                Source::Loaded(predictors)
            }
            LoadStrategy::PerRequest => {
                tracing::info!(
                    weights_dir = %loader.weights_dir().display(),
                    "Models will be loaded per request"
                );
                Source::Disk(loader)
            }
        };

        Ok(Self {
            source,
            class_count,
        })
    }

    /// Cache over predictors that are already built.
    pub fn from_predictors(
        predictors: impl IntoIterator<Item = Arc<dyn Predictor>>,
        class_count: usize,
    ) -> Self {
        let predictors = predictors
            .into_iter()
            .map(|p| (p.variant(), p))
            .collect();

        Self {
            source: Source::Loaded(predictors),
            class_count,
        }
    }

    pub fn strategy(&self) -> LoadStrategy {
        match self.source {
            Source::Loaded(_) => LoadStrategy::Eager,
            Source::Disk(_) => LoadStrategy::PerRequest,
        }
    }

    pub fn acquire(&self, variant: ModelVariant) -> Result<Arc<dyn Predictor>, LoadError> {
        match &self.source {
            Source::Loaded(predictors) => predictors
                .get(&variant)
                .cloned()
                .ok_or(LoadError::NotLoaded(variant)),
            Source::Disk(loader) => loader.load(variant, self.class_count),
        }
    }
}
