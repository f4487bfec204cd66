use crate::error::LoadError;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use common::span_debug;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Name and shape of one parameter an architecture expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub shape: Vec<usize>,
    /// Fan-in used to scale freshly initialized values.
    pub fan_in: usize,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, shape: &[usize], fan_in: usize) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            fan_in,
        }
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Named f32 tensors on the CPU, keyed the same way as a PyTorch `state_dict`.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    tensors: BTreeMap<String, Tensor>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic uniform(-1/sqrt(fan_in), 1/sqrt(fan_in)) values for every spec.
    pub fn init(specs: &[ParamSpec], seed: u64) -> Result<Self, LoadError> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut store = Self::new();

        for spec in specs {
            let bound = 1.0 / (spec.fan_in.max(1) as f32).sqrt();
            let values: Vec<f32> = (0..spec.element_count())
                .map(|_| (rng.f32() * 2.0 - 1.0) * bound)
                .collect();
            let value = Tensor::from_vec(values, spec.shape.as_slice(), &Device::Cpu)?;
            store.insert(spec.name.clone(), value);
        }

        Ok(store)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Tensor) {
        self.tensors.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Strict state-dict check: same names, same shapes, f32, nothing extra.
    pub fn check(&self, expected: &[ParamSpec]) -> Result<(), LoadError> {
        for spec in expected {
            let value = self
                .tensors
                .get(&spec.name)
                .ok_or_else(|| LoadError::MissingParameter {
                    name: spec.name.clone(),
                })?;

            if value.dims() != spec.shape.as_slice() {
                return Err(LoadError::ShapeMismatch {
                    name: spec.name.clone(),
                    expected: spec.shape.clone(),
                    found: value.dims().to_vec(),
                });
            }
            if value.dtype() != DType::F32 {
                return Err(LoadError::UnsupportedDtype {
                    name: spec.name.clone(),
                    dtype: value.dtype().as_str().to_string(),
                });
            }
        }

        if let Some(name) = self
            .tensors
            .keys()
            .find(|name| !expected.iter().any(|spec| &spec.name == *name))
        {
            return Err(LoadError::UnexpectedParameter { name: name.clone() });
        }

        Ok(())
    }

    /// Hand the tensors to `candle-nn` layer constructors.
    ///
    /// Layers look parameters up by their `state_dict` path and fail on a
    /// missing name or a shape other than the one they ask for.
    pub fn into_var_builder(self) -> VarBuilder<'static> {
        let tensors: HashMap<String, Tensor> = self.tensors.into_iter().collect();
        VarBuilder::from_tensors(tensors, DType::F32, &Device::Cpu)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let buffer = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(path, &buffer)
    }

    fn parse(path: &Path, buffer: &[u8]) -> Result<Self, LoadError> {
        let _s = span_debug!("parse_weights");

        let tensors = candle_core::safetensors::load_buffer(buffer, &Device::Cpu).map_err(|e| {
            LoadError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let store = Self {
            tensors: tensors.into_iter().collect(),
        };

        tracing::debug!(
            path = %path.display(),
            tensors = store.len(),
            "Parsed weight artifact"
        );

        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let tensors: HashMap<&str, Tensor> = self
            .tensors
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();

        candle_core::safetensors::save(&tensors, path).map_err(|e| LoadError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
