use crate::error::InputError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Shape of the drawing carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// 28x28 rasterized grayscale drawing.
    Grid,
    /// Ordered `[dx, dy, pen_state]` stroke steps.
    Sequence,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Grid => "grid",
            Modality::Sequence => "sequence",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two predictors the service can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Convolutional network over the pixel grid (`model1`).
    Grid,
    /// Recurrent network over stroke sequences (`model2`).
    Sequence,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Grid, ModelVariant::Sequence];

    /// Identifier used on the wire and as the artifact file stem.
    pub fn id(&self) -> &'static str {
        match self {
            ModelVariant::Grid => "model1",
            ModelVariant::Sequence => "model2",
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            ModelVariant::Grid => Modality::Grid,
            ModelVariant::Sequence => Modality::Sequence,
        }
    }

    pub fn for_modality(modality: Modality) -> Self {
        match modality {
            Modality::Grid => ModelVariant::Grid,
            Modality::Sequence => ModelVariant::Sequence,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "model1" | "grid" | "cnn" => Some(ModelVariant::Grid),
            "model2" | "sequence" | "rnn" => Some(ModelVariant::Sequence),
            _ => None,
        }
    }

    /// Pick the variant for a request.
    ///
    /// Without a selector the variant follows the payload. An unrecognised
    /// selector falls back to the sequence variant unless `strict` is set.
    pub fn resolve(
        selector: Option<&str>,
        modality: Modality,
        strict: bool,
    ) -> Result<Self, InputError> {
        let Some(selector) = selector else {
            return Ok(Self::for_modality(modality));
        };

        match Self::from_id(selector) {
            Some(variant) => Ok(variant),
            None if strict => Err(InputError::UnknownModel(selector.to_string())),
            None => {
                tracing::warn!(
                    model = selector,
                    fallback = ModelVariant::Sequence.id(),
                    "Unknown model selector, using sequence model"
                );
                Ok(ModelVariant::Sequence)
            }
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Compute device a predictor is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|ordinal| ordinal.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| {
                    format!(
                        "{} is not a supported device. Use `cpu`, `cuda` or `cuda:N`.",
                        other
                    )
                }),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
