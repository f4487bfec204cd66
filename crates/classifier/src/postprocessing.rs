use crate::engine::ProbabilityVector;
use crate::registry::ClassRegistry;
use common::span_debug;
use serde::{Deserialize, Serialize};

const CONFIDENCE_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// Every class of the registry, most likely first.
///
/// Serializes as a bare JSON array of `{label, confidence}` objects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedResult(Vec<Prediction>);

impl RankedResult {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.0.iter()
    }

    /// The `n` most likely classes.
    pub fn top(&self, n: usize) -> &[Prediction] {
        &self.0[..n.min(self.0.len())]
    }
}

impl IntoIterator for RankedResult {
    type Item = Prediction;
    type IntoIter = std::vec::IntoIter<Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Round to the 4 decimals reported to clients.
pub fn round_confidence(p: f32) -> f32 {
    let scale = 10f32.powi(CONFIDENCE_DECIMALS);
    (p * scale).round() / scale
}

/// Pair every probability with its label and sort descending.
///
/// Ordering uses the unrounded values; equal probabilities keep registry
/// order. Rounding only affects the reported confidence.
pub fn rank(probs: &ProbabilityVector, registry: &ClassRegistry) -> RankedResult {
    let _s = span_debug!("rank");

    let mut order: Vec<(usize, f32)> = probs.as_slice().iter().copied().enumerate().collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    let predictions = order
        .into_iter()
        .filter_map(|(index, p)| {
            registry.label(index).map(|label| Prediction {
                label: label.to_string(),
                confidence: round_confidence(p),
            })
        })
        .collect();

    RankedResult(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    /// Builds a probability vector whose values are exactly `values`.
    fn probs(values: &[f32]) -> ProbabilityVector {
        // log(p) logits give back p after softmax when sum(p) == 1.
        let logits: Array1<f32> = values.iter().map(|p| p.ln()).collect();
        ProbabilityVector::from_logits(logits.view())
    }

    fn registry(labels: &[&str]) -> ClassRegistry {
        ClassRegistry::new(labels.iter().copied()).unwrap()
    }

    #[test]
    fn test_rank_orders_descending_and_rounds() {
        let result = rank(&probs(&[0.1, 0.6, 0.3]), &registry(&["a", "b", "c"]));
        let labels: Vec<&str> = result.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["b", "c", "a"]);

        for p in result.iter() {
            assert_eq!(p.confidence, round_confidence(p.confidence));
        }
        assert!((result.top(1)[0].confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_rank_covers_every_class_once() {
        let reg = ClassRegistry::default();
        let uniform = ProbabilityVector::from_logits(Array1::zeros(reg.len()).view());
        let result = rank(&uniform, &reg);

        assert_eq!(result.len(), 20);
        let mut labels: Vec<&str> = result.iter().map(|p| p.label.as_str()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 20, "Each label appears exactly once");
    }

    #[test]
    fn test_equal_probabilities_keep_registry_order() {
        let reg = ClassRegistry::default();
        let uniform = ProbabilityVector::from_logits(Array1::zeros(reg.len()).view());
        let result = rank(&uniform, &reg);

        let labels: Vec<&str> = result.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, reg.labels().collect::<Vec<_>>());
        assert!(result.iter().all(|p| p.confidence == 0.05));
    }

    #[test]
    fn test_ordering_uses_unrounded_probabilities() {
        // Both round to 0.1234; the larger raw value must still come first.
        let values = [0.12341f32, 0.12344, 1.0 - 0.12341 - 0.12344];
        let probs = ProbabilityVector::from_logits(
            values.iter().map(|p| p.ln()).collect::<Array1<f32>>().view(),
        );
        assert!(probs.get(1).unwrap() > probs.get(0).unwrap());

        let result = rank(&probs, &registry(&["first", "second", "rest"]));
        let top: Vec<(&str, f32)> = result
            .iter()
            .map(|p| (p.label.as_str(), p.confidence))
            .collect();
        assert_eq!(top[0].0, "rest");
        assert_eq!(top[1], ("second", 0.1234));
        assert_eq!(top[2], ("first", 0.1234));
    }

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(0.87654), 0.8765);
        assert_eq!(round_confidence(0.00004), 0.0);
        assert_eq!(round_confidence(1.0), 1.0);
    }

    #[test]
    fn test_ranked_result_serializes_as_array() {
        let result = rank(&probs(&[0.25, 0.75]), &registry(&["cat", "tree"]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"label": "tree", "confidence": 0.75},
                {"label": "cat", "confidence": 0.25}
            ])
        );
    }

    #[test]
    fn test_top_clamps_to_length() {
        let result = rank(&probs(&[0.5, 0.5]), &registry(&["x", "y"]));
        assert_eq!(result.top(5).len(), 2);
        assert_eq!(result.top(0).len(), 0);
    }
}
