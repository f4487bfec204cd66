use crate::error::RegistryError;
use std::collections::HashSet;

/// Sketch categories, in the order the models were trained to emit them.
pub const CLASS_NAMES: [&str; 20] = [
    "cat",
    "tree",
    "fish",
    "clock",
    "castle",
    "crown",
    "lollipop",
    "moon",
    "watermelon",
    "tornado",
    "apple",
    "bowtie",
    "bicycle",
    "diamond",
    "flower",
    "butterfly",
    "eye",
    "lightning",
    "cloud",
    "pizza",
];

/// Ordered label list. Index `i` of a model's output vector is scored
/// against `labels[i]`, so the order never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRegistry {
    labels: Vec<String>,
}

impl ClassRegistry {
    pub fn new<I, S>(labels: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(RegistryError::DuplicateLabel(label.clone()));
            }
        }

        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self {
            labels: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = ClassRegistry::default();
        assert_eq!(registry.len(), 20);
        assert_eq!(registry.label(0), Some("cat"));
        assert_eq!(registry.label(9), Some("tornado"));
        assert_eq!(registry.label(19), Some("pizza"));
        assert_eq!(registry.label(20), None);
        assert_eq!(registry.index_of("bowtie"), Some(11));
        assert_eq!(registry.index_of("dog"), None);
    }

    #[test]
    fn test_default_labels_are_unique() {
        let registry = ClassRegistry::new(CLASS_NAMES).unwrap();
        assert_eq!(registry, ClassRegistry::default());
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert_eq!(
            ClassRegistry::new(Vec::<String>::new()),
            Err(RegistryError::Empty)
        );
        assert_eq!(
            ClassRegistry::new(["cat", "moon", "cat"]),
            Err(RegistryError::DuplicateLabel("cat".to_string()))
        );
    }
}
