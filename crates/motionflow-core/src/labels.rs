//! # Label Vocabulary
//!
//! Gesture names in class-index order. Vocabularies built from a dataset are
//! sorted and deduplicated, so the same label set always yields the same
//! mapping. Vocabularies read back from disk keep the stored order, since
//! that order is what the saved model was trained against.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MotionflowError, Result};

/// File name of the label side-file inside model and export directories.
pub const LABELS_FILE: &str = "labels.json";

/// Ordered gesture class names, serialized as `{ "labels": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    /// Builds a vocabulary from any label sequence, sorting and deduplicating.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        Self {
            labels: unique.into_iter().collect(),
        }
    }

    /// Class index of `label`.
    pub fn index_of(&self, label: &str) -> Result<u32> {
        self.labels
            .iter()
            .position(|known| known == label)
            .map(|idx| idx as u32)
            .ok_or_else(|| MotionflowError::UnknownLabel(label.to_string()))
    }

    /// Label for a class index.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Writes the vocabulary as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| MotionflowError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| MotionflowError::io(path, e))
    }

    /// Reads a label file exactly as stored. Duplicate labels are rejected
    /// because two class indices cannot share one name.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MotionflowError::io(path, e))?;
        let vocabulary: Self =
            serde_json::from_str(&content).map_err(|e| MotionflowError::json(path, e))?;

        let duplicate = {
            let mut seen = BTreeSet::new();
            vocabulary
                .labels
                .iter()
                .find(|label| !seen.insert(label.as_str()))
                .cloned()
        };
        if let Some(dup) = duplicate {
            return Err(MotionflowError::InvalidManifest(format!(
                "{} lists label {dup:?} more than once",
                path.display()
            )));
        }
        Ok(vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_and_deduplicated() {
        let vocab = LabelVocabulary::from_labels(["swipe_right", "circle", "swipe_left", "circle"]);
        assert_eq!(vocab.labels(), ["circle", "swipe_left", "swipe_right"]);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn order_independent_of_input_order() {
        let a = LabelVocabulary::from_labels(["b", "a", "c"]);
        let b = LabelVocabulary::from_labels(["c", "b", "a", "a"]);
        assert_eq!(a, b);
    }

    #[test]
    fn index_lookup() {
        let vocab = LabelVocabulary::from_labels(["wave", "pinch"]);
        assert_eq!(vocab.index_of("pinch").unwrap(), 0);
        assert_eq!(vocab.index_of("wave").unwrap(), 1);
        assert_eq!(vocab.label(1), Some("wave"));
        assert!(matches!(
            vocab.index_of("fist"),
            Err(MotionflowError::UnknownLabel(_))
        ));
    }

    #[test]
    fn json_shape() {
        let vocab = LabelVocabulary::from_labels(["swipe_right", "swipe_left"]);
        let json = serde_json::to_value(&vocab).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "labels": ["swipe_left", "swipe_right"] })
        );
    }

    #[test]
    fn load_keeps_stored_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABELS_FILE);
        std::fs::write(&path, r#"{"labels":["zoom","alpha"]}"#).unwrap();

        let vocab = LabelVocabulary::load(&path).unwrap();
        assert_eq!(vocab.labels(), ["zoom", "alpha"]);
        assert_eq!(vocab.index_of("alpha").unwrap(), 1);
    }

    #[test]
    fn load_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABELS_FILE);
        std::fs::write(&path, r#"{"labels":["wave","fist","wave"]}"#).unwrap();

        assert!(matches!(
            LabelVocabulary::load(&path),
            Err(MotionflowError::InvalidManifest(msg)) if msg.contains("wave")
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LABELS_FILE);
        let vocab = LabelVocabulary::from_labels(["open_palm", "fist"]);
        vocab.save(&path).unwrap();
        assert_eq!(LabelVocabulary::load(&path).unwrap(), vocab);
    }
}
