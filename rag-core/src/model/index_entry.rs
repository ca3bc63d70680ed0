use serde::{Deserialize, Serialize};

/// A single retrievable unit stored by a [`crate::EngineType`] backend.
///
/// Mirrors the teacher's `stored_object!`-wrapped chunk rows, generalized
/// away from any one storage engine: `dimension` always equals
/// `embedding.len()`, enforced by [`IndexEntry::new`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub chunk_id: String,
    pub source_id: String,
    pub source_type: String,
    pub knowledge_id: String,
    pub knowledge_base_id: String,
    pub content: String,
    /// Half-precision embedding values, stored as `f32` in memory and
    /// narrowed to `half::f16` at the storage boundary by each engine.
    pub embedding: Vec<f32>,
    pub dimension: u32,
    /// Tri-state: `None` means "enabled" (legacy rows with no flag ever
    /// written); `Some(false)` is the only state that excludes a row.
    pub is_enabled: Option<bool>,
}

impl IndexEntry {
    /// Builds an entry, deriving `dimension` from the embedding length so the
    /// two can never drift apart.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        chunk_id: impl Into<String>,
        source_id: impl Into<String>,
        source_type: impl Into<String>,
        knowledge_id: impl Into<String>,
        knowledge_base_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let dimension = u32::try_from(embedding.len()).unwrap_or(u32::MAX);
        Self {
            id: id.into(),
            chunk_id: chunk_id.into(),
            source_id: source_id.into(),
            source_type: source_type.into(),
            knowledge_id: knowledge_id.into(),
            knowledge_base_id: knowledge_base_id.into(),
            content: content.into(),
            embedding,
            dimension,
            is_enabled: None,
        }
    }

    /// `is_enabled IS NULL OR is_enabled = true`, applied uniformly by every
    /// engine's filter semantics.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.is_enabled != Some(false)
    }

    /// True when this entry is a generated-question row rather than a
    /// regular chunk, per the `source_id = chunk_id + "-" + question_id`
    /// convention.
    #[must_use]
    pub fn is_generated_question(&self) -> bool {
        self.source_id != self.chunk_id && self.source_id.starts_with(&format!("{}-", self.chunk_id))
    }
}

#[cfg(test)]
mod tests {
    use super::IndexEntry;

    #[test]
    fn dimension_tracks_embedding_len() {
        let e = IndexEntry::new("1", "c1", "c1", "text", "k1", "kb1", "hello", vec![0.1, 0.2, 0.3]);
        assert_eq!(e.dimension, 3);
        assert!(e.enabled());
    }

    #[test]
    fn generated_question_detection() {
        let mut e = IndexEntry::new("1", "c1", "c1", "text", "k1", "kb1", "hello", vec![0.1]);
        assert!(!e.is_generated_question());
        e.source_id = "c1-q1".to_string();
        assert!(e.is_generated_question());
    }

    #[test]
    fn disabled_flag_excludes() {
        let mut e = IndexEntry::new("1", "c1", "c1", "text", "k1", "kb1", "hello", vec![0.1]);
        assert!(e.enabled());
        e.is_enabled = Some(false);
        assert!(!e.enabled());
        e.is_enabled = Some(true);
        assert!(e.enabled());
    }
}
