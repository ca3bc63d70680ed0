use serde::{Deserialize, Serialize};

/// Scoping + exclusion rules shared identically by every `RetrievalEngine`
/// implementation (spec §4.2 "Filter semantics").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalFilter {
    pub knowledge_base_ids: Vec<String>,
    pub knowledge_ids: Vec<String>,
    pub exclude_knowledge_ids: Vec<String>,
    pub exclude_chunk_ids: Vec<String>,
}

/// The scoping predicate a filter resolves to, independent of any one
/// engine's query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// No scoping predicate at all (should not normally occur; callers are
    /// expected to always provide KBs or knowledge ids).
    None,
    KnowledgeBases(Vec<String>),
    Knowledge(Vec<String>),
    /// Both given: AND semantics. Documents within the given KBs whose
    /// knowledge id is also in the given list.
    Both { knowledge_base_ids: Vec<String>, knowledge_ids: Vec<String> },
}

impl RetrievalFilter {
    /// Resolves `knowledge_base_ids`/`knowledge_ids` into a [`Scope`] per
    /// spec §4.2: both given is AND, only one given is used alone.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match (self.knowledge_base_ids.is_empty(), self.knowledge_ids.is_empty()) {
            (false, false) => Scope::Both {
                knowledge_base_ids: self.knowledge_base_ids.clone(),
                knowledge_ids: self.knowledge_ids.clone(),
            },
            (false, true) => Scope::KnowledgeBases(self.knowledge_base_ids.clone()),
            (true, false) => Scope::Knowledge(self.knowledge_ids.clone()),
            (true, true) => Scope::None,
        }
    }

    /// True when a candidate entry passes this filter's scope and exclusion
    /// rules and the always-on `is_enabled` rule. Engines that can push
    /// this down into their query language should; this is the reference
    /// semantics every engine's generated query must agree with, and the
    /// form used directly by in-memory/test engines.
    #[must_use]
    pub fn matches(&self, entry: &rag_core::model::IndexEntry) -> bool {
        if !entry.enabled() {
            return false;
        }
        if self.exclude_knowledge_ids.iter().any(|id| id == &entry.knowledge_id) {
            return false;
        }
        if self.exclude_chunk_ids.iter().any(|id| id == &entry.chunk_id) {
            return false;
        }
        match self.scope() {
            Scope::None => true,
            Scope::KnowledgeBases(kbs) => kbs.iter().any(|kb| kb == &entry.knowledge_base_id),
            Scope::Knowledge(kids) => kids.iter().any(|k| k == &entry.knowledge_id),
            Scope::Both { knowledge_base_ids, knowledge_ids } => {
                knowledge_base_ids.iter().any(|kb| kb == &entry.knowledge_base_id)
                    && knowledge_ids.iter().any(|k| k == &entry.knowledge_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RetrievalFilter, Scope};
    use rag_core::model::IndexEntry;

    fn entry(kb: &str, knowledge: &str) -> IndexEntry {
        IndexEntry::new("1", "c1", "c1", "text", knowledge, kb, "hi", vec![0.1])
    }

    #[test]
    fn both_given_is_and() {
        let f = RetrievalFilter {
            knowledge_base_ids: vec!["kb1".into()],
            knowledge_ids: vec!["k1".into()],
            ..Default::default()
        };
        assert_eq!(
            f.scope(),
            Scope::Both { knowledge_base_ids: vec!["kb1".into()], knowledge_ids: vec!["k1".into()] }
        );
        assert!(f.matches(&entry("kb1", "k1")));
        assert!(!f.matches(&entry("kb1", "k2")));
        assert!(!f.matches(&entry("kb2", "k1")));
    }

    #[test]
    fn exclusions_apply_as_must_not() {
        let f = RetrievalFilter {
            knowledge_base_ids: vec!["kb1".into()],
            exclude_knowledge_ids: vec!["k1".into()],
            ..Default::default()
        };
        assert!(!f.matches(&entry("kb1", "k1")));
        assert!(f.matches(&entry("kb1", "k2")));
    }

    #[test]
    fn disabled_entries_never_match() {
        let f = RetrievalFilter::default();
        let mut e = entry("kb1", "k1");
        e.is_enabled = Some(false);
        assert!(!f.matches(&e));
    }
}
