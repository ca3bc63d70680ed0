//! Dimension-sharding helpers shared by the Qdrant (collection-per-dimension)
//! and, conceptually, any future per-dimension-partitioned backend (spec
//! §4.2 "Dimension sharding").

/// Physical collection/table name for a logical `base` name at embedding
/// `dim`: `"<base>_<dim>"`.
#[must_use]
pub fn sharded_name(base: &str, dim: u32) -> String {
    format!("{base}_{dim}")
}

/// A concurrent-safe "has this shard been initialized" tracker. Creation
/// must be idempotent under races: two concurrent callers asking to
/// initialize the same `(base, dim)` pair must both succeed without double
/// creating the underlying collection.
///
/// Uses double-checked locking over a `dashmap::DashSet`, matching the
/// teacher's use of `dashmap` for its own initialized-collections set.
#[derive(Debug, Default)]
pub struct ShardRegistry {
    initialized: dashmap::DashSet<String>,
}

impl ShardRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_initialized(&self, base: &str, dim: u32) -> bool {
        self.initialized.contains(&sharded_name(base, dim))
    }

    /// Marks `(base, dim)` as initialized, returning `true` if this call
    /// was the one that actually inserted it (i.e. the caller that should
    /// create the collection), `false` if another caller already had.
    #[must_use]
    pub fn mark_initialized(&self, base: &str, dim: u32) -> bool {
        self.initialized.insert(sharded_name(base, dim))
    }

    /// All sharded names initialized so far for `base`, for callers that
    /// need to sweep every known dimension shard (e.g. a chunk-id update
    /// with no dimension of its own to key on).
    #[must_use]
    pub fn known_names(&self, base: &str) -> Vec<String> {
        let prefix = format!("{base}_");
        self.initialized.iter().filter(|name| name.starts_with(&prefix)).map(|name| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{sharded_name, ShardRegistry};

    #[test]
    fn name_format() {
        assert_eq!(sharded_name("aiplusall_kb_embeddings", 1536), "aiplusall_kb_embeddings_1536");
    }

    #[test]
    fn mark_initialized_is_idempotent() {
        let reg = ShardRegistry::new();
        assert!(!reg.is_initialized("base", 768));
        assert!(reg.mark_initialized("base", 768));
        assert!(reg.is_initialized("base", 768));
        assert!(!reg.mark_initialized("base", 768));
    }
}
