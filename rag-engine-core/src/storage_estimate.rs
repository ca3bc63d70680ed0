//! Per-entry storage cost model (spec §4.2 "Storage estimation"), used only
//! for capacity planning, never for query behavior.

use rag_core::model::IndexEntry;

const METADATA_OVERHEAD_BYTES: u64 = 200;
const ID_TRACKER_BYTES: u64 = 24;

/// `content_bytes + 2*dim (half-precision vector) + 200 (metadata overhead)
/// + 2*(2*dim) (HNSW) + 24 (id tracker)`.
#[must_use]
pub fn estimate_entry_bytes(entry: &IndexEntry) -> u64 {
    let content_bytes = entry.content.len() as u64;
    let dim = u64::from(entry.dimension);
    let vector_bytes = 2 * dim;
    let hnsw_bytes = 2 * (2 * dim);
    content_bytes + vector_bytes + METADATA_OVERHEAD_BYTES + hnsw_bytes + ID_TRACKER_BYTES
}

/// Total estimated bytes for a batch, plus an `extras` allowance for
/// caller-supplied auxiliary structures (e.g. payload indexes) not captured
/// by the per-entry model.
#[must_use]
pub fn estimate_storage_size(entries: &[IndexEntry], extras: u64) -> u64 {
    entries.iter().map(estimate_entry_bytes).sum::<u64>() + extras
}

#[cfg(test)]
mod tests {
    use super::{estimate_entry_bytes, estimate_storage_size};
    use rag_core::model::IndexEntry;

    #[test]
    fn matches_formula() {
        let e = IndexEntry::new("1", "c1", "c1", "text", "k1", "kb1", "hello", vec![0.0; 128]);
        let expected = 5 /* "hello" */ + 2 * 128 + 200 + 2 * (2 * 128) + 24;
        assert_eq!(estimate_entry_bytes(&e), expected);
    }

    #[test]
    fn batch_adds_extras() {
        let e = IndexEntry::new("1", "c1", "c1", "text", "k1", "kb1", "hi", vec![0.0; 4]);
        let total = estimate_storage_size(&[e.clone(), e], 100);
        assert_eq!(total, 2 * estimate_entry_bytes(&IndexEntry::new("1", "c1", "c1", "text", "k1", "kb1", "hi", vec![0.0; 4])) + 100);
    }
}
