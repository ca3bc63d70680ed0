//! A dependency-free embedder for local exercising (SPEC_FULL §B "Test
//! tooling"): a hashed bag-of-words vector, exactly
//! `eval/src/embedding.rs`'s `EmbeddingInner::Hashed` backend, generalized
//! from an eval-only fallback into `rag-cli`'s only embedder so the demo
//! never needs a model download or network call.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rag_core::collaborators::Embedder;
use rag_core::AppError;

pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut token_count = 0f32;
        for token in tokens(text) {
            token_count += 1.0;
            let idx = bucket(&token, self.dimension);
            vector[idx] += 1.0;
        }
        if token_count == 0.0 {
            return vector;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashedEmbedder {
    fn dimension(&self) -> u32 {
        u32::try_from(self.dimension).unwrap_or(u32::MAX)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(self.embed_sync(text))
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric()).filter(|token| !token.is_empty()).map(str::to_ascii_lowercase)
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

#[cfg(test)]
mod tests {
    use super::HashedEmbedder;

    #[test]
    fn same_text_hashes_to_same_vector() {
        let embedder = HashedEmbedder::new(32);
        assert_eq!(embedder.embed_sync("rotate certificates"), embedder.embed_sync("rotate certificates"));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashedEmbedder::new(16);
        assert_eq!(embedder.embed_sync(""), vec![0.0; 16]);
    }
}
