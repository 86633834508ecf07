//! Embedding-based similarity ranking
//!
//! Two-stage design: a cheap wide recall pass (cosine similarity over
//! batch embeddings) selects a bounded candidate pool, then an optional
//! cross-encoder rerank refines the final top-K. If the reranker is
//! unconfigured or fails, the cosine ordering is used directly.
//!
//! Embeddings are cached per exact input text: the same text embeds
//! identically every time, so a long TTL is sound. A failed embedding
//! batch degrades to zero vectors (scoring 0 against everything)
//! rather than failing the request.

use seekr_common::cache::{keys, TieredCache};
use seekr_common::model::{Chunk, ScoredChunk};
use seekr_providers::{Embedder, RerankClient};
use std::sync::Arc;
use tracing::warn;

/// Guards the cosine denominator against all-zero vectors
const EPSILON: f32 = 1e-12;

/// Cosine similarity between two vectors. Symmetric; an all-zero
/// vector scores 0 against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..len {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    dot / (norm_a.sqrt() * norm_b.sqrt() + EPSILON)
}

#[derive(Debug, Clone)]
pub struct RankerSettings {
    /// Characters each text is truncated to before embedding
    pub truncate_chars: usize,
    /// Embedding cache TTL
    pub embed_cache_ttl_secs: u64,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            truncate_chars: 2000,
            embed_cache_ttl_secs: 3600,
        }
    }
}

pub struct Ranker {
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<RerankClient>>,
    cache: TieredCache,
    settings: RankerSettings,
}

impl Ranker {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<RerankClient>>,
        cache: TieredCache,
        settings: RankerSettings,
    ) -> Self {
        Self {
            embedder,
            reranker,
            cache,
            settings,
        }
    }

    /// Rank chunks against the query: cosine recall into a bounded
    /// pool, optional rerank, final top-K in descending score order.
    /// Ties keep the original collection order (stable sort).
    pub async fn rank(
        &self,
        query: &str,
        chunks: &[Chunk],
        pool_size: usize,
        top_k: usize,
        use_rerank: bool,
    ) -> Vec<ScoredChunk> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let mut texts = Vec::with_capacity(chunks.len() + 1);
        texts.push(truncate_chars(query, self.settings.truncate_chars));
        for chunk in chunks {
            texts.push(truncate_chars(&chunk.text, self.settings.truncate_chars));
        }

        let vectors = self.embed_cached(&texts).await;
        let query_vector = &vectors[0];

        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vector, &vectors[i + 1]),
            })
            .collect();

        // Stable sort: equal scores keep collection order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(pool_size.max(1));

        if use_rerank {
            if let Some(reranker) = &self.reranker {
                match self.rerank_pool(query, &scored, top_k, reranker).await {
                    Some(reranked) => return reranked,
                    None => {
                        warn!("Rerank unavailable, falling back to cosine ordering");
                    }
                }
            }
        }

        scored.truncate(top_k.max(1));
        scored
    }

    async fn rerank_pool(
        &self,
        query: &str,
        pool: &[ScoredChunk],
        top_k: usize,
        reranker: &RerankClient,
    ) -> Option<Vec<ScoredChunk>> {
        let documents: Vec<String> = pool
            .iter()
            .map(|s| truncate_chars(&s.chunk.text, self.settings.truncate_chars))
            .collect();

        match reranker.rerank(query, &documents, top_k).await {
            Ok(scores) => Some(
                scores
                    .into_iter()
                    .filter_map(|s| {
                        pool.get(s.index).map(|candidate| ScoredChunk {
                            chunk: candidate.chunk.clone(),
                            score: s.relevance_score,
                        })
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "Cross-encoder rerank failed");
                None
            }
        }
    }

    /// Embed texts with a per-text cache; cache misses are batched to
    /// the provider, and a failed batch degrades to zero vectors
    async fn embed_cached(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let model = self.embedder.model_name().to_string();

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut miss_slots = Vec::new();
        let mut miss_texts = Vec::new();

        for text in texts {
            let key = keys::embedding(&model, text);
            match self.cache.get::<Vec<f32>>(&key).await {
                Some(vector) => vectors.push(Some(vector)),
                None => {
                    miss_slots.push(vectors.len());
                    miss_texts.push(text.clone());
                    vectors.push(None);
                }
            }
        }

        if !miss_texts.is_empty() {
            match self.embedder.embed_batch(&miss_texts).await {
                Ok(embedded) => {
                    for (slot, vector) in miss_slots.iter().zip(embedded) {
                        let key = keys::embedding(&model, &texts[*slot]);
                        self.cache
                            .set_with_ttl(&key, &vector, self.settings.embed_cache_ttl_secs)
                            .await;
                        vectors[*slot] = Some(vector);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Embedding batch failed, substituting zero vectors");
                }
            }
        }

        let dimension = self.embedder.dimension();
        vectors
            .into_iter()
            .map(|v| v.unwrap_or_else(|| vec![0.0; dimension]))
            .collect()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seekr_common::errors::Result;
    use seekr_common::model::{ChunkSource, SourceType};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    /// Deterministic embedder: the vector is a pure function of the
    /// input text, so rank() output is reproducible across runs
    struct FixtureEmbedder;

    fn fixture_vector(text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..8)
            .map(|i| ((seed >> (i * 8)) & 0xff) as f32 / 255.0 + 0.01)
            .collect()
    }

    #[async_trait]
    impl Embedder for FixtureEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(fixture_vector(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| fixture_vector(t)).collect())
        }

        fn model_name(&self) -> &str {
            "fixture"
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    /// Embedder that always fails, for the zero-vector degrade path
    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(seekr_common::errors::AppError::Embedding {
                message: "down".into(),
            })
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(seekr_common::errors::AppError::Embedding {
                message: "down".into(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk::new(
            text.to_string(),
            ChunkSource {
                source_type: SourceType::Web,
                url: "https://example.com".into(),
                title: "Example".into(),
                author: None,
                subreddit: None,
            },
        )
    }

    fn ranker(embedder: Arc<dyn Embedder>) -> Ranker {
        Ranker::new(
            embedder,
            None,
            TieredCache::memory_only(64),
            RankerSettings::default(),
        )
    }

    #[test]
    fn test_cosine_symmetry() {
        let a = vec![0.5, 0.2, 0.9];
        let b = vec![0.1, 0.8, 0.3];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_self_similarity() {
        let a = vec![0.5, 0.2, 0.9];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_cosine_zero_vector_scores_zero() {
        let zero = vec![0.0; 3];
        let a = vec![0.5, 0.2, 0.9];
        assert_eq!(cosine_similarity(&zero, &a), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[tokio::test]
    async fn test_rank_deterministic_under_fixed_embeddings() {
        let ranker = ranker(Arc::new(FixtureEmbedder));
        let chunks = vec![
            chunk("alpha text"),
            chunk("bravo text"),
            chunk("charlie text"),
            chunk("delta text"),
        ];

        let first = ranker.rank("query", &chunks, 10, 4, false).await;
        let second = ranker.rank("query", &chunks, 10, 4, false).await;

        let ids_first: Vec<_> = first.iter().map(|s| s.chunk.id).collect();
        let ids_second: Vec<_> = second.iter().map(|s| s.chunk.id).collect();
        assert_eq!(ids_first, ids_second);

        // Descending scores
        for pair in first.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_rank_ties_keep_collection_order() {
        // Identical texts embed identically: tied scores must keep
        // original order
        let ranker = ranker(Arc::new(FixtureEmbedder));
        let chunks = vec![chunk("same text"), chunk("same text"), chunk("same text")];
        let ids: Vec<_> = chunks.iter().map(|c| c.id).collect();

        let ranked = ranker.rank("query", &chunks, 10, 3, false).await;
        let ranked_ids: Vec<_> = ranked.iter().map(|s| s.chunk.id).collect();
        assert_eq!(ids, ranked_ids);
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_zero_scores() {
        let ranker = ranker(Arc::new(FailingEmbedder));
        let chunks = vec![chunk("a"), chunk("b")];

        let ranked = ranker.rank("query", &chunks, 10, 2, false).await;
        assert_eq!(ranked.len(), 2);
        for scored in &ranked {
            assert_eq!(scored.score, 0.0);
        }
    }

    #[tokio::test]
    async fn test_unconfigured_reranker_falls_back_to_cosine() {
        let reranker = Arc::new(
            RerankClient::new(&seekr_common::config::RerankConfig::default()).unwrap(),
        );
        let ranker = Ranker::new(
            Arc::new(FixtureEmbedder),
            Some(reranker),
            TieredCache::memory_only(64),
            RankerSettings::default(),
        );

        let chunks = vec![chunk("alpha"), chunk("bravo"), chunk("charlie")];
        let with_rerank = ranker.rank("query", &chunks, 10, 2, true).await;
        let without = ranker.rank("query", &chunks, 10, 2, false).await;

        let a: Vec<_> = with_rerank.iter().map(|s| s.chunk.id).collect();
        let b: Vec<_> = without.iter().map(|s| s.chunk.id).collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_pool_and_top_k_bounds() {
        let ranker = ranker(Arc::new(FixtureEmbedder));
        let chunks: Vec<Chunk> = (0..20).map(|i| chunk(&format!("text {}", i))).collect();

        let ranked = ranker.rank("query", &chunks, 8, 5, false).await;
        assert_eq!(ranked.len(), 5);
    }
}
