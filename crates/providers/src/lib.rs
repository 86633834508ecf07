//! Seekr Provider Clients
//!
//! Every external collaborator the pipeline depends on lives here:
//! - Web/news search (SERP-style, with supplementary engines)
//! - Encyclopedia, forum, microblog, video, academic, photo sources
//! - Embedding provider (batched)
//! - Generative-text providers with a routing policy
//! - Optional cross-encoder reranker
//! - Article text extraction
//!
//! Provider responses are normalized to `seekr_common::model` shapes at
//! this boundary; provider-specific field names never leak past it. A
//! client constructed without its credential is disabled: it returns
//! empty results, never an error.

pub mod embedding;
pub mod extract;
pub mod generation;
pub mod rerank;
pub mod reddit;
pub mod scholar;
pub mod search;
pub mod social;
pub mod wiki;
pub mod youtube;

use async_trait::async_trait;
use seekr_common::errors::Result;
use seekr_common::model::{Hit, SourceType};

pub use embedding::{create_embedder, Embedder, HttpEmbedder, MockEmbedder};
pub use extract::{extract, Article};
pub use generation::{GenerationParams, Generator, ModelRouter, Profile};
pub use rerank::{RerankClient, RerankScore};

/// A search provider producing normalized hits for one source category
#[async_trait]
pub trait HitSource: Send + Sync {
    /// Category this provider's hits are tagged with
    fn source_type(&self) -> SourceType;

    /// Run one search; a disabled provider returns an empty list
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>>;
}
