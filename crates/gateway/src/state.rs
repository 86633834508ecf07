//! Shared application state: provider wiring and the orchestrator

use seekr_common::cache::TieredCache;
use seekr_common::config::AppConfig;
use seekr_common::errors::Result;
use seekr_pipeline::collector::{Collector, CollectorSettings};
use seekr_pipeline::fetch::PageFetcher;
use seekr_pipeline::fusion::FusionEngine;
use seekr_pipeline::orchestrator::Orchestrator;
use seekr_pipeline::ranker::{Ranker, RankerSettings};
use seekr_pipeline::synthesizer::Synthesizer;
use seekr_pipeline::verifier::Verifier;
use seekr_providers::reddit::RedditSearch;
use seekr_providers::scholar::{ArxivSearch, SemanticScholarSearch};
use seekr_providers::search::{ExtraEngineSearch, NewsSearch, SerpClient, WebSearch};
use seekr_providers::social::{InstagramSearch, TwitterSearch};
use seekr_providers::wiki::WikiSearch;
use seekr_providers::youtube::YoutubeSearch;
use seekr_providers::{create_embedder, HitSource, ModelRouter, RerankClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Wire every provider client and assemble the pipeline
    pub async fn build(config: Arc<AppConfig>) -> Result<Self> {
        let cache = TieredCache::from_settings(&config.cache).await;

        let serp = Arc::new(SerpClient::new(&config.search)?);
        let timeout = config.search.timeout_secs;

        let mut sources: Vec<Arc<dyn HitSource>> = vec![
            Arc::new(WebSearch::new(Arc::clone(&serp))),
            Arc::new(NewsSearch::new(Arc::clone(&serp))),
            Arc::new(WikiSearch::new(
                config.sources.wiki_endpoint.clone(),
                timeout,
            )?),
            Arc::new(TwitterSearch::new(
                config.sources.twitter_bearer.clone(),
                timeout,
            )?),
            Arc::new(RedditSearch::new(
                config.sources.reddit_client_id.clone(),
                config.sources.reddit_client_secret.clone(),
                timeout,
            )?),
            Arc::new(YoutubeSearch::new(
                config.sources.youtube_api_key.clone(),
                timeout,
            )?),
            Arc::new(ArxivSearch::new(timeout)?),
            Arc::new(SemanticScholarSearch::new(
                config.sources.semantic_scholar_key.clone(),
                timeout,
            )?),
        ];
        if config.sources.instagram_token.is_some() {
            sources.push(Arc::new(InstagramSearch::new(
                config.sources.instagram_token.clone(),
                timeout,
            )?));
        }

        let extra: Option<Arc<dyn HitSource>> = if serp.enabled()
            && !config.search.extra_engines.is_empty()
        {
            Some(Arc::new(ExtraEngineSearch::new(
                Arc::clone(&serp),
                config.search.extra_engines.clone(),
            )))
        } else {
            None
        };

        let collector = Collector::new(
            sources,
            extra,
            cache.clone(),
            CollectorSettings {
                branch_timeout: Duration::from_millis(config.pipeline.collect_timeout_ms),
                max_results: config.search.max_results,
                sparse_threshold: config.search.sparse_threshold,
                cache_ttl_secs: config.pipeline.search_cache_ttl_secs,
            },
        );

        let fetcher = PageFetcher::new(cache.clone(), config.pipeline.page_cache_ttl_secs)?;

        let embedder = create_embedder(&config.embedding);
        let reranker = if config.rerank.endpoint.is_some() {
            Some(Arc::new(RerankClient::new(&config.rerank)?))
        } else {
            None
        };
        let ranker = Ranker::new(
            embedder,
            reranker,
            cache.clone(),
            RankerSettings {
                truncate_chars: config.pipeline.embed_truncate_chars,
                embed_cache_ttl_secs: config.pipeline.embed_cache_ttl_secs,
            },
        );

        let router = Arc::new(ModelRouter::from_config(&config.generation));
        let fusion = FusionEngine::new(Some(Arc::clone(&router)));
        let synthesizer = Synthesizer::new(Arc::clone(&router), config.generation.max_tokens);
        let verifier = Verifier::new(router);

        let orchestrator = Orchestrator::new(
            collector,
            fetcher,
            ranker,
            fusion,
            synthesizer,
            verifier,
            config.pipeline.clone(),
        );

        info!(
            search_configured = config.search.api_key.is_some(),
            generation_configured = config.generation.api_key.is_some(),
            redis = config.cache.redis_url.is_some(),
            "Pipeline assembled"
        );

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
        })
    }
}
