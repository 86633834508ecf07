//! Configuration management for Seekr services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration.
///
/// Every section defaults so the gateway boots with no config file;
/// unconfigured providers simply run disabled.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cross-request cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Web/news search provider configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Social and reference source credentials
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generative-text provider configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Optional cross-encoder reranker configuration
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Pipeline tuning parameters
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Redis URL; when absent only the in-memory cache is used
    pub redis_url: Option<String>,

    /// Key prefix for namespacing
    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,

    /// Default TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,

    /// Maximum entries held by the in-memory fallback cache
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// API key for the primary SERP-style provider
    pub api_key: Option<String>,

    /// Provider endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Supplementary engines merged in when primary results are sparse
    #[serde(default = "default_extra_engines")]
    pub extra_engines: Vec<String>,

    /// Maximum organic results requested per call
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    /// Primary result count below which extra engines are consulted
    #[serde(default = "default_sparse_threshold")]
    pub sparse_threshold: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Encyclopedia search endpoint (opensearch-compatible)
    #[serde(default = "default_wiki_endpoint")]
    pub wiki_endpoint: String,

    /// Microblog API bearer token
    pub twitter_bearer: Option<String>,

    /// Forum API OAuth client id
    pub reddit_client_id: Option<String>,

    /// Forum API OAuth client secret
    pub reddit_client_secret: Option<String>,

    /// Video search API key
    pub youtube_api_key: Option<String>,

    /// Academic search API key (optional; public tier works without one)
    pub semantic_scholar_key: Option<String>,

    /// Photo-sharing API token
    pub instagram_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
}

/// A provider + model pair selectable by the routing policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// API key shared by OpenAI-compatible chat providers
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_generation_base")]
    pub api_base: String,

    /// Profile used for plain factual queries
    #[serde(default = "default_simple_model")]
    pub simple: ModelSpec,

    /// Profile used for recency/analysis/comparison queries
    #[serde(default = "default_deep_model")]
    pub deep: ModelSpec,

    /// Profile used for story/poem/ad-copy queries
    #[serde(default = "default_creative_model")]
    pub creative: ModelSpec,

    /// Hardcoded last-resort profile
    #[serde(default = "default_fallback_model")]
    pub fallback: ModelSpec,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Default max output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    /// Rerank endpoint; absent means cosine ordering is used directly
    pub endpoint: Option<String>,

    /// API key
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_rerank_timeout")]
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_rerank_timeout(),
        }
    }
}

/// Pipeline tuning parameters.
///
/// The confidence boost, threshold and diversity floor are empirically
/// chosen constants; they are configurable but the defaults are the
/// behavior-compatible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Multiplier applied to the on-topic hit fraction
    #[serde(default = "default_confidence_boost")]
    pub confidence_boost: f32,

    /// Confidence level at which collection rounds stop early
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Minimum distinct source categories required to stop early
    #[serde(default = "default_min_diversity")]
    pub min_source_diversity: usize,

    /// Maximum collection rounds per sub-task
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_max_len")]
    pub chunk_max_len: usize,

    /// Characters each chunk text is truncated to before embedding
    #[serde(default = "default_embed_truncate")]
    pub embed_truncate_chars: usize,

    /// Cosine candidate pool size (default profile)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Cosine candidate pool size (fast profile)
    #[serde(default = "default_pool_size_fast")]
    pub pool_size_fast: usize,

    /// Final top-K chunks kept for fusion
    #[serde(default = "default_top_chunks")]
    pub top_chunks: usize,

    /// Maximum fused facts rendered per sub-task
    #[serde(default = "default_max_bullets")]
    pub max_bullets: usize,

    /// Maximum pages fetched per sub-task
    #[serde(default = "default_max_web")]
    pub max_web: usize,

    /// Page fetch timeout in milliseconds (default profile)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Page fetch timeout in milliseconds (fast profile)
    #[serde(default = "default_fetch_timeout_fast_ms")]
    pub fetch_timeout_fast_ms: u64,

    /// Per-source collector branch timeout in milliseconds
    #[serde(default = "default_collect_timeout_ms")]
    pub collect_timeout_ms: u64,

    /// Page cache TTL in seconds
    #[serde(default = "default_page_cache_ttl")]
    pub page_cache_ttl_secs: u64,

    /// Search result cache TTL in seconds
    #[serde(default = "default_search_cache_ttl")]
    pub search_cache_ttl_secs: u64,

    /// Embedding cache TTL in seconds
    #[serde(default = "default_embed_cache_ttl")]
    pub embed_cache_ttl_secs: u64,

    /// Overall wall-clock deadline per request in seconds
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 300 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_cache_prefix() -> String { "seekr".to_string() }
fn default_cache_ttl() -> u64 { 600 }
fn default_memory_capacity() -> usize { 2048 }
fn default_search_endpoint() -> String { "https://serpapi.com/search".to_string() }
fn default_extra_engines() -> Vec<String> {
    vec!["bing".to_string(), "duckduckgo".to_string()]
}
fn default_search_max_results() -> usize { 10 }
fn default_sparse_threshold() -> usize { 3 }
fn default_search_timeout() -> u64 { 8 }
fn default_wiki_endpoint() -> String { "https://en.wikipedia.org/w/api.php".to_string() }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_embed_batch_size() -> usize { 100 }
fn default_generation_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_simple_model() -> ModelSpec {
    ModelSpec { provider: "openai".into(), model: "gpt-4o-mini".into() }
}
fn default_deep_model() -> ModelSpec {
    ModelSpec { provider: "openai".into(), model: "gpt-4o".into() }
}
fn default_creative_model() -> ModelSpec {
    ModelSpec { provider: "openai".into(), model: "gpt-4o".into() }
}
fn default_fallback_model() -> ModelSpec {
    ModelSpec { provider: "openai".into(), model: "gpt-4o-mini".into() }
}
fn default_generation_timeout() -> u64 { 30 }
fn default_max_tokens() -> usize { 1400 }
fn default_rerank_timeout() -> u64 { 10 }
fn default_confidence_boost() -> f32 { 1.25 }
fn default_confidence_threshold() -> f32 { 0.85 }
fn default_min_diversity() -> usize { 3 }
fn default_max_rounds() -> usize { 3 }
fn default_chunk_max_len() -> usize { 1500 }
fn default_embed_truncate() -> usize { 2000 }
fn default_pool_size() -> usize { 40 }
fn default_pool_size_fast() -> usize { 8 }
fn default_top_chunks() -> usize { 12 }
fn default_max_bullets() -> usize { 18 }
fn default_max_web() -> usize { 8 }
fn default_fetch_timeout_ms() -> u64 { 3000 }
fn default_fetch_timeout_fast_ms() -> u64 { 800 }
fn default_collect_timeout_ms() -> u64 { 8000 }
fn default_page_cache_ttl() -> u64 { 600 }
fn default_search_cache_ttl() -> u64 { 600 }
fn default_embed_cache_ttl() -> u64 { 3600 }
fn default_deadline_secs() -> u64 { 240 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "seekr".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl PipelineConfig {
    /// Page fetch timeout for the given latency profile
    pub fn fetch_timeout(&self, fast: bool) -> Duration {
        if fast {
            Duration::from_millis(self.fetch_timeout_fast_ms)
        } else {
            Duration::from_millis(self.fetch_timeout_ms)
        }
    }

    /// Cosine candidate pool size for the given latency profile
    pub fn pool(&self, fast: bool) -> usize {
        if fast {
            self.pool_size_fast
        } else {
            self.pool_size
        }
    }

    /// Overall request deadline
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_cache_prefix(),
            default_ttl_secs: default_cache_ttl(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_search_endpoint(),
            extra_engines: default_extra_engines(),
            max_results: default_search_max_results(),
            sparse_threshold: default_sparse_threshold(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            wiki_endpoint: default_wiki_endpoint(),
            twitter_bearer: None,
            reddit_client_id: None,
            reddit_client_secret: None,
            youtube_api_key: None,
            semantic_scholar_key: None,
            instagram_token: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_embed_batch_size(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_generation_base(),
            simple: default_simple_model(),
            deep: default_deep_model(),
            creative: default_creative_model(),
            fallback: default_fallback_model(),
            timeout_secs: default_generation_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_boost: default_confidence_boost(),
            confidence_threshold: default_confidence_threshold(),
            min_source_diversity: default_min_diversity(),
            max_rounds: default_max_rounds(),
            chunk_max_len: default_chunk_max_len(),
            embed_truncate_chars: default_embed_truncate(),
            pool_size: default_pool_size(),
            pool_size_fast: default_pool_size_fast(),
            top_chunks: default_top_chunks(),
            max_bullets: default_max_bullets(),
            max_web: default_max_web(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            fetch_timeout_fast_ms: default_fetch_timeout_fast_ms(),
            collect_timeout_ms: default_collect_timeout_ms(),
            page_cache_ttl_secs: default_page_cache_ttl(),
            search_cache_ttl_secs: default_search_cache_ttl(),
            embed_cache_ttl_secs: default_embed_cache_ttl(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
    }

    #[test]
    fn test_pipeline_defaults_preserved() {
        let pipeline = PipelineConfig::default();
        assert!((pipeline.confidence_boost - 1.25).abs() < f32::EPSILON);
        assert!((pipeline.confidence_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(pipeline.min_source_diversity, 3);
        assert_eq!(pipeline.max_rounds, 3);
    }

    #[test]
    fn test_profile_helpers() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.pool(false), 40);
        assert_eq!(pipeline.pool(true), 8);
        assert!(pipeline.fetch_timeout(true) < pipeline.fetch_timeout(false));
    }
}
