//! Seekr Common Library
//!
//! Shared code for the Seekr answer backend including:
//! - Core data model (hits, pages, chunks, plans)
//! - Error types and handling
//! - Configuration management
//! - Tiered cross-request caching
//! - Metrics and observability

pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod model;

// Re-export commonly used types
pub use cache::TieredCache;
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use model::{Chunk, Hit, Page, ScoredChunk, SourceType};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
