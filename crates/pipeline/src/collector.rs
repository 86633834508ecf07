//! Multi-source collector
//!
//! Fans out one search per requested source category. Every branch is
//! wrapped individually with a timeout so a failing provider yields an
//! empty list instead of aborting its siblings. Results are normalized
//! hits already; this layer deduplicates by normalized URL and merges
//! supplementary web engines when the primary results are sparse or
//! off-topic.

use seekr_common::cache::{keys, TieredCache};
use seekr_common::model::{Hit, SourceType};
use seekr_providers::HitSource;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Collector tuning derived from the pipeline config
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Per-branch timeout
    pub branch_timeout: Duration,
    /// Max hits requested per source
    pub max_results: usize,
    /// Primary web count below which extra engines are merged
    pub sparse_threshold: usize,
    /// Search result cache TTL
    pub cache_ttl_secs: u64,
}

pub struct Collector {
    sources: Vec<Arc<dyn HitSource>>,
    extra: Option<Arc<dyn HitSource>>,
    cache: TieredCache,
    settings: CollectorSettings,
}

impl Collector {
    pub fn new(
        sources: Vec<Arc<dyn HitSource>>,
        extra: Option<Arc<dyn HitSource>>,
        cache: TieredCache,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            sources,
            extra,
            cache,
            settings,
        }
    }

    /// Source categories this collector can serve
    pub fn available_sources(&self) -> Vec<SourceType> {
        self.sources.iter().map(|s| s.source_type()).collect()
    }

    /// Fan out to every requested source and gather normalized hits.
    /// Individual provider failures and timeouts degrade to empty
    /// lists; this method itself never fails.
    pub async fn collect(&self, query: &str, wanted: &[SourceType]) -> Vec<Hit> {
        let branches = self
            .sources
            .iter()
            .filter(|source| wanted.contains(&source.source_type()))
            .map(|source| self.run_branch(Arc::clone(source), query));

        let results = futures::future::join_all(branches).await;

        let mut hits: Vec<Hit> = Vec::new();
        for branch_hits in results {
            hits.extend(branch_hits);
        }

        let hits = dedup_hits(hits);

        // Merge supplementary engines when the primary web results are
        // sparse or none of them look on-topic
        let web_hits: Vec<&Hit> = hits
            .iter()
            .filter(|h| h.source == SourceType::Web)
            .collect();
        let needs_extra = wanted.contains(&SourceType::Web)
            && (web_hits.len() < self.settings.sparse_threshold
                || !web_hits.iter().any(|h| is_on_topic(h, query)));

        if needs_extra {
            if let Some(extra) = &self.extra {
                debug!(
                    query = %query,
                    web_hits = web_hits.len(),
                    "Primary web results sparse or off-topic, merging extra engines"
                );
                let extra_hits = self.run_branch(Arc::clone(extra), query).await;
                let mut merged = hits;
                merged.extend(extra_hits);
                return dedup_hits(merged);
            }
        }

        hits
    }

    /// One provider call: cache first, then a timeout-wrapped search
    /// whose failure yields an empty list
    async fn run_branch(&self, source: Arc<dyn HitSource>, query: &str) -> Vec<Hit> {
        let label = source.source_type().label().to_lowercase();
        let cache_key = keys::search(&label, query);

        if let Some(hits) = self.cache.get::<Vec<Hit>>(&cache_key).await {
            return hits;
        }

        let outcome = tokio::time::timeout(
            self.settings.branch_timeout,
            source.search(query, self.settings.max_results),
        )
        .await;

        let hits = match outcome {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(source = %label, error = %e, "Source search failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    source = %label,
                    timeout_ms = self.settings.branch_timeout.as_millis() as u64,
                    "Source search timed out"
                );
                Vec::new()
            }
        };

        seekr_common::metrics::record_collect(&label, hits.len());

        if !hits.is_empty() {
            self.cache
                .set_with_ttl(&cache_key, &hits, self.settings.cache_ttl_secs)
                .await;
        }

        hits
    }
}

/// Deduplicate hits by normalized URL, preserving collection order
pub fn dedup_hits(hits: Vec<Hit>) -> Vec<Hit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.dedup_key()))
        .collect()
}

/// Cheap on-topic check: title or snippet contains the query,
/// case-insensitively
pub fn is_on_topic(hit: &Hit, query: &str) -> bool {
    let query = query.to_lowercase();
    hit.title.to_lowercase().contains(&query) || hit.snippet.to_lowercase().contains(&query)
}

/// Progressive query rewriting across collection rounds: quoted exact
/// phrase with the current year, then encyclopedia/academic site
/// filters with an "explained" suffix
pub fn rewrite_query(query: &str, round: usize, year: i32) -> String {
    match round {
        0 => query.to_string(),
        1 => format!("\"{}\" {}", query, year),
        _ => format!("{} explained site:wikipedia.org OR site:arxiv.org", query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seekr_common::errors::{AppError, Result};

    struct StaticSource {
        source_type: SourceType,
        hits: Vec<Hit>,
        fail: bool,
    }

    #[async_trait]
    impl HitSource for StaticSource {
        fn source_type(&self) -> SourceType {
            self.source_type
        }

        async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<Hit>> {
            if self.fail {
                return Err(AppError::Provider {
                    provider: "static".into(),
                    message: "down".into(),
                });
            }
            Ok(self.hits.clone())
        }
    }

    fn hit(url: &str, title: &str, source: SourceType) -> Hit {
        Hit {
            title: title.into(),
            url: url.into(),
            snippet: String::new(),
            source,
            published: None,
            author: None,
            subreddit: None,
        }
    }

    fn settings() -> CollectorSettings {
        CollectorSettings {
            branch_timeout: Duration::from_millis(500),
            max_results: 10,
            sparse_threshold: 3,
            cache_ttl_secs: 60,
        }
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_abort_siblings() {
        let web = Arc::new(StaticSource {
            source_type: SourceType::Web,
            hits: vec![
                hit("https://a.com/1", "rust result", SourceType::Web),
                hit("https://a.com/2", "rust result 2", SourceType::Web),
                hit("https://a.com/3", "rust result 3", SourceType::Web),
            ],
            fail: false,
        });
        let wiki = Arc::new(StaticSource {
            source_type: SourceType::Wiki,
            hits: Vec::new(),
            fail: true,
        });

        let collector = Collector::new(
            vec![web, wiki],
            None,
            TieredCache::memory_only(16),
            settings(),
        );

        let hits = collector
            .collect("rust", &[SourceType::Web, SourceType::Wiki])
            .await;
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_dedup_across_sources() {
        let web = Arc::new(StaticSource {
            source_type: SourceType::Web,
            hits: vec![
                hit("https://a.com/1?x=1&y=2", "rust", SourceType::Web),
                hit("https://a.com/1?y=2&x=1", "rust dup", SourceType::Web),
                hit("https://a.com/2", "rust", SourceType::Web),
                hit("https://a.com/3", "rust", SourceType::Web),
            ],
            fail: false,
        });

        let collector = Collector::new(vec![web], None, TieredCache::memory_only(16), settings());
        let hits = collector.collect("rust", &[SourceType::Web]).await;
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_sparse_web_triggers_extra_engines() {
        let web = Arc::new(StaticSource {
            source_type: SourceType::Web,
            hits: vec![hit("https://a.com/1", "rust", SourceType::Web)],
            fail: false,
        });
        let extra = Arc::new(StaticSource {
            source_type: SourceType::Web,
            hits: vec![
                hit("https://b.com/1", "rust extra", SourceType::Web),
                hit("https://b.com/2", "rust extra 2", SourceType::Web),
            ],
            fail: false,
        });

        let collector = Collector::new(
            vec![web],
            Some(extra),
            TieredCache::memory_only(16),
            settings(),
        );

        let hits = collector.collect("rust", &[SourceType::Web]).await;
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_plentiful_on_topic_web_skips_extra() {
        let web = Arc::new(StaticSource {
            source_type: SourceType::Web,
            hits: vec![
                hit("https://a.com/1", "rust one", SourceType::Web),
                hit("https://a.com/2", "rust two", SourceType::Web),
                hit("https://a.com/3", "rust three", SourceType::Web),
            ],
            fail: false,
        });
        let extra = Arc::new(StaticSource {
            source_type: SourceType::Web,
            hits: vec![hit("https://b.com/1", "extra", SourceType::Web)],
            fail: false,
        });

        let collector = Collector::new(
            vec![web],
            Some(extra),
            TieredCache::memory_only(16),
            settings(),
        );

        let hits = collector.collect("rust", &[SourceType::Web]).await;
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_is_on_topic_case_insensitive() {
        let h = hit("https://a.com", "Rust Programming", SourceType::Web);
        assert!(is_on_topic(&h, "rust"));
        assert!(!is_on_topic(&h, "python"));
    }

    #[test]
    fn test_rewrite_query_rounds() {
        assert_eq!(rewrite_query("rust", 0, 2026), "rust");
        assert_eq!(rewrite_query("rust", 1, 2026), "\"rust\" 2026");
        assert!(rewrite_query("rust", 2, 2026).contains("site:wikipedia.org"));
    }
}
