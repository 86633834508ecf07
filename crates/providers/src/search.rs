//! Web and news search via a SERP-style provider
//!
//! One shared client drives three hit sources: primary web results,
//! news results, and a supplementary fan-out over alternate engines
//! used when the primary results are sparse or off-topic.

use crate::HitSource;
use async_trait::async_trait;
use seekr_common::config::SearchConfig;
use seekr_common::errors::{AppError, Result};
use seekr_common::model::{Hit, SourceType};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    news_results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

/// Shared SERP API client
pub struct SerpClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_results: usize,
}

impl SerpClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
        })
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn query(&self, engine: &str, query: &str) -> Result<SerpResponse> {
        let Some(api_key) = &self.api_key else {
            return Ok(SerpResponse {
                organic_results: Vec::new(),
                news_results: Vec::new(),
            });
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", engine),
                ("q", query),
                ("num", &self.max_results.to_string()),
                ("api_key", api_key),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: format!("serp:{}", engine),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Provider {
                provider: format!("serp:{}", engine),
                message: format!("API error {}", status),
            });
        }

        response.json().await.map_err(|e| AppError::Provider {
            provider: format!("serp:{}", engine),
            message: format!("Failed to parse response: {}", e),
        })
    }
}

fn organic_to_hit(result: OrganicResult, source: SourceType) -> Option<Hit> {
    if result.link.is_empty() {
        return None;
    }
    Some(Hit {
        title: result.title,
        url: result.link,
        snippet: result.snippet,
        source,
        published: result.date,
        author: None,
        subreddit: None,
    })
}

/// Primary web search source
pub struct WebSearch {
    serp: Arc<SerpClient>,
}

impl WebSearch {
    pub fn new(serp: Arc<SerpClient>) -> Self {
        Self { serp }
    }
}

#[async_trait]
impl HitSource for WebSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Web
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let response = self.serp.query("google", query).await?;
        Ok(response
            .organic_results
            .into_iter()
            .filter_map(|r| organic_to_hit(r, SourceType::Web))
            .take(max_results)
            .collect())
    }
}

/// News search source; prefers the provider's news vertical, falls back
/// to organic results
pub struct NewsSearch {
    serp: Arc<SerpClient>,
}

impl NewsSearch {
    pub fn new(serp: Arc<SerpClient>) -> Self {
        Self { serp }
    }
}

#[async_trait]
impl HitSource for NewsSearch {
    fn source_type(&self) -> SourceType {
        SourceType::News
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let response = self.serp.query("google_news", query).await?;

        let mut hits: Vec<Hit> = response
            .news_results
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| Hit {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
                source: SourceType::News,
                published: r.date,
                author: r.source,
                subreddit: None,
            })
            .collect();

        if hits.is_empty() {
            hits = response
                .organic_results
                .into_iter()
                .filter_map(|r| organic_to_hit(r, SourceType::News))
                .collect();
        }

        hits.truncate(max_results);
        Ok(hits)
    }
}

/// Supplementary fan-out over alternate web engines, merged in when the
/// primary web results are sparse or off-topic
pub struct ExtraEngineSearch {
    serp: Arc<SerpClient>,
    engines: Vec<String>,
}

impl ExtraEngineSearch {
    pub fn new(serp: Arc<SerpClient>, engines: Vec<String>) -> Self {
        Self { serp, engines }
    }
}

#[async_trait]
impl HitSource for ExtraEngineSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Web
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let mut hits = Vec::new();

        for engine in &self.engines {
            match self.serp.query(engine, query).await {
                Ok(response) => {
                    hits.extend(
                        response
                            .organic_results
                            .into_iter()
                            .filter_map(|r| organic_to_hit(r, SourceType::Web)),
                    );
                }
                Err(e) => {
                    debug!(engine = %engine, error = %e, "Extra engine failed, skipping");
                }
            }
            if hits.len() >= max_results {
                break;
            }
        }

        hits.truncate(max_results);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_client() -> Arc<SerpClient> {
        let config = SearchConfig {
            api_key: None,
            endpoint: "https://serpapi.invalid/search".into(),
            extra_engines: vec!["bing".into()],
            max_results: 10,
            sparse_threshold: 3,
            timeout_secs: 2,
        };
        Arc::new(SerpClient::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_disabled_client_returns_empty() {
        let web = WebSearch::new(disabled_client());
        let hits = web.search("rust", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_extra_engines_disabled_returns_empty() {
        let extra = ExtraEngineSearch::new(disabled_client(), vec!["bing".into()]);
        let hits = extra.search("rust", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_organic_without_link_dropped() {
        let result = OrganicResult {
            title: "t".into(),
            link: String::new(),
            snippet: "s".into(),
            date: None,
        };
        assert!(organic_to_hit(result, SourceType::Web).is_none());
    }
}
