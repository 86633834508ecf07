//! Optional cross-encoder rerank provider
//!
//! Scores a bounded candidate pool against the query. Callers fall back
//! to the cosine ordering whenever this client is unconfigured or fails.

use seekr_common::config::RerankConfig;
use seekr_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct RerankScore {
    pub index: usize,
    pub relevance_score: f32,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankScore>,
}

pub struct RerankClient {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl RerankClient {
    pub fn new(config: &RerankConfig) -> Result<Self> {
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
        })
    }

    pub fn enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Score documents against the query, highest relevance first
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankScore>> {
        let Some(endpoint) = &self.endpoint else {
            return Err(AppError::Rerank {
                message: "Reranker not configured".to_string(),
            });
        };

        let mut request = self.client.post(endpoint).json(&RerankRequest {
            query,
            documents,
            top_n,
        });

        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await.map_err(|e| AppError::Rerank {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            return Err(AppError::Rerank {
                message: format!("API error {}", response.status()),
            });
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| AppError::Rerank {
            message: format!("Failed to parse response: {}", e),
        })?;

        let mut results: Vec<RerankScore> = parsed
            .results
            .into_iter()
            .filter(|r| r.index < documents.len())
            .collect();
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_n);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_rerank_errors() {
        let client = RerankClient::new(&RerankConfig::default()).unwrap();
        assert!(!client.enabled());

        let result = client.rerank("q", &["doc".to_string()], 5).await;
        assert!(result.is_err());
    }
}
