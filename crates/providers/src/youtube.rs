//! Video search client
//!
//! API-key based; video descriptions double as self-contained snippets
//! so these hits skip the page fetch downstream.

use crate::HitSource;
use async_trait::async_trait;
use seekr_common::errors::{AppError, Result};
use seekr_common::model::{Hit, SourceType};
use serde::Deserialize;
use std::time::Duration;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct ItemId {
    #[serde(default, rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "channelTitle")]
    channel_title: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

pub struct YoutubeSearch {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl YoutubeSearch {
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl HitSource for YoutubeSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Youtube
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let Some(api_key) = &self.api_key else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", &max_results.to_string()),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: "youtube".into(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "youtube".into(),
                message: format!("API error {}", response.status()),
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| AppError::Provider {
            provider: "youtube".into(),
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(Hit {
                    title: item.snippet.title,
                    url: format!("https://www.youtube.com/watch?v={}", video_id),
                    snippet: item.snippet.description,
                    source: SourceType::Youtube,
                    published: item.snippet.published_at,
                    author: item.snippet.channel_title,
                    subreddit: None,
                })
            })
            .take(max_results)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_without_key() {
        let search = YoutubeSearch::new(None, 2).unwrap();
        let hits = search.search("rust", 5).await.unwrap();
        assert!(hits.is_empty());
    }
}
