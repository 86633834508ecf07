//! Microblog and photo-sharing search clients
//!
//! Both are bearer-token APIs. A client built without its token is
//! disabled and returns empty results.

use crate::HitSource;
use async_trait::async_trait;
use seekr_common::errors::{AppError, Result};
use seekr_common::model::{Hit, SourceType};
use serde::Deserialize;
use std::time::Duration;

const TWITTER_SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
const INSTAGRAM_SEARCH_URL: &str = "https://graph.instagram.com/v18.0/ig_hashtag_search";

#[derive(Debug, Deserialize)]
struct TweetResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Microblog recent-search client
pub struct TwitterSearch {
    client: reqwest::Client,
    bearer: Option<String>,
}

impl TwitterSearch {
    pub fn new(bearer: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, bearer })
    }
}

#[async_trait]
impl HitSource for TwitterSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Twitter
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let Some(bearer) = &self.bearer else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(TWITTER_SEARCH_URL)
            .bearer_auth(bearer)
            .query(&[
                ("query", query),
                ("max_results", &max_results.clamp(10, 100).to_string()),
                ("tweet.fields", "author_id,created_at"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: "twitter".into(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "twitter".into(),
                message: format!("API error {}", response.status()),
            });
        }

        let parsed: TweetResponse = response.json().await.map_err(|e| AppError::Provider {
            provider: "twitter".into(),
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(parsed
            .data
            .into_iter()
            .take(max_results)
            .map(|tweet| Hit {
                title: truncate(&tweet.text, 80),
                url: format!("https://twitter.com/i/web/status/{}", tweet.id),
                snippet: tweet.text,
                source: SourceType::Twitter,
                published: tweet.created_at,
                author: tweet.author_id,
                subreddit: None,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct InstagramResponse {
    #[serde(default)]
    data: Vec<InstagramMedia>,
}

#[derive(Debug, Deserialize)]
struct InstagramMedia {
    id: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Photo-sharing hashtag search client
pub struct InstagramSearch {
    client: reqwest::Client,
    token: Option<String>,
}

impl InstagramSearch {
    pub fn new(token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, token })
    }
}

#[async_trait]
impl HitSource for InstagramSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Instagram
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let Some(token) = &self.token else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(INSTAGRAM_SEARCH_URL)
            .query(&[("q", query), ("access_token", token)])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: "instagram".into(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "instagram".into(),
                message: format!("API error {}", response.status()),
            });
        }

        let parsed: InstagramResponse = response.json().await.map_err(|e| AppError::Provider {
            provider: "instagram".into(),
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(parsed
            .data
            .into_iter()
            .take(max_results)
            .map(|media| {
                let caption = media.caption.unwrap_or_default();
                Hit {
                    title: truncate(&caption, 80),
                    url: media
                        .permalink
                        .unwrap_or_else(|| format!("https://www.instagram.com/p/{}/", media.id)),
                    snippet: caption,
                    source: SourceType::Instagram,
                    published: media.timestamp,
                    author: media.username,
                    subreddit: None,
                }
            })
            .collect())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_twitter_disabled_without_token() {
        let search = TwitterSearch::new(None, 2).unwrap();
        let hits = search.search("rust", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_instagram_disabled_without_token() {
        let search = InstagramSearch::new(None, 2).unwrap();
        let hits = search.search("rust", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 80), "short");
    }
}
