//! Forum search client with OAuth client-credentials flow
//!
//! The token manager tracks expiry and refreshes under a single mutex,
//! so concurrent requests never trigger duplicate refreshes.

use crate::HitSource;
use async_trait::async_trait;
use seekr_common::errors::{AppError, Result};
use seekr_common::model::{Hit, SourceType};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const SEARCH_URL: &str = "https://oauth.reddit.com/search.json";
const USER_AGENT: &str = "seekr/0.3 (answer backend)";

/// Refresh slightly before the reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// OAuth token manager with single-flight refresh
pub struct TokenManager {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(client: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    /// Get a valid token, refreshing if absent or near expiry. The
    /// mutex is held across the refresh so concurrent callers wait for
    /// one refresh instead of issuing their own.
    pub async fn get(&self) -> Result<String> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing forum OAuth token");
        let refreshed = self.refresh().await?;
        let access_token = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(access_token)
    }

    async fn refresh(&self) -> Result<CachedToken> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("User-Agent", USER_AGENT)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: "reddit".into(),
                message: format!("Token request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "reddit".into(),
                message: format!("Token request error {}", response.status()),
            });
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| AppError::Provider {
            provider: "reddit".into(),
            message: format!("Failed to parse token response: {}", e),
        })?;

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    created_utc: Option<f64>,
}

/// Forum search source
pub struct RedditSearch {
    client: reqwest::Client,
    tokens: Option<TokenManager>,
}

impl RedditSearch {
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let tokens = match (client_id, client_secret) {
            (Some(id), Some(secret)) => Some(TokenManager::new(client.clone(), id, secret)),
            _ => None,
        };

        Ok(Self { client, tokens })
    }
}

#[async_trait]
impl HitSource for RedditSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Reddit
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let Some(tokens) = &self.tokens else {
            return Ok(Vec::new());
        };

        let token = tokens.get().await?;

        let response = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(&token)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("q", query),
                ("limit", &max_results.to_string()),
                ("sort", "relevance"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: "reddit".into(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "reddit".into(),
                message: format!("API error {}", response.status()),
            });
        }

        let listing: Listing = response.json().await.map_err(|e| AppError::Provider {
            provider: "reddit".into(),
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(listing
            .data
            .children
            .into_iter()
            .take(max_results)
            .map(|child| {
                let post = child.data;
                let snippet: String = post.selftext.chars().take(400).collect();
                Hit {
                    title: post.title,
                    url: format!("https://www.reddit.com{}", post.permalink),
                    snippet,
                    source: SourceType::Reddit,
                    published: post.created_utc.map(|ts| ts.to_string()),
                    author: Some(post.author),
                    subreddit: Some(post.subreddit),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_without_credentials() {
        let search = RedditSearch::new(None, None, 2).unwrap();
        let hits = search.search("rust", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_partial_credentials_disable_provider() {
        let search = RedditSearch::new(Some("id".into()), None, 2).unwrap();
        let hits = search.search("rust", 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
