//! Encyclopedia search via the MediaWiki search API
//!
//! No credential required; the public API works anonymously.

use crate::HitSource;
use async_trait::async_trait;
use seekr_common::errors::{AppError, Result};
use seekr_common::model::{Hit, SourceType};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct WikiResponse {
    #[serde(default)]
    query: Option<WikiQuery>,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    search: Vec<WikiResult>,
}

#[derive(Debug, Deserialize)]
struct WikiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

pub struct WikiSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl WikiSearch {
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, endpoint })
    }

    /// Article URL derived from the title, MediaWiki convention
    fn article_url(title: &str) -> String {
        format!(
            "https://en.wikipedia.org/wiki/{}",
            title.replace(' ', "_")
        )
    }

    /// Search snippets come back with highlight markup; strip the tags
    fn strip_markup(snippet: &str) -> String {
        let re = regex_lite::Regex::new(r"<[^>]+>").unwrap();
        re.replace_all(snippet, "").to_string()
    }
}

#[async_trait]
impl HitSource for WikiSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Wiki
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("srlimit", &max_results.to_string()),
                ("srsearch", query),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: "wiki".into(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "wiki".into(),
                message: format!("API error {}", response.status()),
            });
        }

        let parsed: WikiResponse = response.json().await.map_err(|e| AppError::Provider {
            provider: "wiki".into(),
            message: format!("Failed to parse response: {}", e),
        })?;

        let results = parsed.query.map(|q| q.search).unwrap_or_default();

        Ok(results
            .into_iter()
            .filter(|r| !r.title.is_empty())
            .map(|r| Hit {
                url: Self::article_url(&r.title),
                snippet: Self::strip_markup(&r.snippet),
                title: r.title,
                source: SourceType::Wiki,
                published: None,
                author: None,
                subreddit: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_url() {
        assert_eq!(
            WikiSearch::article_url("Rust (programming language)"),
            "https://en.wikipedia.org/wiki/Rust_(programming_language)"
        );
    }

    #[test]
    fn test_strip_markup() {
        let stripped =
            WikiSearch::strip_markup("The <span class=\"searchmatch\">Rust</span> language");
        assert_eq!(stripped, "The Rust language");
    }
}
