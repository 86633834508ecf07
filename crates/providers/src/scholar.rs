//! Academic paper search: arXiv (Atom feed) and Semantic Scholar (JSON)
//!
//! The arXiv API only speaks Atom; entries are pulled out with a small
//! streaming parse rather than a full feed model.

use crate::HitSource;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use seekr_common::errors::{AppError, Result};
use seekr_common::model::{Hit, SourceType};
use serde::Deserialize;
use std::time::Duration;

const ARXIV_URL: &str = "https://export.arxiv.org/api/query";
const S2_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";

#[derive(Debug, Default)]
struct ArxivEntry {
    title: String,
    summary: String,
    id: String,
    published: Option<String>,
    author: Option<String>,
}

/// Parse Atom entries from the arXiv response body
fn parse_arxiv_feed(xml: &str) -> Vec<ArxivEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "entry" {
                    current = Some(ArxivEntry::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("entry") {
                    if let Some(entry) = current.take() {
                        if !entry.id.is_empty() {
                            entries.push(entry);
                        }
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(entry) = current.as_mut() {
                    let value = text.unescape().unwrap_or_default().to_string();
                    match path.last().map(String::as_str) {
                        Some("title") => entry.title = value,
                        Some("summary") => entry.summary = value,
                        Some("id") => entry.id = value,
                        Some("published") => entry.published = Some(value),
                        Some("name") if entry.author.is_none() => entry.author = Some(value),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    entries
}

pub struct ArxivSearch {
    client: reqwest::Client,
}

impl ArxivSearch {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HitSource for ArxivSearch {
    fn source_type(&self) -> SourceType {
        SourceType::Arxiv
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let response = self
            .client
            .get(ARXIV_URL)
            .query(&[
                ("search_query", format!("all:{}", query).as_str()),
                ("max_results", &max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider {
                provider: "arxiv".into(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "arxiv".into(),
                message: format!("API error {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| AppError::Provider {
            provider: "arxiv".into(),
            message: format!("Failed to read response: {}", e),
        })?;

        Ok(parse_arxiv_feed(&body)
            .into_iter()
            .take(max_results)
            .map(|entry| Hit {
                title: entry.title.split_whitespace().collect::<Vec<_>>().join(" "),
                url: entry.id,
                snippet: entry
                    .summary
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
                source: SourceType::Arxiv,
                published: entry.published,
                author: entry.author,
                subreddit: None,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct S2Response {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    #[serde(default)]
    title: String,
    #[serde(default)]
    r#abstract: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<S2Author>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    #[serde(default)]
    name: String,
}

pub struct SemanticScholarSearch {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SemanticScholarSearch {
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
impl HitSource for SemanticScholarSearch {
    fn source_type(&self) -> SourceType {
        SourceType::SemanticScholar
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Hit>> {
        let mut request = self.client.get(S2_URL).query(&[
            ("query", query),
            ("limit", &max_results.to_string()),
            ("fields", "title,abstract,url,year,authors"),
        ]);

        // Public tier works without a key; the key only raises limits
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request.send().await.map_err(|e| AppError::Provider {
            provider: "semantic_scholar".into(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(AppError::Provider {
                provider: "semantic_scholar".into(),
                message: format!("API error {}", response.status()),
            });
        }

        let parsed: S2Response = response.json().await.map_err(|e| AppError::Provider {
            provider: "semantic_scholar".into(),
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(parsed
            .data
            .into_iter()
            .filter_map(|paper| {
                let url = paper.url?;
                Some(Hit {
                    title: paper.title,
                    url,
                    snippet: paper.r#abstract.unwrap_or_default(),
                    source: SourceType::SemanticScholar,
                    published: paper.year.map(|y| y.to_string()),
                    author: paper.authors.first().map(|a| a.name.clone()),
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

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v1</id>
    <title>Attention Is All
      You Need</title>
    <summary>We propose a new architecture.</summary>
    <published>2021-01-01T00:00:00Z</published>
    <author><name>A. Researcher</name></author>
    <author><name>B. Researcher</name></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2101.00002v1</id>
    <title>Second Paper</title>
    <summary>Another abstract.</summary>
    <published>2021-02-01T00:00:00Z</published>
    <author><name>C. Researcher</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_arxiv_feed() {
        let entries = parse_arxiv_feed(SAMPLE_FEED);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "http://arxiv.org/abs/2101.00001v1");
        assert_eq!(entries[0].author.as_deref(), Some("A. Researcher"));
        assert_eq!(entries[1].title, "Second Paper");
    }

    #[test]
    fn test_parse_arxiv_feed_empty() {
        assert!(parse_arxiv_feed("<feed></feed>").is_empty());
        assert!(parse_arxiv_feed("not xml at all").is_empty());
    }

    #[test]
    fn test_feed_title_ignored_outside_entry() {
        let entries = parse_arxiv_feed(SAMPLE_FEED);
        assert!(entries[0].title.starts_with("Attention"));
    }
}
