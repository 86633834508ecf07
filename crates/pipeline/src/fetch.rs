//! Page fetch layer
//!
//! Retrieves and extracts readable text from arbitrary URLs under a
//! hard timeout. Every failure mode (network, timeout, non-2xx, empty
//! extraction) degrades to `None`; a failed fetch simply removes that
//! hit from downstream consideration and is never retried within the
//! same request.

use seekr_common::cache::{keys, TieredCache};
use seekr_common::errors::{AppError, Result};
use seekr_common::model::Page;
use seekr_providers::extract;
use std::time::{Duration, Instant};
use tracing::debug;

/// Desktop browser User-Agent; some sites serve stripped pages to
/// unknown agents
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub struct PageFetcher {
    client: reqwest::Client,
    cache: TieredCache,
    page_ttl_secs: u64,
}

impl PageFetcher {
    pub fn new(cache: TieredCache, page_ttl_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            cache,
            page_ttl_secs,
        })
    }

    /// Fetch and extract one page. The cache is consulted first; a
    /// cache hit skips the network entirely.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Option<Page> {
        let cache_key = keys::page(url);
        if let Some(page) = self.cache.get::<Page>(&cache_key).await {
            return Some(page);
        }

        let start = Instant::now();
        let page = match tokio::time::timeout(timeout, self.fetch_uncached(url)).await {
            Ok(Some(page)) => page,
            Ok(None) => {
                seekr_common::metrics::record_fetch(start.elapsed().as_secs_f64(), false);
                return None;
            }
            Err(_) => {
                debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Page fetch timed out");
                seekr_common::metrics::record_fetch(start.elapsed().as_secs_f64(), false);
                return None;
            }
        };

        seekr_common::metrics::record_fetch(start.elapsed().as_secs_f64(), true);
        self.cache
            .set_with_ttl(&cache_key, &page, self.page_ttl_secs)
            .await;
        Some(page)
    }

    async fn fetch_uncached(&self, url: &str) -> Option<Page> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "Page fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "Page fetch non-success status");
            return None;
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                debug!(url = %url, error = %e, "Failed to read page body");
                return None;
            }
        };

        let article = extract(&html);
        if article.text.trim().is_empty() {
            debug!(url = %url, "No readable text extracted");
            return None;
        }

        Some(Page {
            url: url.to_string(),
            title: article.title,
            text: article.text,
            author: article.author,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_url_degrades_to_none() {
        let fetcher = PageFetcher::new(TieredCache::memory_only(16), 600).unwrap();
        let page = fetcher
            .fetch("http://127.0.0.1:1/unreachable", Duration::from_millis(300))
            .await;
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let cache = TieredCache::memory_only(16);
        let cached = Page {
            url: "https://example.com/a".into(),
            title: "Cached".into(),
            text: "Cached body".into(),
            author: None,
        };
        cache
            .set_with_ttl(&keys::page("https://example.com/a"), &cached, 600)
            .await;

        let fetcher = PageFetcher::new(cache, 600).unwrap();
        let page = fetcher
            .fetch("https://example.com/a", Duration::from_millis(1))
            .await
            .expect("cached page");
        assert_eq!(page.title, "Cached");
    }
}
