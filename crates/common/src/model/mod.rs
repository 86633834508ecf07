//! Core data model for the answer pipeline
//!
//! Every provider response is normalized into these shapes at the
//! collector boundary; provider-specific field names never travel
//! further than the client that produced them. All entities are
//! request-scoped and never persisted (the cache stores serialized
//! copies purely as a performance optimization).

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Category of the provider a hit came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Web,
    News,
    Wiki,
    Reddit,
    Twitter,
    Youtube,
    Arxiv,
    SemanticScholar,
    Instagram,
}

impl SourceType {
    /// Human-readable label used in source maps
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::Web => "Web",
            SourceType::News => "News",
            SourceType::Wiki => "Wikipedia",
            SourceType::Reddit => "Reddit",
            SourceType::Twitter => "Twitter",
            SourceType::Youtube => "YouTube",
            SourceType::Arxiv => "arXiv",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::Instagram => "Instagram",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A normalized single search result from any provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: SourceType,

    /// Publication date when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,

    /// Author / account identifier when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Subreddit for forum hits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
}

impl Hit {
    /// Key used for cross-provider deduplication
    pub fn dedup_key(&self) -> String {
        normalize_url(&self.url)
    }

    /// Whether the hit carries enough inline text to be chunked directly
    /// without a page fetch (tweets, forum posts, video descriptions)
    pub fn is_self_contained(&self) -> bool {
        matches!(
            self.source,
            SourceType::Twitter | SourceType::Reddit | SourceType::Youtube | SourceType::Instagram
        )
    }
}

/// A fetched and extracted document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Provenance carried by every chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSource {
    pub source_type: SourceType,
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
}

impl From<&Hit> for ChunkSource {
    fn from(hit: &Hit) -> Self {
        Self {
            source_type: hit.source,
            url: hit.url.clone(),
            title: hit.title.clone(),
            author: hit.author.clone(),
            subreddit: hit.subreddit.clone(),
        }
    }
}

/// A bounded slice of source text, the unit of ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub text: String,
    pub source: ChunkSource,
}

impl Chunk {
    pub fn new(text: String, source: ChunkSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            source,
        }
    }
}

/// A chunk paired with its similarity score
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A deduplicated sentence-level claim with its supporting chunk indices.
///
/// `support` holds 0-based indices into the ranked chunk list, in
/// first-contribution order; it is never empty and only grows during
/// fusion.
#[derive(Debug, Clone)]
pub struct FusedFact {
    /// Normalized dedup key
    pub key: String,
    /// Original sentence text from the first contributing chunk
    pub display: String,
    pub support: Vec<usize>,
}

/// A citation flagged as missing by verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingCitation {
    pub snippet: String,
    pub suggestion: String,
}

/// Output of the post-hoc verification pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub contradictions: Vec<String>,
    pub missing_citations: Vec<MissingCitation>,
    pub confidence: f32,
    pub needs_retry: bool,
    pub refinements: Vec<String>,
}

impl Default for VerificationReport {
    /// Permissive default used when the critique call or its JSON parse
    /// fails
    fn default() -> Self {
        Self {
            contradictions: Vec::new(),
            missing_citations: Vec::new(),
            confidence: 0.6,
            needs_retry: false,
            refinements: Vec::new(),
        }
    }
}

/// Kind of a planned sub-task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    News,
    Transcript,
    Generic,
}

/// Geographic scope of a news sub-task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NewsScope {
    Country,
    City,
}

/// One decomposed unit of a multi-intent query; immutable after planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: Uuid,
    pub kind: TaskKind,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<NewsScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SubTask {
    pub fn generic(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TaskKind::Generic,
            query: query.into(),
            place: None,
            scope: None,
            date: None,
            month: None,
            year: None,
            title: None,
        }
    }
}

/// A cited source in the final payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// Final response payload for one answered query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub formatted_answer: String,
    pub sources: Vec<SourceRef>,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<SubTask>>,
    pub last_fetched: String,
}

/// Normalize a URL for deduplication and cache keying: lowercase scheme
/// and host, strip the fragment, sort query parameters. Unparseable
/// input falls back to the trimmed original.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };

    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        let query = pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&query));
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_sorts_params_and_strips_fragment() {
        let a = normalize_url("HTTPS://Example.com/page?b=2&a=1#section");
        let b = normalize_url("https://example.com/page?a=1&b=2");
        assert_eq!(a, b);
        assert!(!a.contains('#'));
    }

    #[test]
    fn test_normalize_url_unparseable_passthrough() {
        assert_eq!(normalize_url("  not a url  "), "not a url");
    }

    #[test]
    fn test_hit_dedup_key_matches_across_variants() {
        let hit1 = Hit {
            title: "Page".into(),
            url: "https://example.com/a?x=1&y=2".into(),
            snippet: String::new(),
            source: SourceType::Web,
            published: None,
            author: None,
            subreddit: None,
        };
        let hit2 = Hit {
            url: "https://EXAMPLE.com/a?y=2&x=1#frag".into(),
            ..hit1.clone()
        };
        assert_eq!(hit1.dedup_key(), hit2.dedup_key());
    }

    #[test]
    fn test_source_type_serde_snake_case() {
        let json = serde_json::to_string(&SourceType::SemanticScholar).unwrap();
        assert_eq!(json, "\"semantic_scholar\"");
    }

    #[test]
    fn test_self_contained_hits() {
        let mut hit = Hit {
            title: "t".into(),
            url: "https://x.com/1".into(),
            snippet: "s".into(),
            source: SourceType::Twitter,
            published: None,
            author: None,
            subreddit: None,
        };
        assert!(hit.is_self_contained());
        hit.source = SourceType::Web;
        assert!(!hit.is_self_contained());
    }
}
