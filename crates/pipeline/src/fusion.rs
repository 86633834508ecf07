//! Context fusion
//!
//! Deduplicates overlapping factual sentences across the top chunks
//! into cited bullet facts. The first chunk to contribute a sentence
//! owns its display form; later contributors only extend the fact's
//! supporting source set. A per-chunk sentence cap keeps one long
//! chunk from crowding out the rest.
//!
//! Sentence splitting is a simple punctuation/newline scan; known
//! abbreviations ("Dr. Smith") over-split. That is an accepted
//! heuristic limitation, not something this module tries to fix.

use seekr_common::model::{ChunkSource, FusedFact, ScoredChunk, SourceType};
use seekr_providers::{GenerationParams, ModelRouter, Profile};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maximum sentences taken from any single chunk
const SENTENCES_PER_CHUNK: usize = 3;

/// Minimum sentence length in characters
const MIN_SENTENCE_CHARS: usize = 40;

/// Minimum substantive (alphanumeric) characters per sentence
const MIN_SUBSTANTIVE_CHARS: usize = 20;

/// Maximum contradictions requested from the model
const MAX_CONTRADICTIONS: usize = 6;

/// Fusion result: facts plus their rendered forms
#[derive(Debug, Clone)]
pub struct FusionOutput {
    pub facts: Vec<FusedFact>,
    /// Bullet list, one line per fact with source tags
    pub fused_text: String,
    /// `S# : label` lines, one per top chunk
    pub source_map: String,
    /// Raw label per chunk, same order as the ranked chunks
    pub labels: Vec<String>,
    /// Best-effort cross-source contradictions; empty means none found
    pub contradictions: Vec<String>,
}

/// Split text into sentences on terminal punctuation or newlines
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
    current.clear();
}

/// Filter out fragments and headers
fn is_substantial(sentence: &str) -> bool {
    if sentence.chars().count() < MIN_SENTENCE_CHARS {
        return false;
    }
    let substantive = sentence.chars().filter(|c| c.is_alphanumeric()).count();
    substantive >= MIN_SUBSTANTIVE_CHARS
}

/// Dedup key: lowercase, punctuation stripped, whitespace collapsed
pub fn normalize_sentence(sentence: &str) -> String {
    sentence
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fuse the top chunks into deduplicated facts. Chunk indices in the
/// returned facts are 0-based positions in `scored`.
pub fn fuse_facts(scored: &[ScoredChunk], max_bullets: usize) -> Vec<FusedFact> {
    let mut facts: Vec<FusedFact> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for (chunk_index, scored_chunk) in scored.iter().enumerate() {
        let mut taken = 0;

        for sentence in split_sentences(&scored_chunk.chunk.text) {
            if taken >= SENTENCES_PER_CHUNK {
                break;
            }
            if !is_substantial(&sentence) {
                continue;
            }

            let key = normalize_sentence(&sentence);
            if key.is_empty() {
                continue;
            }

            match index_by_key.get(&key) {
                Some(&fact_index) => {
                    let fact = &mut facts[fact_index];
                    if !fact.support.contains(&chunk_index) {
                        fact.support.push(chunk_index);
                    }
                    taken += 1;
                }
                None => {
                    if facts.len() >= max_bullets {
                        continue;
                    }
                    index_by_key.insert(key.clone(), facts.len());
                    facts.push(FusedFact {
                        key,
                        display: sentence,
                        support: vec![chunk_index],
                    });
                    taken += 1;
                }
            }
        }
    }

    debug!(facts = facts.len(), chunks = scored.len(), "Context fused");
    facts
}

/// Human label for one chunk's source, varying by source type
pub fn source_label(source: &ChunkSource) -> String {
    match source.source_type {
        SourceType::Twitter => format!(
            "Twitter ({}) — {}",
            source.author.as_deref().unwrap_or("unknown"),
            source.url
        ),
        SourceType::Reddit => format!(
            "Reddit (r/{}) — {}",
            source.subreddit.as_deref().unwrap_or("unknown"),
            source.url
        ),
        SourceType::Youtube => format!("YouTube: {} — {}", source.title, source.url),
        SourceType::Instagram => format!(
            "Instagram ({}) — {}",
            source.author.as_deref().unwrap_or("unknown"),
            source.url
        ),
        _ => format!("{} — {}", source.title, source.url),
    }
}

/// Render facts as bullets with 1-based source tags
pub fn render_facts(facts: &[FusedFact]) -> String {
    facts
        .iter()
        .map(|fact| {
            let tags = fact
                .support
                .iter()
                .map(|i| format!("S{}", i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            format!("- {} [{}]", fact.display, tags)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the parallel source map
pub fn render_source_map(labels: &[String]) -> String {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| format!("S{}: {}", i + 1, label))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fusion engine; the router is only used for best-effort contradiction
/// detection
pub struct FusionEngine {
    router: Option<Arc<ModelRouter>>,
}

impl FusionEngine {
    pub fn new(router: Option<Arc<ModelRouter>>) -> Self {
        Self { router }
    }

    /// Fuse ranked chunks and render the context block. Contradiction
    /// detection is one extra model call; its failure yields an empty
    /// list, never an error.
    pub async fn fuse(
        &self,
        scored: &[ScoredChunk],
        max_bullets: usize,
        detect_contradictions: bool,
    ) -> FusionOutput {
        let facts = fuse_facts(scored, max_bullets);
        let labels: Vec<String> = scored
            .iter()
            .map(|s| source_label(&s.chunk.source))
            .collect();

        let fused_text = render_facts(&facts);
        let source_map = render_source_map(&labels);

        let contradictions = if detect_contradictions && !facts.is_empty() {
            self.detect_contradictions(&fused_text).await
        } else {
            Vec::new()
        };

        FusionOutput {
            facts,
            fused_text,
            source_map,
            labels,
            contradictions,
        }
    }

    async fn detect_contradictions(&self, fused_text: &str) -> Vec<String> {
        let Some(router) = &self.router else {
            return Vec::new();
        };

        let prompt = format!(
            "Below is a list of facts collected from different sources. \
            List up to {} factual contradictions between them, one per line, \
            each starting with \"- \". If there are no contradictions, reply \
            with exactly \"None\".\n\nFacts:\n{}",
            MAX_CONTRADICTIONS, fused_text
        );

        let params = GenerationParams {
            temperature: 0.0,
            max_tokens: 400,
        };

        match router.generate(Profile::Simple, &prompt, &params).await {
            Ok(response) => parse_contradictions(&response),
            Err(e) => {
                debug!(error = %e, "Contradiction detection failed, defaulting to none");
                Vec::new()
            }
        }
    }
}

fn parse_contradictions(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("- ").map(str::to_string)
        })
        .take(MAX_CONTRADICTIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekr_common::model::Chunk;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(
                text.to_string(),
                ChunkSource {
                    source_type: SourceType::Web,
                    url: "https://example.com/page".into(),
                    title: "Example Page".into(),
                    author: None,
                    subreddit: None,
                },
            ),
            score: 0.9,
        }
    }

    const FACT: &str =
        "The Eiffel Tower was completed in 1889 and stands 330 metres tall in Paris.";

    #[test]
    fn test_dedup_idempotence_same_sentence_two_chunks() {
        let chunks = vec![
            scored(FACT),
            scored(&format!("  {}  ", FACT.to_uppercase())),
        ];

        let facts = fuse_facts(&chunks, 10);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].support, vec![0, 1]);
        // Display form comes from the first contributor
        assert_eq!(facts[0].display, FACT);
    }

    #[test]
    fn test_support_grows_not_duplicates() {
        let text = format!("{} {}", FACT, FACT);
        let facts = fuse_facts(&[scored(&text)], 10);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].support, vec![0]);
    }

    #[test]
    fn test_per_chunk_sentence_cap() {
        let text = "The first long factual sentence describes something important here. \
            The second long factual sentence describes something different here. \
            The third long factual sentence describes yet another topic here. \
            The fourth long factual sentence should be cut by the diversity guard.";
        let facts = fuse_facts(&[scored(text)], 10);
        assert_eq!(facts.len(), SENTENCES_PER_CHUNK);
    }

    #[test]
    fn test_max_bullets_cap() {
        let chunks: Vec<ScoredChunk> = (0..10)
            .map(|i| {
                scored(&format!(
                    "Distinct factual sentence number {} carries enough substantial text.",
                    i
                ))
            })
            .collect();

        let facts = fuse_facts(&chunks, 4);
        assert_eq!(facts.len(), 4);
    }

    #[test]
    fn test_fragments_filtered() {
        let text = "Short one. Headers!\nAnother tiny bit? ---- ===== *****";
        let facts = fuse_facts(&[scored(text)], 10);
        assert!(facts.is_empty());
    }

    #[test]
    fn test_render_facts_tags() {
        let facts = vec![FusedFact {
            key: "k".into(),
            display: "A fact".into(),
            support: vec![0, 2],
        }];
        assert_eq!(render_facts(&facts), "- A fact [S1, S3]");
    }

    #[test]
    fn test_source_labels_by_type() {
        let mut source = ChunkSource {
            source_type: SourceType::Web,
            url: "https://example.com".into(),
            title: "Example".into(),
            author: Some("someone".into()),
            subreddit: Some("rust".into()),
        };
        assert_eq!(source_label(&source), "Example — https://example.com");

        source.source_type = SourceType::Reddit;
        assert_eq!(
            source_label(&source),
            "Reddit (r/rust) — https://example.com"
        );

        source.source_type = SourceType::Twitter;
        assert_eq!(
            source_label(&source),
            "Twitter (someone) — https://example.com"
        );
    }

    #[test]
    fn test_render_source_map_one_based() {
        let labels = vec!["First — url".to_string(), "Second — url".to_string()];
        let map = render_source_map(&labels);
        assert!(map.starts_with("S1: First"));
        assert!(map.contains("\nS2: Second"));
    }

    #[test]
    fn test_split_sentences_on_newlines() {
        let sentences = split_sentences("First line\nSecond line. Third!");
        assert_eq!(sentences, vec!["First line", "Second line.", "Third!"]);
    }

    #[test]
    fn test_abbreviation_oversplit_is_accepted() {
        // Documented limitation: "Dr. Smith" splits at the period
        let sentences = split_sentences("Dr. Smith spoke.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_parse_contradictions() {
        let parsed = parse_contradictions("- A says X, B says Y\n- C disagrees with D\nNone");
        assert_eq!(parsed.len(), 2);
        assert!(parse_contradictions("None").is_empty());
    }

    #[tokio::test]
    async fn test_engine_without_router_skips_contradictions() {
        let engine = FusionEngine::new(None);
        let output = engine.fuse(&[scored(FACT)], 10, true).await;
        assert_eq!(output.facts.len(), 1);
        assert!(output.contradictions.is_empty());
        assert!(output.fused_text.starts_with("- "));
        assert!(output.source_map.starts_with("S1: "));
    }
}
