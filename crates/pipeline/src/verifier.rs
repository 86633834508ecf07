//! Post-hoc answer verification
//!
//! One self-critique generation call inspects the answer against the
//! fused facts and reports contradictions, missing citations and a
//! confidence score. The model's JSON is located by its outermost
//! brace span; any parse or provider failure yields a permissive
//! default instead of failing the request. Heuristic overrides always
//! apply on top of the model's self-report.

use seekr_common::model::{MissingCitation, SourceRef, VerificationReport};
use seekr_providers::{GenerationParams, ModelRouter, Profile};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Confidence cap when fewer than two distinct sources exist
const SINGLE_SOURCE_CAP: f32 = 0.5;

/// Confidence cap when inline citation density is too low
const LOW_CITATION_CAP: f32 = 0.58;

/// Below this confidence a retry is forced if the model offered no
/// refinements
const RETRY_THRESHOLD: f32 = 0.55;

/// Expected answer lines per inline citation
const LINES_PER_CITATION: usize = 4;

#[derive(Debug, Default, Deserialize)]
struct RawReport {
    #[serde(default)]
    contradictions: Vec<String>,
    #[serde(default)]
    missing_citations: Vec<MissingCitation>,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    needs_retry: bool,
    #[serde(default)]
    refinements: Vec<String>,
}

fn default_confidence() -> f32 {
    0.6
}

pub struct Verifier {
    router: Arc<ModelRouter>,
}

impl Verifier {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }

    /// Verify an answer against the fused facts. Never fails: provider
    /// or parse errors produce the permissive default report, then the
    /// heuristic overrides run regardless.
    pub async fn verify(
        &self,
        query: &str,
        answer: &str,
        fused_text: &str,
        source_map: &str,
        sources: &[SourceRef],
    ) -> VerificationReport {
        let prompt = format!(
            "Critique the answer below against the provided facts. Reply with ONLY a JSON \
            object of the form {{\"contradictions\": [string], \"missing_citations\": \
            [{{\"snippet\": string, \"suggestion\": string}}], \"confidence\": number between \
            0 and 1, \"needs_retry\": boolean, \"refinements\": [string]}}. Refinements are \
            improved search queries to fill gaps.\n\nQuestion: {}\n\nFacts:\n{}\n\nSources:\n{}\
            \n\nAnswer:\n{}",
            query, fused_text, source_map, answer
        );

        let params = GenerationParams {
            temperature: 0.0,
            max_tokens: 500,
        };

        let raw = match self.router.generate(Profile::Simple, &prompt, &params).await {
            Ok(response) => parse_report(&response),
            Err(e) => {
                debug!(error = %e, "Verification call failed, using permissive default");
                None
            }
        };

        let mut report = match raw {
            Some(raw) => VerificationReport {
                contradictions: raw.contradictions,
                missing_citations: raw.missing_citations,
                confidence: raw.confidence,
                needs_retry: raw.needs_retry,
                refinements: raw.refinements,
            },
            None => VerificationReport::default(),
        };

        apply_overrides(&mut report, query, answer, sources);
        report
    }
}

/// Locate the outermost `{...}` span and parse it
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_report(response: &str) -> Option<RawReport> {
    let json = extract_json(response)?;
    match serde_json::from_str::<RawReport>(json) {
        Ok(report) => Some(report),
        Err(e) => {
            debug!(error = %e, "Failed to parse verification JSON");
            None
        }
    }
}

/// Count inline citations: `[S#]` tags and Markdown links
fn count_citations(answer: &str) -> usize {
    let tag_re = regex_lite::Regex::new(r"\[S\d+(?:,\s*S\d+)*\]").unwrap();
    let link_re = regex_lite::Regex::new(r"\[[^\]]+\]\(https?://[^)\s]+\)").unwrap();

    tag_re.find_iter(answer).count() + link_re.find_iter(answer).count()
}

/// Heuristic overrides applied on top of the model's self-report
fn apply_overrides(
    report: &mut VerificationReport,
    query: &str,
    answer: &str,
    sources: &[SourceRef],
) {
    let distinct_sources = sources
        .iter()
        .map(|s| s.url.as_str())
        .collect::<HashSet<_>>()
        .len();

    if distinct_sources < 2 {
        report.confidence = report.confidence.min(SINGLE_SOURCE_CAP);
    }

    let lines = answer.lines().filter(|l| !l.trim().is_empty()).count();
    let citations = count_citations(answer);
    if lines > 0 && citations * LINES_PER_CITATION < lines {
        report.missing_citations.push(MissingCitation {
            snippet: answer.lines().next().unwrap_or_default().chars().take(80).collect(),
            suggestion: "Add inline [S#] citations for the stated facts".to_string(),
        });
        report.confidence = report.confidence.min(LOW_CITATION_CAP);
    }

    if report.confidence < RETRY_THRESHOLD && report.refinements.is_empty() {
        report.refinements = vec![
            format!("{} site:wikipedia.org", query),
            format!("{} site:reuters.com filetype:pdf", query),
        ];
        report.needs_retry = true;
    }

    report.confidence = report.confidence.clamp(0.0, 1.0);
}
