//! Confidence estimation
//!
//! Cheap heuristic scoring of whether collected hits are on-topic for
//! the query, used by the round loop to decide whether more collection
//! is worthwhile. Confidence alone can be gamed by many near-duplicate
//! hits from one source, so the stop condition also requires source
//! diversity.

use crate::collector::is_on_topic;
use seekr_common::model::{Hit, SourceType};
use std::collections::HashSet;

/// Fraction of hits whose title or snippet contains the query
/// (case-insensitive), boosted and clamped to [0, 1]. Empty input
/// scores 0.
pub fn check_confidence(hits: &[Hit], query: &str, boost: f32) -> f32 {
    if hits.is_empty() {
        return 0.0;
    }

    let matches = hits.iter().filter(|hit| is_on_topic(hit, query)).count();
    let fraction = matches as f32 / hits.len().max(1) as f32;
    (fraction * boost).min(1.0)
}

/// Number of distinct source categories that contributed hits
pub fn source_diversity(hits: &[Hit]) -> usize {
    hits.iter()
        .map(|hit| hit.source)
        .collect::<HashSet<SourceType>>()
        .len()
}
