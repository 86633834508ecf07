//! Seekr Answer Pipeline
//!
//! The retrieval-augmented synthesis core: multi-source collection,
//! page fetching and chunking, embedding-based ranking, context fusion
//! with deduplicated citations, answer synthesis, post-hoc verification
//! and multi-task orchestration.
//!
//! Within one sub-task the stages run strictly in sequence; across
//! sub-tasks and across the per-source fan-out inside a collect stage
//! everything runs concurrently with wait-for-all, tolerate-individual-
//! failure semantics.

pub mod chunker;
pub mod collector;
pub mod confidence;
pub mod fetch;
pub mod fusion;
pub mod orchestrator;
pub mod planner;
pub mod ranker;
pub mod synthesizer;
pub mod verifier;

pub use collector::Collector;
pub use fetch::PageFetcher;
pub use fusion::FusionEngine;
pub use orchestrator::{Orchestrator, PipelineEvent, SearchJob};
pub use ranker::Ranker;
