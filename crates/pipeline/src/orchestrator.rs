//! Multi-round / multi-task orchestration
//!
//! Drives the per-request state flow: plan the query into sub-tasks,
//! run each through collect → confidence loop → fetch → rank → fuse →
//! synthesize → verify (with at most one refinement retry), then
//! compose the sub-results. Sub-tasks run concurrently and a failed
//! sub-task degrades to an embedded note instead of cancelling its
//! siblings. Only caller input errors fail the request before any
//! pipeline work starts.

use crate::collector::{dedup_hits, rewrite_query, Collector};
use crate::confidence::{check_confidence, source_diversity};
use crate::fetch::PageFetcher;
use crate::fusion::FusionEngine;
use crate::planner;
use crate::ranker::Ranker;
use crate::synthesizer::{extract_citations, extract_images, PromptPolicy, Synthesizer};
use crate::verifier::Verifier;
use crate::chunker;
use chrono::{Datelike, Utc};
use seekr_common::config::PipelineConfig;
use seekr_common::errors::{AppError, Result};
use seekr_common::model::{
    Answer, Chunk, ChunkSource, Hit, ScoredChunk, SourceRef, SourceType, SubTask, TaskKind,
    VerificationReport,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Honest degraded answer used when a sub-task gathers nothing usable
pub const INSUFFICIENT_CONTENT: &str =
    "Not enough verified content was found for this query — try deep mode or rephrase the question.";

/// Caller-facing job parameters for one answer request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchJob {
    pub query: String,

    /// Maximum pages fetched per sub-task
    #[serde(default)]
    pub max_web: Option<usize>,

    /// Final top-K chunks kept for fusion
    #[serde(default)]
    pub top_chunks: Option<usize>,

    /// Latency-optimized profile: smaller pools and timeouts, skips
    /// reranking and verification
    #[serde(default)]
    pub fast: bool,

    /// Run the post-hoc verification pass
    #[serde(default = "default_verify")]
    pub verify: bool,

    /// Restrict collection to these source categories
    #[serde(default)]
    pub sources: Option<Vec<SourceType>>,
}

fn default_verify() -> bool {
    true
}

/// Server-push event emitted by the streaming variant
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Start {
        query: String,
        fast: bool,
        max_rounds: usize,
    },
    Stage {
        stage: &'static str,
        detail: String,
    },
    Metrics {
        hits_by_source: Vec<(String, usize)>,
        pages_fetched: usize,
    },
    Answer(Box<Answer>),
    Done,
    Error {
        message: String,
    },
}

impl PipelineEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Start { .. } => "start",
            PipelineEvent::Stage { .. } => "stage",
            PipelineEvent::Metrics { .. } => "metrics",
            PipelineEvent::Answer(_) => "answer",
            PipelineEvent::Done => "done",
            PipelineEvent::Error { .. } => "error",
        }
    }

    /// SSE event payload
    pub fn payload(&self) -> serde_json::Value {
        match self {
            PipelineEvent::Start {
                query,
                fast,
                max_rounds,
            } => serde_json::json!({ "query": query, "fast": fast, "rounds": max_rounds }),
            PipelineEvent::Stage { stage, detail } => {
                serde_json::json!({ "stage": stage, "detail": detail })
            }
            PipelineEvent::Metrics {
                hits_by_source,
                pages_fetched,
            } => {
                let counts: HashMap<&str, usize> = hits_by_source
                    .iter()
                    .map(|(k, v)| (k.as_str(), *v))
                    .collect();
                serde_json::json!({ "hits": counts, "pages_fetched": pages_fetched })
            }
            PipelineEvent::Answer(answer) => {
                serde_json::to_value(answer.as_ref()).unwrap_or_default()
            }
            PipelineEvent::Done => serde_json::json!({}),
            PipelineEvent::Error { message } => serde_json::json!({ "message": message }),
        }
    }
}

/// Best-effort event channel; absent for the non-streaming variant
#[derive(Clone, Default)]
struct EventSink {
    tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventSink {
    fn streaming(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}

/// One sub-task's outcome; degradation is data, not an error
struct SubTaskOutput {
    task: SubTask,
    answer_md: String,
    sources: Vec<SourceRef>,
    images: Vec<String>,
    verification: Option<VerificationReport>,
    degraded: bool,
}

pub struct Orchestrator {
    collector: Collector,
    fetcher: PageFetcher,
    ranker: Ranker,
    fusion: FusionEngine,
    synthesizer: Synthesizer,
    verifier: Verifier,
    config: PipelineConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        collector: Collector,
        fetcher: PageFetcher,
        ranker: Ranker,
        fusion: FusionEngine,
        synthesizer: Synthesizer,
        verifier: Verifier,
        config: PipelineConfig,
    ) -> Self {
        Self {
            collector,
            fetcher,
            ranker,
            fusion,
            synthesizer,
            verifier,
            config,
        }
    }

    /// Answer one request. Fails fast on caller input errors; every
    /// pipeline-level failure degrades into the response instead.
    pub async fn answer(&self, job: &SearchJob) -> Result<Answer> {
        self.validate(job)?;
        Ok(self.run(job, EventSink::default()).await)
    }

    /// Streaming variant: same pipeline, progress pushed as events.
    /// The final `answer` event carries the same payload shape as the
    /// non-streaming response.
    pub async fn answer_streaming(&self, job: SearchJob, tx: mpsc::Sender<PipelineEvent>) {
        if let Err(e) = self.validate(&job) {
            let _ = tx
                .send(PipelineEvent::Error {
                    message: e.to_string(),
                })
                .await;
            return;
        }

        let sink = EventSink::streaming(tx.clone());
        let answer = self.run(&job, sink).await;
        let _ = tx.send(PipelineEvent::Answer(Box::new(answer))).await;
        let _ = tx.send(PipelineEvent::Done).await;
    }

    /// Caller input validation, before any provider work
    fn validate(&self, job: &SearchJob) -> Result<()> {
        if job.query.trim().is_empty() {
            return Err(AppError::MissingField {
                field: "query".to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, job: &SearchJob, sink: EventSink) -> Answer {
        let started = Instant::now();
        let deadline = started + self.config.deadline();

        sink.emit(PipelineEvent::Start {
            query: job.query.clone(),
            fast: job.fast,
            max_rounds: self.config.max_rounds,
        })
        .await;

        let tasks = planner::plan(&job.query);
        sink.emit(PipelineEvent::Stage {
            stage: "planning",
            detail: format!("{} sub-task(s)", tasks.len()),
        })
        .await;

        let runs = tasks
            .iter()
            .map(|task| self.run_subtask(job, task.clone(), deadline, sink.clone()));
        let outputs: Vec<SubTaskOutput> = futures::future::join_all(runs).await;
        let degraded = outputs.iter().filter(|o| o.degraded).count();

        let answer = compose(&tasks, outputs);

        info!(
            query = %job.query,
            sub_tasks = tasks.len(),
            degraded,
            sources = answer.sources.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            fast = job.fast,
            "Answer composed"
        );

        answer
    }

    /// One sub-task's full pipeline pass. Never fails: every internal
    /// error degrades to an insufficient-content note.
    async fn run_subtask(
        &self,
        job: &SearchJob,
        task: SubTask,
        deadline: Instant,
        sink: EventSink,
    ) -> SubTaskOutput {
        let wanted = self.wanted_sources(job, &task);

        // Collection rounds with progressively rewritten queries,
        // stopping early on confidence AND diversity, bounded by the
        // request deadline
        let mut hits: Vec<Hit> = Vec::new();
        let year = Utc::now().year();

        for round in 0..self.config.max_rounds.max(1) {
            if Instant::now() >= deadline {
                warn!(round, "Deadline exhausted, proceeding with collected hits");
                break;
            }

            let round_query = rewrite_query(&task.query, round, year);
            sink.emit(PipelineEvent::Stage {
                stage: "collect",
                detail: format!("round {} for \"{}\"", round + 1, round_query),
            })
            .await;

            let collected = self.collector.collect(&round_query, &wanted).await;
            hits = dedup_hits(hits.into_iter().chain(collected).collect());

            let confidence = check_confidence(&hits, &task.query, self.config.confidence_boost);
            let diversity = source_diversity(&hits);
            debug!(round, confidence, diversity, hits = hits.len(), "Collection round done");

            if confidence >= self.config.confidence_threshold
                && diversity >= self.config.min_source_diversity
            {
                break;
            }
        }

        if hits.is_empty() {
            return degraded_output(task);
        }

        // Fetch pages for hits that need it; self-contained hits chunk
        // directly from their snippet
        sink.emit(PipelineEvent::Stage {
            stage: "reading",
            detail: format!("{} hit(s)", hits.len()),
        })
        .await;

        let max_web = job.max_web.unwrap_or(self.config.max_web);
        let fetch_timeout = self.config.fetch_timeout(job.fast);

        let to_fetch: Vec<&Hit> = hits
            .iter()
            .filter(|h| !h.is_self_contained())
            .take(max_web)
            .collect();

        let fetches = to_fetch
            .iter()
            .map(|hit| self.fetcher.fetch(&hit.url, fetch_timeout));
        let pages = futures::future::join_all(fetches).await;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut pages_fetched = 0usize;

        for (hit, page) in to_fetch.iter().zip(pages) {
            let Some(page) = page else {
                continue;
            };
            pages_fetched += 1;

            let mut source = ChunkSource::from(*hit);
            if source.title.is_empty() && !page.title.is_empty() {
                source.title = page.title.clone();
            }
            chunks.extend(chunker::chunk(&page.text, self.config.chunk_max_len, &source));
        }

        for hit in hits.iter().filter(|h| h.is_self_contained()) {
            if !hit.snippet.trim().is_empty() {
                chunks.push(Chunk::new(hit.snippet.clone(), ChunkSource::from(hit)));
            }
        }

        let mut by_source: HashMap<String, usize> = HashMap::new();
        for hit in &hits {
            *by_source.entry(hit.source.label().to_string()).or_default() += 1;
        }
        sink.emit(PipelineEvent::Metrics {
            hits_by_source: by_source.into_iter().collect(),
            pages_fetched,
        })
        .await;

        if chunks.is_empty() {
            return degraded_output(task);
        }

        // Rank
        sink.emit(PipelineEvent::Stage {
            stage: "ranking",
            detail: format!("{} chunk(s)", chunks.len()),
        })
        .await;

        let pool = self.config.pool(job.fast);
        let top_k = job.top_chunks.unwrap_or(self.config.top_chunks);
        let top = self
            .ranker
            .rank(&task.query, &chunks, pool, top_k, !job.fast)
            .await;

        if top.is_empty() {
            return degraded_output(task);
        }

        // Fuse + synthesize
        sink.emit(PipelineEvent::Stage {
            stage: "writing",
            detail: format!("{} chunk(s) fused", top.len()),
        })
        .await;

        let fused = self.fusion.fuse(&top, self.config.max_bullets, !job.fast).await;
        let context = render_context(&fused.fused_text, &fused.contradictions, job.fast);
        let policy = self.prompt_policy(job, &task);

        let answer_md = match self
            .synthesizer
            .synthesize(&task.query, &context, &fused.source_map, &policy)
            .await
        {
            Ok(markdown) => markdown,
            Err(e) => {
                warn!(error = %e, "Synthesis failed, degrading sub-task");
                return SubTaskOutput {
                    sources: extract_citations("", &top),
                    images: Vec::new(),
                    verification: None,
                    degraded: true,
                    answer_md: INSUFFICIENT_CONTENT.to_string(),
                    task,
                };
            }
        };

        let mut sources = extract_citations(&answer_md, &top);
        let images = extract_images(&answer_md);
        let mut final_answer = answer_md;

        // Verification with at most one bounded retry; the retry is
        // never re-verified
        let mut verification = None;
        if job.verify && !job.fast {
            let report = self
                .verifier
                .verify(&task.query, &final_answer, &context, &fused.source_map, &sources)
                .await;

            if report.needs_retry {
                if let Some(refinement) = report.refinements.first() {
                    seekr_common::metrics::record_verification_retry();
                    sink.emit(PipelineEvent::Stage {
                        stage: "retry",
                        detail: refinement.clone(),
                    })
                    .await;

                    if let Some((md, retry_sources)) =
                        self.retry_once(job, &task, refinement, &top).await
                    {
                        final_answer = md;
                        sources = retry_sources;
                    }
                }
            }

            verification = Some(report);
        }

        SubTaskOutput {
            task,
            answer_md: final_answer,
            sources,
            images,
            verification,
            degraded: false,
        }
    }

    /// Exactly one refinement pass: collect → rank on the first
    /// refinement query, merge with the original top chunks, regenerate
    async fn retry_once(
        &self,
        job: &SearchJob,
        task: &SubTask,
        refinement: &str,
        original_top: &[ScoredChunk],
    ) -> Option<(String, Vec<SourceRef>)> {
        let wanted = self.wanted_sources(job, task);
        let hits = self.collector.collect(refinement, &wanted).await;
        if hits.is_empty() {
            return None;
        }

        let fetch_timeout = self.config.fetch_timeout(job.fast);
        let max_web = job.max_web.unwrap_or(self.config.max_web);

        let to_fetch: Vec<&Hit> = hits
            .iter()
            .filter(|h| !h.is_self_contained())
            .take(max_web)
            .collect();
        let pages = futures::future::join_all(
            to_fetch
                .iter()
                .map(|hit| self.fetcher.fetch(&hit.url, fetch_timeout)),
        )
        .await;

        let mut chunks: Vec<Chunk> = Vec::new();
        for (hit, page) in to_fetch.iter().zip(pages) {
            if let Some(page) = page {
                let source = ChunkSource::from(*hit);
                chunks.extend(chunker::chunk(&page.text, self.config.chunk_max_len, &source));
            }
        }
        if chunks.is_empty() {
            return None;
        }

        let pool = self.config.pool(job.fast);
        let top_k = job.top_chunks.unwrap_or(self.config.top_chunks);
        let retry_top = self.ranker.rank(&task.query, &chunks, pool, top_k, false).await;

        // Merge original and retry chunks, original first
        let mut merged: Vec<ScoredChunk> = original_top.to_vec();
        for scored in retry_top {
            if !merged.iter().any(|m| m.chunk.text == scored.chunk.text) {
                merged.push(scored);
            }
        }
        merged.truncate(top_k.max(original_top.len()));

        let fused = self.fusion.fuse(&merged, self.config.max_bullets, false).await;
        let policy = self.prompt_policy(job, task);

        match self
            .synthesizer
            .synthesize(&task.query, &fused.fused_text, &fused.source_map, &policy)
            .await
        {
            Ok(markdown) => {
                let sources = extract_citations(&markdown, &merged);
                Some((markdown, sources))
            }
            Err(e) => {
                warn!(error = %e, "Retry synthesis failed, keeping original answer");
                None
            }
        }
    }

    /// Source categories for a sub-task, restricted by the caller's
    /// explicit list when present
    fn wanted_sources(&self, job: &SearchJob, task: &SubTask) -> Vec<SourceType> {
        let defaults: Vec<SourceType> = match task.kind {
            TaskKind::News => vec![
                SourceType::News,
                SourceType::Web,
                SourceType::Twitter,
            ],
            TaskKind::Transcript => vec![SourceType::Web, SourceType::Wiki, SourceType::Youtube],
            TaskKind::Generic => self.collector.available_sources(),
        };

        match &job.sources {
            Some(allowed) => defaults
                .into_iter()
                .filter(|s| allowed.contains(s))
                .collect(),
            None => defaults,
        }
    }

    fn prompt_policy(&self, job: &SearchJob, task: &SubTask) -> PromptPolicy {
        let mut policy = PromptPolicy::new();

        match task.kind {
            TaskKind::News => {
                policy = policy.with_modifier(
                    "Focus on the most recent developments and include dates where the sources give them.",
                );
            }
            TaskKind::Transcript => {
                policy = policy.with_modifier(
                    "Reproduce the requested transcript or speech content faithfully from the sources; do not paraphrase quoted passages.",
                );
            }
            TaskKind::Generic => {}
        }

        if job.fast {
            policy = policy.with_modifier("Answer as concisely as possible.");
        }

        policy
    }
}

/// Fused facts plus the contradiction block the synthesizer and
/// verifier see; fast mode skips contradiction detection entirely
fn render_context(fused_text: &str, contradictions: &[String], fast: bool) -> String {
    if fast {
        return fused_text.to_string();
    }

    let block = if contradictions.is_empty() {
        "None".to_string()
    } else {
        contradictions
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("{}\n\nContradictions:\n{}", fused_text, block)
}

fn degraded_output(task: SubTask) -> SubTaskOutput {
    SubTaskOutput {
        task,
        answer_md: INSUFFICIENT_CONTENT.to_string(),
        sources: Vec::new(),
        images: Vec::new(),
        verification: None,
        degraded: true,
    }
}

/// Section heading for one sub-task in a composed multi-task answer
fn heading(task: &SubTask) -> String {
    match task.kind {
        TaskKind::News => {
            let place = task
                .place
                .as_deref()
                .map(title_case)
                .unwrap_or_else(|| truncate_words(&task.query, 8));
            format!("News: {}", place)
        }
        TaskKind::Transcript => {
            let title = task
                .title
                .clone()
                .unwrap_or_else(|| truncate_words(&task.query, 8));
            format!("Transcript: {}", title)
        }
        TaskKind::Generic => truncate_words(&task.query, 8),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compose sub-task outputs into the final answer. Single sub-task
/// results are returned as-is; multiple sub-tasks are concatenated
/// under per-task headings, each with its own source list.
fn compose(tasks: &[SubTask], outputs: Vec<SubTaskOutput>) -> Answer {
    let last_fetched = Utc::now().to_rfc3339();

    if outputs.len() == 1 {
        let output = outputs.into_iter().next().expect("one output");
        return Answer {
            formatted_answer: output.answer_md,
            sources: output.sources,
            images: output.images,
            verification: output.verification,
            plan: Some(tasks.to_vec()),
            last_fetched,
        };
    }

    let mut sections = Vec::new();
    let mut all_sources: Vec<SourceRef> = Vec::new();
    let mut all_images: Vec<String> = Vec::new();

    for output in outputs {
        let mut section = format!("## {}\n\n{}", heading(&output.task), output.answer_md);

        if !output.sources.is_empty() {
            let list = output
                .sources
                .iter()
                .map(|s| format!("- [{}]({})", s.title, s.url))
                .collect::<Vec<_>>()
                .join("\n");
            section.push_str(&format!("\n\nSources:\n{}", list));
        }
        sections.push(section);

        for source in output.sources {
            if !all_sources.contains(&source) {
                all_sources.push(source);
            }
        }
        for image in output.images {
            if !all_images.contains(&image) {
                all_images.push(image);
            }
        }
    }

    Answer {
        formatted_answer: sections.join("\n\n"),
        sources: all_sources,
        images: all_images,
        verification: None,
        plan: Some(tasks.to_vec()),
        last_fetched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorSettings;
    use crate::ranker::RankerSettings;
    use async_trait::async_trait;
    use seekr_common::cache::TieredCache;
    use seekr_providers::{Embedder, GenerationParams, Generator, HitSource, ModelRouter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingSource {
        source_type: SourceType,
        hits: Vec<Hit>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HitSource for CountingSource {
        fn source_type(&self) -> SourceType {
            self.source_type
        }

        async fn search(&self, _query: &str, _max: usize) -> seekr_common::errors::Result<Vec<Hit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Provider {
                    provider: "mock".into(),
                    message: "outage".into(),
                });
            }
            Ok(self.hits.clone())
        }
    }

    struct StaticGenerator {
        output: Option<String>,
    }

    #[async_trait]
    impl Generator for StaticGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> seekr_common::errors::Result<String> {
            match &self.output {
                Some(text) => Ok(text.clone()),
                None => Err(AppError::Generation {
                    message: "down".into(),
                }),
            }
        }

        fn id(&self) -> String {
            "static".into()
        }
    }

    struct FixtureEmbedder;

    #[async_trait]
    impl Embedder for FixtureEmbedder {
        async fn embed(&self, text: &str) -> seekr_common::errors::Result<Vec<f32>> {
            let len = text.len() as f32;
            Ok(vec![1.0, len % 7.0, len % 13.0, 0.5])
        }

        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> seekr_common::errors::Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "fixture"
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn tweet_hit(text: &str, id: u32) -> Hit {
        Hit {
            title: text.chars().take(40).collect(),
            url: format!("https://twitter.com/i/web/status/{}", id),
            snippet: text.into(),
            source: SourceType::Twitter,
            published: None,
            author: Some("tester".into()),
            subreddit: None,
        }
    }

    fn orchestrator(
        sources: Vec<Arc<dyn HitSource>>,
        generator_output: Option<&str>,
    ) -> Orchestrator {
        let cache = TieredCache::memory_only(64);
        let settings = CollectorSettings {
            branch_timeout: Duration::from_millis(500),
            max_results: 10,
            sparse_threshold: 3,
            cache_ttl_secs: 60,
        };
        let collector = Collector::new(sources, None, cache.clone(), settings);
        let fetcher = PageFetcher::new(cache.clone(), 600).unwrap();
        let ranker = Ranker::new(
            Arc::new(FixtureEmbedder),
            None,
            cache,
            RankerSettings::default(),
        );
        let router = Arc::new(ModelRouter::from_chains(
            vec![Arc::new(StaticGenerator {
                output: generator_output.map(str::to_string),
            }) as Arc<dyn Generator>],
            vec![Arc::new(StaticGenerator {
                output: generator_output.map(str::to_string),
            }) as Arc<dyn Generator>],
            vec![Arc::new(StaticGenerator {
                output: generator_output.map(str::to_string),
            }) as Arc<dyn Generator>],
        ));
        let fusion = FusionEngine::new(Some(Arc::clone(&router)));
        let synthesizer = Synthesizer::new(Arc::clone(&router), 800);
        let verifier = Verifier::new(router);

        let mut config = PipelineConfig::default();
        config.max_rounds = 1;
        Orchestrator::new(collector, fetcher, ranker, fusion, synthesizer, verifier, config)
    }

    fn job(query: &str) -> SearchJob {
        SearchJob {
            query: query.into(),
            max_web: None,
            top_chunks: None,
            fast: false,
            verify: false,
            sources: None,
        }
    }

    #[tokio::test]
    async fn test_missing_query_fails_before_any_provider_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(CountingSource {
            source_type: SourceType::Web,
            hits: Vec::new(),
            fail: false,
            calls: Arc::clone(&calls),
        });

        let orchestrator = orchestrator(vec![source], Some("answer"));
        let result = orchestrator.answer(&job("   ")).await;

        assert!(matches!(result, Err(AppError::MissingField { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_outage_degrades_to_insufficient_content() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(CountingSource {
            source_type: SourceType::Web,
            hits: Vec::new(),
            fail: true,
            calls: Arc::clone(&calls),
        });

        let orchestrator = orchestrator(vec![source], None);
        let answer = orchestrator.answer(&job("anything at all")).await.unwrap();

        assert!(answer.sources.is_empty());
        assert!(answer.images.is_empty());
        assert!(answer.formatted_answer.contains("Not enough verified content"));
        assert!(calls.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_simple_factual_query_end_to_end() {
        // Self-contained hits avoid real page fetches in tests
        let long_fact = "Paris is the capital of France and has been the seat of \
            government for centuries according to every reliable source.";
        let source = Arc::new(CountingSource {
            source_type: SourceType::Twitter,
            hits: vec![
                tweet_hit(long_fact, 1),
                tweet_hit("Paris — capital of France, confirmed again by observers today.", 2),
            ],
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        });

        let orchestrator = orchestrator(
            vec![source],
            Some("Paris is the capital of France [S1]."),
        );
        let answer = orchestrator.answer(&job("capital of France")).await.unwrap();

        assert!(!answer.formatted_answer.is_empty());
        assert!(!answer.formatted_answer.contains("undefined"));
        assert!(!answer.sources.is_empty());
        assert!(answer
            .sources
            .iter()
            .any(|s| s.url.contains("twitter.com")));
        assert!(answer.plan.is_some());
    }

    #[tokio::test]
    async fn test_multi_intent_compose_has_two_sections() {
        let long_fact = "A reasonably long factual sentence that clears the fusion \
            filters and shows up in the fused context block.";
        let source = Arc::new(CountingSource {
            source_type: SourceType::Twitter,
            hits: vec![tweet_hit(long_fact, 3)],
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        });

        let orchestrator = orchestrator(vec![source], Some("Section answer [S1]."));
        let answer = orchestrator
            .answer(&job(
                "latest news in India today\nfull transcript of Steve Jobs 2007 iPhone launch",
            ))
            .await
            .unwrap();

        let plan = answer.plan.as_ref().unwrap();
        assert!(plan.len() >= 2);
        assert!(plan.iter().any(|t| t.kind == TaskKind::News));
        assert!(plan.iter().any(|t| t.kind == TaskKind::Transcript));

        let headings = answer
            .formatted_answer
            .matches("## ")
            .count();
        assert!(headings >= 2);
        assert!(answer.formatted_answer.contains("News: India"));
        assert!(answer.formatted_answer.contains("Transcript:"));
    }

    #[tokio::test]
    async fn test_generation_outage_still_returns_shaped_answer() {
        let long_fact = "Some long factual sentence that is substantial enough to be \
            fused into the context for the generation stage.";
        let source = Arc::new(CountingSource {
            source_type: SourceType::Twitter,
            hits: vec![tweet_hit(long_fact, 4)],
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        });

        let orchestrator = orchestrator(vec![source], None);
        let answer = orchestrator.answer(&job("some question")).await.unwrap();

        assert!(answer.formatted_answer.contains("Not enough verified content"));
        assert!(answer.last_fetched.contains('T'));
    }

    #[test]
    fn test_compose_single_task_no_heading() {
        let task = SubTask::generic("q");
        let output = SubTaskOutput {
            task: task.clone(),
            answer_md: "Plain answer".into(),
            sources: vec![],
            images: vec![],
            verification: None,
            degraded: false,
        };
        let answer = compose(&[task], vec![output]);
        assert_eq!(answer.formatted_answer, "Plain answer");
    }

    #[test]
    fn test_render_context_contradiction_block() {
        let ctx = render_context("- fact [S1]", &[], false);
        assert!(ctx.ends_with("Contradictions:\nNone"));

        let ctx = render_context("- fact [S1]", &["A vs B".to_string()], false);
        assert!(ctx.contains("- A vs B"));

        assert_eq!(render_context("- fact [S1]", &[], true), "- fact [S1]");
    }

    #[test]
    fn test_event_names_and_payloads() {
        let event = PipelineEvent::Start {
            query: "q".into(),
            fast: false,
            max_rounds: 3,
        };
        assert_eq!(event.name(), "start");
        assert_eq!(event.payload()["rounds"], 3);

        assert_eq!(PipelineEvent::Done.name(), "done");
    }
}
