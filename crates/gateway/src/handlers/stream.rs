//! Streaming answer handler
//!
//! Exposes the pipeline as a server-sent event sequence with named
//! events (`start`, `stage`, `metrics`, `answer`, `done`, `error`) and
//! a periodic keep-alive to hold the connection open.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::search::SearchRequest;
use crate::AppState;
use seekr_pipeline::orchestrator::PipelineEvent;

/// Interval for the no-op keep-alive event
const KEEP_ALIVE_SECS: u64 = 15;

/// Channel depth for pipeline progress events
const EVENT_BUFFER: usize = 64;

/// Stream one query's pipeline progress and final answer
pub async fn search_stream(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<PipelineEvent>(EVENT_BUFFER);

    // Input errors surface as a terminal `error` event rather than an
    // HTTP error, keeping the event contract uniform
    if let Err(e) = validator::Validate::validate(&request) {
        let _ = tx
            .send(PipelineEvent::Error {
                message: format!("Validation failed: {}", e),
            })
            .await;
    } else {
        let orchestrator = state.orchestrator.clone();
        let job = request.into_job();
        tokio::spawn(async move {
            orchestrator.answer_streaming(job, tx).await;
        });
    }

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default()
            .event(event.name())
            .data(event.payload().to_string()))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}
