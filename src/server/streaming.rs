//! Streaming response bodies.
//!
//! Converts a [`GenerationStream`] into either a chunked `text/plain` body
//! (native and legacy completion endpoints) or an SSE stream of OpenAI
//! `chat.completion.chunk` objects.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use tokio_stream::StreamExt;

use crate::error::BridgeError;
use crate::inference::bridge::{GenerationEvent, GenerationStream};
use crate::state::AppState;

/// Streaming chat completion chunk (OpenAI-compatible).
#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: usize,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Chunked `text/plain` body carrying the raw chunks.
///
/// A binding failure after the response started aborts the body, so the
/// client sees a truncated transfer instead of a clean end of stream.
pub fn text_stream_response(state: Arc<AppState>, stream: GenerationStream) -> Response {
    let body = stream.into_stream().filter_map(move |event| match event {
        GenerationEvent::Chunk(text) => Some(Ok(Bytes::from(text))),
        GenerationEvent::Done { chunks, reason } => {
            state.metrics.record_finished(reason, chunks);
            None
        }
        GenerationEvent::Error(message) => {
            state.report_error(&BridgeError::Stream(message.clone()));
            Some(Err(std::io::Error::other(message)))
        }
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

/// SSE stream of chat completion chunks, terminated by `[DONE]`.
pub fn chat_sse_response(
    state: Arc<AppState>,
    stream: GenerationStream,
    request_id: String,
    model: String,
) -> Response {
    let mut first = true;

    let events = stream
        .into_stream()
        .map(move |event| {
            let (delta, finish_reason) = match event {
                GenerationEvent::Chunk(text) => {
                    let mut delta = ChunkDelta {
                        role: None,
                        content: Some(text),
                    };

                    // First chunk includes the role.
                    if first {
                        delta.role = Some("assistant".to_string());
                        first = false;
                    }
                    (delta, None)
                }
                GenerationEvent::Done { chunks, reason } => {
                    state.metrics.record_finished(reason, chunks);
                    (
                        ChunkDelta {
                            role: None,
                            content: None,
                        },
                        Some("stop".to_string()),
                    )
                }
                GenerationEvent::Error(e) => {
                    state.report_error(&BridgeError::Stream(e.clone()));
                    (
                        ChunkDelta {
                            role: None,
                            content: Some(format!("[Error: {e}]")),
                        },
                        Some("error".to_string()),
                    )
                }
            };

            let chunk = ChatCompletionChunk {
                id: format!("chatcmpl-{request_id}"),
                object: "chat.completion.chunk".to_string(),
                created: unix_now(),
                model: model.clone(),
                choices: vec![ChunkChoice {
                    index: 0,
                    delta,
                    finish_reason,
                }],
            };

            let data = serde_json::to_string(&chunk).unwrap_or_default();
            Ok::<_, std::convert::Infallible>(Event::default().data(data))
        })
        // Append the [DONE] sentinel after all events.
        .chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))));

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}
