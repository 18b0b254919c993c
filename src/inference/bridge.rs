//! Streaming bridge between a blocking binding and async HTTP handlers.
//!
//! The binding's `generate` call blocks and reports chunks through a
//! callback, so it runs on a blocking worker (one per request, no pool).
//! The callback feeds each chunk through a [`GenerationSession`] and hands
//! accepted chunks to the HTTP side over a bounded channel:
//!
//! 1. the session checks the request's cancellation token,
//! 2. appends the chunk and runs the antiprompt guard,
//! 3. forwards the chunk, or tells the binding to stop.
//!
//! When the binding returns, the worker sends a final `Done` or `Error`
//! event. Chunks reach the consumer in exactly the order the callback saw
//! them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::inference::antiprompt::AntipromptGuard;
use crate::inference::binding::{Binding, BindingError, ChunkControl};
use crate::inference::params::{GenerationRequest, SamplingParams};
use crate::inference::session::{ChunkOutcome, GenerationSession, StopReason};

/// An event on a generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// A chunk accepted for delivery.
    Chunk(String),
    /// Generation ended normally.
    Done { chunks: usize, reason: StopReason },
    /// The binding failed after the stream started.
    Error(String),
}

/// Result of a non-streaming generation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Accumulated text, cut at the first antiprompt.
    pub text: String,
    pub chunks: usize,
    pub reason: StopReason,
}

/// Counts generations in flight. The server is busy while any is running.
#[derive(Debug, Default)]
pub struct BusyFlag {
    active: AtomicUsize,
}

impl BusyFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Mark a generation as running until the returned guard is dropped.
    pub fn mark(self: &Arc<Self>) -> BusyGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        BusyGuard { flag: self.clone() }
    }
}

pub struct BusyGuard {
    flag: Arc<BusyFlag>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs generations for a single mounted binding.
#[derive(Clone)]
pub struct GenerationBridge {
    binding: Arc<dyn Binding>,
    guard: AntipromptGuard,
    busy: Arc<BusyFlag>,
    channel_capacity: usize,
}

impl GenerationBridge {
    pub fn new(
        binding: Arc<dyn Binding>,
        guard: AntipromptGuard,
        busy: Arc<BusyFlag>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            binding,
            guard,
            busy,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Run generation to completion and return the accumulated text.
    ///
    /// The binding still runs on a blocking worker so the async runtime is
    /// never stalled; the caller just waits for it. Dropping the returned
    /// future cancels the generation at the binding's next callback.
    pub async fn run_to_completion(
        &self,
        request: &GenerationRequest,
        sampling: SamplingParams,
        cancel: CancellationToken,
    ) -> Result<GenerationOutcome, BridgeError> {
        let binding = self.binding.clone();
        let guard = self.guard.clone();
        let busy = self.busy.mark();
        let request = request.clone();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let (session, result) = tokio::task::spawn_blocking(move || {
            let _busy = busy;
            run_session(binding.as_ref(), &request, &sampling, guard, cancel, |_| true)
        })
        .await?;
        result?;

        Ok(GenerationOutcome {
            reason: session.stop_reason(),
            chunks: session.chunk_count(),
            text: session.into_text(),
        })
    }

    /// Start generation on a background worker and return the event stream.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        sampling: SamplingParams,
        cancel: CancellationToken,
    ) -> GenerationStream {
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let binding = self.binding.clone();
        let guard = self.guard.clone();
        let busy = self.busy.mark();
        let request = request.clone();
        let worker_cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let _busy = busy;
            let (session, result) = run_session(
                binding.as_ref(),
                &request,
                &sampling,
                guard,
                worker_cancel,
                |chunk| tx.blocking_send(GenerationEvent::Chunk(chunk.to_string())).is_ok(),
            );

            let last = match result {
                Ok(()) => GenerationEvent::Done {
                    chunks: session.chunk_count(),
                    reason: session.stop_reason(),
                },
                Err(e) => GenerationEvent::Error(e.to_string()),
            };
            // Receiver gone means the client left; nothing to report to.
            let _ = tx.blocking_send(last);
        });

        GenerationStream {
            rx,
            cancel: cancel.clone(),
            _cancel_on_drop: cancel.drop_guard(),
            delivered: 0,
            finished: false,
        }
    }
}

/// Feed every chunk of one `generate` call through a session.
///
/// `deliver` forwards accepted chunks; returning `false` (consumer gone)
/// stops the binding.
fn run_session<F>(
    binding: &dyn Binding,
    request: &GenerationRequest,
    sampling: &SamplingParams,
    guard: AntipromptGuard,
    cancel: CancellationToken,
    mut deliver: F,
) -> (GenerationSession, Result<(), BindingError>)
where
    F: FnMut(&str) -> bool,
{
    info!(
        request_id = request.request_id,
        binding = binding.name(),
        n_predict = request.n_predict,
        stream = request.stream,
        "Starting generation"
    );

    let mut session = GenerationSession::new(guard, cancel.clone());
    let result = binding.generate(&request.prompt, request.n_predict, sampling, &mut |chunk: &str| {
        match session.on_chunk(chunk) {
            ChunkOutcome::Emit(accepted) => {
                if deliver(accepted) {
                    ChunkControl::Continue
                } else {
                    debug!(request_id = request.request_id, "Consumer dropped, stopping");
                    cancel.cancel();
                    ChunkControl::Stop
                }
            }
            ChunkOutcome::Halt { keep, .. } => {
                if !keep.is_empty() {
                    deliver(keep);
                }
                ChunkControl::Stop
            }
        }
    });

    match &result {
        Ok(()) => info!(
            request_id = request.request_id,
            chunks = session.chunk_count(),
            reason = %session.stop_reason(),
            "Generation complete"
        ),
        Err(e) => warn!(request_id = request.request_id, error = %e, "Generation failed"),
    }

    (session, result)
}

/// Consumer half of a streaming generation.
///
/// Yields chunks in production order, then exactly one terminal event
/// (`Done` or `Error`). A worker that dies mid-generation surfaces as
/// `Error`. Dropping the stream cancels the generation.
pub struct GenerationStream {
    rx: mpsc::Receiver<GenerationEvent>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
    delivered: usize,
    finished: bool,
}

impl GenerationStream {
    /// Next event, or `None` once the terminal event has been returned.
    ///
    /// Chunks already buffered are drained before a cancellation is honoured,
    /// so the stream ends promptly even when the binding is stuck inside a
    /// call and cannot observe the token itself.
    pub async fn recv(&mut self) -> Option<GenerationEvent> {
        if self.finished {
            return None;
        }

        let event = tokio::select! {
            biased;
            // The worker always sends a terminal event unless it panicked.
            event = self.rx.recv() => Some(event.unwrap_or_else(|| {
                warn!("Generation worker exited without a terminal event");
                GenerationEvent::Error("generation worker exited unexpectedly".to_string())
            })),
            _ = self.cancel.cancelled() => match self.rx.try_recv() {
                Ok(event) => Some(event),
                Err(_) => Some(GenerationEvent::Done {
                    chunks: self.delivered,
                    reason: StopReason::Cancelled,
                }),
            },
        };

        match &event {
            Some(GenerationEvent::Chunk(_)) => self.delivered += 1,
            _ => self.finished = true,
        }
        event
    }

    /// Adapt into a [`Stream`] for response bodies.
    pub fn into_stream(self) -> impl Stream<Item = GenerationEvent> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.recv().await.map(|event| (event, stream))
        })
    }
}
