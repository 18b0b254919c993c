//! Per-request generation session.
//!
//! The session is owned by the worker running the binding. It accumulates
//! the generated text, applies the antiprompt guard to every chunk and
//! watches the request's cancellation token.

use tokio_util::sync::CancellationToken;

use crate::inference::antiprompt::{AntipromptGuard, AntipromptMatch};

/// Why a generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The binding produced all it was going to.
    Completed,
    /// An antiprompt marker was found and the text truncated.
    Antiprompt,
    /// The request was cancelled (stop endpoint or client disconnect).
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::Antiprompt => "antiprompt",
            StopReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of feeding one chunk into the session.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome<'a> {
    /// Deliver the chunk and keep generating.
    Emit(&'a str),
    /// Deliver `keep` (the part of the chunk before an antiprompt, possibly
    /// empty) and stop generating.
    Halt { keep: &'a str, reason: StopReason },
}

pub struct GenerationSession {
    text: String,
    chunks: usize,
    guard: AntipromptGuard,
    cancel: CancellationToken,
    stopped: Option<StopReason>,
    antiprompt: Option<AntipromptMatch>,
}

impl GenerationSession {
    pub fn new(guard: AntipromptGuard, cancel: CancellationToken) -> Self {
        Self {
            text: String::new(),
            chunks: 0,
            guard,
            cancel,
            stopped: None,
            antiprompt: None,
        }
    }

    /// Append a chunk and decide whether it may be delivered.
    pub fn on_chunk<'a>(&mut self, chunk: &'a str) -> ChunkOutcome<'a> {
        if let Some(reason) = self.stopped {
            return ChunkOutcome::Halt { keep: "", reason };
        }
        if self.cancel.is_cancelled() {
            self.stopped = Some(StopReason::Cancelled);
            return ChunkOutcome::Halt {
                keep: "",
                reason: StopReason::Cancelled,
            };
        }

        let before = self.text.len();
        self.text.push_str(chunk);
        if let Some(found) = self.guard.check_and_truncate(&mut self.text, before) {
            // A marker that began in an earlier chunk leaves nothing to keep.
            let keep = &chunk[..found.position.saturating_sub(before)];
            if !keep.is_empty() {
                self.chunks += 1;
            }
            self.antiprompt = Some(found);
            self.stopped = Some(StopReason::Antiprompt);
            return ChunkOutcome::Halt {
                keep,
                reason: StopReason::Antiprompt,
            };
        }

        self.chunks += 1;
        ChunkOutcome::Emit(chunk)
    }

    /// Text accumulated so far, truncated at any antiprompt.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Chunks accepted for delivery.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// The antiprompt that ended generation, if any.
    pub fn antiprompt(&self) -> Option<&AntipromptMatch> {
        self.antiprompt.as_ref()
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stopped.unwrap_or(StopReason::Completed)
    }
}
