//! Interface to the mounted model binding.
//!
//! The binding owns tokenization, sampling and model execution. Its
//! `generate` call blocks the calling thread and invokes a callback once per
//! produced chunk; the callback's return value decides whether generation
//! continues.
//!
//! Two bindings ship with the crate: [`EchoBinding`] so the server can run
//! without a model, and [`ScriptedBinding`] for deterministic tests.

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

use crate::inference::params::SamplingParams;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// What the binding should do after delivering a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    Continue,
    Stop,
}

/// A model binding performing blocking, callback-driven generation.
pub trait Binding: Send + Sync {
    /// Human-readable binding name.
    fn name(&self) -> &str;

    /// Generate up to `n_predict` tokens for `prompt`, calling `on_chunk` for
    /// every chunk in production order. Returns once generation is exhausted
    /// or the callback returned [`ChunkControl::Stop`].
    fn generate(
        &self,
        prompt: &str,
        n_predict: usize,
        params: &SamplingParams,
        on_chunk: &mut dyn FnMut(&str) -> ChunkControl,
    ) -> Result<(), BindingError>;
}

/// Echoes the prompt back one word per chunk.
#[derive(Debug, Default)]
pub struct EchoBinding;

impl Binding for EchoBinding {
    fn name(&self) -> &str {
        "echo"
    }

    fn generate(
        &self,
        prompt: &str,
        n_predict: usize,
        _params: &SamplingParams,
        on_chunk: &mut dyn FnMut(&str) -> ChunkControl,
    ) -> Result<(), BindingError> {
        for (i, word) in prompt.split_inclusive(char::is_whitespace).enumerate() {
            if i >= n_predict {
                break;
            }
            if on_chunk(word) == ChunkControl::Stop {
                break;
            }
        }
        Ok(())
    }
}

/// Emits a fixed list of chunks.
///
/// Optionally sleeps before each chunk and fails after a given number of
/// chunks. Records the sampling parameters of the last call.
#[derive(Debug, Default)]
pub struct ScriptedBinding {
    chunks: Vec<String>,
    delay: Option<Duration>,
    fail_after: Option<usize>,
    last_params: Mutex<Option<SamplingParams>>,
    requested: Mutex<usize>,
}

impl ScriptedBinding {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sleep for `delay` before producing each chunk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return an error after `n` chunks have been delivered.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Sampling parameters received by the most recent `generate` call.
    pub fn last_params(&self) -> Option<SamplingParams> {
        self.last_params
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(None)
    }

    /// Number of chunks handed to callbacks across all calls.
    pub fn chunks_requested(&self) -> usize {
        self.requested.lock().map(|n| *n).unwrap_or(0)
    }
}

impl Binding for ScriptedBinding {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(
        &self,
        _prompt: &str,
        n_predict: usize,
        params: &SamplingParams,
        on_chunk: &mut dyn FnMut(&str) -> ChunkControl,
    ) -> Result<(), BindingError> {
        if let Ok(mut last) = self.last_params.lock() {
            *last = Some(params.clone());
        }

        for (i, chunk) in self.chunks.iter().take(n_predict).enumerate() {
            if self.fail_after == Some(i) {
                return Err(BindingError::GenerationFailed(format!(
                    "scripted failure after {i} chunks"
                )));
            }
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if let Ok(mut n) = self.requested.lock() {
                *n += 1;
            }
            if on_chunk(chunk) == ChunkControl::Stop {
                return Ok(());
            }
        }

        if self.fail_after == Some(self.chunks.len().min(n_predict)) {
            return Err(BindingError::GenerationFailed(
                "scripted failure at end of output".to_string(),
            ));
        }
        Ok(())
    }
}
