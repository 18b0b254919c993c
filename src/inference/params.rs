//! Generation parameters and the request shape every endpoint converges on.

use serde::{Deserialize, Serialize};

use crate::config::GenerationDefaults;

/// Per-request sampling overrides. Unset fields fall back to the server's
/// configured defaults when generation starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    pub repeat_penalty: Option<f64>,
    pub repeat_last_n: Option<u32>,
    pub seed: Option<i64>,
    pub n_threads: Option<u32>,
}

/// Fully resolved sampling configuration handed to the binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub repeat_penalty: f64,
    pub repeat_last_n: u32,
    pub seed: i64,
    pub n_threads: u32,
}

impl GenerationParameters {
    /// Only the temperature is overridden; everything else uses the defaults.
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
            ..Self::default()
        }
    }

    /// Fill every unset field from `defaults`.
    pub fn resolve(&self, defaults: &GenerationDefaults) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            repeat_penalty: self.repeat_penalty.unwrap_or(defaults.repeat_penalty),
            repeat_last_n: self.repeat_last_n.unwrap_or(defaults.repeat_last_n),
            seed: self.seed.unwrap_or(defaults.seed),
            n_threads: self.n_threads.unwrap_or(defaults.n_threads),
        }
    }
}

impl From<&GenerationDefaults> for SamplingParams {
    fn from(defaults: &GenerationDefaults) -> Self {
        GenerationParameters::default().resolve(defaults)
    }
}

/// A generation request, after any of the HTTP request shapes has been adapted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Unique request ID.
    pub request_id: String,

    /// Prompt text passed to the binding unchanged.
    pub prompt: String,

    /// Maximum tokens to generate.
    pub n_predict: usize,

    /// Whether the caller wants chunks as they are produced.
    pub stream: bool,

    /// Sampling overrides, resolved against the defaults at call time.
    pub sampling: GenerationParameters,
}
