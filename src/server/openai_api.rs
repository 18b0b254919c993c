//! OpenAI-compatible HTTP API.
//!
//! Implements the subset of the OpenAI API the bridge serves:
//! - POST /v1/chat/completions
//! - POST /v1/completions
//! - GET /v1/models

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::BridgeError;
use crate::inference::bridge::GenerationOutcome;
use crate::inference::params::{GenerationParameters, GenerationRequest};
use crate::inference::session::StopReason;
use crate::server::lollms_api::no_binding;
use crate::server::streaming::{chat_sse_response, text_stream_response, unix_now};
use crate::state::AppState;

// ─── Request/Response Types ────────────────────────────────────────────────

/// Chat completion request (OpenAI-compatible).
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    /// `null` or missing means 0.1.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

const DEFAULT_CHAT_TEMPERATURE: f64 = 0.1;

/// Chat completion response (non-streaming).
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: usize,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// Token accounting. The binding does not expose its tokenizer, so only
/// generated chunks are counted.
#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Model listing response.
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

// ─── Request Adapters ──────────────────────────────────────────────────────

/// Flatten chat messages into a single prompt, one `role: content` line each.
pub fn chat_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}\n", m.role, m.content))
        .collect()
}

impl ChatCompletionRequest {
    /// Non-positive or missing `max_tokens` uses the configured `n_predict`.
    pub fn into_generation(self, request_id: String, default_n_predict: usize) -> GenerationRequest {
        let n_predict = match self.max_tokens {
            Some(n) if n > 0 => n as usize,
            _ => default_n_predict,
        };

        GenerationRequest {
            request_id,
            prompt: chat_prompt(&self.messages),
            n_predict,
            stream: self.stream.unwrap_or(false),
            sampling: GenerationParameters::with_temperature(
                self.temperature.unwrap_or(DEFAULT_CHAT_TEMPERATURE),
            ),
        }
    }
}

/// Adapt the loosely typed legacy completion payload.
///
/// `prompt` is required; `max_tokens`, `stream` and `temperature` are
/// optional and fall back to the configured defaults.
pub fn legacy_completion_request(
    data: &Value,
    request_id: String,
    default_n_predict: usize,
) -> Result<GenerationRequest, BridgeError> {
    let object = data
        .as_object()
        .ok_or_else(|| BridgeError::InvalidRequest("expected a JSON object".to_string()))?;

    let prompt = object
        .get("prompt")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::InvalidRequest("missing string field `prompt`".to_string()))?;

    let n_predict = object
        .get("max_tokens")
        .and_then(Value::as_f64)
        .filter(|n| *n > 0.0)
        .map(|n| n as usize)
        .unwrap_or(default_n_predict);

    let stream = object.get("stream").and_then(Value::as_bool).unwrap_or(false);

    let sampling = GenerationParameters {
        temperature: object.get("temperature").and_then(Value::as_f64),
        ..GenerationParameters::default()
    };

    Ok(GenerationRequest {
        request_id,
        prompt: prompt.to_string(),
        n_predict,
        stream,
        sampling,
    })
}

fn finish_reason(outcome: &GenerationOutcome, n_predict: usize) -> &'static str {
    match outcome.reason {
        StopReason::Completed if outcome.chunks >= n_predict => "length",
        _ => "stop",
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatCompletionRequest>,
) -> Response {
    state.metrics.record_request("chat_completions");
    let request_id = Uuid::new_v4().to_string();

    info!(
        request_id = request_id,
        model = req.model.as_deref().unwrap_or(""),
        messages = req.messages.len(),
        stream = req.stream.unwrap_or(false),
        "Chat completion request"
    );

    let Some(bridge) = state.bridge().await else {
        return no_binding();
    };

    let n_predict_default = state.defaults().await.n_predict;
    let gen_request = req.into_generation(request_id.clone(), n_predict_default);
    let sampling = state.resolve(&gen_request.sampling).await;
    let cancel = state.request_token();

    if gen_request.stream {
        let stream = bridge.generate(&gen_request, sampling, cancel);
        return chat_sse_response(state.clone(), stream, request_id, state.model_name.clone());
    }

    match bridge.run_to_completion(&gen_request, sampling, cancel).await {
        Ok(outcome) => {
            state.metrics.record_finished(outcome.reason, outcome.chunks);
            let response = ChatCompletionResponse {
                id: format!("chatcmpl-{request_id}"),
                object: "chat.completion".to_string(),
                created: unix_now(),
                model: state.model_name.clone(),
                choices: vec![ChatChoice {
                    index: 0,
                    message: ChatMessage {
                        role: "assistant".to_string(),
                        content: outcome.text.clone(),
                    },
                    finish_reason: finish_reason(&outcome, gen_request.n_predict).to_string(),
                }],
                usage: Usage {
                    prompt_tokens: 0,
                    completion_tokens: outcome.chunks,
                    total_tokens: outcome.chunks,
                },
            };
            Json(response).into_response()
        }
        Err(e) => {
            state.report_error(&e);
            e.into_response()
        }
    }
}

pub async fn completions(State(state): State<Arc<AppState>>, Json(data): Json<Value>) -> Response {
    state.metrics.record_request("completions");
    let request_id = Uuid::new_v4().to_string();

    let Some(bridge) = state.bridge().await else {
        return no_binding();
    };

    let gen_request = match legacy_completion_request(&data, request_id, state.defaults().await.n_predict) {
        Ok(r) => r,
        Err(e) => {
            state.report_error(&e);
            return e.into_response();
        }
    };

    info!(
        request_id = gen_request.request_id,
        stream = gen_request.stream,
        "Completion request"
    );

    let sampling = state.resolve(&gen_request.sampling).await;
    let cancel = state.request_token();

    if gen_request.stream {
        let stream = bridge.generate(&gen_request, sampling, cancel);
        return text_stream_response(state, stream);
    }

    match bridge.run_to_completion(&gen_request, sampling, cancel).await {
        Ok(outcome) => {
            state.metrics.record_finished(outcome.reason, outcome.chunks);
            outcome.text.into_response()
        }
        Err(e) => {
            state.report_error(&e);
            e.into_response()
        }
    }
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(ModelList {
        object: "list".to_string(),
        data: vec![ModelInfo {
            id: state.model_name.clone(),
            object: "model".to_string(),
            created: 0,
            owned_by: "local".to_string(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_prompt_concatenates_roles() {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: "be brief".to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            },
        ];
        assert_eq!(chat_prompt(&messages), "system: be brief\nuser: hi\n");
    }

    #[test]
    fn test_chat_non_positive_max_tokens_falls_back() {
        let req: ChatCompletionRequest =
            serde_json::from_value(json!({"messages": [], "max_tokens": 0})).unwrap();
        let gen = req.into_generation("r".to_string(), 1024);
        assert_eq!(gen.n_predict, 1024);
        assert_eq!(gen.sampling.temperature, Some(0.1));
        assert_eq!(gen.sampling.top_k, None);
    }

    #[test]
    fn test_chat_null_fields_use_defaults() {
        let req: ChatCompletionRequest =
            serde_json::from_value(json!({"messages": [], "temperature": null, "stream": null})).unwrap();
        let gen = req.into_generation("r".to_string(), 1024);
        assert!(!gen.stream);
        assert_eq!(gen.sampling.temperature, Some(0.1));
    }

    #[test]
    fn test_legacy_payload_defaults() {
        let gen = legacy_completion_request(&json!({"prompt": "Once"}), "r".to_string(), 77).unwrap();
        assert_eq!(gen.prompt, "Once");
        assert_eq!(gen.n_predict, 77);
        assert!(!gen.stream);
        assert_eq!(gen.sampling.temperature, None);
    }

    #[test]
    fn test_legacy_payload_accepts_float_max_tokens() {
        let gen = legacy_completion_request(
            &json!({"prompt": "Once", "max_tokens": 12.0, "stream": true, "temperature": 0.9}),
            "r".to_string(),
            77,
        )
        .unwrap();
        assert_eq!(gen.n_predict, 12);
        assert!(gen.stream);
        assert_eq!(gen.sampling.temperature, Some(0.9));
    }

    #[test]
    fn test_legacy_payload_requires_prompt() {
        let err = legacy_completion_request(&json!({"max_tokens": 3}), "r".to_string(), 77).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));
    }
}
