//! Native generation endpoints.
//!
//! - GET /get_generation_status
//! - POST /lollms_generate
//! - POST /stop_gen
//! - GET /health
//! - GET /metrics

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::inference::params::{GenerationParameters, GenerationRequest};
use crate::server::streaming::text_stream_response;
use crate::state::AppState;

/// Native generation request. Unset sampling fields use the server defaults.
#[derive(Debug, Deserialize)]
pub struct LollmsGenerateRequest {
    pub text: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub personality: Option<i64>,
    #[serde(default)]
    pub n_predict: Option<usize>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub repeat_penalty: Option<f64>,
    #[serde(default)]
    pub repeat_last_n: Option<u32>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub n_threads: Option<u32>,
}

impl LollmsGenerateRequest {
    pub fn into_generation(self, request_id: String, default_n_predict: usize) -> GenerationRequest {
        GenerationRequest {
            request_id,
            prompt: self.text,
            n_predict: self.n_predict.unwrap_or(default_n_predict),
            stream: self.stream,
            sampling: GenerationParameters {
                temperature: self.temperature,
                top_k: self.top_k,
                top_p: self.top_p,
                repeat_penalty: self.repeat_penalty,
                repeat_last_n: self.repeat_last_n,
                seed: self.seed,
                n_threads: self.n_threads,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub binding: Option<String>,
    pub busy: bool,
}

/// Body returned by generation endpoints when no binding is mounted.
pub(crate) fn no_binding() -> Response {
    debug!("No binding mounted");
    Json(Value::Null).into_response()
}

pub async fn generation_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.is_busy(),
    })
}

pub async fn lollms_generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LollmsGenerateRequest>,
) -> Response {
    state.metrics.record_request("lollms_generate");
    let request_id = Uuid::new_v4().to_string();

    info!(
        request_id = request_id,
        model = req.model_name.as_deref().unwrap_or(""),
        n_predict = req.n_predict,
        stream = req.stream,
        "Generate request"
    );
    if let Some(personality) = req.personality {
        debug!(request_id = request_id, personality, "Personality selection is not supported, ignoring");
    }

    let Some(bridge) = state.bridge().await else {
        return no_binding();
    };

    let gen_request = req.into_generation(request_id, state.defaults().await.n_predict);
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

/// Stop every generation in flight.
pub async fn stop_gen(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.cancellation.stop_all();
    Json(StatusResponse { status: true })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        binding: state.binding_name().await,
        busy: state.is_busy(),
    })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
