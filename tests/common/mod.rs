//! Shared helpers for the HTTP tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;

use lollms_bridge::config::Config;
use lollms_bridge::error::BridgeError;
use lollms_bridge::inference::binding::{Binding, BindingError, ChunkControl};
use lollms_bridge::inference::params::SamplingParams;
use lollms_bridge::server::build_router;
use lollms_bridge::state::{AppState, ErrorSink};

/// Keeps every reported error for inspection.
#[derive(Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<String>>,
}

impl ErrorSink for RecordingSink {
    fn report(&self, err: &BridgeError) {
        self.errors.lock().unwrap().push(err.to_string());
    }
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

/// Emits one chunk, then panics inside `generate`.
pub struct PanickingBinding;

impl Binding for PanickingBinding {
    fn name(&self) -> &str {
        "panicking"
    }

    fn generate(
        &self,
        _prompt: &str,
        _n_predict: usize,
        _params: &SamplingParams,
        on_chunk: &mut dyn FnMut(&str) -> ChunkControl,
    ) -> Result<(), BindingError> {
        on_chunk("a");
        panic!("binding crashed");
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub sink: Arc<RecordingSink>,
}

pub fn test_app(binding: Option<Arc<dyn Binding>>) -> TestApp {
    test_app_with(Config::default(), binding)
}

pub fn test_app_with(config: Config, binding: Option<Arc<dyn Binding>>) -> TestApp {
    let sink = Arc::new(RecordingSink::default());
    let state = Arc::new(AppState::new(&config, binding, sink.clone()).unwrap());
    TestApp {
        router: build_router(state.clone()),
        state,
        sink,
    }
}

pub fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
