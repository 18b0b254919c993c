//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::{BindingKind, Config, GenerationDefaults};
use crate::error::BridgeError;
use crate::inference::antiprompt::AntipromptGuard;
use crate::inference::binding::{Binding, EchoBinding};
use crate::inference::bridge::{BusyFlag, GenerationBridge};
use crate::inference::cancel::CancellationHub;
use crate::inference::params::{GenerationParameters, SamplingParams};
use crate::metrics::Metrics;

/// Receives every error raised while handling a request.
pub trait ErrorSink: Send + Sync {
    fn report(&self, err: &BridgeError);
}

/// Logs reported errors.
#[derive(Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: &BridgeError) {
        error!(error = %err, "Generation request failed");
    }
}

pub struct AppState {
    binding: RwLock<Option<Arc<dyn Binding>>>,
    defaults: RwLock<GenerationDefaults>,
    pub model_name: String,
    pub guard: AntipromptGuard,
    pub cancellation: CancellationHub,
    pub busy: Arc<BusyFlag>,
    pub metrics: Metrics,
    pub errors: Arc<dyn ErrorSink>,
    pub start_time: Instant,
    channel_capacity: usize,
}

impl AppState {
    /// Build state from configuration, mounting the configured built-in binding.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let binding: Option<Arc<dyn Binding>> = match config.model.binding {
            BindingKind::Echo => Some(Arc::new(EchoBinding)),
            BindingKind::None => None,
        };
        Self::new(config, binding, Arc::new(TracingErrorSink))
    }

    pub fn new(
        config: &Config,
        binding: Option<Arc<dyn Binding>>,
        errors: Arc<dyn ErrorSink>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            binding: RwLock::new(binding),
            defaults: RwLock::new(config.generation.clone()),
            model_name: config.model.model_name.clone(),
            guard: AntipromptGuard::new(config.antiprompt.markers.iter().cloned()),
            cancellation: CancellationHub::new(),
            busy: BusyFlag::new(),
            metrics: Metrics::new()?,
            errors,
            start_time: Instant::now(),
            channel_capacity: config.server.stream_channel_capacity,
        })
    }

    /// Replace (or remove) the mounted binding.
    pub async fn mount_binding(&self, binding: Option<Arc<dyn Binding>>) {
        *self.binding.write().await = binding;
    }

    pub async fn binding_name(&self) -> Option<String> {
        self.binding
            .read()
            .await
            .as_ref()
            .map(|b| b.name().to_string())
    }

    /// A bridge to the mounted binding, or `None` when nothing is mounted.
    pub async fn bridge(&self) -> Option<GenerationBridge> {
        let binding = self.binding.read().await.clone()?;
        Some(GenerationBridge::new(
            binding,
            self.guard.clone(),
            self.busy.clone(),
            self.channel_capacity,
        ))
    }

    pub async fn defaults(&self) -> GenerationDefaults {
        self.defaults.read().await.clone()
    }

    /// Change the sampling defaults applied to requests from now on.
    pub async fn set_defaults(&self, defaults: GenerationDefaults) {
        *self.defaults.write().await = defaults;
    }

    /// Resolve request overrides against the current defaults.
    pub async fn resolve(&self, params: &GenerationParameters) -> SamplingParams {
        params.resolve(&*self.defaults.read().await)
    }

    pub fn request_token(&self) -> CancellationToken {
        self.cancellation.request_token()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Send an error to the sink and count it.
    pub fn report_error(&self, err: &BridgeError) {
        self.metrics.record_error();
        self.errors.report(err);
    }
}
