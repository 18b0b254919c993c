//! lollms-bridge: HTTP bridge for a mounted text-generation binding.
//!
//! Forwards generation requests to a blocking, callback-driven binding and
//! streams the produced chunks back over HTTP:
//!   native `/lollms_generate`, OpenAI `/v1/chat/completions` and
//!   `/v1/completions`, plus status and stop endpoints.
//!
//! Output is cut at configured antiprompt markers, and `/stop_gen` cancels
//! every generation in flight.

pub mod config;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod server;
pub mod state;
