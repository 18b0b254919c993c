//! Generation against the mounted binding.
//!
//! - [`binding`]: The binding interface and built-in bindings
//! - [`params`]: Sampling parameters and default resolution
//! - [`antiprompt`]: Hallucination guard
//! - [`session`]: Per-request accumulated text and stop decisions
//! - [`cancel`]: Server-wide cancellation of in-flight generations
//! - [`bridge`]: Blocking binding → async stream bridge

pub mod antiprompt;
pub mod binding;
pub mod bridge;
pub mod cancel;
pub mod params;
pub mod session;
