//! Server-wide generation cancellation.
//!
//! `/stop_gen` does not name a request: it stops every generation in flight.
//! Each request receives a child of the current root token; stopping cancels
//! the root and installs a fresh one, so the stop request never leaks into
//! generations started afterwards.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct CancellationHub {
    root: Mutex<CancellationToken>,
}

impl CancellationHub {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(CancellationToken::new()),
        }
    }

    /// Token for a new request. Cancelled by [`stop_all`](Self::stop_all) or
    /// by the request itself (e.g. when its client disconnects).
    pub fn request_token(&self) -> CancellationToken {
        self.current().child_token()
    }

    /// Cancel every generation currently running.
    pub fn stop_all(&self) {
        let previous = match self.root.lock() {
            Ok(mut root) => std::mem::replace(&mut *root, CancellationToken::new()),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), CancellationToken::new()),
        };
        previous.cancel();
        info!("Generation stop requested");
    }

    /// Whether a stop is pending for requests started from now on.
    pub fn is_cancel_requested(&self) -> bool {
        self.current().is_cancelled()
    }

    fn current(&self) -> CancellationToken {
        match self.root.lock() {
            Ok(root) => root.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for CancellationHub {
    fn default() -> Self {
        Self::new()
    }
}
