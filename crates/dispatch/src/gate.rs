//! Generation gate: the dry-run switch.
//!
//! A [`GenerationGate`] is created once at startup (disabled in test mode)
//! and cloned into every generation. Clones share one flag. The submitter
//! reads it exactly once, immediately before invoking the scheduler, so
//! flipping it later never affects a request already past that point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct GenerationGate {
    enabled: Arc<AtomicBool>,
}

impl Default for GenerationGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GenerationGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "Generation gate updated");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
