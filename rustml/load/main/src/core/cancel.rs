//! Cooperative cancellation.

use crate::api::error::{LoadError, LoadResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag shared between a load and whoever may abort it.
///
/// Cloning shares the flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(LoadError::Cancelled)` once cancellation has been requested.
    pub fn checkpoint(&self) -> LoadResult<()> {
        if self.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        Ok(())
    }
}
