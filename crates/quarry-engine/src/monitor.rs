//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::EngineError;

/// Receives progress from a resolution and tells it when to stop.
pub trait ProgressMonitor: Send + Sync {
    fn is_cancelled(&self) -> bool;

    fn report_progress(&self, message: &str, units: u32);
}

/// A monitor that never cancels and discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl ProgressMonitor for NullMonitor {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn report_progress(&self, _message: &str, _units: u32) {}
}

/// A monitor backed by an atomic flag, cancellable from any thread.
/// Progress goes to the `trace` log.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl ProgressMonitor for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn report_progress(&self, message: &str, units: u32) {
        tracing::trace!(units, "{message}");
    }
}

/// Fail with `Cancelled` if the monitor asks to stop, else report `message`.
pub(crate) fn checkpoint(monitor: &dyn ProgressMonitor, message: &str) -> Result<(), EngineError> {
    if monitor.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    monitor.report_progress(message, 1);
    Ok(())
}
