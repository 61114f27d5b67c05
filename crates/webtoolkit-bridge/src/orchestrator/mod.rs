//! Capture and form-answer flows across the coordinator/page boundary.

pub mod capture;
pub mod form;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{BridgeError, BridgeResult};

pub use capture::{is_restricted_url, CaptureOrchestrator};
pub use form::{FormAnswer, FormAnswerOrchestrator};

/// Admits one operation at a time.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

/// Releases its [`InFlight`] when dropped.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl InFlight {
    pub fn try_begin(&self, operation: &'static str) -> BridgeResult<InFlightGuard<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::warn!("Rejected overlapping {operation}");
            return Err(BridgeError::Busy(operation));
        }
        Ok(InFlightGuard { busy: &self.busy })
    }

    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
