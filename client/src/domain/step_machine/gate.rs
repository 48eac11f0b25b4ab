//! Single-slot gate admitting one step operation at a time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::StepOperation;

/// Holds the operation currently waiting for a response, if any.
#[derive(Debug, Default)]
pub(super) struct InFlightGate {
    slot: Mutex<Option<StepOperation>>,
}

impl InFlightGate {
    fn lock(&self) -> MutexGuard<'_, Option<StepOperation>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for `operation`, or return the operation holding it.
    pub(super) fn try_acquire(
        &self,
        operation: StepOperation,
    ) -> Result<InFlightPermit<'_>, StepOperation> {
        let mut slot = self.lock();
        if let Some(busy) = *slot {
            return Err(busy);
        }
        *slot = Some(operation);
        Ok(InFlightPermit { gate: self })
    }

    /// Operation currently holding the slot.
    pub(super) fn current(&self) -> Option<StepOperation> {
        *self.lock()
    }
}

/// Frees the slot when dropped, including when the owning future is dropped.
#[derive(Debug)]
pub(super) struct InFlightPermit<'a> {
    gate: &'a InFlightGate,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        self.gate.lock().take();
    }
}
