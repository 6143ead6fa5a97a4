// ============================================================================
// RENDER GATE — re-entrancy guard shared with whoever schedules redraws
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set while a render is in progress.  A render that finds the gate held is
/// coalesced into a no-op instead of being queued.
#[derive(Clone, Debug, Default)]
pub struct RenderGate {
    busy: Arc<AtomicBool>,
}

impl RenderGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate.  `None` if a render already holds it.
    pub fn try_enter(&self) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate on drop, including on early error returns.
#[derive(Debug)]
pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
