//! RTOS-side services the sequencer consumes as opaque collaborators.

use crate::state::PgCtrl;

/// Code-resident overlays the sequencer attaches around library-heavy work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    FifoResource,
}

/// How long an entry-semaphore acquire is willing to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaWait {
    /// Normal entry: give up after this many scheduler ticks.
    Bounded(u32),
    /// Voltage/frequency-switch requester: wait as long as it takes.
    Forever,
}

/// Legacy blocking RPC calls (pre-SEC2 chips only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCall {
    GpccsBootstrap,
}

/// Services supplied by the surrounding RTOS/task layer.
///
/// Defaults are permissive no-ops so a bare environment behaves like an
/// uncontended single-task system; [`NullPlatform`] is exactly that.
pub trait Platform {
    fn critical_enter(&mut self) {}
    fn critical_exit(&mut self) {}

    /// Returns `false` if the overlay could not be made resident.
    fn attach_overlay(&mut self, overlay: Overlay) -> bool {
        let _ = overlay;
        true
    }

    fn detach_overlay(&mut self, overlay: Overlay) {
        let _ = overlay;
    }

    /// Returns `false` if the wait expired without the semaphore.
    fn acquire_entry_sema(&mut self, wait: SemaWait) -> bool {
        let _ = wait;
        true
    }

    fn release_entry_sema(&mut self) {}

    /// A higher-priority wake request is pending; long polls should yield
    /// the transition rather than burn their full window.
    fn wake_request_pending(&mut self, ctrl: PgCtrl) -> bool {
        let _ = ctrl;
        false
    }

    /// Queued-but-unprocessed power-state change requests for `ctrl`.
    fn queued_requests(&mut self, ctrl: PgCtrl) -> usize {
        let _ = ctrl;
        0
    }

    /// Enable/disable clock-domain access for the named client.
    fn set_clk_access(&mut self, ctrl: PgCtrl, enabled: bool) {
        let _ = (ctrl, enabled);
    }

    /// Legacy blocking RPC path; returns `false` on failure.
    fn execute_rpc_blocking(&mut self, call: RpcCall) -> bool {
        let _ = call;
        true
    }
}

/// All-defaults [`Platform`].
pub struct NullPlatform;

impl Platform for NullPlatform {}
