//! Per-controller power-gate state.

use lpwr_regs::{Bus, RegisterBus};

use crate::regs;

/// The two flavors of the GR power-gate controller.
///
/// `GrPg` gates engine logic/SRAM only; `GrRg` additionally cuts the voltage
/// rail and runs the extra reset/clamp/GPIO phases on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PgCtrl {
    GrPg,
    GrRg,
}

impl PgCtrl {
    pub fn index(self) -> u32 {
        match self {
            PgCtrl::GrPg => 0,
            PgCtrl::GrRg => 1,
        }
    }
}

bitflags::bitflags! {
    /// Optional sub-features enabled for a controller, from fuses/PLM read
    /// at init. Invariant for the life of the boot, except that a
    /// privilege-locked register statically disables its sub-feature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SupportFlags: u32 {
        /// PRI error-detection mechanism may be armed over the gated range.
        const PRIV_RING = 1 << 0;
        /// MMU unbind/rebind runs during entry/exit.
        const UNBIND = 1 << 1;
        /// Global register state is saved/restored across the transition.
        const SAVE_GLOBAL_STATE = 1 << 2;
        /// Clock-domain access is dropped for the duration of the sequence.
        const CLK_ACCESS_GATING = 1 << 3;
    }
}

/// Read the LPWR feature fuses, then statically drop anything a higher
/// privilege level has locked out from under us.
pub fn probe_support(bus: &mut dyn RegisterBus) -> SupportFlags {
    let fuse = bus.read32(Bus::Bar0, regs::FUSE_OPT_LPWR);
    let mut support = SupportFlags::from_bits_truncate(fuse);
    let plm = bus.read32(Bus::Bar0, regs::LPWR_PLM);
    if plm & regs::PLM_WRITE_PROTECTED != 0 {
        support.remove(SupportFlags::PRIV_RING);
    }
    support
}

/// Read-mostly bookkeeping for one power-gate controller.
#[derive(Debug, Clone)]
pub struct PowerGateState {
    pub ctrl: PgCtrl,
    /// FIFO engine ids whose scheduling is held off during a transition.
    /// Computed once from which engines exist on this chip.
    pub holdoff_mask: u32,
    /// Idle-signal masks programmed into the controller at init.
    pub idle_mask: [u32; 3],
    /// Last abort, OR-encoded as `checkpoint | reason`. Diagnostic only.
    pub abort_reason: u32,
    pub support: SupportFlags,
}

impl PowerGateState {
    pub fn new(ctrl: PgCtrl) -> Self {
        Self {
            ctrl,
            holdoff_mask: 0,
            idle_mask: [0; 3],
            abort_reason: 0,
            support: SupportFlags::empty(),
        }
    }
}
