//! Shared idle-check primitive.
//!
//! "Idle enough to proceed" is four independent sub-checks, each with its own
//! failure reason so aborts can be attributed precisely:
//! 1. no interrupt pending on the engine's interrupt-status registers,
//! 2. the idle-flip latch is clear (the engine has not gone busy, even
//!    transiently, since the latch was last cleared — a plain busy snapshot
//!    would miss those windows),
//! 3. the controller's software work queue is empty,
//! 4. (chip-specific) the SEC2 wake-up status bit is clear.

use lpwr_regs::{Bus, ChipCaps, RegisterBus};

use crate::regs;
use crate::state::PgCtrl;

/// Why the engine is not considered idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    IntrPending,
    IdleFlip,
    QueueNotEmpty,
    Sec2Wake,
}

/// Run the four sub-checks in order; the first failure wins.
pub fn check_idle(
    bus: &mut dyn RegisterBus,
    caps: &ChipCaps,
    ctrl: PgCtrl,
    intr_pending_mask: u32,
    queued_requests: usize,
) -> Result<(), IdleReason> {
    let intr = bus.read32(Bus::Csb, regs::pg_addr(ctrl, regs::PG_INTR_STATUS));
    if intr & intr_pending_mask != 0 {
        return Err(IdleReason::IntrPending);
    }

    let flip = bus.read32(Bus::Csb, regs::pg_addr(ctrl, regs::PG_IDLE_FLIP));
    if flip & regs::IDLE_FLIP_ASSERTED != 0 {
        return Err(IdleReason::IdleFlip);
    }

    if queued_requests != 0 {
        return Err(IdleReason::QueueNotEmpty);
    }

    if caps.sec2_wake_check {
        let wake = bus.read32(Bus::Csb, regs::SEC2_WAKE_STATUS);
        if wake & regs::SEC2_WAKE_ASSERTED != 0 {
            return Err(IdleReason::Sec2Wake);
        }
    }

    Ok(())
}

/// Clear the idle-flip latch. The preemption protocol's own register traffic
/// re-asserts the latch, so the sequencer clears it after a successful
/// preempt before re-evaluating idleness.
pub fn clear_idle_flip(bus: &mut dyn RegisterBus, ctrl: PgCtrl) {
    bus.write32(
        Bus::Csb,
        regs::pg_addr(ctrl, regs::PG_IDLE_FLIP),
        regs::IDLE_FLIP_CLEAR,
    );
}
