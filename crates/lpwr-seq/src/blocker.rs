//! Priv-blocker controller.
//!
//! Keeps privileged register-bus traffic away from the engine while its
//! clocks/power are manipulated, without dropping traffic other on-chip
//! agents still need serviced. Normal path per controller:
//! `Unblocked -> BlockAll -> BlockEquation -> Unblocked`, with a direct
//! return to `Unblocked` from either blocked mode on abort.
//!
//! Engage runs under the platform critical section: a concurrent requester
//! observing a partially-engaged blocker would be unsafe.

use lpwr_regs::{poll32, Bus, ChipCaps, Clock, PollUnit, RegisterBus};
use tracing::{trace, warn};

use crate::abort::AbortReason;
use crate::idle::check_idle;
use crate::platform::Platform;
use crate::regs;
use crate::state::PgCtrl;

/// Blocker hardware mode, as written to and read back from the mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockerMode {
    Unblocked,
    BlockAll,
    BlockEquation,
}

impl BlockerMode {
    pub fn bits(self) -> u32 {
        match self {
            BlockerMode::Unblocked => 0,
            BlockerMode::BlockAll => 1,
            BlockerMode::BlockEquation => 2,
        }
    }
}

/// Engage/flush poll windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockerTimeouts {
    /// Per mode change; the blocker acknowledges in tens of microseconds.
    pub engage_ns: u64,
    /// Priv-path flush drain window.
    pub flush_ns: u64,
}

impl Default for BlockerTimeouts {
    fn default() -> Self {
        Self {
            engage_ns: 30_000,
            flush_ns: 1_000_000,
        }
    }
}

/// Walk the blocker to `BlockEquation` for a power-gate entry.
///
/// On any failure the blocker is returned to `Unblocked` here, inline. The
/// abort machine disengages again at `AfterPrivBlocker`; both calls must
/// stay (see DESIGN.md) and both are idempotent.
pub fn engage(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    caps: &ChipCaps,
    ctrl: PgCtrl,
    intr_pending_mask: u32,
    timeouts: &BlockerTimeouts,
    platform: &mut dyn Platform,
) -> Result<(), AbortReason> {
    platform.critical_enter();
    let result = engage_locked(bus, clock, caps, ctrl, intr_pending_mask, timeouts, platform);
    if let Err(reason) = result {
        warn!("priv blocker engage failed for {:?}: {:?}", ctrl, reason);
        disengage(bus, caps, ctrl);
    }
    platform.critical_exit();
    result
}

fn engage_locked(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    caps: &ChipCaps,
    ctrl: PgCtrl,
    intr_pending_mask: u32,
    timeouts: &BlockerTimeouts,
    platform: &mut dyn Platform,
) -> Result<(), AbortReason> {
    if ctrl == PgCtrl::GrRg && caps.rg_allow_range {
        bus.write32(
            Bus::Bar0,
            regs::blocker_addr(ctrl, regs::BLOCKER_ALLOW_LO),
            regs::ALLOW_RANGE_WIDE_LO,
        );
        bus.write32(
            Bus::Bar0,
            regs::blocker_addr(ctrl, regs::BLOCKER_ALLOW_HI),
            regs::ALLOW_RANGE_WIDE_HI,
        );
    }

    if !set_mode(bus, clock, ctrl, BlockerMode::BlockAll, timeouts.engage_ns) {
        return Err(AbortReason::BlockAllTimeout);
    }

    if !flush_priv_path(bus, clock, caps, timeouts.flush_ns) {
        return Err(AbortReason::FlushTimeout);
    }

    let queued = platform.queued_requests(ctrl);
    check_idle(bus, caps, ctrl, intr_pending_mask, queued)?;

    if !set_mode(bus, clock, ctrl, BlockerMode::BlockEquation, timeouts.engage_ns) {
        return Err(AbortReason::BlockEquationTimeout);
    }

    Ok(())
}

/// Return the blocker to `Unblocked`. Fire-and-forget; never fails, safe to
/// repeat. The RG variant also narrows the allow range back down.
pub fn disengage(bus: &mut dyn RegisterBus, caps: &ChipCaps, ctrl: PgCtrl) {
    bus.write32(
        Bus::Bar0,
        regs::blocker_addr(ctrl, 0),
        BlockerMode::Unblocked.bits(),
    );
    if ctrl == PgCtrl::GrRg && caps.rg_allow_range {
        bus.write32(
            Bus::Bar0,
            regs::blocker_addr(ctrl, regs::BLOCKER_ALLOW_LO),
            regs::ALLOW_RANGE_NARROW_LO,
        );
        bus.write32(
            Bus::Bar0,
            regs::blocker_addr(ctrl, regs::BLOCKER_ALLOW_HI),
            regs::ALLOW_RANGE_NARROW_HI,
        );
    }
}

fn set_mode(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    ctrl: PgCtrl,
    mode: BlockerMode,
    timeout_ns: u64,
) -> bool {
    let addr = regs::blocker_addr(ctrl, 0);
    trace!("priv blocker {:?} -> {:?}", ctrl, mode);
    bus.write32(Bus::Bar0, addr, mode.bits());
    poll32(
        bus,
        clock,
        Bus::Bar0,
        addr,
        regs::BLOCKER_MODE_FIELD,
        mode.bits(),
        timeout_ns,
        PollUnit::Ns,
    )
}

/// Drain in-flight privileged traffic through every bridge present on this
/// chip.
fn flush_priv_path(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    caps: &ChipCaps,
    timeout_ns: u64,
) -> bool {
    let mut trigger = regs::FLUSH_PRIV_PATH;
    if caps.flush_bridges.external_bus {
        trigger |= regs::FLUSH_EXT_BUS;
    }
    if caps.flush_bridges.sec2 {
        trigger |= regs::FLUSH_SEC2;
    }
    if caps.flush_bridges.gsp {
        trigger |= regs::FLUSH_GSP;
    }
    bus.write32(Bus::Bar0, regs::PRIV_FLUSH_TRIGGER, trigger);
    poll32(
        bus,
        clock,
        Bus::Bar0,
        regs::PRIV_FLUSH_STATUS,
        u32::MAX,
        0,
        timeout_ns,
        PollUnit::Ns,
    )
}
