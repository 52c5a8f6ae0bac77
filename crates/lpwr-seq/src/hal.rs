//! Per-chip-family hardware operations.
//!
//! The sequencer is chip-agnostic: everything generation-specific is either
//! a capability bit ([`ChipCaps`]) or one of these operations. One impl per
//! family; the sequencer takes the HAL by trait object.

use lpwr_regs::{poll32, Bus, ChipCaps, ChipFamily, Clock, PollUnit, RegisterBus};

use crate::regs;
use crate::state::PgCtrl;

pub trait GrHal {
    fn caps(&self) -> &ChipCaps;

    /// Idle-signal masks programmed into the controller's idle logic at
    /// init. All masked signals must read idle for the controller to count
    /// as quiescent.
    fn idle_masks(&self, ctrl: PgCtrl) -> [u32; 3];

    /// Which interrupt-pending bits veto idleness for this controller.
    fn intr_pending_mask(&self, ctrl: PgCtrl) -> u32;

    /// Put the engine and its context interface into reset, observing the
    /// mandated settle time between stages.
    fn assert_engine_resets(&self, bus: &mut dyn RegisterBus, clock: &dyn Clock, settle_ns: u64);

    /// Release the resets asserted by [`GrHal::assert_engine_resets`].
    fn deassert_engine_resets(&self, bus: &mut dyn RegisterBus, clock: &dyn Clock, settle_ns: u64);

    /// Wait for SRAM repair to finish after a rail ungate.
    fn poll_ram_repair(&self, bus: &mut dyn RegisterBus, clock: &dyn Clock, timeout_ns: u64) -> bool {
        poll32(
            bus,
            clock,
            Bus::Bar0,
            regs::RAM_REPAIR_STATUS,
            u32::MAX,
            0,
            timeout_ns,
            PollUnit::Ns,
        )
    }

    /// Arm/disarm the PRI error-detection mechanism over the gated range.
    fn set_pri_error_detection(&self, bus: &mut dyn RegisterBus, enabled: bool) {
        let value = if enabled { regs::PRI_ERROR_ENABLE } else { 0 };
        bus.write32(Bus::Bar0, regs::PRI_ERROR_CTRL, value);
    }
}

/// Ampere-class HAL.
pub struct Ga10x {
    caps: ChipCaps,
}

impl Ga10x {
    pub fn new() -> Self {
        Self {
            caps: ChipCaps::for_family(ChipFamily::Ga10x),
        }
    }

    pub fn with_caps(caps: ChipCaps) -> Self {
        Self { caps }
    }
}

impl Default for Ga10x {
    fn default() -> Self {
        Self::new()
    }
}

impl GrHal for Ga10x {
    fn caps(&self) -> &ChipCaps {
        &self.caps
    }

    fn idle_masks(&self, ctrl: PgCtrl) -> [u32; 3] {
        match ctrl {
            PgCtrl::GrPg => [0x0000_ffff, 0x00ff_0000, 0x0000_0000],
            PgCtrl::GrRg => [0xffff_ffff, 0x00ff_00ff, 0x0000_0001],
        }
    }

    fn intr_pending_mask(&self, ctrl: PgCtrl) -> u32 {
        match ctrl {
            PgCtrl::GrPg => 0x0000_00ff,
            PgCtrl::GrRg => 0x0000_0fff,
        }
    }

    // Resets are staged: engine first, context interface once the engine
    // reset has settled. The release mirrors that, context first.
    fn assert_engine_resets(&self, bus: &mut dyn RegisterBus, clock: &dyn Clock, settle_ns: u64) {
        bus.write32(Bus::Bar0, regs::GR_RESET_CTRL, regs::RESET_ENGINE);
        clock.busy_wait_ns(settle_ns);
        bus.write32(
            Bus::Bar0,
            regs::GR_RESET_CTRL,
            regs::RESET_ENGINE | regs::RESET_CONTEXT,
        );
    }

    fn deassert_engine_resets(&self, bus: &mut dyn RegisterBus, clock: &dyn Clock, settle_ns: u64) {
        bus.write32(Bus::Bar0, regs::GR_RESET_CTRL, regs::RESET_ENGINE);
        clock.busy_wait_ns(settle_ns);
        bus.write32(Bus::Bar0, regs::GR_RESET_CTRL, 0);
    }
}

/// Turing-class HAL: single-stage resets, narrower idle masks.
pub struct Tu10x {
    caps: ChipCaps,
}

impl Tu10x {
    pub fn new() -> Self {
        Self {
            caps: ChipCaps::for_family(ChipFamily::Tu10x),
        }
    }

    pub fn with_caps(caps: ChipCaps) -> Self {
        Self { caps }
    }
}

impl Default for Tu10x {
    fn default() -> Self {
        Self::new()
    }
}

impl GrHal for Tu10x {
    fn caps(&self) -> &ChipCaps {
        &self.caps
    }

    fn idle_masks(&self, ctrl: PgCtrl) -> [u32; 3] {
        match ctrl {
            PgCtrl::GrPg => [0x0000_0fff, 0x000f_0000, 0x0000_0000],
            PgCtrl::GrRg => [0x0000_ffff, 0x000f_000f, 0x0000_0000],
        }
    }

    fn intr_pending_mask(&self, _ctrl: PgCtrl) -> u32 {
        0x0000_003f
    }

    fn assert_engine_resets(&self, bus: &mut dyn RegisterBus, clock: &dyn Clock, settle_ns: u64) {
        bus.write32(
            Bus::Bar0,
            regs::GR_RESET_CTRL,
            regs::RESET_ENGINE | regs::RESET_CONTEXT,
        );
        clock.busy_wait_ns(settle_ns);
    }

    fn deassert_engine_resets(&self, bus: &mut dyn RegisterBus, clock: &dyn Clock, settle_ns: u64) {
        bus.write32(Bus::Bar0, regs::GR_RESET_CTRL, 0);
        clock.busy_wait_ns(settle_ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lpwr_regs::mock::MockBus;
    use lpwr_regs::ManualClock;
    use pretty_assertions::assert_eq;

    #[test]
    fn ga10x_stages_the_reset_assert() {
        let clock = ManualClock::new();
        let mut bus = MockBus::new();
        Ga10x::new().assert_engine_resets(&mut bus, &clock, 10_000);
        assert_eq!(
            bus.writes_to(Bus::Bar0, regs::GR_RESET_CTRL),
            vec![
                regs::RESET_ENGINE,
                regs::RESET_ENGINE | regs::RESET_CONTEXT
            ]
        );
        assert_eq!(clock.now_ns(), 10_000);
    }

    #[test]
    fn tu10x_asserts_in_one_write() {
        let clock = ManualClock::new();
        let mut bus = MockBus::new();
        Tu10x::new().assert_engine_resets(&mut bus, &clock, 10_000);
        assert_eq!(
            bus.writes_to(Bus::Bar0, regs::GR_RESET_CTRL),
            vec![regs::RESET_ENGINE | regs::RESET_CONTEXT]
        );
    }
}
