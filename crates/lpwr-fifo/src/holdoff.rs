//! Scheduling-holdoff mask and holdoff-interrupt controls.
//!
//! Holdoff defers work scheduling (and its interrupt delivery) for a masked
//! set of FIFO engines while the sequencer has the engine mid-transition.

use lpwr_regs::{poll32, Bus, Clock, PollUnit, RegisterBus};

use crate::regs;

/// Set the given engine bits in the holdoff mask and wait for the engage to
/// be reflected. Returns `false` if the readback never shows the bits.
pub fn engage(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    mask: u32,
    timeout_ns: u64,
) -> bool {
    let current = bus.read32(Bus::Csb, regs::HOLDOFF_MASK);
    bus.write32(Bus::Csb, regs::HOLDOFF_MASK, current | mask);
    poll32(
        bus,
        clock,
        Bus::Csb,
        regs::HOLDOFF_MASK,
        mask,
        mask,
        timeout_ns,
        PollUnit::Ns,
    )
}

/// Clear the given engine bits from the holdoff mask. Fire-and-forget; safe
/// to repeat on already-clear bits.
pub fn disengage(bus: &mut dyn RegisterBus, mask: u32) {
    let current = bus.read32(Bus::Csb, regs::HOLDOFF_MASK);
    bus.write32(Bus::Csb, regs::HOLDOFF_MASK, current & !mask);
}

/// Replace the whole holdoff mask.
pub fn set_mask(bus: &mut dyn RegisterBus, mask: u32) {
    bus.write32(Bus::Csb, regs::HOLDOFF_MASK, mask);
}

pub fn mask(bus: &mut dyn RegisterBus) -> u32 {
    bus.read32(Bus::Csb, regs::HOLDOFF_MASK)
}

pub fn intr_enable_mask(bus: &mut dyn RegisterBus) -> u32 {
    bus.read32(Bus::Csb, regs::HOLDOFF_INTR_EN)
}

pub fn set_intr_enable_mask(bus: &mut dyn RegisterBus, mask: u32) {
    bus.write32(Bus::Csb, regs::HOLDOFF_INTR_EN, mask);
}
