//! Runlist preemption protocol.
//!
//! Stops an engine from accepting further scheduled work and confirms it has
//! stopped, before the sequencer mutates engine state behind its back.

use lpwr_regs::{poll32_cancellable, Bus, ChipCaps, Clock, PollStatus, PollUnit, RegisterBus};
use tracing::trace;

use crate::engines::EngineInfo;
use crate::{holdoff, regs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PreemptError {
    /// The runlist or engine was already busy; preemption was not attempted
    /// (the hardware will self-wake anyway, so don't disturb it).
    #[error("runlist or engine busy, preemption not attempted")]
    NotIdle,
    /// A stalling PBDMA interrupt is outstanding; preemption completion
    /// cannot be trusted until it is serviced.
    #[error("stalling interrupt pending on runlist")]
    InterruptPending,
    /// The preempt-pending bit did not clear in time, or a higher-priority
    /// wake request cut the wait short.
    #[error("runlist preemption did not complete")]
    Timeout,
}

/// Preempt the engine's runlist.
///
/// Both preconditions are ordered fast-fails: nothing is written to the
/// preempt register unless both pass. On interlock-equipped chips the
/// preempt write is wrapped in the mandatory 3-phase holdoff sequence
/// (disable the engine's holdoff interrupts, issue the preempt, clear the
/// holdoff mask entirely so the preemption can drain); the interrupt enables
/// are restored on every path out.
pub fn preempt_runlist(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    caps: &ChipCaps,
    engine: &EngineInfo,
    timeout_ns: u64,
    wake_pending: &mut dyn FnMut() -> bool,
) -> Result<(), PreemptError> {
    let base = engine.runlist_base;

    let runlist_busy =
        bus.read32(Bus::Bar0, base + regs::RUNLIST_STATUS) & regs::RUNLIST_BUSY != 0;
    let engine_busy = bus.read32(
        Bus::Bar0,
        regs::engine_status_addr(base, engine.runlist_engine_index),
    ) & regs::ENGINE_BUSY
        != 0;
    if runlist_busy || engine_busy {
        return Err(PreemptError::NotIdle);
    }

    if bus.read32(Bus::Bar0, base + regs::RUNLIST_INTR_STALL) != 0 {
        return Err(PreemptError::InterruptPending);
    }

    let engine_bit = 1u32 << engine.fifo_id;
    let saved_intr_en = holdoff::intr_enable_mask(bus);
    if caps.holdoff_preempt_interlock {
        holdoff::set_intr_enable_mask(bus, saved_intr_en & !engine_bit);
    }

    trace!(
        "preempting runlist {} (engine fifo id {})",
        engine.runlist_id,
        engine.fifo_id
    );
    bus.write32(Bus::Bar0, base + regs::RUNLIST_PREEMPT, regs::PREEMPT_TYPE_RUNLIST);

    if caps.holdoff_preempt_interlock {
        holdoff::set_mask(bus, 0);
    }

    let status = poll32_cancellable(
        bus,
        clock,
        Bus::Bar0,
        base + regs::RUNLIST_PREEMPT,
        regs::PREEMPT_PENDING,
        0,
        timeout_ns,
        PollUnit::Ns,
        wake_pending,
    );

    if caps.holdoff_preempt_interlock {
        holdoff::set_intr_enable_mask(bus, saved_intr_en);
    }

    match status {
        PollStatus::Matched => Ok(()),
        PollStatus::TimedOut | PollStatus::Cancelled => Err(PreemptError::Timeout),
    }
}
