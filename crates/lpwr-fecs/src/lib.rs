//! FECS method-submission protocol.
//!
//! The context-switch microcontroller (FECS) owns graphics register state
//! this firmware cannot touch directly. Asking it to save or restore that
//! state is a mailbox handshake: clear the completion mailbox, write the
//! method data word, write the method id to the push register, then poll the
//! mailbox for a method-specific completion value.
//!
//! On SMC-partitioned chips every active sys-pipe runs its own FECS; the
//! submit phase fans out to all of them first and the poll phase then
//! confirms each one. There is no partial success: one pipe timing out fails
//! the whole call.

#![forbid(unsafe_code)]

use lpwr_regs::{poll32, Bus, ChipCaps, Clock, PollUnit, RegisterBus};
use tracing::{trace, warn};

pub mod regs;

/// Ask FECS to snapshot its global register state.
pub const METHOD_SAVE_REGLIST: u32 = 0x30;
/// Ask FECS to replay its global register state.
pub const METHOD_RESTORE_REGLIST: u32 = 0x31;

/// Mailbox value FECS posts when a reglist method completes.
pub const MAILBOX_REGLIST_DONE: u32 = 0x1;

/// Per-method poll windows. Restore is documented to take longer on hardware
/// than save; anything else gets the conservative default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FecsTimeouts {
    pub save_ns: u64,
    pub restore_ns: u64,
    pub default_ns: u64,
}

impl Default for FecsTimeouts {
    fn default() -> Self {
        Self {
            save_ns: 4_000_000,
            restore_ns: 10_000_000,
            default_ns: 2_000_000,
        }
    }
}

impl FecsTimeouts {
    pub fn for_method(&self, method: u32) -> u64 {
        match method {
            METHOD_SAVE_REGLIST => self.save_ns,
            METHOD_RESTORE_REGLIST => self.restore_ns,
            _ => self.default_ns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FecsError {
    /// A targeted sys-pipe's mailbox never reached the expected value.
    #[error("FECS method 0x{method:02x} timed out on sys-pipe {pipe}")]
    Timeout { method: u32, pipe: u8 },
}

/// Active sys-pipe mask for this chip.
///
/// Partitioned chips report the mask from the SMC configuration register;
/// everything else is the single pipe 0.
pub fn active_sys_pipes(bus: &mut dyn RegisterBus, caps: &ChipCaps) -> u32 {
    if !caps.smc_sys_pipes {
        return 0b1;
    }
    let mask = bus.read32(Bus::Bar0, regs::SMC_PARTITION_MASK) & regs::SMC_PARTITION_MASK_FIELD;
    // Pipe 0 always exists, even if the config read returns garbage.
    if mask == 0 {
        0b1
    } else {
        mask
    }
}

/// Submit `method` with `data` to every pipe in `pipes`, then poll each
/// pipe's mailbox for `expected` within the method's timeout.
pub fn submit_method(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    timeouts: &FecsTimeouts,
    pipes: u32,
    method: u32,
    data: u32,
    expected: u32,
) -> Result<(), FecsError> {
    let pipes = if pipes == 0 { 0b1 } else { pipes };
    let timeout_ns = timeouts.for_method(method);

    for pipe in pipe_iter(pipes) {
        trace!("submitting FECS method 0x{:02x} to sys-pipe {}", method, pipe);
        bus.write32(Bus::FecsHub, regs::pipe_addr(regs::FECS_MAILBOX0, pipe), 0);
        bus.write32(Bus::FecsHub, regs::pipe_addr(regs::FECS_METHOD_DATA, pipe), data);
        bus.write32(Bus::FecsHub, regs::pipe_addr(regs::FECS_METHOD_PUSH, pipe), method);
    }

    for pipe in pipe_iter(pipes) {
        let done = poll32(
            bus,
            clock,
            Bus::FecsHub,
            regs::pipe_addr(regs::FECS_MAILBOX0, pipe),
            u32::MAX,
            expected,
            timeout_ns,
            PollUnit::Ns,
        );
        if !done {
            warn!(
                "FECS method 0x{:02x} timed out on sys-pipe {} after {}ns",
                method, pipe, timeout_ns
            );
            return Err(FecsError::Timeout { method, pipe });
        }
    }
    Ok(())
}

fn pipe_iter(pipes: u32) -> impl Iterator<Item = u8> {
    (0..32u8).filter(move |p| pipes & (1u32 << *p) != 0)
}
