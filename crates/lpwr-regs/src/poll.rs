//! Bounded busy-poll primitives.
//!
//! Every timeout in the sequencer is a tight read-compare-repeat loop against
//! the timebase; no cooperative yield happens inside a poll window. The
//! register is sampled at least once even with a zero timeout, so a
//! zero-budget poll still observes current hardware state.

use crate::{Bus, Clock, RegisterBus};

/// Unit of a poll timeout value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollUnit {
    Us,
    Ns,
}

impl PollUnit {
    fn to_ns(self, value: u64) -> u64 {
        match self {
            PollUnit::Us => value.saturating_mul(1_000),
            PollUnit::Ns => value,
        }
    }
}

/// Outcome of a cancellable poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The masked register value matched before the deadline.
    Matched,
    /// The deadline elapsed without a match.
    TimedOut,
    /// The external cancel condition asserted before a match.
    Cancelled,
}

/// Poll `addr` until `(value & mask) == expected` or the timeout elapses.
///
/// Returns `false` on timeout.
pub fn poll32(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    sel: Bus,
    addr: u32,
    mask: u32,
    expected: u32,
    timeout: u64,
    unit: PollUnit,
) -> bool {
    matches!(
        poll32_cancellable(
            bus,
            clock,
            sel,
            addr,
            mask,
            expected,
            timeout,
            unit,
            &mut || false,
        ),
        PollStatus::Matched
    )
}

/// [`poll32`] with a per-iteration cancel hook.
///
/// The hook models "lose gracefully to a higher-priority requester": a poll
/// that would otherwise burn its whole window gives up as soon as the hook
/// reports a pending wake. The hook is sampled once per iteration, after the
/// register sample, so a match on the final sample still wins.
#[allow(clippy::too_many_arguments)]
pub fn poll32_cancellable(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    sel: Bus,
    addr: u32,
    mask: u32,
    expected: u32,
    timeout: u64,
    unit: PollUnit,
    cancel: &mut dyn FnMut() -> bool,
) -> PollStatus {
    let deadline = clock.now_ns().saturating_add(unit.to_ns(timeout));
    loop {
        if bus.read32(sel, addr) & mask == expected {
            return PollStatus::Matched;
        }
        if cancel() {
            return PollStatus::Cancelled;
        }
        if clock.now_ns() >= deadline {
            return PollStatus::TimedOut;
        }
        std::hint::spin_loop();
    }
}
