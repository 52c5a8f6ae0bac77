//! Register-bus access primitives shared by the low-power (LPWR) crates.
//!
//! Everything in the LPWR stack talks to hardware through 32-bit register
//! transactions on one of three buses:
//! - `Bar0`: the direct priv bus. Single-cycle, always blocking.
//! - `FecsHub`: the indirect hub route through the context-switch
//!   microcontroller. Address bits select routing; the transaction itself is
//!   still presented as blocking at this layer.
//! - `Csb`: the PMU-local bus. Only reaches registers inside the
//!   microcontroller complex (PG controllers, holdoff, wake status).
//!
//! Bus transactions never fail at the transaction level: a read of a
//! powered-down or misrouted register returns stale/garbage data, and the
//! only way a problem surfaces is a later bounded poll timing out. The poll
//! primitives here take an explicit [`Clock`] so tests can expire timeouts
//! deterministically (see [`ManualClock`]).

#![forbid(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

pub mod chip;
pub mod mock;
pub mod poll;

pub use chip::{ChipCaps, ChipFamily, FlushBridges};
pub use poll::{poll32, poll32_cancellable, PollStatus, PollUnit};

/// Register bus selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bus {
    /// Direct priv access.
    Bar0,
    /// Indirect access routed through the FECS hub.
    FecsHub,
    /// PMU-internal bus.
    Csb,
}

/// Blocking 32-bit register access.
///
/// Reads and writes always "succeed"; wrong data is the failure mode.
pub trait RegisterBus {
    fn read32(&mut self, bus: Bus, addr: u32) -> u32;
    fn write32(&mut self, bus: Bus, addr: u32, value: u32);
}

/// Monotonic time source for bounded polls and mandated settle delays.
pub trait Clock {
    fn now_ns(&self) -> u64;

    /// Busy-wait for `delay_ns`. This is a tight spin, not a scheduler sleep;
    /// sequencer steps that mandate an inter-step delay must not yield.
    fn busy_wait_ns(&self, delay_ns: u64) {
        let deadline = self.now_ns().saturating_add(delay_ns);
        while self.now_ns() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Wall-clock backed [`Clock`].
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos().min(u64::MAX as u128) as u64
    }
}

/// Deterministic, manually-advanced [`Clock`].
///
/// Handles are cheap clones sharing one timebase, so a test can hold one
/// handle while a [`mock::MockBus`] advances another on every register
/// access (making poll loops make progress without real elapsed time).
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ns: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ns(&self, delta_ns: u64) {
        self.now_ns.set(self.now_ns.get().wrapping_add(delta_ns));
    }

    pub fn set_ns(&self, now_ns: u64) {
        self.now_ns.set(now_ns);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.get()
    }

    fn busy_wait_ns(&self, delay_ns: u64) {
        // A manual clock never advances on its own; consume the delay instead
        // of spinning forever.
        self.advance_ns(delay_ns);
    }
}
