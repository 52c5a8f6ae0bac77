//! Register save/restore cache ("sequence cache").
//!
//! Registers inside a power-gated domain cannot be read back while the rails
//! are down, so everything that must survive a gate/ungate cycle is
//! snapshotted into this cache on the way down and replayed on the way up.
//!
//! The set of registers is described by three kinds of descriptor lists,
//! expanded exactly once at init into a flat `(address, data)` buffer:
//! - a flat list of literal addresses,
//! - an indexed list of `{base, stride, count}` ranges,
//! - an auto-increment list of `{ctrl, data, count}` pairs, contributing
//!   `count` copies of the *data* address (the control register selects the
//!   hidden sub-index, which advances implicitly on every data access).
//!
//! Buffer order is load-bearing: auto-increment data addresses must be
//! visited in exactly the order the expansion produced them, and every
//! auto-increment control register must be reset to 0 before a pass so the
//! first access lands on sub-index 0 rather than whatever index unrelated
//! code left behind.

#![forbid(unsafe_code)]

use std::collections::TryReserveError;

use lpwr_regs::{Bus, RegisterBus};

/// `{base, stride, count}` descriptor expanding to `count` addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedRange {
    pub base: u32,
    pub stride: u32,
    pub count: u32,
}

/// Auto-increment register pair descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoIncrRange {
    pub ctrl: u32,
    pub data: u32,
    pub count: u32,
}

/// The three descriptor lists a chip provides for its global state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegList<'a> {
    pub flat: &'a [u32],
    pub indexed: &'a [IndexedRange],
    pub auto_incr: &'a [AutoIncrRange],
}

impl RegList<'_> {
    /// Total number of cache entries the lists expand to.
    pub fn entry_count(&self) -> usize {
        let indexed: usize = self.indexed.iter().map(|r| r.count as usize).sum();
        let auto: usize = self.auto_incr.iter().map(|r| r.count as usize).sum();
        self.flat.len() + indexed + auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheEntry {
    addr: u32,
    data: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Allocation of the cache buffers failed. Fatal to firmware init; the
    /// caller halts rather than limping on without save/restore.
    #[error("out of memory allocating the sequence cache")]
    OutOfMemory,
}

impl From<TryReserveError> for CacheError {
    fn from(_: TryReserveError) -> Self {
        CacheError::OutOfMemory
    }
}

/// Process-lifetime cache of `(address, data)` pairs.
///
/// Allocated exactly once; the address column is immutable after init and
/// only the data column changes, once per save and once per restore.
#[derive(Debug)]
pub struct SeqCache {
    entries: Vec<CacheEntry>,
    ctrl_resets: Vec<u32>,
    bus: Bus,
}

impl SeqCache {
    /// Expand the descriptor lists into the cache buffers.
    pub fn new(lists: &RegList<'_>) -> Result<Self, CacheError> {
        let total = lists.entry_count();

        let mut entries = Vec::new();
        entries.try_reserve_exact(total)?;
        let mut ctrl_resets = Vec::new();
        ctrl_resets.try_reserve_exact(lists.auto_incr.len())?;

        for &addr in lists.flat {
            entries.push(CacheEntry { addr, data: 0 });
        }
        for range in lists.indexed {
            for i in 0..range.count {
                entries.push(CacheEntry {
                    addr: range.base.wrapping_add(i.wrapping_mul(range.stride)),
                    data: 0,
                });
            }
        }
        for range in lists.auto_incr {
            ctrl_resets.push(range.ctrl);
            for _ in 0..range.count {
                entries.push(CacheEntry {
                    addr: range.data,
                    data: 0,
                });
            }
        }

        debug_assert_eq!(entries.len(), total);
        Ok(Self {
            entries,
            ctrl_resets,
            bus: Bus::Bar0,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot every cached register from hardware, in buffer order.
    pub fn save(&mut self, bus: &mut dyn RegisterBus) {
        self.reset_ctrls(bus);
        for entry in &mut self.entries {
            entry.data = bus.read32(self.bus, entry.addr);
        }
    }

    /// Replay the last snapshot back into hardware, in buffer order.
    ///
    /// Only meaningful following a prior [`SeqCache::save`].
    pub fn restore(&self, bus: &mut dyn RegisterBus) {
        self.reset_ctrls(bus);
        for entry in &self.entries {
            bus.write32(self.bus, entry.addr, entry.data);
        }
    }

    fn reset_ctrls(&self, bus: &mut dyn RegisterBus) {
        for &ctrl in &self.ctrl_resets {
            bus.write32(self.bus, ctrl, 0);
        }
    }
}
