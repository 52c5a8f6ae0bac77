//! Runlist and holdoff register layout.
//!
//! Each runlist owns a small register block at a fixed stride off the runlist
//! space base; per-engine status registers sit inside the block indexed by
//! the engine's runlist-internal index.

/// Runlist register space (BAR0).
pub const RUNLIST_SPACE_BASE: u32 = 0x0080_0000;
pub const RUNLIST_SPACE_STRIDE: u32 = 0x0000_0800;

pub const RUNLIST_PREEMPT: u32 = 0x008;
pub const RUNLIST_STATUS: u32 = 0x00c;
pub const RUNLIST_INTR_STALL: u32 = 0x010;
pub const RUNLIST_ENGINE_STATUS0: u32 = 0x100;
pub const RUNLIST_ENGINE_STATUS_STRIDE: u32 = 0x8;

pub const PREEMPT_TYPE_RUNLIST: u32 = 1 << 0;
pub const PREEMPT_PENDING: u32 = 1 << 20;

pub const RUNLIST_BUSY: u32 = 1 << 0;

pub const ENGINE_BUSY: u32 = 1 << 0;
pub const ENGINE_CTX_STATUS_SHIFT: u32 = 4;
pub const ENGINE_CTX_STATUS_MASK: u32 = 0x7 << ENGINE_CTX_STATUS_SHIFT;
pub const ENGINE_CTX_STATUS_INVALID: u32 = 0;
pub const ENGINE_CTX_STATUS_VALID: u32 = 1;

pub fn runlist_base(runlist_id: u8) -> u32 {
    RUNLIST_SPACE_BASE + u32::from(runlist_id) * RUNLIST_SPACE_STRIDE
}

pub fn engine_status_addr(runlist_base: u32, runlist_engine_index: u8) -> u32 {
    runlist_base + RUNLIST_ENGINE_STATUS0
        + u32::from(runlist_engine_index) * RUNLIST_ENGINE_STATUS_STRIDE
}

/// Engine scheduling holdoff (CSB).
pub const HOLDOFF_MASK: u32 = 0x0001_0200;
pub const HOLDOFF_INTR_EN: u32 = 0x0001_0204;
