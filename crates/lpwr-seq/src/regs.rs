//! Register layout consumed by the sequencer: PG controller blocks, priv
//! blockers, flush, PRI error detection, clock gating, MMU bind, and the
//! RG rail-gate controls.

use crate::state::PgCtrl;

/// Per-controller PG block (CSB).
pub const PG_CTRL_BASE: u32 = 0x0001_1000;
pub const PG_CTRL_STRIDE: u32 = 0x100;

pub const PG_IDLE_MASK0: u32 = 0x00;
pub const PG_IDLE_MASK1: u32 = 0x04;
pub const PG_IDLE_MASK2: u32 = 0x08;
/// Latched "went busy since last cleared". Bit 0 reads the latch;
/// writing 1 clears it.
pub const PG_IDLE_FLIP: u32 = 0x10;
pub const PG_INTR_STATUS: u32 = 0x14;
pub const PG_TARGET: u32 = 0x18;
pub const PG_STATUS: u32 = 0x1c;

pub const IDLE_FLIP_ASSERTED: u32 = 1 << 0;
pub const IDLE_FLIP_CLEAR: u32 = 1 << 0;

pub const PG_TARGET_POWERED_DOWN: u32 = 1;
pub const PG_TARGET_POWERED_UP: u32 = 0;
pub const PG_STATUS_FIELD: u32 = 0x3;
pub const PG_STATUS_PWR_ON: u32 = 0x0;
pub const PG_STATUS_LOW_POWER: u32 = 0x2;

pub fn pg_addr(ctrl: PgCtrl, offset: u32) -> u32 {
    PG_CTRL_BASE + ctrl.index() * PG_CTRL_STRIDE + offset
}

/// SEC2 wake-up status (CSB). Bit 0 set means the security processor has a
/// wake in flight for this engine.
pub const SEC2_WAKE_STATUS: u32 = 0x0001_2000;
pub const SEC2_WAKE_ASSERTED: u32 = 1 << 0;

/// Per-controller priv blocker (BAR0). The mode field both accepts the
/// requested mode and reads back the mode actually engaged.
pub const BLOCKER_CTRL_BASE: u32 = 0x0050_0000;
pub const BLOCKER_CTRL_STRIDE: u32 = 0x20;
pub const BLOCKER_MODE_FIELD: u32 = 0x3;
pub const BLOCKER_ALLOW_LO: u32 = 0x08;
pub const BLOCKER_ALLOW_HI: u32 = 0x0c;

pub fn blocker_addr(ctrl: PgCtrl, offset: u32) -> u32 {
    BLOCKER_CTRL_BASE + ctrl.index() * BLOCKER_CTRL_STRIDE + offset
}

/// Allow-range bounds while blocked: widened on RG so the few registers
/// other on-chip agents legitimately touch stay reachable (erratum
/// workaround), narrowed again on disengage.
pub const ALLOW_RANGE_WIDE_LO: u32 = 0x0040_0000;
pub const ALLOW_RANGE_WIDE_HI: u32 = 0x0040_3fff;
pub const ALLOW_RANGE_NARROW_LO: u32 = 0x0040_0000;
pub const ALLOW_RANGE_NARROW_HI: u32 = 0x0040_00ff;

/// Priv-path flush (BAR0): trigger bits select which bridges drain; status
/// reads nonzero while any selected drain is in flight.
pub const PRIV_FLUSH_TRIGGER: u32 = 0x0050_0040;
pub const PRIV_FLUSH_STATUS: u32 = 0x0050_0044;
pub const FLUSH_PRIV_PATH: u32 = 1 << 0;
pub const FLUSH_EXT_BUS: u32 = 1 << 1;
pub const FLUSH_SEC2: u32 = 1 << 2;
pub const FLUSH_GSP: u32 = 1 << 3;

/// PRI error detection (BAR0): while enabled, privileged accesses to the
/// gated range raise an error instead of hanging the bus.
pub const PRI_ERROR_CTRL: u32 = 0x0050_0080;
pub const PRI_ERROR_ENABLE: u32 = 1 << 0;

/// Engine-level clock gating (BAR0).
pub const ELCG_CTRL: u32 = 0x0020_0000;
pub const ELCG_ENABLED: u32 = 1 << 0;

/// SMC arbiter free-running timestamp (BAR0).
pub const SMCARB_TIMESTAMP_CTRL: u32 = 0x0020_0040;
pub const SMCARB_TIMESTAMP_ENABLED: u32 = 1 << 0;

/// GR MMU bind (BAR0). Clearing the bind bit requests an unbind; status
/// reads nonzero while the unbind is still draining.
pub const MMU_BIND: u32 = 0x0010_0000;
pub const MMU_BIND_ENGINE: u32 = 1 << 0;
pub const MMU_BIND_STATUS: u32 = 0x0010_0004;

/// LPWR feature fuses and their protection-level mask (BAR0).
pub const FUSE_OPT_LPWR: u32 = 0x0002_1000;
pub const LPWR_PLM: u32 = 0x0002_1004;
pub const PLM_WRITE_PROTECTED: u32 = 1 << 0;

/// RG rail-gate controls (BAR0).
pub const GR_RESET_CTRL: u32 = 0x0010_0200;
pub const RESET_ENGINE: u32 = 1 << 0;
pub const RESET_CONTEXT: u32 = 1 << 1;

pub const RAIL_CLAMP: u32 = 0x0010_0210;
pub const RAIL_CLAMP_ASSERTED: u32 = 1 << 0;

pub const RESET_PROPAGATION: u32 = 0x0010_0214;
pub const RESET_PROPAGATION_BLOCKED: u32 = 1 << 0;

/// Nonzero while SRAM repair is still running after a rail ungate.
pub const RAM_REPAIR_STATUS: u32 = 0x0010_0220;

/// GPIO rail control, serialized by a hardware mutex register: reads 0 when
/// free, returns the holder's token once acquired, freed by writing 0.
pub const GPIO_MUTEX: u32 = 0x0010_0300;
pub const GPIO_MUTEX_TOKEN_PMU: u32 = 0x5;
pub const GPIO_OUTPUT_CNTL: u32 = 0x0010_0304;
pub const GPIO_RAIL_ON: u32 = 1 << 0;
pub const GPIO_TRIGGER: u32 = 0x0010_0308;
pub const GPIO_TRIGGER_UPDATE: u32 = 1 << 0;
/// Nonzero while a triggered GPIO update is still latching.
pub const GPIO_TRIGGER_STATUS: u32 = 0x0010_030c;
pub const RAIL_PGOOD: u32 = 0x0010_0310;
pub const RAIL_PGOOD_ASSERTED: u32 = 1 << 0;
