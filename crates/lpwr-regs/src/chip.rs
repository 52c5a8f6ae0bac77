//! Chip identification and capability flags.
//!
//! The sequencer itself is chip-agnostic; everything generation-specific is
//! either a capability bit here or lives behind the per-family HAL in
//! `lpwr-seq`. Two families are enough to exercise every capability branch;
//! exact per-chip register bit encodings are out of scope.

/// Supported GPU chip families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipFamily {
    /// Turing-class: no holdoff/preempt interlock, no SMC partitioning,
    /// GPCCS bootstrap goes through the legacy blocking-RPC path.
    Tu10x,
    /// Ampere-class: holdoff/preempt interlock, SMC sys-pipes, SEC2 wake
    /// status, RG allow-range erratum workaround.
    Ga10x,
}

/// Which optional on-chip bridges participate in a priv-path flush.
///
/// The flush must drain every bridge that can hold an in-flight privileged
/// transaction; absent bridges are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushBridges {
    /// External bus bridge (host interface).
    pub external_bus: bool,
    /// Security co-processor bridge.
    pub sec2: bool,
    /// Graphics service processor bridge.
    pub gsp: bool,
}

/// Per-family feature capabilities consumed by the LPWR stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipCaps {
    pub family: ChipFamily,
    /// Runlist preemption must be wrapped in the 3-phase holdoff interrupt
    /// interlock (disable -> preempt -> restore).
    pub holdoff_preempt_interlock: bool,
    /// Chip partitions the graphics engine into SMC sys-pipes; FECS methods
    /// fan out to every active pipe.
    pub smc_sys_pipes: bool,
    /// Idle evaluation includes the SEC2 wake-up status bit.
    pub sec2_wake_check: bool,
    /// RG blocker engage first widens the allow range to the registers other
    /// on-chip agents legitimately touch while blocked (erratum workaround).
    pub rg_allow_range: bool,
    /// PGOOD confirmation after a rail toggle is only wired up in
    /// simulation/RTL environments.
    pub simulation_pgood_check: bool,
    /// GPCCS bootstrap on power-ungate goes through the legacy blocking-RPC
    /// path instead of SEC2.
    pub legacy_gpccs_bootstrap: bool,
    pub flush_bridges: FlushBridges,
}

impl ChipCaps {
    pub fn for_family(family: ChipFamily) -> Self {
        match family {
            ChipFamily::Tu10x => Self {
                family,
                holdoff_preempt_interlock: false,
                smc_sys_pipes: false,
                sec2_wake_check: false,
                rg_allow_range: false,
                simulation_pgood_check: false,
                legacy_gpccs_bootstrap: true,
                flush_bridges: FlushBridges {
                    external_bus: true,
                    sec2: false,
                    gsp: false,
                },
            },
            ChipFamily::Ga10x => Self {
                family,
                holdoff_preempt_interlock: true,
                smc_sys_pipes: true,
                sec2_wake_check: true,
                rg_allow_range: true,
                simulation_pgood_check: false,
                legacy_gpccs_bootstrap: false,
                flush_bridges: FlushBridges {
                    external_bus: true,
                    sec2: true,
                    gsp: true,
                },
            },
        }
    }
}
