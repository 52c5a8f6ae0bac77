//! Engine lookup tables and the runtime engine table.
//!
//! Each chip family ships a static `(device kind, instance) -> PMU engine id`
//! lookup table. FIFO pre-init expands it once into an [`EngineTable`]: the
//! single source of truth for "where are this engine's runlist registers"
//! queries made by the preemption protocol and the sequencer.

use crate::regs;

/// Logical PMU engine id; indexes the [`EngineTable`].
pub type PmuEngineId = u8;

pub const PMU_ENGINE_GR: PmuEngineId = 0;
pub const PMU_ENGINE_CE0: PmuEngineId = 1;
pub const PMU_ENGINE_CE1: PmuEngineId = 2;
pub const PMU_ENGINE_CE2: PmuEngineId = 3;
pub const PMU_ENGINE_SEC2: PmuEngineId = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Graphics,
    CopyEngine,
    Sec2,
}

struct DeviceListEntry {
    kind: DeviceKind,
    instance: u8,
    pmu_engine_id: PmuEngineId,
    fifo_id: u8,
    runlist_id: u8,
    runlist_engine_index: u8,
}

const fn dev(
    kind: DeviceKind,
    instance: u8,
    pmu_engine_id: PmuEngineId,
    fifo_id: u8,
    runlist_id: u8,
    runlist_engine_index: u8,
) -> DeviceListEntry {
    DeviceListEntry {
        kind,
        instance,
        pmu_engine_id,
        fifo_id,
        runlist_id,
        runlist_engine_index,
    }
}

// GRCE copy engines share the graphics runlist; the async copy engine and
// SEC2 run their own.
const DEVICE_LIST_GA10X: &[DeviceListEntry] = &[
    dev(DeviceKind::Graphics, 0, PMU_ENGINE_GR, 0, 0, 0),
    dev(DeviceKind::CopyEngine, 0, PMU_ENGINE_CE0, 1, 0, 1),
    dev(DeviceKind::CopyEngine, 1, PMU_ENGINE_CE1, 2, 0, 2),
    dev(DeviceKind::CopyEngine, 2, PMU_ENGINE_CE2, 3, 2, 0),
    dev(DeviceKind::Sec2, 0, PMU_ENGINE_SEC2, 7, 3, 0),
];

const DEVICE_LIST_TU10X: &[DeviceListEntry] = &[
    dev(DeviceKind::Graphics, 0, PMU_ENGINE_GR, 0, 0, 0),
    dev(DeviceKind::CopyEngine, 0, PMU_ENGINE_CE0, 1, 0, 1),
    dev(DeviceKind::CopyEngine, 1, PMU_ENGINE_CE1, 2, 2, 0),
    dev(DeviceKind::Sec2, 0, PMU_ENGINE_SEC2, 6, 3, 0),
];

/// Resolved per-engine bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineInfo {
    pub kind: DeviceKind,
    pub instance: u8,
    pub pmu_engine_id: PmuEngineId,
    pub fifo_id: u8,
    pub runlist_id: u8,
    pub runlist_base: u32,
    pub runlist_engine_index: u8,
}

/// Expanded engine table for one chip, built once at FIFO pre-init.
#[derive(Debug, Clone)]
pub struct EngineTable {
    entries: Vec<EngineInfo>,
}

impl EngineTable {
    pub fn for_family(family: lpwr_regs::ChipFamily) -> Self {
        let list = match family {
            lpwr_regs::ChipFamily::Ga10x => DEVICE_LIST_GA10X,
            lpwr_regs::ChipFamily::Tu10x => DEVICE_LIST_TU10X,
        };
        let entries = list
            .iter()
            .map(|d| EngineInfo {
                kind: d.kind,
                instance: d.instance,
                pmu_engine_id: d.pmu_engine_id,
                fifo_id: d.fifo_id,
                runlist_id: d.runlist_id,
                runlist_base: regs::runlist_base(d.runlist_id),
                runlist_engine_index: d.runlist_engine_index,
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: PmuEngineId) -> Option<&EngineInfo> {
        self.entries.iter().find(|e| e.pmu_engine_id == id)
    }

    pub fn graphics(&self) -> &EngineInfo {
        self.get(PMU_ENGINE_GR)
            .expect("every device list carries a graphics engine")
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineInfo> {
        self.entries.iter()
    }

    /// FIFO-engine-id bitmask of everything whose scheduling must be held
    /// off across a GR power transition: graphics itself, the copy engines,
    /// and the security processor.
    pub fn holdoff_mask(&self) -> u32 {
        self.entries
            .iter()
            .fold(0, |mask, e| mask | (1u32 << e.fifo_id))
    }
}
