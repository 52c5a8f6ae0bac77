//! GR-RG rail-gate phases.
//!
//! Only the RG controller runs these: before the rail comes back up the
//! domain is put into a safe state (resets asserted, rails clamped, external
//! reset propagation blocked), the rail itself is toggled through a
//! GPIO whose controller is shared and therefore serialized by a hardware
//! mutex register, and after the toggle the domain is brought out of that
//! safe state once SRAM repair has finished.

use lpwr_regs::{poll32, Bus, ChipCaps, Clock, PollUnit, RegisterBus};
use tracing::warn;

use crate::hal::GrHal;
use crate::regs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RailGateError {
    #[error("GPIO hardware mutex not acquired")]
    GpioMutexTimeout,
    #[error("GPIO rail toggle did not latch")]
    ToggleTimeout,
    #[error("rail PGOOD never asserted")]
    PgoodTimeout,
    #[error("SRAM repair did not complete")]
    RamRepairTimeout,
}

/// Put the domain into its safe state ahead of a rail transition: resets
/// asserted, rails clamped, external reset propagation blocked.
pub fn prepare_rail_gate(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    hal: &dyn GrHal,
    settle_ns: u64,
) {
    hal.assert_engine_resets(bus, clock, settle_ns);
    bus.write32(Bus::Bar0, regs::RAIL_CLAMP, regs::RAIL_CLAMP_ASSERTED);
    bus.write32(
        Bus::Bar0,
        regs::RESET_PROPAGATION,
        regs::RESET_PROPAGATION_BLOCKED,
    );
}

/// Toggle the power rail via the shared GPIO controller.
///
/// The GPIO mutex is held only across the output/trigger pair and released
/// on every path out. The PGOOD confirmation is only wired up in
/// simulation/RTL environments.
pub fn set_rail(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    caps: &ChipCaps,
    on: bool,
    toggle_timeout_ns: u64,
) -> Result<(), RailGateError> {
    if !acquire_gpio_mutex(bus, clock, toggle_timeout_ns) {
        return Err(RailGateError::GpioMutexTimeout);
    }

    let level = if on { regs::GPIO_RAIL_ON } else { 0 };
    bus.write32(Bus::Bar0, regs::GPIO_OUTPUT_CNTL, level);
    bus.write32(Bus::Bar0, regs::GPIO_TRIGGER, regs::GPIO_TRIGGER_UPDATE);
    let latched = poll32(
        bus,
        clock,
        Bus::Bar0,
        regs::GPIO_TRIGGER_STATUS,
        u32::MAX,
        0,
        toggle_timeout_ns,
        PollUnit::Ns,
    );
    release_gpio_mutex(bus);
    if !latched {
        return Err(RailGateError::ToggleTimeout);
    }

    if on && caps.simulation_pgood_check {
        let good = poll32(
            bus,
            clock,
            Bus::Bar0,
            regs::RAIL_PGOOD,
            regs::RAIL_PGOOD_ASSERTED,
            regs::RAIL_PGOOD_ASSERTED,
            toggle_timeout_ns,
            PollUnit::Ns,
        );
        if !good {
            return Err(RailGateError::PgoodTimeout);
        }
    }
    Ok(())
}

/// Bring the domain out of its safe state after the rail is back up.
///
/// Every step runs even if SRAM repair times out; the engine has to come
/// out of reset regardless, so the first failure is reported only after the
/// sweep completes.
pub fn finish_rail_ungate(
    bus: &mut dyn RegisterBus,
    clock: &dyn Clock,
    hal: &dyn GrHal,
    settle_ns: u64,
    ram_repair_timeout_ns: u64,
) -> Result<(), RailGateError> {
    let mut result = Ok(());
    if !hal.poll_ram_repair(bus, clock, ram_repair_timeout_ns) {
        warn!("SRAM repair still pending after rail ungate");
        result = Err(RailGateError::RamRepairTimeout);
    }

    bus.write32(Bus::Bar0, regs::RESET_PROPAGATION, 0);
    bus.write32(Bus::Bar0, regs::RAIL_CLAMP, 0);
    hal.deassert_engine_resets(bus, clock, settle_ns);
    bus.write32(Bus::Bar0, regs::ELCG_CTRL, regs::ELCG_ENABLED);
    bus.write32(
        Bus::Bar0,
        regs::SMCARB_TIMESTAMP_CTRL,
        regs::SMCARB_TIMESTAMP_ENABLED,
    );
    result
}

fn acquire_gpio_mutex(bus: &mut dyn RegisterBus, clock: &dyn Clock, timeout_ns: u64) -> bool {
    let deadline = clock.now_ns().saturating_add(timeout_ns);
    loop {
        bus.write32(Bus::Bar0, regs::GPIO_MUTEX, regs::GPIO_MUTEX_TOKEN_PMU);
        if bus.read32(Bus::Bar0, regs::GPIO_MUTEX) == regs::GPIO_MUTEX_TOKEN_PMU {
            return true;
        }
        if clock.now_ns() >= deadline {
            return false;
        }
    }
}

fn release_gpio_mutex(bus: &mut dyn RegisterBus) {
    bus.write32(Bus::Bar0, regs::GPIO_MUTEX, 0);
}
