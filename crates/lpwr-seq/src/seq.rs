//! GR entry/exit sequencer.
//!
//! Two symmetric multi-step sequences per controller: power-down ("entry")
//! and power-up ("exit"). Entry is checkpointed; any recoverable failure
//! lands in [`GrSequencer::abort`], which rolls back exactly the suffix of
//! forward actions completed so far and leaves the system in its pre-entry
//! state. Exit never unwinds: every mandatory step runs, and the first
//! failure is reported only after the sweep completes (the safe direction
//! for exit is "up").

use std::cell::RefCell;
use std::rc::Rc;

use lpwr_cache::SeqCache;
use lpwr_fecs::{FecsTimeouts, MAILBOX_REGLIST_DONE, METHOD_RESTORE_REGLIST, METHOD_SAVE_REGLIST};
use lpwr_fifo::engines::EngineTable;
use lpwr_fifo::regs as fifo_regs;
use lpwr_fifo::{holdoff, preempt_runlist};
use lpwr_regs::{poll32, Bus, Clock, PollUnit, RegisterBus};
use tracing::{debug, warn};

use crate::abort::{encode_abort, AbortReason, Checkpoint, EntryAborted};
use crate::blocker::{self, BlockerTimeouts};
use crate::hal::GrHal;
use crate::idle::{self, check_idle, IdleReason};
use crate::platform::{Overlay, Platform, RpcCall, SemaWait};
use crate::railgate;
use crate::regs;
use crate::state::{PgCtrl, PowerGateState, SupportFlags};

/// Policy timeout values for every bounded wait in the sequences. Defaults
/// are the stock policy numbers; chip configuration may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqTimeouts {
    pub preempt_ns: u64,
    pub blocker: BlockerTimeouts,
    pub holdoff_ns: u64,
    pub unbind_ns: u64,
    pub pg_fsm_ns: u64,
    pub fecs: FecsTimeouts,
    pub reset_settle_ns: u64,
    pub ram_repair_ns: u64,
    pub rail_toggle_ns: u64,
    pub sema_ticks: u32,
}

impl Default for SeqTimeouts {
    fn default() -> Self {
        Self {
            preempt_ns: 40_000_000,
            blocker: BlockerTimeouts::default(),
            holdoff_ns: 1_000_000,
            unbind_ns: 100_000,
            pg_fsm_ns: 80_000,
            fecs: FecsTimeouts::default(),
            reset_settle_ns: 10_000,
            ram_repair_ns: 500_000,
            rail_toggle_ns: 10_000_000,
            sema_ticks: 10,
        }
    }
}

/// Exit step that recorded the sweep's first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStage {
    RailUngate,
    PgFsm,
    GlobalStateRestore,
    GpccsBootstrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("power-ungate step failed: {stage:?}")]
pub struct ExitError {
    pub stage: ExitStage,
}

/// One power-gate controller's sequencer.
///
/// Owns the controller's [`PowerGateState`] and attempt-scoped bookkeeping;
/// shares the process-wide [`SeqCache`] with its sibling controller. The
/// register bus is passed per call, mirroring how the surrounding task
/// hands the sequencer its bus access.
pub struct GrSequencer<C: Clock> {
    hal: Box<dyn GrHal>,
    clock: C,
    timeouts: SeqTimeouts,
    engines: EngineTable,
    platform: Box<dyn Platform>,
    cache: Rc<RefCell<SeqCache>>,
    pg: PowerGateState,

    overlay_attached: bool,
    sema_held: bool,
    clk_access_disabled: bool,
    mmu_unbound: bool,
    gated: bool,
}

impl<C: Clock> GrSequencer<C> {
    pub fn new(
        hal: Box<dyn GrHal>,
        clock: C,
        ctrl: PgCtrl,
        platform: Box<dyn Platform>,
        cache: Rc<RefCell<SeqCache>>,
    ) -> Self {
        let engines = EngineTable::for_family(hal.caps().family);
        Self {
            hal,
            clock,
            timeouts: SeqTimeouts::default(),
            engines,
            platform,
            cache,
            pg: PowerGateState::new(ctrl),
            overlay_attached: false,
            sema_held: false,
            clk_access_disabled: false,
            mmu_unbound: false,
            gated: false,
        }
    }

    /// One-time controller init: program the idle masks, derive the holdoff
    /// mask from engine presence, and read the support fuses.
    pub fn init(&mut self, bus: &mut dyn RegisterBus) {
        let ctrl = self.pg.ctrl;
        let masks = self.hal.idle_masks(ctrl);
        bus.write32(Bus::Csb, regs::pg_addr(ctrl, regs::PG_IDLE_MASK0), masks[0]);
        bus.write32(Bus::Csb, regs::pg_addr(ctrl, regs::PG_IDLE_MASK1), masks[1]);
        bus.write32(Bus::Csb, regs::pg_addr(ctrl, regs::PG_IDLE_MASK2), masks[2]);
        self.pg.idle_mask = masks;
        self.pg.holdoff_mask = self.engines.holdoff_mask();
        self.pg.support = crate::state::probe_support(bus);
    }

    pub fn pg_state(&self) -> &PowerGateState {
        &self.pg
    }

    pub fn is_gated(&self) -> bool {
        self.gated
    }

    pub fn timeouts_mut(&mut self) -> &mut SeqTimeouts {
        &mut self.timeouts
    }

    /// Power-down entry sequence.
    pub fn power_gate(&mut self, bus: &mut dyn RegisterBus) -> Result<(), EntryAborted> {
        debug_assert!(!self.gated, "entry while already gated");
        let ctrl = self.pg.ctrl;
        let caps = *self.hal.caps();
        self.pg.abort_reason = 0;
        debug!("{:?} power-gate entry", ctrl);

        // Checkpoint 1.
        if let Err(reason) = self.idle_now(bus) {
            return Err(self.abort_with(bus, Checkpoint::PgOn, reason.into()));
        }

        // GR-RG is serialized against a concurrent voltage/frequency switch;
        // losing the semaphore is a graceful abort, not an error. The
        // semaphore is held from here through exit, and released by the
        // `PrivBlocker` rollback case if the entry dies later.
        if ctrl == PgCtrl::GrRg {
            let wait = SemaWait::Bounded(self.timeouts.sema_ticks);
            if !self.platform.acquire_entry_sema(wait) {
                return Err(self.abort_with(bus, Checkpoint::PgOn, AbortReason::MutexAcquireFailed));
            }
            self.sema_held = true;
        }

        if self.pg.support.contains(SupportFlags::CLK_ACCESS_GATING) {
            self.platform.set_clk_access(ctrl, false);
            self.clk_access_disabled = true;
        }

        if ctrl == PgCtrl::GrRg {
            // Arbiter timestamps and engine-level clock gating stay off for
            // the whole rail transition; the abort path and exit re-enable
            // both.
            bus.write32(Bus::Bar0, regs::SMCARB_TIMESTAMP_CTRL, 0);
            bus.write32(Bus::Bar0, regs::ELCG_CTRL, 0);
        }

        // Steps 2-5: blockers walk to equation mode (flush and the second
        // idle checkpoint happen inside, under the critical section).
        let intr_mask = self.hal.intr_pending_mask(ctrl);
        if let Err(reason) = blocker::engage(
            bus,
            &self.clock,
            &caps,
            ctrl,
            intr_mask,
            &self.timeouts.blocker,
            self.platform.as_mut(),
        ) {
            return Err(self.abort_with(bus, Checkpoint::PrivBlocker, reason));
        }

        if !self.platform.attach_overlay(Overlay::FifoResource) {
            return Err(self.abort_with(
                bus,
                Checkpoint::OverlayLoad,
                AbortReason::OverlayAttachFailed,
            ));
        }
        self.overlay_attached = true;

        // Step 6: preemption, yielding to any higher-priority wake.
        let gr = *self.engines.graphics();
        let preempted = {
            let platform = self.platform.as_mut();
            preempt_runlist(
                bus,
                &self.clock,
                &caps,
                &gr,
                self.timeouts.preempt_ns,
                &mut || platform.wake_request_pending(ctrl),
            )
        };
        if let Err(err) = preempted {
            return Err(self.abort_with(bus, Checkpoint::PreemptSequence, err.into()));
        }
        // The preempt's own register traffic re-asserts the flip latch.
        idle::clear_idle_flip(bus, ctrl);

        // Step 7.
        if !holdoff::engage(
            bus,
            &self.clock,
            self.pg.holdoff_mask,
            self.timeouts.holdoff_ns,
        ) {
            return Err(self.abort_with(
                bus,
                Checkpoint::HoldoffEnabled0,
                AbortReason::HoldoffTimeout,
            ));
        }

        // Step 8: independent confirmation that the preempt unloaded the
        // context, beyond the preempt-pending bit clearing.
        let status_addr = fifo_regs::engine_status_addr(gr.runlist_base, gr.runlist_engine_index);
        let ctx = (bus.read32(Bus::Bar0, status_addr) & fifo_regs::ENGINE_CTX_STATUS_MASK)
            >> fifo_regs::ENGINE_CTX_STATUS_SHIFT;
        if ctx != fifo_regs::ENGINE_CTX_STATUS_INVALID {
            return Err(self.abort_with(
                bus,
                Checkpoint::HoldoffEnabled0,
                AbortReason::CtxNotInvalid,
            ));
        }

        // Checkpoint 3.
        if let Err(reason) = self.idle_now(bus) {
            return Err(self.abort_with(bus, Checkpoint::HoldoffEnabled0, reason.into()));
        }

        let mut checkpoint = Checkpoint::HoldoffEnabled0;

        if self.pg.support.contains(SupportFlags::UNBIND) {
            bus.write32(Bus::Bar0, regs::MMU_BIND, 0);
            self.mmu_unbound = true;
            let unbound = poll32(
                bus,
                &self.clock,
                Bus::Bar0,
                regs::MMU_BIND_STATUS,
                u32::MAX,
                0,
                self.timeouts.unbind_ns,
                PollUnit::Ns,
            );
            if !unbound {
                return Err(self.abort_with(bus, Checkpoint::MmuUnbind, AbortReason::UnbindTimeout));
            }
            checkpoint = Checkpoint::MmuUnbind;
        }

        // Step 10: best-effort global state save. A failure is logged and
        // the entry continues with a stale snapshot (see DESIGN.md).
        if self.pg.support.contains(SupportFlags::SAVE_GLOBAL_STATE) {
            self.cache.borrow_mut().save(bus);
            let pipes = lpwr_fecs::active_sys_pipes(bus, &caps);
            if let Err(err) = lpwr_fecs::submit_method(
                bus,
                &self.clock,
                &self.timeouts.fecs,
                pipes,
                METHOD_SAVE_REGLIST,
                0,
                MAILBOX_REGLIST_DONE,
            ) {
                warn!("global state save failed, continuing entry: {}", err);
            }
        }

        // Step 11: any further priv access to the gated range raises an
        // error instead of wedging the bus.
        if self.pg.support.contains(SupportFlags::PRIV_RING) {
            self.hal.set_pri_error_detection(bus, true);
        }

        // Step 12: hand the rails to the hardware power-gate FSM.
        bus.write32(
            Bus::Csb,
            regs::pg_addr(ctrl, regs::PG_TARGET),
            regs::PG_TARGET_POWERED_DOWN,
        );
        let gated = poll32(
            bus,
            &self.clock,
            Bus::Csb,
            regs::pg_addr(ctrl, regs::PG_STATUS),
            regs::PG_STATUS_FIELD,
            regs::PG_STATUS_LOW_POWER,
            self.timeouts.pg_fsm_ns,
            PollUnit::Ns,
        );
        if !gated {
            // The checkpoint list does not track PRI-error arming; disarm
            // before unwinding so an aborted entry leaves it off.
            if self.pg.support.contains(SupportFlags::PRIV_RING) {
                self.hal.set_pri_error_detection(bus, false);
            }
            return Err(self.abort_with(bus, checkpoint, AbortReason::PgFsmTimeout));
        }

        self.platform.detach_overlay(Overlay::FifoResource);
        self.overlay_attached = false;
        self.gated = true;
        debug!("{:?} power-gated", ctrl);
        Ok(())
    }

    /// Power-up exit sequence. Runs every mandatory step; reports the first
    /// failure after the sweep.
    pub fn power_ungate(&mut self, bus: &mut dyn RegisterBus) -> Result<(), ExitError> {
        let ctrl = self.pg.ctrl;
        let caps = *self.hal.caps();
        debug!("{:?} power-ungate exit", ctrl);
        let mut first_failure: Option<ExitStage> = None;

        if ctrl == PgCtrl::GrRg {
            railgate::prepare_rail_gate(
                bus,
                &self.clock,
                self.hal.as_ref(),
                self.timeouts.reset_settle_ns,
            );
            if let Err(err) =
                railgate::set_rail(bus, &self.clock, &caps, true, self.timeouts.rail_toggle_ns)
            {
                warn!("rail ungate toggle failed: {}", err);
                first_failure.get_or_insert(ExitStage::RailUngate);
            }
            if let Err(err) = railgate::finish_rail_ungate(
                bus,
                &self.clock,
                self.hal.as_ref(),
                self.timeouts.reset_settle_ns,
                self.timeouts.ram_repair_ns,
            ) {
                warn!("rail ungate completion failed: {}", err);
                first_failure.get_or_insert(ExitStage::RailUngate);
            }
        }

        bus.write32(
            Bus::Csb,
            regs::pg_addr(ctrl, regs::PG_TARGET),
            regs::PG_TARGET_POWERED_UP,
        );
        let powered = poll32(
            bus,
            &self.clock,
            Bus::Csb,
            regs::pg_addr(ctrl, regs::PG_STATUS),
            regs::PG_STATUS_FIELD,
            regs::PG_STATUS_PWR_ON,
            self.timeouts.pg_fsm_ns,
            PollUnit::Ns,
        );
        if !powered {
            warn!("{:?} power-gate FSM did not report power-on", ctrl);
            first_failure.get_or_insert(ExitStage::PgFsm);
        }

        if self.pg.support.contains(SupportFlags::SAVE_GLOBAL_STATE) {
            let pipes = lpwr_fecs::active_sys_pipes(bus, &caps);
            if let Err(err) = lpwr_fecs::submit_method(
                bus,
                &self.clock,
                &self.timeouts.fecs,
                pipes,
                METHOD_RESTORE_REGLIST,
                0,
                MAILBOX_REGLIST_DONE,
            ) {
                warn!("FECS global state restore failed: {}", err);
                first_failure.get_or_insert(ExitStage::GlobalStateRestore);
            }
            self.cache.borrow().restore(bus);
        }

        if caps.legacy_gpccs_bootstrap
            && !self.platform.execute_rpc_blocking(RpcCall::GpccsBootstrap)
        {
            warn!("legacy GPCCS bootstrap RPC failed");
            first_failure.get_or_insert(ExitStage::GpccsBootstrap);
        }

        if self.pg.support.contains(SupportFlags::PRIV_RING) {
            self.hal.set_pri_error_detection(bus, false);
        }

        if self.mmu_unbound {
            bus.write32(Bus::Bar0, regs::MMU_BIND, regs::MMU_BIND_ENGINE);
            self.mmu_unbound = false;
        }

        self.platform.critical_enter();
        blocker::disengage(bus, &caps, ctrl);
        self.platform.critical_exit();

        holdoff::disengage(bus, self.pg.holdoff_mask);

        if self.clk_access_disabled {
            self.platform.set_clk_access(ctrl, true);
            self.clk_access_disabled = false;
        }

        if ctrl == PgCtrl::GrRg && self.sema_held {
            self.platform.release_entry_sema();
            self.sema_held = false;
        }

        self.gated = false;
        match first_failure {
            None => {
                debug!("{:?} powered up", ctrl);
                Ok(())
            }
            Some(stage) => Err(ExitError { stage }),
        }
    }

    /// Roll back a partially-completed entry.
    ///
    /// The rollback set is exactly the suffix of forward actions from
    /// `checkpoint` back to the start; every action is safe to repeat, so a
    /// second abort at the same checkpoint is a no-op on hardware state.
    /// Public because the task layer also forces an abort on external
    /// events (e.g. a wake request landing mid-entry).
    pub fn abort(&mut self, bus: &mut dyn RegisterBus, checkpoint: Checkpoint, reason: AbortReason) {
        self.pg.abort_reason = encode_abort(checkpoint, reason);
        warn!(
            "{:?} entry aborted at {:?}: {:?}",
            self.pg.ctrl, checkpoint, reason
        );
        let ctrl = self.pg.ctrl;
        let caps = *self.hal.caps();

        for step in checkpoint.unwind_suffix() {
            match step {
                Checkpoint::MmuUnbind => {
                    if self.mmu_unbound {
                        bus.write32(Bus::Bar0, regs::MMU_BIND, regs::MMU_BIND_ENGINE);
                        self.mmu_unbound = false;
                    }
                }
                Checkpoint::HoldoffEnabled0 => {
                    holdoff::disengage(bus, self.pg.holdoff_mask);
                }
                // No action of its own; falls through to the overlay
                // release below.
                Checkpoint::PreemptSequence => {}
                Checkpoint::OverlayLoad => {
                    if self.overlay_attached {
                        self.platform.detach_overlay(Overlay::FifoResource);
                        self.overlay_attached = false;
                    }
                }
                Checkpoint::PrivBlocker => {
                    self.platform.critical_enter();
                    blocker::disengage(bus, &caps, ctrl);
                    self.platform.critical_exit();
                    if ctrl == PgCtrl::GrRg {
                        bus.write32(
                            Bus::Bar0,
                            regs::SMCARB_TIMESTAMP_CTRL,
                            regs::SMCARB_TIMESTAMP_ENABLED,
                        );
                        bus.write32(Bus::Bar0, regs::ELCG_CTRL, regs::ELCG_ENABLED);
                        if self.sema_held {
                            self.platform.release_entry_sema();
                            self.sema_held = false;
                        }
                    }
                }
                Checkpoint::DisableClkAccess => {
                    if self.clk_access_disabled {
                        self.platform.set_clk_access(ctrl, true);
                        self.clk_access_disabled = false;
                    }
                }
                Checkpoint::PgOn => {}
            }
        }
    }

    /// Voltage/frequency-switch side of the GR-RG serialization: takes the
    /// entry semaphore with an unbounded wait, forcing any in-flight GR-RG
    /// entry to lose its bounded acquire until the switch completes.
    pub fn lock_for_vf_switch(&mut self) {
        debug_assert_eq!(self.pg.ctrl, PgCtrl::GrRg);
        self.platform.acquire_entry_sema(SemaWait::Forever);
    }

    pub fn unlock_after_vf_switch(&mut self) {
        debug_assert_eq!(self.pg.ctrl, PgCtrl::GrRg);
        self.platform.release_entry_sema();
    }

    fn idle_now(&mut self, bus: &mut dyn RegisterBus) -> Result<(), IdleReason> {
        let ctrl = self.pg.ctrl;
        let caps = *self.hal.caps();
        let intr_mask = self.hal.intr_pending_mask(ctrl);
        let queued = self.platform.queued_requests(ctrl);
        check_idle(bus, &caps, ctrl, intr_mask, queued)
    }

    fn abort_with(
        &mut self,
        bus: &mut dyn RegisterBus,
        checkpoint: Checkpoint,
        reason: AbortReason,
    ) -> EntryAborted {
        self.abort(bus, checkpoint, reason);
        EntryAborted { checkpoint, reason }
    }
}
