//! End-to-end entry/exit sequences over the mock register space.

mod common;

use common::*;
use lpwr_fifo::regs as fifo_regs;
use lpwr_regs::mock::MockBus;
use lpwr_regs::{Bus, ChipFamily};
use lpwr_seq::{regs, AbortReason, Checkpoint, ExitStage, PgCtrl};
use pretty_assertions::assert_eq;

fn write_pos(bus: &MockBus, sel: Bus, addr: u32, value: u32) -> usize {
    bus.writes()
        .iter()
        .position(|w| *w == (sel, addr, value))
        .unwrap_or_else(|| panic!("no write of {value:#x} to {addr:#x}"))
}

#[test]
fn pg_entry_happy_path_orders_the_protocol() {
    let mut r = rig(ChipFamily::Ga10x, PgCtrl::GrPg, FUSE_ALL);
    arm_pg_fsm_gate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);

    r.seq.power_gate(&mut r.bus).unwrap();

    assert!(r.seq.is_gated());
    assert_eq!(r.seq.pg_state().abort_reason, 0);

    // Forward order: blockers narrowed to equation mode, then preemption,
    // then holdoff, then the power-gate FSM trigger.
    let blocker_ctrl = regs::blocker_addr(PgCtrl::GrPg, 0);
    let gr_preempt = fifo_regs::runlist_base(0) + fifo_regs::RUNLIST_PREEMPT;
    let holdoff_mask = r.seq.pg_state().holdoff_mask;
    let equation = write_pos(&r.bus, Bus::Bar0, blocker_ctrl, 2);
    let preempt = write_pos(&r.bus, Bus::Bar0, gr_preempt, fifo_regs::PREEMPT_TYPE_RUNLIST);
    let holdoff = write_pos(&r.bus, Bus::Csb, lpwr_fifo::regs::HOLDOFF_MASK, holdoff_mask);
    let target = write_pos(
        &r.bus,
        Bus::Csb,
        regs::pg_addr(PgCtrl::GrPg, regs::PG_TARGET),
        regs::PG_TARGET_POWERED_DOWN,
    );
    assert!(equation < preempt);
    assert!(preempt < holdoff);
    assert!(holdoff < target);

    // PRI error detection armed for the gated window.
    assert_eq!(
        r.bus.get(Bus::Bar0, regs::PRI_ERROR_CTRL),
        regs::PRI_ERROR_ENABLE
    );

    // Platform bookkeeping balanced; clock-domain access stays off while
    // gated.
    let p = r.platform.borrow();
    assert_eq!(p.overlay_refs, 0);
    assert_eq!(p.critical_depth, 0);
    assert!(!p.clk_access_on);
    assert_eq!(p.count(Event::AttachOverlay), 1);
    assert_eq!(p.count(Event::DetachOverlay), 1);
}

#[test]
fn busy_engine_at_checkpoint_one_aborts_with_zero_writes() {
    let mut r = rig(ChipFamily::Ga10x, PgCtrl::GrPg, FUSE_ALL);
    let baseline = r.bus.total_writes();
    r.bus
        .set(Bus::Csb, regs::pg_addr(PgCtrl::GrPg, regs::PG_INTR_STATUS), 0x1);

    let err = r.seq.power_gate(&mut r.bus).unwrap_err();

    assert_eq!(err.checkpoint, Checkpoint::PgOn);
    assert_eq!(err.reason, AbortReason::IntrPending);
    assert_eq!(
        r.seq.pg_state().abort_reason,
        lpwr_seq::encode_abort(Checkpoint::PgOn, AbortReason::IntrPending)
    );
    // Nothing was written beyond the idle check's own reads.
    assert_eq!(r.bus.total_writes(), baseline);
    assert!(!r.seq.is_gated());
}

#[test]
fn fecs_save_timeout_is_best_effort_and_the_snapshot_survives() {
    let mut r = rig(ChipFamily::Ga10x, PgCtrl::GrPg, FUSE_ALL);
    arm_pg_fsm_gate(&mut r, PgCtrl::GrPg);
    // No FECS completion queued: the save submit burns its whole window.

    r.seq.power_gate(&mut r.bus).unwrap();
    assert!(r.seq.is_gated());
    assert_eq!(r.seq.pg_state().abort_reason, 0);

    // The local snapshot still captured the pre-gate values; a later exit
    // replays them over whatever the powered-down domain reads as.
    r.bus.set(Bus::Bar0, CACHED_REGS[0], 0xdead_beef);
    r.bus.set(Bus::Bar0, CACHED_REGS[1], 0xdead_beef);
    arm_pg_fsm_ungate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);
    r.seq.power_ungate(&mut r.bus).unwrap();

    assert_eq!(r.bus.get(Bus::Bar0, CACHED_REGS[0]), 0x1111);
    assert_eq!(r.bus.get(Bus::Bar0, CACHED_REGS[1]), 0x2222);
}

#[test]
fn rg_full_cycle_gates_and_ungates() {
    let mut r = rig(ChipFamily::Ga10x, PgCtrl::GrRg, FUSE_ALL);
    arm_pg_fsm_gate(&mut r, PgCtrl::GrRg);
    arm_fecs_done(&mut r);

    r.seq.power_gate(&mut r.bus).unwrap();
    assert!(r.seq.is_gated());
    {
        let p = r.platform.borrow();
        assert_eq!(p.sema_holds, 1, "entry semaphore held while gated");
    }
    // RG parked the arbiter timestamp and engine clock gating.
    assert_eq!(r.bus.get(Bus::Bar0, regs::SMCARB_TIMESTAMP_CTRL), 0);
    assert_eq!(r.bus.get(Bus::Bar0, regs::ELCG_CTRL), 0);
    // Allow range widened while blocked.
    assert_eq!(
        r.bus
            .get(Bus::Bar0, regs::blocker_addr(PgCtrl::GrRg, regs::BLOCKER_ALLOW_HI)),
        regs::ALLOW_RANGE_WIDE_HI
    );

    r.bus.set(Bus::Bar0, CACHED_REGS[0], 0xdead_beef);
    arm_pg_fsm_ungate(&mut r, PgCtrl::GrRg);
    arm_fecs_done(&mut r);
    r.seq.power_ungate(&mut r.bus).unwrap();

    assert!(!r.seq.is_gated());
    let p = r.platform.borrow();
    assert_eq!(p.sema_holds, 0);
    assert!(p.clk_access_on);
    // The domain came fully out of its safe state.
    assert_eq!(r.bus.get(Bus::Bar0, regs::GR_RESET_CTRL), 0);
    assert_eq!(r.bus.get(Bus::Bar0, regs::RAIL_CLAMP), 0);
    assert_eq!(r.bus.get(Bus::Bar0, regs::ELCG_CTRL), regs::ELCG_ENABLED);
    assert_eq!(
        r.bus.get(Bus::Bar0, regs::SMCARB_TIMESTAMP_CTRL),
        regs::SMCARB_TIMESTAMP_ENABLED
    );
    assert_eq!(r.bus.get(Bus::Bar0, regs::MMU_BIND), regs::MMU_BIND_ENGINE);
    assert_eq!(r.bus.get(Bus::Bar0, regs::blocker_addr(PgCtrl::GrRg, 0)), 0);
    assert_eq!(r.bus.get(Bus::Csb, lpwr_fifo::regs::HOLDOFF_MASK), 0);
    assert_eq!(r.bus.get(Bus::Bar0, CACHED_REGS[0]), 0x1111);
    // GPIO rail toggled on under its hardware mutex, which was released.
    assert_eq!(r.bus.get(Bus::Bar0, regs::GPIO_OUTPUT_CNTL), regs::GPIO_RAIL_ON);
    assert_eq!(r.bus.get(Bus::Bar0, regs::GPIO_MUTEX), 0);
}

#[test]
fn exit_records_the_first_failure_but_finishes_the_sweep() {
    let mut r = rig(ChipFamily::Ga10x, PgCtrl::GrRg, FUSE_ALL);
    arm_pg_fsm_gate(&mut r, PgCtrl::GrRg);
    arm_fecs_done(&mut r);
    r.seq.power_gate(&mut r.bus).unwrap();

    // The GPIO toggle never latches.
    r.bus.set(Bus::Bar0, regs::GPIO_TRIGGER_STATUS, 1);
    r.seq.timeouts_mut().rail_toggle_ns = 100_000;
    arm_pg_fsm_ungate(&mut r, PgCtrl::GrRg);
    arm_fecs_done(&mut r);

    let err = r.seq.power_ungate(&mut r.bus).unwrap_err();
    assert_eq!(err.stage, ExitStage::RailUngate);

    // The mandatory tail of the sweep still ran.
    assert_eq!(r.bus.get(Bus::Bar0, regs::blocker_addr(PgCtrl::GrRg, 0)), 0);
    assert_eq!(r.bus.get(Bus::Csb, lpwr_fifo::regs::HOLDOFF_MASK), 0);
    let p = r.platform.borrow();
    assert_eq!(p.sema_holds, 0);
    assert!(!r.seq.is_gated());
}

#[test]
fn tu10x_exit_bootstraps_gpccs_over_the_legacy_rpc() {
    let mut r = rig(ChipFamily::Tu10x, PgCtrl::GrPg, FUSE_ALL);
    arm_pg_fsm_gate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);
    r.seq.power_gate(&mut r.bus).unwrap();

    arm_pg_fsm_ungate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);
    r.seq.power_ungate(&mut r.bus).unwrap();
    assert_eq!(r.platform.borrow().count(Event::Rpc), 1);
}

#[test]
fn tu10x_failed_bootstrap_is_reported() {
    let mut r = rig(ChipFamily::Tu10x, PgCtrl::GrPg, FUSE_ALL);
    arm_pg_fsm_gate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);
    r.seq.power_gate(&mut r.bus).unwrap();

    r.platform.borrow_mut().rpc_fail = true;
    arm_pg_fsm_ungate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);
    let err = r.seq.power_ungate(&mut r.bus).unwrap_err();
    assert_eq!(err.stage, ExitStage::GpccsBootstrap);
}

#[test]
fn vf_switch_holder_makes_rg_entry_abort_gracefully() {
    let mut r = rig(ChipFamily::Ga10x, PgCtrl::GrRg, FUSE_ALL);

    r.seq.lock_for_vf_switch();
    assert_eq!(r.platform.borrow().count(Event::AcquireSemaForever), 1);
    // While the switch holds the semaphore, bounded acquires lose.
    r.platform.borrow_mut().deny_sema = true;

    let baseline = r.bus.total_writes();
    let err = r.seq.power_gate(&mut r.bus).unwrap_err();
    assert_eq!(err.checkpoint, Checkpoint::PgOn);
    assert_eq!(err.reason, AbortReason::MutexAcquireFailed);
    assert!(err.is_graceful());
    assert_eq!(r.bus.total_writes(), baseline);
    assert_eq!(r.platform.borrow().count(Event::ReleaseSema), 0);

    r.platform.borrow_mut().deny_sema = false;
    r.seq.unlock_after_vf_switch();
    assert_eq!(r.platform.borrow().sema_holds, 0);
}

#[test]
fn critical_sections_stay_balanced_across_a_cycle() {
    let mut r = rig(ChipFamily::Ga10x, PgCtrl::GrPg, FUSE_ALL);
    arm_pg_fsm_gate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);
    r.seq.power_gate(&mut r.bus).unwrap();
    arm_pg_fsm_ungate(&mut r, PgCtrl::GrPg);
    arm_fecs_done(&mut r);
    r.seq.power_ungate(&mut r.bus).unwrap();

    let p = r.platform.borrow();
    assert_eq!(p.critical_depth, 0);
    assert_eq!(p.count(Event::CriticalEnter), p.count(Event::CriticalExit));
}
