//! Shared test rig: a recording platform double and a fully-wired
//! sequencer over a `MockBus`/`ManualClock` pair.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use lpwr_cache::{RegList, SeqCache};
use lpwr_regs::mock::MockBus;
use lpwr_regs::{Bus, ChipFamily, ManualClock};
use lpwr_seq::seq::GrSequencer;
use lpwr_seq::{regs, Ga10x, Overlay, PgCtrl, Platform, RpcCall, SemaWait, Tu10x};

/// Registers the shared test cache covers.
pub const CACHED_REGS: [u32; 2] = [0x0030_0000, 0x0030_0004];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    CriticalEnter,
    CriticalExit,
    AttachOverlay,
    DetachOverlay,
    AcquireSemaBounded,
    AcquireSemaForever,
    ReleaseSema,
    ClkAccess(bool),
    Rpc,
}

#[derive(Debug)]
pub struct PlatformState {
    pub events: Vec<Event>,
    pub deny_sema: bool,
    pub deny_overlay: bool,
    pub queued: VecDeque<usize>,
    pub wake_pending: bool,
    pub rpc_fail: bool,
    pub sema_holds: i32,
    pub critical_depth: i32,
    pub overlay_refs: i32,
    pub clk_access_on: bool,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            deny_sema: false,
            deny_overlay: false,
            queued: VecDeque::new(),
            wake_pending: false,
            rpc_fail: false,
            sema_holds: 0,
            critical_depth: 0,
            overlay_refs: 0,
            clk_access_on: true,
        }
    }
}

impl PlatformState {
    pub fn count(&self, event: Event) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }
}

pub struct RecordingPlatform(pub Rc<RefCell<PlatformState>>);

impl Platform for RecordingPlatform {
    fn critical_enter(&mut self) {
        let mut s = self.0.borrow_mut();
        s.critical_depth += 1;
        s.events.push(Event::CriticalEnter);
    }

    fn critical_exit(&mut self) {
        let mut s = self.0.borrow_mut();
        s.critical_depth -= 1;
        s.events.push(Event::CriticalExit);
    }

    fn attach_overlay(&mut self, _overlay: Overlay) -> bool {
        let mut s = self.0.borrow_mut();
        s.events.push(Event::AttachOverlay);
        if s.deny_overlay {
            return false;
        }
        s.overlay_refs += 1;
        true
    }

    fn detach_overlay(&mut self, _overlay: Overlay) {
        let mut s = self.0.borrow_mut();
        s.overlay_refs -= 1;
        s.events.push(Event::DetachOverlay);
    }

    fn acquire_entry_sema(&mut self, wait: SemaWait) -> bool {
        let mut s = self.0.borrow_mut();
        match wait {
            SemaWait::Bounded(_) => {
                s.events.push(Event::AcquireSemaBounded);
                if s.deny_sema {
                    return false;
                }
            }
            SemaWait::Forever => s.events.push(Event::AcquireSemaForever),
        }
        s.sema_holds += 1;
        true
    }

    fn release_entry_sema(&mut self) {
        let mut s = self.0.borrow_mut();
        s.sema_holds -= 1;
        s.events.push(Event::ReleaseSema);
    }

    fn wake_request_pending(&mut self, _ctrl: PgCtrl) -> bool {
        self.0.borrow().wake_pending
    }

    fn queued_requests(&mut self, _ctrl: PgCtrl) -> usize {
        self.0.borrow_mut().queued.pop_front().unwrap_or(0)
    }

    fn set_clk_access(&mut self, _ctrl: PgCtrl, enabled: bool) {
        let mut s = self.0.borrow_mut();
        s.clk_access_on = enabled;
        s.events.push(Event::ClkAccess(enabled));
    }

    fn execute_rpc_blocking(&mut self, _call: RpcCall) -> bool {
        let mut s = self.0.borrow_mut();
        s.events.push(Event::Rpc);
        !s.rpc_fail
    }
}

pub struct Rig {
    pub bus: MockBus,
    pub clock: ManualClock,
    pub seq: GrSequencer<ManualClock>,
    pub platform: Rc<RefCell<PlatformState>>,
    pub cache: Rc<RefCell<SeqCache>>,
}

/// All support fuses lit.
pub const FUSE_ALL: u32 = 0b1111;

pub fn rig(family: ChipFamily, ctrl: PgCtrl, fuse: u32) -> Rig {
    let clock = ManualClock::new();
    let mut bus = MockBus::new();
    bus.attach_clock(clock.clone(), 100);
    bus.set(Bus::Bar0, regs::FUSE_OPT_LPWR, fuse);
    bus.set(Bus::Bar0, CACHED_REGS[0], 0x1111);
    bus.set(Bus::Bar0, CACHED_REGS[1], 0x2222);
    bus.mark_write1_clear(Bus::Csb, regs::pg_addr(ctrl, regs::PG_IDLE_FLIP));

    let cache = Rc::new(RefCell::new(
        SeqCache::new(&RegList {
            flat: &CACHED_REGS,
            ..RegList::default()
        })
        .unwrap(),
    ));

    let platform = Rc::new(RefCell::new(PlatformState::default()));
    let hal: Box<dyn lpwr_seq::GrHal> = match family {
        ChipFamily::Ga10x => Box::new(Ga10x::new()),
        ChipFamily::Tu10x => Box::new(Tu10x::new()),
    };
    let mut seq = GrSequencer::new(
        hal,
        clock.clone(),
        ctrl,
        Box::new(RecordingPlatform(platform.clone())),
        cache.clone(),
    );
    seq.init(&mut bus);

    Rig {
        bus,
        clock,
        seq,
        platform,
        cache,
    }
}

/// Make the entry sequence's power-gate FSM poll succeed.
pub fn arm_pg_fsm_gate(rig: &mut Rig, ctrl: PgCtrl) {
    rig.bus.set(
        Bus::Csb,
        regs::pg_addr(ctrl, regs::PG_STATUS),
        regs::PG_STATUS_LOW_POWER,
    );
}

/// Make the exit sequence's power-gate FSM poll succeed.
pub fn arm_pg_fsm_ungate(rig: &mut Rig, ctrl: PgCtrl) {
    rig.bus.set(
        Bus::Csb,
        regs::pg_addr(ctrl, regs::PG_STATUS),
        regs::PG_STATUS_PWR_ON,
    );
}

/// Queue a FECS completion for the next submitted method (pipe 0).
pub fn arm_fecs_done(rig: &mut Rig) {
    rig.bus.script_reads(
        Bus::FecsHub,
        lpwr_fecs::regs::FECS_MAILBOX0,
        &[lpwr_fecs::MAILBOX_REGLIST_DONE],
    );
}
