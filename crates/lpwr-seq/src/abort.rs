//! Abort checkpoints, reasons, and the rollback order.
//!
//! A checkpoint names how far the entry sequence got before failing; the
//! rollback for an abort at checkpoint `C` is exactly the suffix of
//! [`Checkpoint::UNWIND_ORDER`] starting at `C` — later checkpoints imply
//! every earlier rollback action as well. The forward sequence and this
//! order must only ever change together.

/// Furthest point the entry sequence completed before aborting.
///
/// Ordered from earliest to latest forward progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Checkpoint {
    /// Nothing beyond the PG-on request itself.
    PgOn,
    /// Clock-domain access was dropped.
    DisableClkAccess,
    /// Priv blockers were (being) engaged.
    PrivBlocker,
    /// The FIFO resource overlay was attached.
    OverlayLoad,
    /// Runlist preemption ran.
    PreemptSequence,
    /// Holdoff was enabled (and context/idle confirmed).
    HoldoffEnabled0,
    /// The MMU unbind was issued.
    MmuUnbind,
}

impl Checkpoint {
    /// Rollback execution order, latest checkpoint first. `PreemptSequence`
    /// carries no action of its own; aborting there falls through to
    /// `OverlayLoad`'s overlay release, exactly like the adjacent case
    /// labels in the original fallthrough chain.
    pub const UNWIND_ORDER: [Checkpoint; 7] = [
        Checkpoint::MmuUnbind,
        Checkpoint::HoldoffEnabled0,
        Checkpoint::PreemptSequence,
        Checkpoint::OverlayLoad,
        Checkpoint::PrivBlocker,
        Checkpoint::DisableClkAccess,
        Checkpoint::PgOn,
    ];

    /// The rollback steps an abort at `self` must execute, in order.
    pub fn unwind_suffix(self) -> &'static [Checkpoint] {
        let start = Self::UNWIND_ORDER
            .iter()
            .position(|c| *c == self)
            .expect("every checkpoint appears in UNWIND_ORDER");
        &Self::UNWIND_ORDER[start..]
    }

    fn code(self) -> u32 {
        match self {
            Checkpoint::PgOn => 0x0,
            Checkpoint::DisableClkAccess => 0x1,
            Checkpoint::PrivBlocker => 0x2,
            Checkpoint::OverlayLoad => 0x3,
            Checkpoint::PreemptSequence => 0x4,
            Checkpoint::HoldoffEnabled0 => 0x5,
            Checkpoint::MmuUnbind => 0x6,
        }
    }
}

/// Why the entry sequence gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    // Idle-check attributions.
    IntrPending,
    IdleFlip,
    QueueNotEmpty,
    Sec2Wake,
    // Priv-blocker controller.
    BlockAllTimeout,
    FlushTimeout,
    BlockEquationTimeout,
    // Preemption protocol.
    PreemptNotIdle,
    PreemptInterrupt,
    PreemptTimeout,
    // Later entry steps.
    HoldoffTimeout,
    CtxNotInvalid,
    UnbindTimeout,
    PgFsmTimeout,
    OverlayAttachFailed,
    /// The GR-RG entry semaphore was taken by a concurrent
    /// voltage/frequency switch. Graceful, not an error to escalate.
    MutexAcquireFailed,
}

impl AbortReason {
    fn code(self) -> u32 {
        match self {
            AbortReason::IntrPending => 0x01,
            AbortReason::IdleFlip => 0x02,
            AbortReason::QueueNotEmpty => 0x03,
            AbortReason::Sec2Wake => 0x04,
            AbortReason::BlockAllTimeout => 0x10,
            AbortReason::FlushTimeout => 0x11,
            AbortReason::BlockEquationTimeout => 0x12,
            AbortReason::PreemptNotIdle => 0x20,
            AbortReason::PreemptInterrupt => 0x21,
            AbortReason::PreemptTimeout => 0x22,
            AbortReason::HoldoffTimeout => 0x30,
            AbortReason::CtxNotInvalid => 0x31,
            AbortReason::UnbindTimeout => 0x32,
            AbortReason::PgFsmTimeout => 0x40,
            AbortReason::OverlayAttachFailed => 0x50,
            AbortReason::MutexAcquireFailed => 0x60,
        }
    }
}

impl From<crate::idle::IdleReason> for AbortReason {
    fn from(reason: crate::idle::IdleReason) -> Self {
        match reason {
            crate::idle::IdleReason::IntrPending => AbortReason::IntrPending,
            crate::idle::IdleReason::IdleFlip => AbortReason::IdleFlip,
            crate::idle::IdleReason::QueueNotEmpty => AbortReason::QueueNotEmpty,
            crate::idle::IdleReason::Sec2Wake => AbortReason::Sec2Wake,
        }
    }
}

impl From<lpwr_fifo::PreemptError> for AbortReason {
    fn from(err: lpwr_fifo::PreemptError) -> Self {
        match err {
            lpwr_fifo::PreemptError::NotIdle => AbortReason::PreemptNotIdle,
            lpwr_fifo::PreemptError::InterruptPending => AbortReason::PreemptInterrupt,
            lpwr_fifo::PreemptError::Timeout => AbortReason::PreemptTimeout,
        }
    }
}

/// Pack checkpoint and reason into the single diagnostic word stored in
/// `PowerGateState::abort_reason`.
pub fn encode_abort(checkpoint: Checkpoint, reason: AbortReason) -> u32 {
    (checkpoint.code() << 8) | reason.code()
}

/// Aggregate failure surfaced to the entry sequence's caller. Interior step
/// errors never escape raw; the system is back in its pre-entry-equivalent
/// state by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("power-gate entry aborted at {checkpoint:?} ({reason:?})")]
pub struct EntryAborted {
    pub checkpoint: Checkpoint,
    pub reason: AbortReason,
}

impl EntryAborted {
    /// Losing the GR-RG entry semaphore to a concurrent voltage/frequency
    /// switch is an expected outcome, not a condition to escalate.
    pub fn is_graceful(&self) -> bool {
        matches!(self.reason, AbortReason::MutexAcquireFailed)
    }
}
