//! GR engine power-gate/power-ungate sequencer.
//!
//! The core state machine of the LPWR stack: orchestrates the priv-blocker
//! controller, runlist preemption, register save/restore, and the FECS
//! method protocol into the checkpointed power-down entry sequence and its
//! mirror power-up exit, with a rollback sub-machine whose action set is
//! always the exact suffix of the forward steps completed.

#![forbid(unsafe_code)]

pub mod abort;
pub mod blocker;
pub mod hal;
pub mod idle;
pub mod platform;
pub mod railgate;
pub mod regs;
pub mod seq;
pub mod state;

pub use abort::{encode_abort, AbortReason, Checkpoint, EntryAborted};
pub use blocker::{BlockerMode, BlockerTimeouts};
pub use hal::{Ga10x, GrHal, Tu10x};
pub use idle::IdleReason;
pub use platform::{NullPlatform, Overlay, Platform, RpcCall, SemaWait};
pub use seq::{ExitError, ExitStage, GrSequencer, SeqTimeouts};
pub use state::{PgCtrl, PowerGateState, SupportFlags};
