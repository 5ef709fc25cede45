//! Phase tracking between a voxel simulation engine and its extensions.
//!
//! `phase-core` decides *why* each primitive world mutation happens and
//! *whether* it is allowed to. The engine keeps calling mutation entrypoints
//! synchronously; the [`PhaseTracker`] attributes each call to the phase on top
//! of its stack, captures or applies it according to that phase's
//! [`PhaseState`], and turns captured effects into committed or rolled-back
//! mutations when the phase unwinds. Listeners see proposals together with a
//! detached [`Cause`] and can accept, cancel or replace them.
pub mod cause;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod event;
pub mod state;
pub mod tracker;
pub mod transaction;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cause::{
    Cause, CauseObject, CauseStack, CauseStackError, CauseStackFrame, ContextValue,
    EventContextKey, FrameId,
};
pub use config::TrackerConfig;
pub use context::{CaptureBuffer, PhaseContext};
pub use env::Env;
pub use error::{ErrorClass, TrackerError};
pub use event::{
    BlockChange, ChangeBlockEvent, DropItemEvent, EventListener, ListenerError, NoopListener,
    Proposal, SpawnEntityEvent, Verdict,
};
pub use state::{
    BufferKind, GenerationPhase, PacketPhase, PhaseId, PhaseKind, PhaseState, PhaseStates,
    PhaseStatesBuilder, PluginPhase, PolicyFlags, UnwindPlan,
};
pub use tracker::{
    DropOutcome, FrameSummary, PhaseError, PhaseGuard, PhaseStatus, PhaseTracker,
    SetBlockOutcome, SpawnOutcome, StackDump, TreeOutcome, UnwindReport,
};
pub use transaction::{BlockTransaction, ChangeKind, TransactionForest, TxId, TxOrigin, TxStatus};
pub use world::{
    BlockKind, BlockPhysics, BlockPos, BlockSnapshot, BlockState, BlockStorage, CommittedChange,
    EntityId, EntityKind, EntitySpawn, EntityStorage, ItemDrop, ItemKind, ItemStack,
    PlayerSession, PluginId, Reaction, SpawnType, World, WorldId,
};
