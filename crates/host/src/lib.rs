//! Async host for `phase-core`.
//!
//! This crate runs a phase tracker inside a single simulation worker task and
//! exposes it to clients through a command channel and a topic-based event
//! bus. It supplies the engine side the tracker expects: a chunked voxel world
//! with simple support physics, a priority-ordered listener chain and the
//! tick loop that opens dimension, block and entity tick phases.
//!
//! Modules are organized by responsibility:
//! - [`host`] hosts the orchestrator
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides the topic-based event bus
//! - [`listeners`] holds the listener registry and built-in listeners
//! - [`world`] and [`session`] supply the engine collaborators
//! - `workers` keeps the simulation task internal to the crate
pub mod api;
pub mod config;
pub mod events;
pub mod host;
pub mod listeners;
pub mod session;
pub mod world;

mod workers;

pub use api::{HostError, HostHandle, Result};
pub use config::{ChannelConfig, HostConfig, ProtectionConfig};
pub use events::{
    BlockEvent, EntityEvent, Event, EventBus, PhaseEvent, PhaseSummary, TickSummary, Topic,
    VerdictKind,
};
pub use host::Host;
pub use listeners::{
    AuditListener, HostListener, ListenerCriticality, ListenerRegistry, SpawnLimiter,
    SpawnProtection,
};
pub use session::{Packet, Session};
pub use world::{ChunkPos, Mob, VoxelWorld};
