//! Host orchestrator.
//!
//! The host owns the simulation worker task, wires up the command channel and
//! the event bus, and hands out cloneable [`HostHandle`]s.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use phase_core::{PhaseTracker, WorldId};

use crate::api::{HostError, HostHandle, Result};
use crate::config::HostConfig;
use crate::events::{Event, EventBus, PhaseSummary, Topic};
use crate::listeners::ListenerRegistry;
use crate::workers::SimulationWorker;
use crate::world::VoxelWorld;

/// Running host: one simulation worker plus its handle.
pub struct Host {
    handle: HostHandle,
    worker: JoinHandle<()>,
    generation: Vec<PhaseSummary>,
}

impl Host {
    /// Generates the spawn area and spawns the simulation worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: HostConfig) -> Result<Self> {
        let event_bus = EventBus::with_capacity(config.channels.event_buffer);
        let (command_tx, command_rx) = mpsc::channel(config.channels.command_buffer);

        let listeners = ListenerRegistry::builtin(&config, event_bus.clone());
        let tracker = PhaseTracker::new(config.tracker.clone());
        let world = VoxelWorld::new(WorldId(0));

        let mut worker =
            SimulationWorker::new(tracker, world, listeners, command_rx, event_bus.clone());
        let generation = worker.generate(config.spawn_area)?;
        let worker = tokio::spawn(worker.run());

        Ok(Self {
            handle: HostHandle::new(command_tx, event_bus),
            worker,
            generation,
        })
    }

    /// Get a cloneable handle to this host
    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Phases unwound while the spawn area was generated.
    pub fn generation(&self) -> &[PhaseSummary] {
        &self.generation
    }

    /// Stops the worker and waits for it.
    ///
    /// The worker stops even when its phase stack was not empty; that error is
    /// still returned after the join.
    pub async fn shutdown(self) -> Result<()> {
        let Self { handle, worker, .. } = self;

        let verdict = handle.shutdown().await;
        drop(handle);

        worker.await.map_err(HostError::WorkerJoin)?;
        verdict
    }
}
