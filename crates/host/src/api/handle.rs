//! Cloneable façade for issuing commands to the simulation worker.
//!
//! [`HostHandle`] hides channel plumbing and offers async helpers for
//! submitting packets, ticking the simulation or streaming events from
//! specific topics.
use tokio::sync::{broadcast, mpsc, oneshot};

use phase_core::{BlockPos, BlockSnapshot, EntityId, EntityKind};

use super::errors::{HostError, Result};
use crate::events::{Event, EventBus, PhaseSummary, TickSummary, Topic};
use crate::session::{Packet, Session};
use crate::workers::Command;

/// Client-facing handle to interact with the host
#[derive(Clone)]
pub struct HostHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl HostHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    /// Handle a packet from `session` inside its packet phase
    pub async fn submit_packet(&self, session: Session, packet: Packet) -> Result<PhaseSummary> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Packet {
                session,
                packet,
                reply: reply_tx,
            })
            .await
            .map_err(|_| HostError::CommandChannelClosed)?;

        reply_rx.await.map_err(HostError::ReplyChannelClosed)?
    }

    /// Advance the simulation by one tick
    pub async fn tick(&self) -> Result<TickSummary> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Tick { reply: reply_tx })
            .await
            .map_err(|_| HostError::CommandChannelClosed)?;

        reply_rx.await.map_err(HostError::ReplyChannelClosed)?
    }

    /// Read the block at `pos`
    pub async fn block_at(&self, pos: BlockPos) -> Result<BlockSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::QueryBlock {
                pos,
                reply: reply_tx,
            })
            .await
            .map_err(|_| HostError::CommandChannelClosed)?;

        reply_rx.await.map_err(HostError::ReplyChannelClosed)
    }

    /// Spawn an entity on behalf of the host; `None` if a listener vetoed it
    pub async fn spawn_entity(&self, kind: EntityKind, pos: BlockPos) -> Result<Option<EntityId>> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::SpawnEntity {
                kind,
                pos,
                reply: reply_tx,
            })
            .await
            .map_err(|_| HostError::CommandChannelClosed)?;

        reply_rx.await.map_err(HostError::ReplyChannelClosed)?
    }

    /// Ask the worker to verify its phase stack and stop
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| HostError::CommandChannelClosed)?;

        reply_rx.await.map_err(HostError::ReplyChannelClosed)?
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Blocks` - Block commits, rollbacks and verdicts
    /// - `Topic::Entities` - Spawns, item drops and their verdicts
    /// - `Topic::Phases` - Unwound and rejected phases
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }
}
