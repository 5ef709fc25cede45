//! Topic-based event bus implementation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use super::types::{BlockEvent, EntityEvent, PhaseEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Block commits and listener verdicts on block changes
    Blocks,
    /// Entity spawns, item drops and their verdicts
    Entities,
    /// Phase lifecycle (unwinds, rejected pushes)
    Phases,
}

impl Topic {
    pub const ALL: [Self; 3] = [Self::Blocks, Self::Entities, Self::Phases];
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Block(BlockEvent),
    Entity(EntityEvent),
    Phase(PhaseEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Block(_) => Topic::Blocks,
            Event::Entity(_) => Topic::Entities,
            Event::Phase(_) => Topic::Phases,
        }
    }
}

/// Topic-based event bus
///
/// Publishing is best-effort: events nobody subscribed to are dropped.
pub struct EventBus {
    channels: Arc<RwLock<HashMap<Topic, broadcast::Sender<Event>>>>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity).0))
            .collect();

        Self {
            channels: Arc::new(RwLock::new(channels)),
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();

        // try_read keeps publishing synchronous inside the worker
        match self.channels.try_read() {
            Ok(channels) => {
                if let Some(tx) = channels.get(&topic)
                    && tx.send(event).is_err()
                {
                    tracing::trace!(target: "phase_host::events", ?topic, "no subscribers");
                }
            }
            Err(_) => {
                tracing::debug!(
                    target: "phase_host::events",
                    ?topic,
                    "event bus lock contended, event skipped"
                );
            }
        }
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        let channels = self
            .channels
            .try_read()
            .expect("Failed to acquire read lock on event channels");
        channels
            .get(&topic)
            .expect("Topic channel not initialized")
            .subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use phase_core::{BlockPos, PhaseKind};

    use super::*;
    use crate::events::VerdictKind;

    #[tokio::test]
    async fn subscribers_only_see_their_topic() {
        let bus = EventBus::with_capacity(4);
        let mut blocks = bus.subscribe(Topic::Blocks);
        let mut phases = bus.subscribe(Topic::Phases);

        let event = Event::Block(BlockEvent::Verdict {
            phase: PhaseKind::BlockTick,
            pos: BlockPos::ORIGIN,
            player: None,
            reaction: false,
            verdict: VerdictKind::Cancelled,
        });
        bus.publish(event.clone());

        assert_eq!(blocks.recv().await.ok(), Some(event));
        assert!(phases.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(Event::Phase(PhaseEvent::Rejected {
            kind: PhaseKind::DimensionTick,
            code: "PHASE_DEPTH_EXCEEDED".into(),
            reason: "full".into(),
        }));
    }
}
