use tracing::trace;

use phase_core::{
    Cause, ChangeBlockEvent, DropItemEvent, EventListener, ListenerError, SpawnEntityEvent,
};

use super::{HostListener, ListenerCriticality};
use crate::events::{BlockEvent, EntityEvent, Event, EventBus, VerdictKind};

/// Publishes the verdict the listener chain reached for every proposal.
///
/// Runs last so it sees what everyone before it decided.
pub struct AuditListener {
    bus: EventBus,
    recorded: u64,
}

impl AuditListener {
    pub fn new(bus: EventBus) -> Self {
        Self { bus, recorded: 0 }
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    fn record(&mut self, event: Event) {
        self.recorded += 1;
        self.bus.publish(event);
    }
}

impl EventListener for AuditListener {
    fn name(&self) -> &str {
        "audit"
    }

    fn on_change_block(
        &mut self,
        cause: &Cause,
        event: &mut ChangeBlockEvent,
    ) -> Result<(), ListenerError> {
        let player = cause.first_player();
        for change in &event.changes {
            let verdict = VerdictKind::from(change.proposal.verdict());
            trace!(
                target: "phase_host::audit",
                phase = %event.phase,
                pos = %change.pos(),
                tx = %change.tx,
                ?verdict,
                "block verdict"
            );
            self.record(Event::Block(BlockEvent::Verdict {
                phase: event.phase,
                pos: change.pos(),
                player,
                reaction: change.is_reaction(),
                verdict,
            }));
        }
        Ok(())
    }

    fn on_spawn_entity(
        &mut self,
        _cause: &Cause,
        event: &mut SpawnEntityEvent,
    ) -> Result<(), ListenerError> {
        for proposal in &event.entities {
            self.record(Event::Entity(EntityEvent::SpawnVerdict {
                phase: event.phase,
                kind: proposal.value().kind,
                spawn_type: event.spawn_type,
                verdict: VerdictKind::from(proposal.verdict()),
            }));
        }
        Ok(())
    }

    fn on_drop_item(
        &mut self,
        _cause: &Cause,
        event: &mut DropItemEvent,
    ) -> Result<(), ListenerError> {
        for proposal in &event.drops {
            self.record(Event::Entity(EntityEvent::DropVerdict {
                phase: event.phase,
                stack: proposal.value().stack,
                pos: proposal.value().pos,
                verdict: VerdictKind::from(proposal.verdict()),
            }));
        }
        Ok(())
    }
}

impl HostListener for AuditListener {
    fn priority(&self) -> i32 {
        i32::MAX
    }

    fn criticality(&self) -> ListenerCriticality {
        ListenerCriticality::Optional
    }
}
