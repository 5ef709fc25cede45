use tracing::debug;

use phase_core::{Cause, EventListener, ListenerError, SpawnEntityEvent};

use super::HostListener;

/// Accepts at most `max_per_batch` entities from one spawn batch.
pub struct SpawnLimiter {
    max_per_batch: usize,
}

impl SpawnLimiter {
    pub fn new(max_per_batch: usize) -> Self {
        Self { max_per_batch }
    }
}

impl EventListener for SpawnLimiter {
    fn name(&self) -> &str {
        "spawn_limiter"
    }

    fn on_spawn_entity(
        &mut self,
        _cause: &Cause,
        event: &mut SpawnEntityEvent,
    ) -> Result<(), ListenerError> {
        let excess = event.entities.len().saturating_sub(self.max_per_batch);
        if excess == 0 {
            return Ok(());
        }
        for proposal in event.entities.iter_mut().skip(self.max_per_batch) {
            proposal.cancel();
        }
        debug!(
            target: "phase_host::listeners",
            phase = %event.phase,
            spawn_type = %event.spawn_type,
            excess,
            "spawn batch over limit"
        );
        Ok(())
    }
}

impl HostListener for SpawnLimiter {
    fn priority(&self) -> i32 {
        -50
    }
}
