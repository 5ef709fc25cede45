//! Scoped phase activation.
use tracing::{error, warn};

use super::{PhaseError, PhaseTracker, UnwindReport};
use crate::env::Env;
use crate::state::PhaseId;

/// Pops its phase when dropped.
///
/// Dropping the guard during a panic abandons the phase instead: tentative
/// block writes are reverted and nothing is dispatched.
pub struct PhaseGuard<'t, 'e> {
    tracker: &'t mut PhaseTracker,
    env: &'t mut Env<'e>,
    id: PhaseId,
    finished: bool,
}

impl<'t, 'e> PhaseGuard<'t, 'e> {
    pub(super) fn new(tracker: &'t mut PhaseTracker, env: &'t mut Env<'e>, id: PhaseId) -> Self {
        Self {
            tracker,
            env,
            id,
            finished: false,
        }
    }

    pub fn id(&self) -> PhaseId {
        self.id
    }

    pub fn tracker(&mut self) -> &mut PhaseTracker {
        &mut *self.tracker
    }

    pub fn env(&mut self) -> &mut Env<'e> {
        &mut *self.env
    }

    /// Both halves at once, for nesting further phases.
    pub fn parts(&mut self) -> (&mut PhaseTracker, &mut Env<'e>) {
        (&mut *self.tracker, &mut *self.env)
    }

    /// Pops the phase now and hands back its report.
    pub fn finish(mut self) -> Result<UnwindReport, PhaseError> {
        self.finished = true;
        self.pop()
    }

    fn pop(&mut self) -> Result<UnwindReport, PhaseError> {
        let current = self.tracker.current_phase();
        if current != self.id {
            error!(
                target: "phase_core::tracker",
                guard = %self.id,
                %current,
                stack = %self.tracker.describe_stack(),
                "phase guard is not on top of the stack"
            );
        }
        self.tracker.pop_phase(&mut *self.env)
    }
}

impl Drop for PhaseGuard<'_, '_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            self.tracker.abandon_phase(&mut *self.env);
            return;
        }
        if let Err(error) = self.pop() {
            warn!(
                target: "phase_core::tracker",
                phase = %self.id,
                %error,
                "phase guard failed to pop"
            );
        }
    }
}
