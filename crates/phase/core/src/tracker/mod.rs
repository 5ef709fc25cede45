//! The phase stack machine.
//!
//! [`PhaseTracker`] is the single point every mutating engine call passes
//! through. It owns a stack of phase frames (with the idle sentinel at the
//! bottom) and the cause stack; the engine's world and the listener surface are
//! borrowed per call through [`Env`].
mod capture;
mod errors;
mod guard;
mod report;
mod unwind;

pub use capture::{DropOutcome, SetBlockOutcome, SpawnOutcome};
pub use errors::PhaseError;
pub use guard::PhaseGuard;
pub use report::{FrameSummary, StackDump, TreeOutcome, UnwindReport};

use tracing::{debug, error, warn};

use crate::cause::{Cause, CauseObject, CauseStack, ContextValue, EventContextKey, FrameId};
use crate::config::TrackerConfig;
use crate::context::PhaseContext;
use crate::env::Env;
use crate::state::{BufferKind, PhaseId, PhaseKind, PhaseState, PhaseStates};

/// Lifecycle of one stack entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PhaseStatus {
    Active,
    Unwinding,
    Closed,
}

#[derive(Debug)]
struct PhaseFrame {
    id: PhaseId,
    kind: PhaseKind,
    context: PhaseContext,
    status: PhaseStatus,
    /// Cause frame opened on push; the sentinel has none.
    cause_frame: Option<FrameId>,
}

impl PhaseFrame {
    fn sentinel() -> Self {
        Self {
            id: PhaseId::SENTINEL,
            kind: PhaseKind::Idle,
            context: PhaseContext::idle(),
            status: PhaseStatus::Active,
            cause_frame: None,
        }
    }
}

/// Disjoint borrows of the top frame plus the shared tracker state.
pub(crate) struct Scope<'t> {
    pub(crate) id: PhaseId,
    pub(crate) state: &'t PhaseState,
    pub(crate) context: &'t mut PhaseContext,
    pub(crate) causes: &'t mut CauseStack,
    pub(crate) config: &'t TrackerConfig,
}

#[derive(Debug)]
pub struct PhaseTracker {
    states: PhaseStates,
    config: TrackerConfig,
    stack: Vec<PhaseFrame>,
    causes: CauseStack,
    next_id: u64,
}

impl PhaseTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_states(config, PhaseStates::standard())
    }

    pub fn with_states(config: TrackerConfig, states: PhaseStates) -> Self {
        Self {
            states,
            config,
            stack: vec![PhaseFrame::sentinel()],
            causes: CauseStack::new(),
            next_id: PhaseId::SENTINEL.0 + 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn states(&self) -> &PhaseStates {
        &self.states
    }

    /// Number of live phases, the sentinel excluded.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    fn top(&self) -> &PhaseFrame {
        self.stack.last().expect("idle sentinel is never popped")
    }

    pub fn current_phase(&self) -> PhaseId {
        self.top().id
    }

    pub fn current_kind(&self) -> PhaseKind {
        self.top().kind
    }

    pub fn current_state(&self) -> &PhaseState {
        self.states.get(self.top().kind)
    }

    pub fn current_status(&self) -> PhaseStatus {
        self.top().status
    }

    pub fn current_context(&self) -> &PhaseContext {
        &self.top().context
    }

    pub fn current_context_mut(&mut self) -> &mut PhaseContext {
        &mut self
            .stack
            .last_mut()
            .expect("idle sentinel is never popped")
            .context
    }

    pub fn causes(&self) -> &CauseStack {
        &self.causes
    }

    pub fn causes_mut(&mut self) -> &mut CauseStack {
        &mut self.causes
    }

    pub fn current_cause(&self) -> Cause {
        self.causes.current_cause()
    }

    pub(crate) fn top_scope(&mut self) -> Scope<'_> {
        let Self {
            states,
            config,
            stack,
            causes,
            ..
        } = self;
        let frame = stack.last_mut().expect("idle sentinel is never popped");
        Scope {
            id: frame.id,
            state: states.get(frame.kind),
            context: &mut frame.context,
            causes,
            config,
        }
    }

    /// Pushes a new phase of `kind` on top of the stack.
    ///
    /// Fails without touching the stack when the depth limit is reached. An
    /// unexpected parent only produces a warning.
    pub fn push_phase(
        &mut self,
        kind: PhaseKind,
        context: PhaseContext,
    ) -> Result<PhaseId, PhaseError> {
        let depth = self.depth();
        if depth >= self.config.max_phase_depth {
            let error = PhaseError::DepthExceeded {
                kind,
                depth,
                max: self.config.max_phase_depth,
            };
            warn!(
                target: "phase_core::tracker",
                phase_kind = %kind,
                parent = %self.current_kind(),
                depth,
                %error,
                "phase push rejected"
            );
            return Err(error);
        }

        let parent = self.current_kind();
        let state = self.states.get(kind);
        if self.config.warn_incompatible_nesting && !state.is_compatible_with(parent) {
            warn!(
                target: "phase_core::tracker",
                phase_kind = %kind,
                %parent,
                "phase pushed over an incompatible parent"
            );
        }

        let id = PhaseId(self.next_id);
        self.next_id += 1;

        let cause_frame = self.causes.push_phase_frame(id.0);
        self.causes.push_cause(CauseObject::Phase { id: id.0, kind });
        self.causes.push_cause(context.source().clone());
        for (key, value) in context.context_entries() {
            self.causes.add_context(key, value);
        }
        self.causes.add_context(
            EventContextKey::SpawnType,
            ContextValue::SpawnType(state.spawn_type()),
        );

        self.stack.push(PhaseFrame {
            id,
            kind,
            context,
            status: PhaseStatus::Active,
            cause_frame: Some(cause_frame),
        });

        debug!(
            target: "phase_core::tracker",
            phase = %id,
            phase_kind = %kind,
            depth = depth + 1,
            "phase pushed"
        );
        Ok(id)
    }

    /// Unwinds and removes the top phase.
    ///
    /// Unwind runs exactly once while the frame is still on top, so effects it
    /// produces are attributed to the phase being closed.
    pub fn pop_phase(&mut self, env: &mut Env<'_>) -> Result<UnwindReport, PhaseError> {
        if self.depth() == 0 {
            error!(
                target: "phase_core::tracker",
                "attempted to pop the idle sentinel"
            );
            return Err(PhaseError::PopSentinel);
        }

        self.set_top_status(PhaseStatus::Unwinding);
        let mut report = self.top_scope().unwind(env);
        self.set_top_status(PhaseStatus::Closed);
        self.top_scope().force_apply_leaks(env, &mut report);

        let frame = self.remove_top();
        debug!(
            target: "phase_core::tracker",
            phase = %frame.id,
            phase_kind = %frame.kind,
            passes = report.passes,
            committed = report.blocks.committed,
            cancelled = report.blocks.cancelled,
            spawned = report.spawned.len(),
            dropped = report.dropped.len(),
            leaked = report.leaked,
            "phase popped"
        );
        Ok(report)
    }

    /// Tears the top phase down without dispatching anything.
    ///
    /// Written-through block captures are reverted; every other capture is
    /// discarded. Used when a phase guard is dropped during a panic.
    pub(crate) fn abandon_phase(&mut self, env: &mut Env<'_>) -> Option<UnwindReport> {
        if self.depth() == 0 {
            return None;
        }
        self.set_top_status(PhaseStatus::Closed);
        let report = self.top_scope().abandon(env);
        let frame = self.remove_top();
        error!(
            target: "phase_core::tracker",
            phase = %frame.id,
            phase_kind = %frame.kind,
            reverted = report.blocks.cancelled,
            "phase abandoned during panic"
        );
        Some(report)
    }

    fn set_top_status(&mut self, status: PhaseStatus) {
        if let Some(frame) = self.stack.last_mut() {
            frame.status = status;
        }
    }

    fn remove_top(&mut self) -> PhaseFrame {
        let frame = self.stack.pop().expect("callers check depth first");
        let closed = frame
            .cause_frame
            .map_or(Ok(()), |cause_frame| self.causes.pop_frame(cause_frame));
        if let Err(error) = closed {
            warn!(
                target: "phase_core::tracker",
                phase = %frame.id,
                %error,
                "phase cause frame was closed early"
            );
        }
        frame
    }

    /// Pushes a phase and returns a guard that pops it when dropped.
    pub fn switch_to_phase<'t, 'e>(
        &'t mut self,
        env: &'t mut Env<'e>,
        kind: PhaseKind,
        context: PhaseContext,
    ) -> Result<PhaseGuard<'t, 'e>, PhaseError> {
        let id = self.push_phase(kind, context)?;
        Ok(PhaseGuard::new(self, env, id))
    }

    /// Verifies that nothing but the sentinel is left.
    pub fn shutdown(&mut self) -> Result<(), PhaseError> {
        let live = self.depth();
        if live > 0 {
            let error = PhaseError::ShutdownWithActivePhases { live };
            error!(
                target: "phase_core::tracker",
                %error,
                stack = %self.describe_stack(),
                "tracker shutdown refused"
            );
            return Err(error);
        }
        if !self.causes.is_empty() {
            let error = PhaseError::CauseStackNotEmpty {
                depth: self.causes.depth(),
            };
            error!(
                target: "phase_core::tracker",
                %error,
                cause = %self.causes.current_cause(),
                "tracker shutdown refused"
            );
            return Err(error);
        }
        debug!(target: "phase_core::tracker", "tracker shut down cleanly");
        Ok(())
    }

    pub fn describe_stack(&self) -> StackDump {
        StackDump {
            frames: self
                .stack
                .iter()
                .rev()
                .map(|frame| FrameSummary {
                    id: frame.id,
                    kind: frame.kind,
                    status: frame.status,
                    pending_blocks: frame.context.pending(BufferKind::Blocks),
                    pending_entities: frame.context.pending(BufferKind::Entities),
                    pending_items: frame.context.pending(BufferKind::Items),
                })
                .collect(),
            cause_depth: self.causes.depth(),
        }
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, TrackerError};
    use crate::event::NoopListener;
    use crate::testing::InMemoryWorld;
    use crate::world::WorldId;

    #[test]
    fn sentinel_is_never_popped() {
        let mut world = InMemoryWorld::new();
        let mut listener = NoopListener;
        let mut env = Env::new(&mut world, &mut listener);
        let mut tracker = PhaseTracker::default();

        let error = tracker.pop_phase(&mut env).unwrap_err();
        assert_eq!(error, PhaseError::PopSentinel);
        assert_eq!(error.class(), ErrorClass::Programming);
        assert_eq!(tracker.current_kind(), PhaseKind::Idle);
        assert!(tracker.shutdown().is_ok());
    }

    #[test]
    fn depth_limit_keeps_existing_frames() {
        let mut tracker = PhaseTracker::new(TrackerConfig::new().with_max_phase_depth(2));
        tracker
            .push_phase(PhaseKind::DimensionTick, PhaseContext::dimension_tick(WorldId(0)))
            .unwrap();
        tracker
            .push_phase(PhaseKind::EntityTick, PhaseContext::idle())
            .unwrap();
        let before = tracker.describe_stack();

        let error = tracker
            .push_phase(PhaseKind::BlockTick, PhaseContext::idle())
            .unwrap_err();
        assert_eq!(error.class(), ErrorClass::Capacity);
        assert_eq!(tracker.describe_stack(), before);
    }

    #[test]
    fn shutdown_reports_live_phases() {
        let mut tracker = PhaseTracker::default();
        tracker
            .push_phase(PhaseKind::DimensionTick, PhaseContext::dimension_tick(WorldId(0)))
            .unwrap();
        assert_eq!(
            tracker.shutdown(),
            Err(PhaseError::ShutdownWithActivePhases { live: 1 })
        );
        assert!(tracker.describe_stack().to_string().contains("dimension_tick"));
    }

    #[test]
    fn push_exposes_context_as_causes() {
        let mut tracker = PhaseTracker::default();
        tracker
            .push_phase(PhaseKind::DimensionTick, PhaseContext::dimension_tick(WorldId(4)))
            .unwrap();
        let cause = tracker.current_cause();
        assert_eq!(cause.root(), Some(&CauseObject::World(WorldId(4))));
        assert_eq!(cause.phase(), Some(PhaseKind::DimensionTick));
        assert_eq!(
            cause.context(EventContextKey::World),
            Some(&ContextValue::World(WorldId(4)))
        );
    }
}
