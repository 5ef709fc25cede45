//! Listener registry that fans events out in priority order.

use tracing::{debug, error};

use phase_core::{
    Cause, ChangeBlockEvent, DropItemEvent, EventListener, ListenerError, PlayerSession,
    SpawnEntityEvent, TrackerError,
};

use super::{
    AuditListener, HostListener, ListenerCriticality, SpawnLimiter, SpawnProtection,
};
use crate::config::HostConfig;
use crate::events::EventBus;

/// Ordered set of [`HostListener`]s acting as one [`EventListener`].
///
/// Every listener sees every event, including proposals an earlier listener
/// already cancelled.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Box<dyn HostListener>>,
}

impl ListenerRegistry {
    /// Creates a registry; listeners are sorted by priority (lower first).
    pub fn new(mut listeners: Vec<Box<dyn HostListener>>) -> Self {
        listeners.sort_by_key(|listener| listener.priority());
        Self { listeners }
    }

    /// Spawn protection, spawn limiter and audit, as configured.
    pub fn builtin(config: &HostConfig, bus: EventBus) -> Self {
        Self::new(vec![
            Box::new(SpawnProtection::new(
                config.protection.center,
                config.protection.radius,
            )),
            Box::new(SpawnLimiter::new(config.max_spawns_per_batch)),
            Box::new(AuditListener::new(bus)),
        ])
    }

    /// Adds a listener after every registered one of equal or lower priority.
    pub fn register(&mut self, listener: Box<dyn HostListener>) {
        let priority = listener.priority();
        let at = self
            .listeners
            .partition_point(|existing| existing.priority() <= priority);
        self.listeners.insert(at, listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listener names and priorities in execution order.
    pub fn listeners(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.listeners
            .iter()
            .map(|listener| (listener.name(), listener.priority()))
    }

    pub fn observe_session(&mut self, session: &dyn PlayerSession) {
        for listener in &mut self.listeners {
            listener.observe_session(session);
        }
    }

    fn fan_out<E>(
        &mut self,
        event: &mut E,
        mut call: impl FnMut(&mut dyn HostListener, &mut E) -> Result<(), ListenerError>,
    ) -> Result<(), ListenerError> {
        for listener in &mut self.listeners {
            if let Err(error) = call(listener.as_mut(), event) {
                handle_listener_error(listener.as_ref(), error)?;
            }
        }
        Ok(())
    }
}

/// Returns the error for critical listeners, logs and swallows it otherwise.
fn handle_listener_error(
    listener: &dyn HostListener,
    error: ListenerError,
) -> Result<(), ListenerError> {
    match listener.criticality() {
        ListenerCriticality::Critical => {
            error!(
                target: "phase_host::listeners",
                listener = listener.name(),
                criticality = "critical",
                code = error.error_code(),
                %error,
                "critical listener failed, cancelling event"
            );
            Err(error)
        }
        ListenerCriticality::Important => {
            error!(
                target: "phase_host::listeners",
                listener = listener.name(),
                criticality = "important",
                code = error.error_code(),
                %error,
                "listener failed, continuing"
            );
            Ok(())
        }
        ListenerCriticality::Optional => {
            debug!(
                target: "phase_host::listeners",
                listener = listener.name(),
                criticality = "optional",
                %error,
                "optional listener failed"
            );
            Ok(())
        }
    }
}

impl EventListener for ListenerRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn on_change_block(
        &mut self,
        cause: &Cause,
        event: &mut ChangeBlockEvent,
    ) -> Result<(), ListenerError> {
        self.fan_out(event, |listener, event| {
            listener.on_change_block(cause, event)
        })
    }

    fn on_spawn_entity(
        &mut self,
        cause: &Cause,
        event: &mut SpawnEntityEvent,
    ) -> Result<(), ListenerError> {
        self.fan_out(event, |listener, event| {
            listener.on_spawn_entity(cause, event)
        })
    }

    fn on_drop_item(
        &mut self,
        cause: &Cause,
        event: &mut DropItemEvent,
    ) -> Result<(), ListenerError> {
        self.fan_out(event, |listener, event| listener.on_drop_item(cause, event))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use phase_core::{
        BlockPos, EntityKind, EntitySpawn, PhaseKind, SpawnType,
    };

    use super::*;

    /// Records its name into a shared log and optionally fails.
    struct Probe {
        name: &'static str,
        priority: i32,
        criticality: ListenerCriticality,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Probe {
        fn boxed(
            name: &'static str,
            priority: i32,
            log: &Arc<Mutex<Vec<&'static str>>>,
        ) -> Box<dyn HostListener> {
            Box::new(Self {
                name,
                priority,
                criticality: ListenerCriticality::Critical,
                fail: false,
                log: Arc::clone(log),
            })
        }

        fn failing(
            name: &'static str,
            criticality: ListenerCriticality,
            log: &Arc<Mutex<Vec<&'static str>>>,
        ) -> Box<dyn HostListener> {
            Box::new(Self {
                name,
                priority: 0,
                criticality,
                fail: true,
                log: Arc::clone(log),
            })
        }
    }

    impl EventListener for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn on_spawn_entity(
            &mut self,
            _cause: &Cause,
            _event: &mut SpawnEntityEvent,
        ) -> Result<(), ListenerError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(ListenerError::failed(self.name, "probe failure"));
            }
            Ok(())
        }
    }

    impl HostListener for Probe {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn criticality(&self) -> ListenerCriticality {
            self.criticality
        }
    }

    fn spawn_event() -> SpawnEntityEvent {
        SpawnEntityEvent::new(
            PhaseKind::EntityTick,
            SpawnType::Breeding,
            vec![EntitySpawn::new(
                EntityKind::Cow,
                BlockPos::ORIGIN,
                SpawnType::Breeding,
            )],
        )
    }

    #[test]
    fn listeners_run_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new(vec![
            Probe::boxed("late", 10, &log),
            Probe::boxed("early", -10, &log),
        ]);
        registry.register(Probe::boxed("middle", 0, &log));
        registry.register(Probe::boxed("last", 10, &log));

        registry
            .on_spawn_entity(&Cause::default(), &mut spawn_event())
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["early", "middle", "late", "last"]);
        assert_eq!(
            registry.listeners().map(|(_, p)| p).collect::<Vec<_>>(),
            vec![-10, 0, 10, 10]
        );
    }

    #[test]
    fn critical_failure_stops_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new(vec![
            Probe::failing("broken", ListenerCriticality::Critical, &log),
            Probe::boxed("after", 5, &log),
        ]);

        let result = registry.on_spawn_entity(&Cause::default(), &mut spawn_event());
        assert!(matches!(result, Err(ListenerError::Failed { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["broken"]);
    }

    #[test]
    fn non_critical_failures_are_swallowed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new(vec![
            Probe::failing("important", ListenerCriticality::Important, &log),
            Probe::failing("optional", ListenerCriticality::Optional, &log),
            Probe::boxed("after", 5, &log),
        ]);

        registry
            .on_spawn_entity(&Cause::default(), &mut spawn_event())
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["important", "optional", "after"]
        );
    }
}
