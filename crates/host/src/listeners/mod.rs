//! Host-side listener chain.
//!
//! The tracker talks to exactly one [`EventListener`]; the host hands it a
//! [`ListenerRegistry`] that fans every event out to its registered
//! [`HostListener`]s in priority order.
//!
//! # Execution Order
//!
//! Listeners are sorted by priority (lower values run first):
//! - Negative priorities: guards that must veto before anyone else looks
//! - Zero: default priority for most listeners
//! - Positive priorities: observers that want to see final verdicts
mod audit;
mod limiter;
mod protection;
mod registry;

pub use audit::AuditListener;
pub use limiter::SpawnLimiter;
pub use protection::SpawnProtection;
pub use registry::ListenerRegistry;

use phase_core::{EventListener, PlayerSession};

/// How a listener failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerCriticality {
    /// Failure cancels everything the event proposed.
    Critical,

    /// Failure is logged as an error; remaining listeners still run.
    Important,

    /// Failure is logged at debug level and otherwise ignored.
    Optional,
}

/// Listener registered with the host.
pub trait HostListener: EventListener + Send {
    /// Lower values run first.
    fn priority(&self) -> i32 {
        0
    }

    fn criticality(&self) -> ListenerCriticality {
        ListenerCriticality::Critical
    }

    /// Called with the sending session before each packet phase is pushed.
    fn observe_session(&mut self, _session: &dyn PlayerSession) {}
}
