//! Topic-based event bus for host events.
//!
//! The simulation worker publishes what phases committed; clients subscribe to
//! the topics they care about.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{BlockEvent, EntityEvent, PhaseEvent, PhaseSummary, TickSummary, VerdictKind};
