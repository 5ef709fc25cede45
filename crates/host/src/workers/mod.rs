//! Background workers owned by the host.
mod simulation;

pub use simulation::{Command, SimulationWorker};
