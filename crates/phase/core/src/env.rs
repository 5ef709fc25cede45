//! Engine collaborators the tracker borrows while it works.
use crate::event::EventListener;
use crate::world::World;

/// Bundles the world and the listener surface for one tracker call.
///
/// The tracker never stores either; every operation that may touch storage or
/// dispatch events takes an `Env` by mutable reference.
pub struct Env<'a> {
    pub world: &'a mut dyn World,
    pub listener: &'a mut dyn EventListener,
}

impl<'a> Env<'a> {
    pub fn new(world: &'a mut dyn World, listener: &'a mut dyn EventListener) -> Self {
        Self { world, listener }
    }
}
