//! Contracts the tracker expects from the surrounding engine.
//!
//! The tracker never owns world data. Storage, entity bookkeeping and block
//! physics are supplied by the host through the traits below; the tracker only
//! decides *whether* and *when* they are invoked.
mod block;
mod entity;

pub use block::{BlockKind, BlockPos, BlockSnapshot, BlockState};
pub use entity::{
    EntityId, EntityKind, EntitySpawn, ItemDrop, ItemKind, ItemStack, PluginId, SpawnType,
    WorldId,
};

/// Synchronous block storage.
///
/// `write_block` must always hand back the snapshot it replaced so that any
/// write can be undone by writing the prior snapshot back.
pub trait BlockStorage {
    fn read_block(&self, pos: BlockPos) -> BlockSnapshot;

    fn write_block(&mut self, pos: BlockPos, snapshot: BlockSnapshot) -> BlockSnapshot;
}

/// Synchronous entity bookkeeping.
pub trait EntityStorage {
    fn spawn_entity(&mut self, spawn: EntitySpawn) -> EntityId;

    fn spawn_item(&mut self, drop: ItemDrop) -> EntityId;
}

/// A change committed to storage, handed to [`BlockPhysics`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedChange<'a> {
    pub original: &'a BlockSnapshot,
    pub committed: &'a BlockSnapshot,
}

impl CommittedChange<'_> {
    pub fn pos(&self) -> BlockPos {
        self.committed.pos
    }
}

/// Follow-up work the engine wants to perform because of a committed change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reaction {
    /// Replace the block at `pos` (neighbour update, falling block, ...).
    SetBlock { pos: BlockPos, state: BlockState },
    DropItem(ItemDrop),
    SpawnEntity(EntitySpawn),
}

/// Engine physics that react to committed block changes.
///
/// Reactions are not applied by the engine directly: the tracker records them
/// as child transactions of the change that caused them, so listeners see and
/// may veto them like any other mutation.
pub trait BlockPhysics {
    fn react(&mut self, _change: &CommittedChange<'_>, _out: &mut Vec<Reaction>) {}
}

/// Everything the tracker needs from the engine's world.
pub trait World: BlockStorage + EntityStorage + BlockPhysics {}

impl<T> World for T where T: BlockStorage + EntityStorage + BlockPhysics {}

/// Packet/session layer view of a connected player.
///
/// Read once when a packet phase context is built; the context keeps copies.
pub trait PlayerSession {
    fn player_id(&self) -> EntityId;

    fn held_item(&self) -> Option<ItemStack>;

    /// Block the player is currently targeting, if any.
    fn selection(&self) -> Option<BlockPos> {
        None
    }

    /// Operators bypass some protections in host listeners.
    fn is_operator(&self) -> bool {
        false
    }
}
