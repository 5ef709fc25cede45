//! In-memory collaborators for tests.
use std::collections::BTreeMap;

use crate::cause::Cause;
use crate::event::{
    BlockChange, ChangeBlockEvent, DropItemEvent, EventListener, ListenerError, SpawnEntityEvent,
    Verdict,
};
use crate::world::{
    BlockKind, BlockPhysics, BlockPos, BlockSnapshot, BlockState, BlockStorage, CommittedChange,
    EntityId, EntitySpawn, EntityStorage, ItemDrop, ItemKind, ItemStack, Reaction,
};

pub type PhysicsRule = Box<dyn FnMut(&InMemoryWorld, &CommittedChange<'_>, &mut Vec<Reaction>)>;

/// Sparse block map with optional physics.
#[derive(Default)]
pub struct InMemoryWorld {
    blocks: BTreeMap<BlockPos, BlockSnapshot>,
    entities: Vec<(EntityId, EntitySpawn)>,
    items: Vec<(EntityId, ItemDrop)>,
    next_entity: u64,
    writes: usize,
    physics: Option<PhysicsRule>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_physics(
        mut self,
        rule: impl FnMut(&InMemoryWorld, &CommittedChange<'_>, &mut Vec<Reaction>) + 'static,
    ) -> Self {
        self.physics = Some(Box::new(rule));
        self
    }

    #[must_use]
    pub fn with_block(mut self, pos: BlockPos, kind: BlockKind) -> Self {
        self.put(BlockSnapshot::new(pos, BlockState::of(kind)));
        self
    }

    /// Writes without counting as an engine write.
    pub fn put(&mut self, snapshot: BlockSnapshot) {
        self.blocks.insert(snapshot.pos, snapshot);
    }

    pub fn kind_at(&self, pos: BlockPos) -> BlockKind {
        self.read_block(pos).kind()
    }

    pub fn entities(&self) -> &[(EntityId, EntitySpawn)] {
        &self.entities
    }

    pub fn items(&self) -> &[(EntityId, ItemDrop)] {
        &self.items
    }

    /// Number of `write_block` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn next_id(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId(self.next_entity)
    }
}

impl BlockStorage for InMemoryWorld {
    fn read_block(&self, pos: BlockPos) -> BlockSnapshot {
        self.blocks
            .get(&pos)
            .cloned()
            .unwrap_or_else(|| BlockSnapshot::air(pos))
    }

    fn write_block(&mut self, pos: BlockPos, snapshot: BlockSnapshot) -> BlockSnapshot {
        self.writes += 1;
        let previous = if snapshot.kind().is_air() && snapshot.tile_data.is_none() {
            self.blocks.remove(&pos)
        } else {
            self.blocks.insert(pos, snapshot.moved_to(pos))
        };
        previous.unwrap_or_else(|| BlockSnapshot::air(pos))
    }
}

impl EntityStorage for InMemoryWorld {
    fn spawn_entity(&mut self, spawn: EntitySpawn) -> EntityId {
        let id = self.next_id();
        self.entities.push((id, spawn));
        id
    }

    fn spawn_item(&mut self, drop: ItemDrop) -> EntityId {
        let id = self.next_id();
        self.items.push((id, drop));
        id
    }
}

impl BlockPhysics for InMemoryWorld {
    fn react(&mut self, change: &CommittedChange<'_>, out: &mut Vec<Reaction>) {
        if let Some(mut rule) = self.physics.take() {
            rule(self, change, out);
            self.physics = Some(rule);
        }
    }
}

/// Minimal support physics: when a block turns to air, a torch resting on it
/// pops off as an item and sand resting on it falls one block.
pub fn support_physics(
    world: &InMemoryWorld,
    change: &CommittedChange<'_>,
    out: &mut Vec<Reaction>,
) {
    if !change.committed.kind().is_air() {
        return;
    }
    let pos = change.pos();
    let above = world.read_block(pos.up());
    match above.kind() {
        kind if kind.needs_support() => {
            out.push(Reaction::SetBlock {
                pos: above.pos,
                state: BlockState::AIR,
            });
            out.push(Reaction::DropItem(torch_drop(above.pos)));
        }
        kind if kind.has_gravity() => {
            out.push(Reaction::SetBlock {
                pos: above.pos,
                state: BlockState::AIR,
            });
            out.push(Reaction::SetBlock {
                pos,
                state: above.state,
            });
        }
        _ => {}
    }
}

type BlockRule = Box<dyn FnMut(&BlockChange) -> Result<Verdict<BlockSnapshot>, ListenerError>>;

/// Listener that records everything it sees and answers per a configured rule.
#[derive(Default)]
pub struct RecordingListener {
    pub blocks: Vec<(Cause, BlockChange)>,
    pub spawn_batches: Vec<(Cause, Vec<EntitySpawn>)>,
    pub drop_batches: Vec<(Cause, Vec<ItemDrop>)>,
    block_rule: Option<BlockRule>,
    cancel_spawns: bool,
    fail_spawns: bool,
    cancel_drops: bool,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_blocks(
        mut self,
        rule: impl FnMut(&BlockChange) -> Result<Verdict<BlockSnapshot>, ListenerError> + 'static,
    ) -> Self {
        self.block_rule = Some(Box::new(rule));
        self
    }

    pub fn cancel_blocks_at(self, pos: BlockPos) -> Self {
        self.on_blocks(move |change| {
            Ok(if change.pos() == pos {
                Verdict::Cancel
            } else {
                Verdict::Accept
            })
        })
    }

    pub fn cancel_spawns(mut self) -> Self {
        self.cancel_spawns = true;
        self
    }

    pub fn fail_spawns(mut self) -> Self {
        self.fail_spawns = true;
        self
    }

    pub fn cancel_drops(mut self) -> Self {
        self.cancel_drops = true;
        self
    }

    /// Positions of every block change seen, in dispatch order.
    pub fn block_positions(&self) -> Vec<BlockPos> {
        self.blocks.iter().map(|(_, change)| change.pos()).collect()
    }
}

impl EventListener for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_change_block(
        &mut self,
        cause: &Cause,
        event: &mut ChangeBlockEvent,
    ) -> Result<(), ListenerError> {
        for change in &mut event.changes {
            self.blocks.push((cause.clone(), change.clone()));
            if let Some(rule) = self.block_rule.as_mut() {
                match rule(change)? {
                    Verdict::Accept => change.proposal.accept(),
                    Verdict::Cancel => change.proposal.cancel(),
                    Verdict::Replace(snapshot) => change.proposal.replace(snapshot),
                }
            }
        }
        Ok(())
    }

    fn on_spawn_entity(
        &mut self,
        cause: &Cause,
        event: &mut SpawnEntityEvent,
    ) -> Result<(), ListenerError> {
        let spawns = event
            .entities
            .iter()
            .map(|proposal| proposal.value().clone())
            .collect();
        self.spawn_batches.push((cause.clone(), spawns));
        if self.fail_spawns {
            return Err(ListenerError::failed("recording", "spawns refused"));
        }
        if self.cancel_spawns {
            event.cancel_all();
        }
        Ok(())
    }

    fn on_drop_item(
        &mut self,
        cause: &Cause,
        event: &mut DropItemEvent,
    ) -> Result<(), ListenerError> {
        let drops = event
            .drops
            .iter()
            .map(|proposal| proposal.value().clone())
            .collect();
        self.drop_batches.push((cause.clone(), drops));
        if self.cancel_drops {
            event.cancel_all();
        }
        Ok(())
    }
}

/// Torch drop used by physics rules in tests.
pub fn torch_drop(pos: BlockPos) -> ItemDrop {
    ItemDrop::new(ItemStack::one(ItemKind::Torch), pos)
}
