//! Chunked in-memory voxel world.
//!
//! Blocks live in 16x16 columns keyed by [`ChunkPos`]; air is never stored.
//! Storage writes have no side effects. Committing a falling block over air
//! schedules a block tick for the next simulation tick, and committing air
//! reports the support reactions of whatever rested on it.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use phase_core::{
    BlockKind, BlockPhysics, BlockPos, BlockSnapshot, BlockState, BlockStorage, CommittedChange,
    EntityId, EntityKind, EntitySpawn, EntityStorage, ItemDrop, ItemKind, ItemStack, Reaction,
    SpawnType, WorldId,
};

pub const CHUNK_SIZE: i32 = 16;

/// Lowest y a falling block can reach.
pub const MIN_Y: i32 = 0;

/// Layers of a generated column, bottom first.
pub const TERRAIN_LAYERS: [BlockKind; 5] = [
    BlockKind::Bedrock,
    BlockKind::Stone,
    BlockKind::Stone,
    BlockKind::Dirt,
    BlockKind::Grass,
];

/// Y of the topmost generated layer.
pub const SURFACE_Y: i32 = MIN_Y + TERRAIN_LAYERS.len() as i32 - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn of(pos: BlockPos) -> Self {
        Self {
            x: pos.x.div_euclid(CHUNK_SIZE),
            z: pos.z.div_euclid(CHUNK_SIZE),
        }
    }
}

#[derive(Default)]
struct Chunk {
    blocks: HashMap<BlockPos, BlockSnapshot>,
}

/// A live non-item entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mob {
    pub id: EntityId,
    pub kind: EntityKind,
    pub pos: BlockPos,
    pub spawn_type: SpawnType,
}

impl Mob {
    /// Mobs that walk every tick.
    pub fn wanders(&self) -> bool {
        matches!(self.kind, EntityKind::Zombie | EntityKind::Skeleton)
    }

    pub fn breeds(&self) -> bool {
        matches!(self.kind, EntityKind::Cow | EntityKind::Sheep)
    }
}

pub struct VoxelWorld {
    id: WorldId,
    chunks: BTreeMap<ChunkPos, Chunk>,
    mobs: BTreeMap<EntityId, Mob>,
    items: BTreeMap<EntityId, ItemDrop>,
    scheduled: BTreeMap<u64, BTreeSet<BlockPos>>,
    now: u64,
    next_entity: u64,
}

impl VoxelWorld {
    pub fn new(id: WorldId) -> Self {
        Self {
            id,
            chunks: BTreeMap::new(),
            mobs: BTreeMap::new(),
            items: BTreeMap::new(),
            scheduled: BTreeMap::new(),
            now: 0,
            next_entity: 0,
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn block_count(&self) -> usize {
        self.chunks.values().map(|chunk| chunk.blocks.len()).sum()
    }

    pub fn mobs(&self) -> Vec<Mob> {
        self.mobs.values().cloned().collect()
    }

    pub fn mob(&self, id: EntityId) -> Option<&Mob> {
        self.mobs.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = (&EntityId, &ItemDrop)> {
        self.items.iter()
    }

    pub fn move_mob(&mut self, id: EntityId, to: BlockPos) {
        if let Some(mob) = self.mobs.get_mut(&id) {
            mob.pos = to;
        }
    }

    /// Advances the clock to `tick` and hands back every block tick due by then.
    pub fn take_due_ticks(&mut self, tick: u64) -> Vec<BlockPos> {
        self.now = tick;
        let later = self.scheduled.split_off(&(tick + 1));
        let due = std::mem::replace(&mut self.scheduled, later);
        due.into_values().flatten().collect()
    }

    pub fn schedule_tick(&mut self, pos: BlockPos, at: u64) {
        self.scheduled.entry(at).or_default().insert(pos);
    }

    pub fn pending_ticks(&self) -> usize {
        self.scheduled.values().map(BTreeSet::len).sum()
    }

    fn next_id(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId(self.next_entity)
    }
}

impl BlockStorage for VoxelWorld {
    fn read_block(&self, pos: BlockPos) -> BlockSnapshot {
        self.chunks
            .get(&ChunkPos::of(pos))
            .and_then(|chunk| chunk.blocks.get(&pos))
            .cloned()
            .unwrap_or_else(|| BlockSnapshot::air(pos))
    }

    fn write_block(&mut self, pos: BlockPos, snapshot: BlockSnapshot) -> BlockSnapshot {
        let chunk = self.chunks.entry(ChunkPos::of(pos)).or_default();
        let previous = if snapshot.kind().is_air() && snapshot.tile_data.is_none() {
            chunk.blocks.remove(&pos)
        } else {
            chunk.blocks.insert(pos, snapshot.moved_to(pos))
        };
        previous.unwrap_or_else(|| BlockSnapshot::air(pos))
    }
}

impl EntityStorage for VoxelWorld {
    fn spawn_entity(&mut self, spawn: EntitySpawn) -> EntityId {
        let id = self.next_id();
        self.mobs.insert(
            id,
            Mob {
                id,
                kind: spawn.kind,
                pos: spawn.pos,
                spawn_type: spawn.spawn_type,
            },
        );
        id
    }

    fn spawn_item(&mut self, drop: ItemDrop) -> EntityId {
        let id = self.next_id();
        self.items.insert(id, drop);
        id
    }
}

impl BlockPhysics for VoxelWorld {
    fn react(&mut self, change: &CommittedChange<'_>, out: &mut Vec<Reaction>) {
        let pos = change.pos();
        let committed = change.committed.kind();
        if committed.has_gravity() {
            if pos.y > MIN_Y && self.read_block(pos.down()).kind().is_air() {
                self.schedule_tick(pos, self.now + 1);
            }
            return;
        }
        if !committed.is_air() {
            return;
        }
        let above = self.read_block(pos.up());
        match above.kind() {
            kind if kind.needs_support() => {
                out.push(Reaction::SetBlock {
                    pos: above.pos,
                    state: BlockState::AIR,
                });
                if let Some(item) = item_for(kind) {
                    out.push(Reaction::DropItem(ItemDrop::new(
                        ItemStack::one(item),
                        above.pos,
                    )));
                }
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
}

/// Item a broken block of `kind` drops, if any.
pub fn item_for(kind: BlockKind) -> Option<ItemKind> {
    match kind {
        BlockKind::Stone => Some(ItemKind::Stone),
        BlockKind::Dirt | BlockKind::Grass => Some(ItemKind::Dirt),
        BlockKind::Sand => Some(ItemKind::Sand),
        BlockKind::Gravel => Some(ItemKind::Gravel),
        BlockKind::Torch => Some(ItemKind::Torch),
        BlockKind::Chest => Some(ItemKind::Chest),
        BlockKind::Air | BlockKind::Water | BlockKind::Bedrock => None,
    }
}
