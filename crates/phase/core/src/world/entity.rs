use std::fmt;

use super::BlockPos;

/// Identifier of any entity the engine tracks (players included).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a dimension / world instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldId(pub u32);

impl WorldId {
    pub const OVERWORLD: Self = Self(0);
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world:{}", self.0)
    }
}

/// Identifier of an extension (plugin) that initiated work.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PluginId(pub String);

impl PluginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityKind {
    Player,
    Zombie,
    Skeleton,
    Cow,
    Sheep,
    FallingBlock,
    Item,
    ExperienceOrb,
    Lightning,
}

/// Why an entity came into existence; surfaced to listeners as event context.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SpawnType {
    Placement,
    DroppedItem,
    BlockSpawning,
    WorldSpawner,
    ChunkLoad,
    Breeding,
    Falling,
    Plugin,
    Custom,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ItemKind {
    Stone,
    Dirt,
    Sand,
    Gravel,
    Torch,
    Chest,
    Stick,
    Apple,
    Bone,
}

impl ItemKind {
    pub const fn max_stack(self) -> u8 {
        match self {
            Self::Chest => 16,
            _ => 64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemStack {
    pub kind: ItemKind,
    pub count: u8,
}

impl ItemStack {
    pub const fn new(kind: ItemKind, count: u8) -> Self {
        Self { kind, count }
    }

    pub const fn one(kind: ItemKind) -> Self {
        Self::new(kind, 1)
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.count, self.kind)
    }
}

/// A request to bring a new entity into the world.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntitySpawn {
    pub kind: EntityKind,
    pub pos: BlockPos,
    pub spawn_type: SpawnType,
}

impl EntitySpawn {
    pub fn new(kind: EntityKind, pos: BlockPos, spawn_type: SpawnType) -> Self {
        Self {
            kind,
            pos,
            spawn_type,
        }
    }
}

/// A request to drop an item stack into the world as an item entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemDrop {
    pub stack: ItemStack,
    pub pos: BlockPos,
}

impl ItemDrop {
    pub fn new(stack: ItemStack, pos: BlockPos) -> Self {
        Self { stack, pos }
    }

    /// Folds `other` into this drop if it is the same item at the same position
    /// and the combined count still fits in one stack.
    pub fn try_merge(&mut self, other: &Self) -> bool {
        if self.pos != other.pos || self.stack.kind != other.stack.kind {
            return false;
        }
        let total = u16::from(self.stack.count) + u16::from(other.stack.count);
        if total > u16::from(self.stack.kind.max_stack()) {
            return false;
        }
        self.stack.count = total as u8;
        true
    }
}
