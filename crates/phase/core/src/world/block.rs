use std::fmt;

use super::EntityId;

/// Integer block coordinates in a dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const ORIGIN: Self = Self { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub const fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub const fn down(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// The six face-adjacent positions, in a fixed order.
    pub const fn neighbors(self) -> [Self; 6] {
        [
            self.down(),
            self.up(),
            self.offset(0, 0, -1),
            self.offset(0, 0, 1),
            self.offset(-1, 0, 0),
            self.offset(1, 0, 0),
        ]
    }

    /// Chebyshev distance on the horizontal plane.
    pub fn horizontal_distance(self, other: Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        dx.max(dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block type.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
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
pub enum BlockKind {
    #[default]
    Air,
    Stone,
    Dirt,
    Grass,
    Sand,
    Gravel,
    Water,
    Torch,
    Chest,
    Bedrock,
}

impl BlockKind {
    pub const fn is_air(self) -> bool {
        matches!(self, Self::Air)
    }

    /// Blocks that fall when the block beneath them is air.
    pub const fn has_gravity(self) -> bool {
        matches!(self, Self::Sand | Self::Gravel)
    }

    /// Blocks that pop off as an item when their support disappears.
    pub const fn needs_support(self) -> bool {
        matches!(self, Self::Torch)
    }

    /// Blocks that carry tile data (inventories and the like).
    pub const fn has_tile_data(self) -> bool {
        matches!(self, Self::Chest)
    }
}

/// Block type plus its packed property bits (facing, level, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockState {
    pub kind: BlockKind,
    pub properties: u16,
}

impl BlockState {
    pub const AIR: Self = Self::of(BlockKind::Air);
    pub const STONE: Self = Self::of(BlockKind::Stone);

    pub const fn of(kind: BlockKind) -> Self {
        Self {
            kind,
            properties: 0,
        }
    }

    pub const fn with_properties(kind: BlockKind, properties: u16) -> Self {
        Self { kind, properties }
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.properties == 0 {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}[{:#06x}]", self.kind, self.properties)
        }
    }
}

/// Full picture of one position: state, tile data and tracked ownership.
///
/// Snapshots are what the storage engine hands out and takes back; restoring a
/// snapshot must reproduce the position exactly, tile bytes included.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockSnapshot {
    pub pos: BlockPos,
    pub state: BlockState,
    /// Opaque tile-entity payload, owned by the persistence layer.
    pub tile_data: Option<Vec<u8>>,
    /// Entity that created the block, when the phase tracks owners.
    pub owner: Option<EntityId>,
    /// Entity that last caused a neighbour update here, when tracked.
    pub notifier: Option<EntityId>,
}

impl BlockSnapshot {
    pub fn new(pos: BlockPos, state: BlockState) -> Self {
        Self {
            pos,
            state,
            tile_data: None,
            owner: None,
            notifier: None,
        }
    }

    pub fn air(pos: BlockPos) -> Self {
        Self::new(pos, BlockState::AIR)
    }

    #[must_use]
    pub fn with_tile_data(mut self, data: Vec<u8>) -> Self {
        self.tile_data = Some(data);
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns a copy of this snapshot placed at another position.
    #[must_use]
    pub fn moved_to(&self, pos: BlockPos) -> Self {
        Self {
            pos,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.state.kind
    }
}

impl fmt::Display for BlockSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.state, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_are_face_adjacent() {
        let pos = BlockPos::new(10, 64, 10);
        for neighbor in pos.neighbors() {
            let d = (neighbor.x - pos.x).abs()
                + (neighbor.y - pos.y).abs()
                + (neighbor.z - pos.z).abs();
            assert_eq!(d, 1);
        }
    }

    #[test]
    fn block_kind_parses_snake_case() {
        assert_eq!("stone".parse::<BlockKind>().unwrap(), BlockKind::Stone);
        assert_eq!("TORCH".parse::<BlockKind>().unwrap(), BlockKind::Torch);
        assert_eq!(BlockKind::Bedrock.to_string(), "bedrock");
    }

    #[test]
    fn moved_snapshot_keeps_tile_data() {
        let snapshot = BlockSnapshot::new(BlockPos::ORIGIN, BlockState::of(BlockKind::Chest))
            .with_tile_data(vec![1, 2, 3]);
        let moved = snapshot.moved_to(BlockPos::new(1, 0, 0));
        assert_eq!(moved.tile_data.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(moved.pos, BlockPos::new(1, 0, 0));
    }
}
