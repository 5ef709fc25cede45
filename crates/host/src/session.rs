//! Connected players and the packets they send.
use serde::{Deserialize, Serialize};

use phase_core::{BlockPos, BlockState, EntityId, ItemStack, PacketPhase, PlayerSession};

/// Session state the packet layer keeps per player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub player: EntityId,
    pub held: Option<ItemStack>,
    pub selection: Option<BlockPos>,
    pub operator: bool,
}

impl Session {
    pub fn new(player: EntityId) -> Self {
        Self {
            player,
            held: None,
            selection: None,
            operator: false,
        }
    }

    #[must_use]
    pub fn holding(mut self, stack: ItemStack) -> Self {
        self.held = Some(stack);
        self
    }

    #[must_use]
    pub fn as_operator(mut self) -> Self {
        self.operator = true;
        self
    }
}

impl PlayerSession for Session {
    fn player_id(&self) -> EntityId {
        self.player
    }

    fn held_item(&self) -> Option<ItemStack> {
        self.held
    }

    fn selection(&self) -> Option<BlockPos> {
        self.selection
    }

    fn is_operator(&self) -> bool {
        self.operator
    }
}

/// Client packets the worker knows how to handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    PlaceBlock { pos: BlockPos, state: BlockState },
    BreakBlock { pos: BlockPos },
    DropItem { stack: ItemStack, pos: BlockPos },
}

impl Packet {
    pub fn phase(&self) -> PacketPhase {
        match self {
            Self::PlaceBlock { .. } => PacketPhase::PlaceBlock,
            Self::BreakBlock { .. } => PacketPhase::BreakBlock,
            Self::DropItem { .. } => PacketPhase::DropItem,
        }
    }

    /// Block the packet acts on, if any.
    pub fn target(&self) -> Option<BlockPos> {
        match self {
            Self::PlaceBlock { pos, .. } | Self::BreakBlock { pos } => Some(*pos),
            Self::DropItem { .. } => None,
        }
    }
}
