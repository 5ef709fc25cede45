use std::fmt;

use super::{PolicyFlags, UnwindPlan};
use crate::world::SpawnType;

/// Packet handlers that run inside their own phase.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum PacketPhase {
    PlaceBlock,
    BreakBlock,
    UseItem,
    InteractEntity,
    DropItem,
    Movement,
    Command,
}

impl PacketPhase {
    pub const ALL: [Self; 7] = [
        Self::PlaceBlock,
        Self::BreakBlock,
        Self::UseItem,
        Self::InteractEntity,
        Self::DropItem,
        Self::Movement,
        Self::Command,
    ];
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum GenerationPhase {
    Terrain,
    Population,
    ChunkLoad,
}

impl GenerationPhase {
    pub const ALL: [Self; 3] = [Self::Terrain, Self::Population, Self::ChunkLoad];
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum PluginPhase {
    Scheduled,
    Command,
    Custom,
}

impl PluginPhase {
    pub const ALL: [Self; 3] = [Self::Scheduled, Self::Command, Self::Custom];
}

/// Closed set of phase kinds.
///
/// Every policy answer is derived from an exhaustive match on this enum, so a
/// new kind cannot be added without deciding each answer for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PhaseKind {
    /// Sentinel at the bottom of every tracker.
    #[default]
    Idle,
    Packet(PacketPhase),
    Generation(GenerationPhase),
    BlockTick,
    EntityTick,
    DimensionTick,
    Plugin(PluginPhase),
}

impl PhaseKind {
    /// Every kind, sentinel first.
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::Idle]
            .into_iter()
            .chain(PacketPhase::ALL.into_iter().map(Self::Packet))
            .chain(GenerationPhase::ALL.into_iter().map(Self::Generation))
            .chain([Self::BlockTick, Self::EntityTick, Self::DimensionTick])
            .chain(PluginPhase::ALL.into_iter().map(Self::Plugin))
    }

    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Baseline policy for this kind.
    pub const fn default_policy(self) -> PolicyFlags {
        use PolicyFlags as F;

        match self {
            Self::Idle => F::TRACKED.union(F::QUIET_NESTING),
            Self::Packet(PacketPhase::Movement) => F::TRACKED.union(F::PACKET),
            Self::Packet(_) => F::TRACKED
                .union(F::CAPTURE_ALL)
                .union(F::PRE_MERGE_ITEM_DROPS)
                .union(F::TRACK_BLOCK_OWNER)
                .union(F::TRACK_BLOCK_NOTIFIER)
                .union(F::PACKET),
            Self::Generation(_) => F::DISPATCH_EVENTS
                .union(F::IGNORE_BLOCKS)
                .union(F::CAPTURE_ENTITY_SPAWNS)
                .union(F::IGNORE_ENTITY_COLLISIONS)
                .union(F::WORLD_GENERATION),
            Self::BlockTick => F::TRACKED
                .union(F::CAPTURE_ALL)
                .union(F::PRE_MERGE_ITEM_DROPS)
                .union(F::TRACK_BLOCK_NOTIFIER)
                .union(F::TICK),
            Self::EntityTick => F::TRACKED
                .union(F::CAPTURE_ALL)
                .union(F::TRACK_BLOCK_OWNER)
                .union(F::TICK),
            Self::DimensionTick => F::TRACKED
                .union(F::CAPTURE_ENTITY_SPAWNS)
                .union(F::IGNORE_ENTITY_COLLISIONS)
                .union(F::TICK),
            Self::Plugin(PluginPhase::Custom) => F::TRACKED
                .union(F::CAPTURE_ALL)
                .union(F::PLUGIN)
                .union(F::QUIET_NESTING),
            Self::Plugin(_) => F::TRACKED.union(F::CAPTURE_ALL).union(F::PLUGIN),
        }
    }

    /// Buffers drained when a phase of this kind unwinds.
    pub const fn unwind_plan(self) -> UnwindPlan {
        match self {
            Self::Idle => UnwindPlan::NONE,
            Self::Generation(_) => UnwindPlan::ENTITIES_ONLY,
            Self::Packet(_)
            | Self::BlockTick
            | Self::EntityTick
            | Self::DimensionTick
            | Self::Plugin(_) => UnwindPlan::ALL,
        }
    }

    /// Spawn type attributed to entities spawned under this kind.
    pub const fn spawn_type(self) -> SpawnType {
        match self {
            Self::Idle => SpawnType::Custom,
            Self::Packet(PacketPhase::PlaceBlock | PacketPhase::UseItem) => SpawnType::Placement,
            Self::Packet(PacketPhase::DropItem) => SpawnType::DroppedItem,
            Self::Packet(PacketPhase::BreakBlock) => SpawnType::BlockSpawning,
            Self::Packet(_) => SpawnType::Custom,
            Self::Generation(GenerationPhase::ChunkLoad) => SpawnType::ChunkLoad,
            Self::Generation(_) => SpawnType::WorldSpawner,
            Self::BlockTick => SpawnType::BlockSpawning,
            Self::EntityTick => SpawnType::Breeding,
            Self::DimensionTick => SpawnType::WorldSpawner,
            Self::Plugin(_) => SpawnType::Plugin,
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Packet(packet) => write!(f, "packet/{packet}"),
            Self::Generation(generation) => write!(f, "generation/{generation}"),
            Self::BlockTick => f.write_str("block_tick"),
            Self::EntityTick => f.write_str("entity_tick"),
            Self::DimensionTick => f.write_str("dimension_tick"),
            Self::Plugin(plugin) => write!(f, "plugin/{plugin}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_each_kind_once() {
        let kinds: Vec<PhaseKind> = PhaseKind::all().collect();
        assert_eq!(kinds.len(), 1 + 7 + 3 + 3 + 3);
        let mut deduped = kinds.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), kinds.len());
        assert_eq!(kinds[0], PhaseKind::Idle);
    }

    #[test]
    fn generation_skips_block_tracking() {
        let flags = PhaseKind::Generation(GenerationPhase::Terrain).default_policy();
        assert!(flags.contains(PolicyFlags::IGNORE_BLOCKS));
        assert!(flags.contains(PolicyFlags::CAPTURE_ENTITY_SPAWNS));
        assert!(!flags.contains(PolicyFlags::CAPTURE_BLOCKS));
        assert!(!flags.contains(PolicyFlags::TRACK_REACTIONS));
    }

    #[test]
    fn packets_capture_everything_except_movement() {
        for packet in PacketPhase::ALL {
            let flags = PhaseKind::Packet(packet).default_policy();
            assert!(flags.contains(PolicyFlags::PACKET));
            assert_eq!(
                flags.contains(PolicyFlags::CAPTURE_ALL),
                packet != PacketPhase::Movement
            );
        }
    }

    #[test]
    fn display_names_sub_kinds() {
        assert_eq!(
            PhaseKind::Packet(PacketPhase::PlaceBlock).to_string(),
            "packet/place_block"
        );
        assert_eq!(PhaseKind::DimensionTick.to_string(), "dimension_tick");
    }
}
