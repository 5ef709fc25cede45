//! Cause objects and keyed event context.
use std::collections::BTreeMap;
use std::fmt;

use crate::state::PhaseKind;
use crate::world::{
    BlockPos, BlockSnapshot, EntityId, EntityKind, ItemStack, PluginId, SpawnType, WorldId,
};

/// One entry of the cause stack: something that explains why work is happening.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CauseObject {
    /// A connected player.
    Player(EntityId),
    /// A non-player entity.
    Entity { id: EntityId, kind: EntityKind },
    /// A block, as it looked when it became a cause.
    Block(BlockSnapshot),
    /// A dimension.
    World(WorldId),
    /// An extension.
    Plugin(PluginId),
    /// A tracked phase activation.
    Phase { id: u64, kind: PhaseKind },
    /// The server itself (console, scheduler).
    Server,
    /// Free-form cause pushed by extension code.
    Custom(String),
}

impl CauseObject {
    pub fn player(&self) -> Option<EntityId> {
        match self {
            Self::Player(id) => Some(*id),
            _ => None,
        }
    }

    pub fn phase_kind(&self) -> Option<PhaseKind> {
        match self {
            Self::Phase { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for CauseObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player {id}"),
            Self::Entity { id, kind } => write!(f, "{kind} {id}"),
            Self::Block(snapshot) => write!(f, "block {snapshot}"),
            Self::World(id) => write!(f, "{id}"),
            Self::Plugin(id) => write!(f, "plugin {id}"),
            Self::Phase { id, kind } => write!(f, "phase {kind}#{id}"),
            Self::Server => f.write_str("server"),
            Self::Custom(label) => write!(f, "custom {label}"),
        }
    }
}

/// Keys of the event-context map.
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
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum EventContextKey {
    /// Entity credited with creating blocks or entities.
    Owner,
    /// Entity credited with triggering neighbour updates.
    Notifier,
    /// Player whose packet is being processed.
    Player,
    /// Item used in the triggering interaction.
    UsedItem,
    /// Block targeted by the triggering interaction.
    BlockHit,
    /// Dimension being ticked.
    World,
    /// Why entities are being spawned.
    SpawnType,
    /// Extension that initiated the work.
    Plugin,
    /// Block whose change caused a neighbour reaction.
    NeighborNotify,
}

/// Values stored under an [`EventContextKey`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContextValue {
    Entity(EntityId),
    Item(ItemStack),
    Block(BlockSnapshot),
    Pos(BlockPos),
    World(WorldId),
    SpawnType(SpawnType),
    Plugin(PluginId),
    Text(String),
}

impl ContextValue {
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_spawn_type(&self) -> Option<SpawnType> {
        match self {
            Self::SpawnType(spawn_type) => Some(*spawn_type),
            _ => None,
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "{id}"),
            Self::Item(stack) => write!(f, "{stack}"),
            Self::Block(snapshot) => write!(f, "{snapshot}"),
            Self::Pos(pos) => write!(f, "{pos}"),
            Self::World(id) => write!(f, "{id}"),
            Self::SpawnType(spawn_type) => write!(f, "{spawn_type}"),
            Self::Plugin(id) => write!(f, "{id}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Immutable copy of the cause stack handed to listeners.
///
/// Causes are ordered from the most recently pushed (the *root*, the most
/// direct reason) to the oldest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cause {
    causes: Vec<CauseObject>,
    context: BTreeMap<EventContextKey, ContextValue>,
}

impl Cause {
    pub(crate) fn new(
        causes: Vec<CauseObject>,
        context: BTreeMap<EventContextKey, ContextValue>,
    ) -> Self {
        Self { causes, context }
    }

    /// Most direct cause.
    pub fn root(&self) -> Option<&CauseObject> {
        self.causes.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CauseObject> {
        self.causes.iter()
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn contains(&self, object: &CauseObject) -> bool {
        self.causes.contains(object)
    }

    /// Nearest player in the chain, if any.
    pub fn first_player(&self) -> Option<EntityId> {
        self.causes.iter().find_map(CauseObject::player)
    }

    /// Nearest phase in the chain, if any.
    pub fn phase(&self) -> Option<PhaseKind> {
        self.causes.iter().find_map(CauseObject::phase_kind)
    }

    pub fn context(&self, key: EventContextKey) -> Option<&ContextValue> {
        self.context.get(&key)
    }

    pub fn context_entries(&self) -> impl Iterator<Item = (EventContextKey, &ContextValue)> {
        self.context.iter().map(|(key, value)| (*key, value))
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, cause) in self.causes.iter().enumerate() {
            if index > 0 {
                f.write_str(" <- ")?;
            }
            write!(f, "{cause}")?;
        }
        f.write_str("]")?;
        if !self.context.is_empty() {
            f.write_str(" {")?;
            for (index, (key, value)) in self.context.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}
