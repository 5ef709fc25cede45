//! Per-activation accumulator for captured side effects.
//!
//! A [`PhaseContext`] is built by the engine right before it pushes a phase
//! and is consumed when that phase pops. It holds the cause the phase was
//! opened for, the phase-specific fields listeners may query, and three capture
//! buffers that only materialise when something is actually captured.
mod buffer;

pub use buffer::{Buffered, CaptureBuffer};

use crate::cause::{CauseObject, ContextValue, EventContextKey};
use crate::state::{BufferKind, PacketPhase};
use crate::transaction::TransactionForest;
use crate::world::{
    BlockPos, BlockSnapshot, EntityId, EntityKind, EntitySpawn, ItemDrop, ItemStack,
    PlayerSession, PluginId, WorldId,
};

#[derive(Clone, Debug)]
pub struct PhaseContext {
    source: CauseObject,

    pub(crate) blocks: CaptureBuffer<TransactionForest>,
    pub(crate) entities: CaptureBuffer<Vec<EntitySpawn>>,
    pub(crate) items: CaptureBuffer<Vec<ItemDrop>>,

    world: Option<WorldId>,
    player: Option<EntityId>,
    packet: Option<PacketPhase>,
    used_item: Option<ItemStack>,
    owner: Option<EntityId>,
    notifier: Option<EntityId>,
    block_hit: Option<BlockPos>,
    plugin: Option<PluginId>,
}

fn required<T: Clone>(field: &Option<T>, name: &str) -> T {
    match field {
        Some(value) => value.clone(),
        None => panic!("phase context field `{name}` is not set"),
    }
}

impl PhaseContext {
    pub fn new(source: CauseObject) -> Self {
        Self {
            source,
            blocks: CaptureBuffer::new(),
            entities: CaptureBuffer::new(),
            items: CaptureBuffer::new(),
            world: None,
            player: None,
            packet: None,
            used_item: None,
            owner: None,
            notifier: None,
            block_hit: None,
            plugin: None,
        }
    }

    /// Context of the idle sentinel.
    pub fn idle() -> Self {
        Self::new(CauseObject::Server)
    }

    /// Packet handling for `session`; the session is read once, here.
    pub fn packet(session: &dyn PlayerSession, packet: PacketPhase) -> Self {
        let player = session.player_id();
        let mut context = Self::new(CauseObject::Player(player))
            .with_player(player)
            .with_owner(player)
            .with_notifier(player)
            .with_packet(packet);
        context.used_item = session.held_item();
        context.block_hit = session.selection();
        context
    }

    pub fn dimension_tick(world: WorldId) -> Self {
        Self::new(CauseObject::World(world)).with_world(world)
    }

    /// Scheduled or random tick of the block in `snapshot`.
    pub fn block_tick(snapshot: BlockSnapshot) -> Self {
        let pos = snapshot.pos;
        let notifier = snapshot.notifier.or(snapshot.owner);
        let mut context = Self::new(CauseObject::Block(snapshot)).with_block_hit(pos);
        context.notifier = notifier;
        context
    }

    pub fn entity_tick(id: EntityId, kind: EntityKind) -> Self {
        Self::new(CauseObject::Entity { id, kind })
            .with_owner(id)
            .with_notifier(id)
    }

    pub fn generation(world: WorldId) -> Self {
        Self::new(CauseObject::World(world)).with_world(world)
    }

    pub fn plugin(plugin: PluginId) -> Self {
        Self::new(CauseObject::Plugin(plugin.clone())).with_plugin(plugin)
    }

    // ===== builder =====

    #[must_use]
    pub fn with_world(mut self, world: WorldId) -> Self {
        self.world = Some(world);
        self
    }

    #[must_use]
    pub fn with_player(mut self, player: EntityId) -> Self {
        self.player = Some(player);
        self
    }

    #[must_use]
    pub fn with_packet(mut self, packet: PacketPhase) -> Self {
        self.packet = Some(packet);
        self
    }

    #[must_use]
    pub fn with_used_item(mut self, item: ItemStack) -> Self {
        self.used_item = Some(item);
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: EntityId) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn with_block_hit(mut self, pos: BlockPos) -> Self {
        self.block_hit = Some(pos);
        self
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: PluginId) -> Self {
        self.plugin = Some(plugin);
        self
    }

    // ===== fields =====

    pub fn source(&self) -> &CauseObject {
        &self.source
    }

    /// # Panics
    ///
    /// Panics if the phase was not opened for a dimension.
    pub fn world(&self) -> WorldId {
        required(&self.world, "world")
    }

    pub fn try_world(&self) -> Option<WorldId> {
        self.world
    }

    /// # Panics
    ///
    /// Panics if no player is attached.
    pub fn player(&self) -> EntityId {
        required(&self.player, "player")
    }

    pub fn try_player(&self) -> Option<EntityId> {
        self.player
    }

    /// # Panics
    ///
    /// Panics outside packet phases.
    pub fn packet_kind(&self) -> PacketPhase {
        required(&self.packet, "packet")
    }

    pub fn try_packet_kind(&self) -> Option<PacketPhase> {
        self.packet
    }

    /// # Panics
    ///
    /// Panics if no item was used.
    pub fn used_item(&self) -> ItemStack {
        required(&self.used_item, "used_item")
    }

    pub fn try_used_item(&self) -> Option<ItemStack> {
        self.used_item
    }

    /// # Panics
    ///
    /// Panics if no owner is attached.
    pub fn owner(&self) -> EntityId {
        required(&self.owner, "owner")
    }

    pub fn try_owner(&self) -> Option<EntityId> {
        self.owner
    }

    /// # Panics
    ///
    /// Panics if no notifier is attached.
    pub fn notifier(&self) -> EntityId {
        required(&self.notifier, "notifier")
    }

    pub fn try_notifier(&self) -> Option<EntityId> {
        self.notifier
    }

    /// # Panics
    ///
    /// Panics if no block was targeted.
    pub fn block_hit(&self) -> BlockPos {
        required(&self.block_hit, "block_hit")
    }

    pub fn try_block_hit(&self) -> Option<BlockPos> {
        self.block_hit
    }

    /// # Panics
    ///
    /// Panics outside plugin-initiated phases.
    pub fn plugin_id(&self) -> PluginId {
        required(&self.plugin, "plugin")
    }

    pub fn try_plugin_id(&self) -> Option<&PluginId> {
        self.plugin.as_ref()
    }

    // ===== buffers =====

    /// Transactions captured so far, if the block buffer was materialised.
    pub fn captured_blocks(&self) -> Option<&TransactionForest> {
        self.blocks.get()
    }

    pub fn captured_entities(&self) -> &[EntitySpawn] {
        self.entities.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn captured_items(&self) -> &[ItemDrop] {
        self.items.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_populated(&self, buffer: BufferKind) -> bool {
        match buffer {
            BufferKind::Blocks => self.blocks.is_populated(),
            BufferKind::Entities => self.entities.is_populated(),
            BufferKind::Items => self.items.is_populated(),
        }
    }

    pub fn is_materialized(&self, buffer: BufferKind) -> bool {
        match buffer {
            BufferKind::Blocks => self.blocks.is_materialized(),
            BufferKind::Entities => self.entities.is_materialized(),
            BufferKind::Items => self.items.is_materialized(),
        }
    }

    pub fn pending(&self, buffer: BufferKind) -> usize {
        match buffer {
            BufferKind::Blocks => self.blocks.len(),
            BufferKind::Entities => self.entities.len(),
            BufferKind::Items => self.items.len(),
        }
    }

    /// Event-context entries contributed by this context's fields.
    pub fn context_entries(&self) -> Vec<(EventContextKey, ContextValue)> {
        let mut entries = Vec::new();
        if let Some(world) = self.world {
            entries.push((EventContextKey::World, ContextValue::World(world)));
        }
        if let Some(player) = self.player {
            entries.push((EventContextKey::Player, ContextValue::Entity(player)));
        }
        if let Some(item) = self.used_item {
            entries.push((EventContextKey::UsedItem, ContextValue::Item(item)));
        }
        if let Some(pos) = self.block_hit {
            entries.push((EventContextKey::BlockHit, ContextValue::Pos(pos)));
        }
        if let Some(owner) = self.owner {
            entries.push((EventContextKey::Owner, ContextValue::Entity(owner)));
        }
        if let Some(notifier) = self.notifier {
            entries.push((EventContextKey::Notifier, ContextValue::Entity(notifier)));
        }
        if let Some(plugin) = &self.plugin {
            entries.push((EventContextKey::Plugin, ContextValue::Plugin(plugin.clone())));
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Session;

    impl PlayerSession for Session {
        fn player_id(&self) -> EntityId {
            EntityId(42)
        }

        fn held_item(&self) -> Option<ItemStack> {
            Some(ItemStack::one(crate::world::ItemKind::Torch))
        }
    }

    #[test]
    fn packet_context_reads_session_once() {
        let context = PhaseContext::packet(&Session, PacketPhase::PlaceBlock);
        assert_eq!(context.player(), EntityId(42));
        assert_eq!(context.owner(), EntityId(42));
        assert_eq!(context.packet_kind(), PacketPhase::PlaceBlock);
        assert!(context.try_block_hit().is_none());
        assert_eq!(context.source(), &CauseObject::Player(EntityId(42)));
        assert!(context
            .context_entries()
            .iter()
            .any(|(key, _)| *key == EventContextKey::UsedItem));
    }

    #[test]
    #[should_panic(expected = "`world` is not set")]
    fn unset_field_panics() {
        let context = PhaseContext::entity_tick(EntityId(1), EntityKind::Zombie);
        let _ = context.world();
    }

    #[test]
    fn buffers_start_absent() {
        let context = PhaseContext::dimension_tick(WorldId::OVERWORLD);
        for buffer in BufferKind::ALL {
            assert!(!context.is_materialized(buffer));
            assert!(!context.is_populated(buffer));
        }
    }
}
