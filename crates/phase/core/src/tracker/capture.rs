//! Capture-or-apply entrypoints.
//!
//! Every primitive mutation asks the top phase state, in order: is this change
//! ignored (write straight through, no tracking), is it captured (buffer it
//! for unwind), or else process it right now as a single-entry batch.
use tracing::trace;

use super::{PhaseTracker, Scope, TreeOutcome};
use crate::env::Env;
use crate::event::{DropItemEvent, SpawnEntityEvent};
use crate::transaction::{TransactionForest, TxId, TxOrigin};
use crate::world::{BlockPos, BlockSnapshot, BlockState, EntityId, EntitySpawn, ItemDrop};

/// What happened to a block change request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetBlockOutcome {
    /// Written without tracking or dispatch.
    Bypassed,
    /// Written through tentatively and recorded for unwind.
    Captured(TxId),
    /// Processed immediately; at least the requested change was committed.
    Applied(TreeOutcome),
    /// Processed immediately and rejected; storage is unchanged.
    Cancelled(TreeOutcome),
}

impl SetBlockOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnOutcome {
    Captured,
    Spawned(EntityId),
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    Captured,
    Dropped(EntityId),
    Cancelled,
}

impl PhaseTracker {
    /// Requests a block state change at `pos`.
    pub fn set_block(
        &mut self,
        env: &mut Env<'_>,
        pos: BlockPos,
        state: BlockState,
    ) -> SetBlockOutcome {
        self.top_scope()
            .set_block(env, BlockSnapshot::new(pos, state))
    }

    /// Requests a full snapshot (tile data included) be written.
    pub fn set_block_snapshot(
        &mut self,
        env: &mut Env<'_>,
        snapshot: BlockSnapshot,
    ) -> SetBlockOutcome {
        self.top_scope().set_block(env, snapshot)
    }

    pub fn spawn_entity(&mut self, env: &mut Env<'_>, spawn: EntitySpawn) -> SpawnOutcome {
        self.top_scope().spawn_entity(env, spawn)
    }

    pub fn drop_item(&mut self, env: &mut Env<'_>, drop: ItemDrop) -> DropOutcome {
        self.top_scope().drop_item(env, drop)
    }
}

impl Scope<'_> {
    pub(crate) fn origin(&self) -> TxOrigin {
        TxOrigin {
            phase: self.id,
            kind: self.state.kind(),
        }
    }

    pub(crate) fn set_block(
        &mut self,
        env: &mut Env<'_>,
        mut proposed: BlockSnapshot,
    ) -> SetBlockOutcome {
        let pos = proposed.pos;

        if self.state.ignores_block_changes() {
            env.world.write_block(pos, proposed);
            return SetBlockOutcome::Bypassed;
        }

        if self.state.tracks_block_owner() {
            if let Some(owner) = self.context.try_owner() {
                proposed.owner = Some(owner);
            }
        }

        if self.state.captures_block_changes() {
            let original = env.world.write_block(pos, proposed.clone());
            let origin = self.origin();
            let forest = self.context.blocks.get_or_init();
            let id = forest.push_root(original, proposed, origin);
            if let Some(tx) = forest.get_mut(id) {
                tx.mark_written_through();
            }
            trace!(
                target: "phase_core::capture",
                phase = %self.id,
                %pos,
                tx = %id,
                "block change captured"
            );
            return SetBlockOutcome::Captured(id);
        }

        let original = env.world.read_block(pos);
        let mut forest = TransactionForest::new();
        let root = forest.push_root(original, proposed, self.origin());
        let outcome = self.process_tree(env, &mut forest, root);
        if outcome.committed == 0 {
            SetBlockOutcome::Cancelled(outcome)
        } else {
            SetBlockOutcome::Applied(outcome)
        }
    }

    pub(crate) fn spawn_entity(&mut self, env: &mut Env<'_>, spawn: EntitySpawn) -> SpawnOutcome {
        if self.state.captures_entity_spawns() {
            self.context.entities.push(spawn);
            return SpawnOutcome::Captured;
        }
        if !self.state.dispatches_events() {
            return SpawnOutcome::Spawned(env.world.spawn_entity(spawn));
        }

        let mut event = SpawnEntityEvent::new(self.state.kind(), spawn.spawn_type, vec![spawn]);
        self.dispatch_spawns(env, &mut event);
        match event.entities.pop().and_then(|proposal| proposal.into_effective()) {
            Some(spawn) => SpawnOutcome::Spawned(env.world.spawn_entity(spawn)),
            None => SpawnOutcome::Cancelled,
        }
    }

    pub(crate) fn drop_item(&mut self, env: &mut Env<'_>, drop: ItemDrop) -> DropOutcome {
        if self.state.captures_item_drops() {
            self.context.items.push(drop);
            return DropOutcome::Captured;
        }
        if !self.state.dispatches_events() {
            return DropOutcome::Dropped(env.world.spawn_item(drop));
        }

        let mut event = DropItemEvent::new(self.state.kind(), vec![drop]);
        self.dispatch_drops(env, &mut event);
        match event.drops.pop().and_then(|proposal| proposal.into_effective()) {
            Some(drop) => DropOutcome::Dropped(env.world.spawn_item(drop)),
            None => DropOutcome::Cancelled,
        }
    }
}
