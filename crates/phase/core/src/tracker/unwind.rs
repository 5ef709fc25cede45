//! Turning captured effects into committed or rolled-back mutations.
//!
//! Drain order is blocks, then entity spawns, then item drops. Committing
//! blocks can produce new drops and spawns, which are captured into the phase
//! being unwound and picked up by the next pass.
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, trace, warn};

use super::{Scope, TreeOutcome, UnwindReport};
use crate::cause::{CauseObject, ContextValue, EventContextKey};
use crate::env::Env;
use crate::error::{ErrorClass, TrackerError};
use crate::event::{
    BlockChange, ChangeBlockEvent, DropItemEvent, ListenerError, Proposal, SpawnEntityEvent,
};
use crate::state::BufferKind;
use crate::transaction::{BlockTransaction, TransactionForest, TxId, TxStatus};
use crate::world::{BlockPos, BlockSnapshot, BlockState, CommittedChange, ItemDrop, Reaction};

impl Scope<'_> {
    pub(crate) fn unwind(&mut self, env: &mut Env<'_>) -> UnwindReport {
        let mut report = UnwindReport::new(self.id, self.state.kind());
        let plan = self.state.unwind_plan();

        while plan
            .buffers()
            .iter()
            .any(|buffer| self.context.is_populated(*buffer))
        {
            if report.passes >= self.config.max_unwind_passes {
                warn!(
                    target: "phase_core::unwind",
                    phase = %self.id,
                    phase_kind = %self.state.kind(),
                    passes = report.passes,
                    class = ErrorClass::Capacity.as_str(),
                    "unwind pass limit reached"
                );
                break;
            }
            report.passes += 1;

            for buffer in plan.buffers() {
                match buffer {
                    BufferKind::Blocks => self.drain_blocks(env, &mut report),
                    BufferKind::Entities => self.drain_entities(env, &mut report),
                    BufferKind::Items => self.drain_items(env, &mut report),
                }
            }
            trace!(
                target: "phase_core::unwind",
                phase = %self.id,
                pass = report.passes,
                "unwind pass complete"
            );
        }

        report
    }

    fn drain_blocks(&mut self, env: &mut Env<'_>, report: &mut UnwindReport) {
        let mut forest = self.context.blocks.take();
        if forest.is_empty() {
            return;
        }

        // Undo tentative writes newest first so every position ends at its
        // pre-phase snapshot before trees are replayed.
        for tx in forest.iter().rev().filter(|tx| tx.is_written_through()) {
            env.world.write_block(tx.pos(), tx.original().clone());
        }

        let roots = forest.roots().to_vec();
        for root in roots {
            let outcome = self.process_tree(env, &mut forest, root);
            report.blocks.absorb(outcome);
        }
        report.transactions.extend(forest.pre_order().cloned());
    }

    /// Dispatches and commits one root tree in pre-order.
    ///
    /// The tree is all-or-nothing: if any node is cancelled or its listener
    /// fails, every write made for the tree (tracked and silent) is undone
    /// newest first and the whole tree is marked cancelled. Undo restores the
    /// snapshot each write replaced, not the capture-time original, so an
    /// earlier cancelled capture at the same position never resurfaces.
    pub(crate) fn process_tree(
        &mut self,
        env: &mut Env<'_>,
        forest: &mut TransactionForest,
        root: TxId,
    ) -> TreeOutcome {
        let mut outcome = TreeOutcome::default();
        let mut work = vec![root];
        let mut applied = 0_usize;
        let mut undo: Vec<(BlockPos, BlockSnapshot)> = Vec::new();
        let mut effects: Vec<Reaction> = Vec::new();
        let mut size = 1_usize;
        let mut rejected = None;

        while let Some(id) = work.pop() {
            let Some(committed) = self.dispatch_block(env, forest, id) else {
                rejected = Some(id);
                break;
            };
            let Some(tx) = forest.get_mut(id) else {
                continue;
            };
            let pos = tx.pos();
            let prior = env.world.write_block(pos, committed.clone());
            tx.mark_committed(committed.clone());
            applied += 1;

            let mut reactions = Vec::new();
            env.world.react(
                &CommittedChange {
                    original: &prior,
                    committed: &committed,
                },
                &mut reactions,
            );
            undo.push((pos, prior));

            let children = self.record_reactions(
                env,
                forest,
                id,
                reactions,
                &mut size,
                &mut undo,
                &mut effects,
                &mut outcome,
            );
            work.extend(children.into_iter().rev());
        }

        if let Some(rejected) = rejected {
            let reverted = undo.len();
            for (pos, prior) in undo.into_iter().rev() {
                env.world.write_block(pos, prior);
            }
            let tree: Vec<TxId> = forest.tree(root).map(BlockTransaction::id).collect();
            for id in &tree {
                if let Some(tx) = forest.get_mut(*id) {
                    tx.mark_cancelled();
                }
            }
            outcome.cancelled += tree.len();
            debug!(
                target: "phase_core::unwind",
                phase = %self.id,
                root = %root,
                rejected = %rejected,
                reverted,
                "transaction tree cancelled"
            );
            return outcome;
        }

        outcome.committed += applied;
        for effect in effects {
            match effect {
                Reaction::DropItem(drop) => {
                    self.drop_item(env, drop);
                }
                Reaction::SpawnEntity(spawn) => {
                    self.spawn_entity(env, spawn);
                }
                Reaction::SetBlock { .. } => {}
            }
        }
        outcome
    }

    /// Asks the listener about one transaction.
    ///
    /// Returns the snapshot to commit, or `None` when the change must not
    /// happen.
    fn dispatch_block(
        &mut self,
        env: &mut Env<'_>,
        forest: &TransactionForest,
        id: TxId,
    ) -> Option<BlockSnapshot> {
        let tx = forest.get(id)?;
        if !self.state.dispatches_events() {
            return Some(tx.proposed().clone());
        }

        let mut event = ChangeBlockEvent {
            phase: self.state.kind(),
            changes: vec![BlockChange {
                tx: id,
                kind: tx.kind(),
                depth: tx.depth(),
                original: tx.original().clone(),
                proposal: Proposal::new(tx.proposed().clone()),
            }],
        };

        let notifier = tx
            .parent()
            .and_then(|parent| forest.get(parent))
            .and_then(BlockTransaction::committed)
            .cloned();
        let cause = match notifier {
            Some(parent) => {
                let mut frame = self.causes.frame();
                frame.push_cause(CauseObject::Block(parent.clone()));
                frame.add_context(EventContextKey::NeighborNotify, ContextValue::Block(parent));
                frame.current_cause()
            }
            None => self.causes.current_cause(),
        };

        let pos = tx.pos();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            env.listener.on_change_block(&cause, &mut event)
        }))
        .unwrap_or_else(|payload| Err(ListenerError::panicked(env.listener.name(), payload)))
        .and_then(|()| {
            let effective = event
                .changes
                .pop()
                .and_then(|change| change.proposal.into_effective());
            match effective {
                Some(snapshot) if snapshot.pos != pos => Err(ListenerError::InvalidReplacement {
                    listener: env.listener.name().to_owned(),
                    pos,
                }),
                other => Ok(other),
            }
        });

        match result {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(
                    target: "phase_core::unwind",
                    phase = %self.id,
                    phase_kind = %self.state.kind(),
                    tx = %id,
                    %pos,
                    %cause,
                    code = error.error_code(),
                    %error,
                    "listener failed; cancelling block transaction"
                );
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_reactions(
        &mut self,
        env: &mut Env<'_>,
        forest: &mut TransactionForest,
        parent: TxId,
        reactions: Vec<Reaction>,
        size: &mut usize,
        undo: &mut Vec<(BlockPos, BlockSnapshot)>,
        effects: &mut Vec<Reaction>,
        outcome: &mut TreeOutcome,
    ) -> Vec<TxId> {
        let depth = forest.get(parent).map_or(0, BlockTransaction::depth) + 1;
        let mut children = Vec::new();

        for reaction in reactions {
            match reaction {
                Reaction::SetBlock { pos, state } if self.state.tracks_reactions() => {
                    if depth > self.config.max_cascade_depth
                        || *size >= self.config.max_cascade_nodes
                    {
                        outcome.dropped_reactions += 1;
                        warn!(
                            target: "phase_core::unwind",
                            phase = %self.id,
                            %pos,
                            depth,
                            nodes = *size,
                            class = ErrorClass::Capacity.as_str(),
                            "cascade bound reached; dropping reaction"
                        );
                        continue;
                    }
                    let original = env.world.read_block(pos);
                    let mut proposed = BlockSnapshot::new(pos, state);
                    if self.state.tracks_block_notifier() {
                        proposed.notifier = self.context.try_notifier();
                    }
                    children.push(forest.push_child(parent, original, proposed, self.origin()));
                    *size += 1;
                }
                Reaction::SetBlock { pos, state } => {
                    self.apply_silently(env, pos, state, undo, effects, outcome);
                }
                other => effects.push(other),
            }
        }
        children
    }

    /// Applies an untracked reaction chain straight to storage.
    ///
    /// Nothing is dispatched, but every replaced snapshot lands in `undo` so
    /// the chain is reverted with its tree.
    #[allow(clippy::too_many_arguments)]
    fn apply_silently(
        &mut self,
        env: &mut Env<'_>,
        pos: BlockPos,
        state: BlockState,
        undo: &mut Vec<(BlockPos, BlockSnapshot)>,
        effects: &mut Vec<Reaction>,
        outcome: &mut TreeOutcome,
    ) {
        let mut pending = vec![(pos, state)];
        let mut budget = self.config.max_cascade_nodes;

        while let Some((pos, state)) = pending.pop() {
            if budget == 0 {
                outcome.dropped_reactions += 1 + pending.len();
                warn!(
                    target: "phase_core::unwind",
                    phase = %self.id,
                    %pos,
                    class = ErrorClass::Capacity.as_str(),
                    "silent reaction chain exceeded the cascade bound"
                );
                break;
            }
            budget -= 1;

            let committed = BlockSnapshot::new(pos, state);
            let original = env.world.write_block(pos, committed.clone());
            let mut reactions = Vec::new();
            env.world.react(
                &CommittedChange {
                    original: &original,
                    committed: &committed,
                },
                &mut reactions,
            );
            undo.push((pos, original));
            let mut follow_ups = Vec::new();
            for reaction in reactions {
                match reaction {
                    Reaction::SetBlock { pos, state } => follow_ups.push((pos, state)),
                    other => effects.push(other),
                }
            }
            pending.extend(follow_ups.into_iter().rev());
        }
    }

    pub(crate) fn dispatch_spawns(&mut self, env: &mut Env<'_>, event: &mut SpawnEntityEvent) {
        let cause = self.causes.current_cause();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            env.listener.on_spawn_entity(&cause, &mut *event)
        }))
        .unwrap_or_else(|payload| Err(ListenerError::panicked(env.listener.name(), payload)));
        if let Err(error) = result {
            warn!(
                target: "phase_core::unwind",
                phase = %self.id,
                phase_kind = %self.state.kind(),
                entities = event.entities.len(),
                %cause,
                code = error.error_code(),
                %error,
                "listener failed; cancelling entity spawns"
            );
            event.cancel_all();
        }
    }

    pub(crate) fn dispatch_drops(&mut self, env: &mut Env<'_>, event: &mut DropItemEvent) {
        let cause = self.causes.current_cause();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            env.listener.on_drop_item(&cause, &mut *event)
        }))
        .unwrap_or_else(|payload| Err(ListenerError::panicked(env.listener.name(), payload)));
        if let Err(error) = result {
            warn!(
                target: "phase_core::unwind",
                phase = %self.id,
                phase_kind = %self.state.kind(),
                drops = event.drops.len(),
                %cause,
                code = error.error_code(),
                %error,
                "listener failed; cancelling item drops"
            );
            event.cancel_all();
        }
    }

    fn drain_entities(&mut self, env: &mut Env<'_>, report: &mut UnwindReport) {
        let spawns = self.context.entities.take();
        if spawns.is_empty() {
            return;
        }
        if !self.state.dispatches_events() {
            report
                .spawned
                .extend(spawns.into_iter().map(|spawn| env.world.spawn_entity(spawn)));
            return;
        }

        let mut event = SpawnEntityEvent::new(self.state.kind(), self.state.spawn_type(), spawns);
        self.dispatch_spawns(env, &mut event);
        for proposal in event.entities {
            match proposal.into_effective() {
                Some(spawn) => report.spawned.push(env.world.spawn_entity(spawn)),
                None => report.cancelled_spawns += 1,
            }
        }
    }

    fn drain_items(&mut self, env: &mut Env<'_>, report: &mut UnwindReport) {
        let mut drops = self.context.items.take();
        if drops.is_empty() {
            return;
        }
        if self.state.pre_merges_item_drops() {
            drops = merge_drops(drops);
        }
        if !self.state.dispatches_events() {
            report
                .dropped
                .extend(drops.into_iter().map(|drop| env.world.spawn_item(drop)));
            return;
        }

        let mut event = DropItemEvent::new(self.state.kind(), drops);
        self.dispatch_drops(env, &mut event);
        for proposal in event.drops {
            match proposal.into_effective() {
                Some(drop) => report.dropped.push(env.world.spawn_item(drop)),
                None => report.cancelled_drops += 1,
            }
        }
    }

    /// Applies whatever is still buffered at close without dispatch.
    pub(crate) fn force_apply_leaks(&mut self, env: &mut Env<'_>, report: &mut UnwindReport) {
        let blocks = self.context.blocks.len();
        let entities = self.context.entities.len();
        let items = self.context.items.len();
        if blocks + entities + items == 0 {
            return;
        }

        warn!(
            target: "phase_core::unwind",
            phase = %self.id,
            phase_kind = %self.state.kind(),
            blocks,
            entities,
            items,
            class = ErrorClass::Leak.as_str(),
            "capture buffers still populated at close; force-applying"
        );

        let mut forest = self.context.blocks.take();
        let pending: Vec<TxId> = forest
            .iter()
            .filter(|tx| tx.status() == TxStatus::Pending)
            .map(BlockTransaction::id)
            .collect();
        for id in pending {
            if let Some(tx) = forest.get_mut(id) {
                let proposed = tx.proposed().clone();
                if !tx.is_written_through() {
                    env.world.write_block(tx.pos(), proposed.clone());
                }
                tx.mark_committed(proposed);
            }
        }
        report.blocks.committed += blocks;
        report.transactions.extend(forest.pre_order().cloned());

        for spawn in self.context.entities.take() {
            report.spawned.push(env.world.spawn_entity(spawn));
        }
        for drop in self.context.items.take() {
            report.dropped.push(env.world.spawn_item(drop));
        }
        report.leaked += blocks + entities + items;
    }

    /// Reverts tentative writes and discards every other capture.
    pub(crate) fn abandon(&mut self, env: &mut Env<'_>) -> UnwindReport {
        let mut report = UnwindReport::new(self.id, self.state.kind());
        report.abandoned = true;

        let mut forest = self.context.blocks.take();
        let written: Vec<TxId> = forest
            .iter()
            .rev()
            .filter(|tx| tx.is_written_through())
            .map(BlockTransaction::id)
            .collect();
        for id in written {
            if let Some(tx) = forest.get_mut(id) {
                env.world.write_block(tx.pos(), tx.original().clone());
                tx.mark_cancelled();
            }
        }
        report.blocks.cancelled = forest.len();
        report.transactions.extend(forest.pre_order().cloned());

        report.cancelled_spawns = self.context.entities.take().len();
        report.cancelled_drops = self.context.items.take().len();
        report
    }
}

/// Folds equal drops at the same position into single stacks, keeping the
/// order in which each stack first appeared.
fn merge_drops(drops: Vec<ItemDrop>) -> Vec<ItemDrop> {
    let mut merged: Vec<ItemDrop> = Vec::with_capacity(drops.len());
    for drop in drops {
        if !merged.iter_mut().any(|existing| existing.try_merge(&drop)) {
            merged.push(drop);
        }
    }
    merged
}
