use phase_core::testing::{InMemoryWorld, RecordingListener, support_physics};
use phase_core::{
    BlockKind, BlockPos, BlockSnapshot, BlockState, BlockStorage, Cause, CauseObject, ContextValue, EntityId,
    EntityKind, EntitySpawn, Env, EventContextKey, EventListener, GenerationPhase, ItemDrop, ItemKind, ItemStack,
    ListenerError, PacketPhase, PhaseContext, PhaseError, PhaseKind, PhaseStates, PhaseTracker,
    PlayerSession, PolicyFlags, SetBlockOutcome, SpawnEntityEvent, SpawnType, TrackerConfig,
    Verdict, WorldId,
};

struct Steve;

impl PlayerSession for Steve {
    fn player_id(&self) -> EntityId {
        EntityId(7)
    }

    fn held_item(&self) -> Option<ItemStack> {
        Some(ItemStack::one(ItemKind::Stone))
    }
}

fn packet(kind: PacketPhase) -> (PhaseKind, PhaseContext) {
    (PhaseKind::Packet(kind), PhaseContext::packet(&Steve, kind))
}

fn zombie(x: i32) -> EntitySpawn {
    EntitySpawn::new(
        EntityKind::Zombie,
        BlockPos::new(x, 64, 0),
        SpawnType::WorldSpawner,
    )
}

#[test]
fn cancelled_placement_restores_air() {
    let pos = BlockPos::new(10, 64, 10);
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new().cancel_blocks_at(pos);
    let mut tracker = PhaseTracker::default();

    {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::PlaceBlock);
        let mut guard = tracker.switch_to_phase(&mut env, kind, context).unwrap();

        let (tracker, env) = guard.parts();
        let outcome = tracker.set_block(env, pos, BlockState::STONE);
        assert!(matches!(outcome, SetBlockOutcome::Captured(_)));
        // captured writes are visible inside the phase
        assert_eq!(env.world.read_block(pos).kind(), BlockKind::Stone);

        let report = guard.finish().unwrap();
        assert_eq!(report.blocks.cancelled, 1);
        assert_eq!(report.blocks.committed, 0);
        assert!(report.spawned.is_empty());
    }

    assert_eq!(world.kind_at(pos), BlockKind::Air);
    assert_eq!(listener.blocks.len(), 1);
    assert!(listener.spawn_batches.is_empty());
    assert_eq!(tracker.depth(), 0);
    assert!(tracker.shutdown().is_ok());
}

#[test]
fn generation_batches_spawns_and_bypasses_blocks() {
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::default();
    let kind = PhaseKind::Generation(GenerationPhase::Terrain);

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(kind, PhaseContext::generation(WorldId::OVERWORLD))
            .unwrap();

        let bypassed = tracker.set_block(&mut env, BlockPos::ORIGIN, BlockState::STONE);
        assert_eq!(bypassed, SetBlockOutcome::Bypassed);
        for x in 0..50 {
            tracker.spawn_entity(&mut env, zombie(x));
        }
        assert_eq!(tracker.current_context().captured_entities().len(), 50);

        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(listener.spawn_batches.len(), 1);
    assert_eq!(listener.spawn_batches[0].1.len(), 50);
    assert!(listener.blocks.is_empty());
    assert_eq!(report.spawned.len(), 50);
    assert_eq!(world.entities().len(), 50);
    assert_eq!(world.kind_at(BlockPos::ORIGIN), BlockKind::Stone);
}

#[test]
fn nested_ticks_restore_cause_depth_after_both_pops() {
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();
    let mut env = Env::new(&mut world, &mut listener);
    let mut tracker = PhaseTracker::default();
    let before = tracker.current_cause();
    let depth_before = tracker.causes().depth();

    tracker
        .push_phase(
            PhaseKind::DimensionTick,
            PhaseContext::dimension_tick(WorldId::OVERWORLD),
        )
        .unwrap();
    let after_dimension = tracker.causes().depth();
    let stone = BlockSnapshot::new(BlockPos::new(3, 60, 3), BlockState::STONE);
    tracker
        .push_phase(PhaseKind::BlockTick, PhaseContext::block_tick(stone.clone()))
        .unwrap();
    assert_eq!(tracker.current_cause().root(), Some(&CauseObject::Block(stone)));

    let inner = tracker.pop_phase(&mut env).unwrap();
    assert_eq!(inner.kind, PhaseKind::BlockTick);
    assert_eq!(tracker.causes().depth(), after_dimension);
    assert!(tracker.causes().depth() > depth_before);

    let outer = tracker.pop_phase(&mut env).unwrap();
    assert_eq!(outer.kind, PhaseKind::DimensionTick);
    assert_eq!(tracker.causes().depth(), depth_before);
    assert_eq!(tracker.current_cause(), before);
}

#[test]
fn cause_keys_added_inside_a_phase_are_gone_after_pop() {
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();
    let mut env = Env::new(&mut world, &mut listener);
    let mut tracker = PhaseTracker::default();
    let before = tracker.current_cause();

    tracker
        .push_phase(PhaseKind::EntityTick, PhaseContext::entity_tick(EntityId(3), EntityKind::Cow))
        .unwrap();
    tracker.causes_mut().push_frame();
    tracker.causes_mut().push_cause(CauseObject::Custom("leftover".into()));
    tracker
        .causes_mut()
        .add_context(EventContextKey::Notifier, ContextValue::Entity(EntityId(99)));
    tracker.pop_phase(&mut env).unwrap();

    assert_eq!(tracker.current_cause(), before);
    assert!(tracker.causes().context(EventContextKey::Notifier).is_none());
    assert!(tracker.shutdown().is_ok());
}

#[test]
fn depth_guard_rejects_push_beyond_limit() {
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();
    let mut env = Env::new(&mut world, &mut listener);
    let mut tracker = PhaseTracker::default();
    let max = TrackerConfig::DEFAULT_MAX_PHASE_DEPTH;

    for _ in 0..max {
        tracker
            .push_phase(PhaseKind::EntityTick, PhaseContext::idle())
            .unwrap();
    }
    let error = tracker
        .push_phase(PhaseKind::EntityTick, PhaseContext::idle())
        .unwrap_err();
    assert!(matches!(error, PhaseError::DepthExceeded { depth, .. } if depth == max));
    assert_eq!(tracker.depth(), max);

    for _ in 0..max {
        tracker.pop_phase(&mut env).unwrap();
    }
    assert_eq!(tracker.pop_phase(&mut env).unwrap_err(), PhaseError::PopSentinel);
    assert!(tracker.shutdown().is_ok());
}

#[test]
fn reactions_are_children_dispatched_in_pre_order() {
    let base = BlockPos::new(0, 64, 0);
    let mut world = InMemoryWorld::new()
        .with_physics(support_physics)
        .with_block(base, BlockKind::Stone)
        .with_block(base.up(), BlockKind::Torch);
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::default();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::BreakBlock);
        tracker.push_phase(kind, context).unwrap();
        tracker.set_block(&mut env, base, BlockState::AIR);
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(listener.block_positions(), vec![base, base.up()]);
    let (root_cause, root) = &listener.blocks[0];
    let (child_cause, child) = &listener.blocks[1];
    assert_eq!(root.depth, 0);
    assert_eq!(root_cause.first_player(), Some(EntityId(7)));
    assert_eq!(child.depth, 1);
    assert!(matches!(
        child_cause.context(EventContextKey::NeighborNotify),
        Some(ContextValue::Block(notifier)) if notifier.pos == base
    ));

    assert_eq!(report.blocks.committed, 2);
    assert_eq!(world.kind_at(base), BlockKind::Air);
    assert_eq!(world.kind_at(base.up()), BlockKind::Air);
    assert_eq!(listener.drop_batches.len(), 1);
    assert_eq!(world.items().len(), 1);
    assert_eq!(world.items()[0].1.stack.kind, ItemKind::Torch);
}

#[test]
fn cancelling_a_reaction_reverts_the_whole_tree() {
    let base = BlockPos::new(0, 64, 0);
    let other = BlockPos::new(5, 64, 5);
    let mut world = InMemoryWorld::new()
        .with_physics(support_physics)
        .with_block(base, BlockKind::Stone)
        .with_block(base.up(), BlockKind::Torch);
    let mut listener = RecordingListener::new().cancel_blocks_at(base.up());
    let mut tracker = PhaseTracker::default();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::BreakBlock);
        tracker.push_phase(kind, context).unwrap();
        tracker.set_block(&mut env, base, BlockState::AIR);
        tracker.set_block(&mut env, other, BlockState::of(BlockKind::Dirt));
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(world.kind_at(base), BlockKind::Stone);
    assert_eq!(world.kind_at(base.up()), BlockKind::Torch);
    assert_eq!(world.kind_at(other), BlockKind::Dirt);
    assert_eq!(report.blocks.cancelled, 2);
    assert_eq!(report.blocks.committed, 1);
    assert!(listener.drop_batches.is_empty());
    assert!(world.items().is_empty());
}

#[test]
fn falling_sand_cascade_runs_depth_first() {
    let base = BlockPos::new(0, 64, 0);
    let mut world = InMemoryWorld::new()
        .with_physics(support_physics)
        .with_block(base, BlockKind::Stone)
        .with_block(base.up(), BlockKind::Sand)
        .with_block(base.up().up(), BlockKind::Sand);
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::default();

    {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(PhaseKind::BlockTick, PhaseContext::block_tick(BlockSnapshot::air(base)))
            .unwrap();
        tracker.set_block(&mut env, base, BlockState::AIR);
        tracker.pop_phase(&mut env).unwrap();
    }

    let (a, b, c) = (base, base.up(), base.up().up());
    assert_eq!(listener.block_positions(), vec![a, b, c, b, a]);
    assert_eq!(world.kind_at(a), BlockKind::Sand);
    assert_eq!(world.kind_at(b), BlockKind::Sand);
    assert_eq!(world.kind_at(c), BlockKind::Air);
}

#[test]
fn cascade_depth_bound_drops_deep_reactions() {
    let base = BlockPos::new(0, 64, 0);
    let mut world = InMemoryWorld::new()
        .with_physics(support_physics)
        .with_block(base, BlockKind::Stone)
        .with_block(base.up(), BlockKind::Sand)
        .with_block(base.up().up(), BlockKind::Sand);
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::new(TrackerConfig::new().with_cascade_limits(1, 64));

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(PhaseKind::BlockTick, PhaseContext::block_tick(BlockSnapshot::air(base)))
            .unwrap();
        tracker.set_block(&mut env, base, BlockState::AIR);
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(report.blocks.dropped_reactions, 2);
    assert_eq!(report.blocks.committed, 3);
    assert_eq!(world.kind_at(base), BlockKind::Sand);
    assert_eq!(world.kind_at(base.up()), BlockKind::Air);
    assert_eq!(world.kind_at(base.up().up()), BlockKind::Sand);
}

#[test]
fn rollback_restores_exact_original_snapshot() {
    let chest_pos = BlockPos::new(1, 70, 1);
    let sibling = BlockPos::new(2, 70, 1);
    let chest = BlockSnapshot::new(chest_pos, BlockState::of(BlockKind::Chest))
        .with_tile_data(vec![1, 2, 3])
        .with_owner(EntityId(11));
    let mut world = InMemoryWorld::new();
    world.put(chest.clone());
    let mut listener = RecordingListener::new().cancel_blocks_at(chest_pos);
    let mut tracker = PhaseTracker::default();

    {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::BreakBlock);
        tracker.push_phase(kind, context).unwrap();
        tracker.set_block(&mut env, sibling, BlockState::STONE);
        tracker.set_block(&mut env, chest_pos, BlockState::AIR);
        tracker.pop_phase(&mut env).unwrap();
    }

    assert_eq!(world.read_block(chest_pos), chest);
    assert_eq!(world.kind_at(sibling), BlockKind::Stone);
    // placed blocks carry the packet's owner
    assert_eq!(world.read_block(sibling).owner, Some(EntityId(7)));
}

#[test]
fn listener_replacement_is_committed() {
    let pos = BlockPos::new(4, 64, 4);
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new().on_blocks(|change| {
        let mut dirt = change.proposal.value().clone();
        dirt.state = BlockState::of(BlockKind::Dirt);
        Ok(Verdict::Replace(dirt))
    });
    let mut tracker = PhaseTracker::default();

    let outcome = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker.set_block(&mut env, pos, BlockState::STONE)
    };

    assert!(matches!(outcome, SetBlockOutcome::Applied(tree) if tree.committed == 1));
    assert_eq!(world.kind_at(pos), BlockKind::Dirt);
}

#[test]
fn misplaced_replacement_and_listener_errors_cancel() {
    let pos = BlockPos::new(4, 64, 4);
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new().on_blocks(move |change| {
        if change.pos() == pos {
            Ok(Verdict::Replace(BlockSnapshot::new(BlockPos::ORIGIN, BlockState::STONE)))
        } else {
            Err(ListenerError::failed("test", "boom"))
        }
    });
    let mut tracker = PhaseTracker::default();

    let (moved, failed) = {
        let mut env = Env::new(&mut world, &mut listener);
        let moved = tracker.set_block(&mut env, pos, BlockState::STONE);
        let failed = tracker.set_block(&mut env, pos.up(), BlockState::STONE);
        (moved, failed)
    };

    assert!(moved.is_cancelled());
    assert!(failed.is_cancelled());
    assert_eq!(world.kind_at(pos), BlockKind::Air);
    assert_eq!(world.kind_at(BlockPos::ORIGIN), BlockKind::Air);
    assert_eq!(world.writes(), 0);
}

#[test]
fn failing_spawn_listener_cancels_whole_batch() {
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new().fail_spawns();
    let mut tracker = PhaseTracker::default();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(PhaseKind::EntityTick, PhaseContext::entity_tick(EntityId(1), EntityKind::Cow))
            .unwrap();
        for x in 0..3 {
            tracker.spawn_entity(&mut env, zombie(x));
        }
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(listener.spawn_batches.len(), 1);
    assert_eq!(report.cancelled_spawns, 3);
    assert!(report.spawned.is_empty());
    assert!(world.entities().is_empty());
}

#[test]
fn item_drops_are_pre_merged() {
    let here = BlockPos::new(0, 64, 0);
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::default();

    {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::DropItem);
        tracker.push_phase(kind, context).unwrap();
        for _ in 0..3 {
            tracker.drop_item(&mut env, ItemDrop::new(ItemStack::one(ItemKind::Dirt), here));
        }
        tracker.drop_item(&mut env, ItemDrop::new(ItemStack::one(ItemKind::Apple), here));
        tracker.pop_phase(&mut env).unwrap();
    }

    assert_eq!(listener.drop_batches.len(), 1);
    let batch = &listener.drop_batches[0].1;
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].stack, ItemStack::new(ItemKind::Dirt, 3));
    assert_eq!(world.items().len(), 2);
}

#[test]
fn leaked_buffers_are_force_applied() {
    let mut builder = PhaseStates::builder();
    builder.configure(PhaseKind::Generation(GenerationPhase::Population), |state| {
        state.set_flag(PolicyFlags::CAPTURE_ITEM_DROPS, true);
    });
    let mut tracker = PhaseTracker::with_states(TrackerConfig::default(), builder.build());
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(
                PhaseKind::Generation(GenerationPhase::Population),
                PhaseContext::generation(WorldId::OVERWORLD),
            )
            .unwrap();
        tracker.drop_item(
            &mut env,
            ItemDrop::new(ItemStack::one(ItemKind::Bone), BlockPos::ORIGIN),
        );
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(report.leaked, 1);
    assert!(!report.is_clean());
    assert_eq!(report.dropped.len(), 1);
    assert!(listener.drop_batches.is_empty());
    assert_eq!(world.items().len(), 1);
}

fn place_then_bail(tracker: &mut PhaseTracker, env: &mut Env<'_>) -> Result<(), PhaseError> {
    let (kind, context) = packet(PacketPhase::PlaceBlock);
    let mut guard = tracker.switch_to_phase(env, kind, context)?;
    let (tracker, env) = guard.parts();
    tracker.set_block(env, BlockPos::new(0, 64, 0), BlockState::STONE);
    Err(PhaseError::PopSentinel)
}

#[test]
fn guard_pops_on_early_return() {
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::default();

    {
        let mut env = Env::new(&mut world, &mut listener);
        assert!(place_then_bail(&mut tracker, &mut env).is_err());
    }

    assert_eq!(tracker.depth(), 0);
    assert_eq!(listener.blocks.len(), 1);
    assert_eq!(world.kind_at(BlockPos::new(0, 64, 0)), BlockKind::Stone);
    assert!(tracker.shutdown().is_ok());
}

#[test]
fn panicking_inside_a_phase_reverts_captures() {
    let pos = BlockPos::new(0, 64, 0);
    let mut world = InMemoryWorld::new().with_block(pos, BlockKind::Grass);
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::default();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::BreakBlock);
        let mut guard = tracker.switch_to_phase(&mut env, kind, context).unwrap();
        let (tracker, env) = guard.parts();
        tracker.set_block(env, pos, BlockState::AIR);
        panic!("handler bug");
    }));

    assert!(result.is_err());
    assert_eq!(tracker.depth(), 0);
    assert_eq!(world.kind_at(pos), BlockKind::Grass);
    assert!(listener.blocks.is_empty());
    assert!(tracker.shutdown().is_ok());
}

#[test]
fn repeated_captures_at_one_position_roll_back_to_the_pre_phase_block() {
    let base = BlockPos::new(0, 64, 0);
    let mut world = InMemoryWorld::new()
        .with_physics(support_physics)
        .with_block(base, BlockKind::Stone)
        .with_block(base.up(), BlockKind::Torch);
    let mut listener = RecordingListener::new().on_blocks(move |change| {
        let dirt = change.proposal.value().kind() == BlockKind::Dirt;
        Ok(if dirt || change.pos() == base.up() {
            Verdict::Cancel
        } else {
            Verdict::Accept
        })
    });
    let mut tracker = PhaseTracker::default();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::BreakBlock);
        tracker.push_phase(kind, context).unwrap();
        tracker.set_block(&mut env, base, BlockState::of(BlockKind::Dirt));
        tracker.set_block(&mut env, base, BlockState::AIR);
        tracker.pop_phase(&mut env).unwrap()
    };

    // dirt root, then air root with its torch child
    assert_eq!(listener.block_positions(), vec![base, base, base.up()]);
    assert_eq!(report.blocks.committed, 0);
    assert_eq!(report.blocks.cancelled, 3);
    assert_eq!(world.kind_at(base), BlockKind::Stone);
    assert_eq!(world.kind_at(base.up()), BlockKind::Torch);
    assert!(world.items().is_empty());
}

#[test]
fn later_capture_at_one_position_commits_over_a_cancelled_one() {
    let pos = BlockPos::new(2, 64, 2);
    let mut world = InMemoryWorld::new().with_block(pos, BlockKind::Grass);
    let mut listener = RecordingListener::new().on_blocks(|change| {
        Ok(if change.proposal.value().kind() == BlockKind::Dirt {
            Verdict::Cancel
        } else {
            Verdict::Accept
        })
    });
    let mut tracker = PhaseTracker::default();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::PlaceBlock);
        tracker.push_phase(kind, context).unwrap();
        tracker.set_block(&mut env, pos, BlockState::of(BlockKind::Dirt));
        tracker.set_block(&mut env, pos, BlockState::STONE);
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(report.blocks.committed, 1);
    assert_eq!(report.blocks.cancelled, 1);
    assert_eq!(world.kind_at(pos), BlockKind::Stone);
}

#[test]
fn panicking_block_listener_cancels_only_its_transaction() {
    let broken = BlockPos::new(0, 64, 0);
    let fine = BlockPos::new(3, 64, 0);
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new().on_blocks(move |change| {
        if change.pos() == broken {
            panic!("extension bug");
        }
        Ok(Verdict::Accept)
    });
    let mut tracker = PhaseTracker::default();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        let (kind, context) = packet(PacketPhase::PlaceBlock);
        tracker.push_phase(kind, context).unwrap();
        tracker.set_block(&mut env, broken, BlockState::STONE);
        tracker.set_block(&mut env, fine, BlockState::STONE);
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(report.blocks.cancelled, 1);
    assert_eq!(report.blocks.committed, 1);
    assert_eq!(world.kind_at(broken), BlockKind::Air);
    assert_eq!(world.kind_at(fine), BlockKind::Stone);
    assert_eq!(tracker.depth(), 0);
    assert!(tracker.shutdown().is_ok());
}

struct PanickingSpawns;

impl EventListener for PanickingSpawns {
    fn name(&self) -> &str {
        "panicking_spawns"
    }

    fn on_spawn_entity(
        &mut self,
        _cause: &Cause,
        _event: &mut SpawnEntityEvent,
    ) -> Result<(), ListenerError> {
        panic!("spawn hook bug")
    }
}

#[test]
fn panicking_spawn_listener_cancels_the_batch_and_pops() {
    let mut world = InMemoryWorld::new();
    let mut listener = PanickingSpawns;
    let mut tracker = PhaseTracker::default();
    let before = tracker.current_cause();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(
                PhaseKind::Generation(GenerationPhase::Population),
                PhaseContext::generation(WorldId::OVERWORLD),
            )
            .unwrap();
        tracker.spawn_entity(&mut env, zombie(0));
        tracker.spawn_entity(&mut env, zombie(1));
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(report.cancelled_spawns, 2);
    assert!(world.entities().is_empty());
    assert_eq!(tracker.depth(), 0);
    assert_eq!(tracker.current_cause(), before);
    assert!(tracker.shutdown().is_ok());
}

#[test]
fn each_push_unwinds_exactly_once() {
    let outer_pos = BlockPos::new(0, 64, 0);
    let inner_pos = BlockPos::new(1, 64, 0);
    let mut world = InMemoryWorld::new();
    let mut listener = RecordingListener::new();
    let mut tracker = PhaseTracker::default();

    let (inner, outer) = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(PhaseKind::EntityTick, PhaseContext::entity_tick(EntityId(2), EntityKind::Cow))
            .unwrap();
        tracker.set_block(&mut env, outer_pos, BlockState::STONE);
        tracker.spawn_entity(&mut env, zombie(0));

        tracker
            .push_phase(PhaseKind::BlockTick, PhaseContext::block_tick(BlockSnapshot::air(inner_pos)))
            .unwrap();
        tracker.set_block(&mut env, inner_pos, BlockState::STONE);
        tracker.spawn_entity(&mut env, zombie(1));
        let inner = tracker.pop_phase(&mut env).unwrap();
        let outer = tracker.pop_phase(&mut env).unwrap();
        (inner, outer)
    };

    assert_eq!(inner.passes, 1);
    assert_eq!(outer.passes, 1);
    assert_eq!(listener.block_positions(), vec![inner_pos, outer_pos]);
    assert_eq!(listener.spawn_batches.len(), 2);
    assert!(listener.spawn_batches.iter().all(|(_, batch)| batch.len() == 1));
    assert_eq!(world.entities().len(), 2);
    assert_eq!(tracker.depth(), 0);
}

#[test]
fn untracked_reactions_apply_without_dispatch() {
    let base = BlockPos::new(0, 64, 0);
    let kind = PhaseKind::Packet(PacketPhase::BreakBlock);
    let mut builder = PhaseStates::builder();
    builder.configure(kind, |state| {
        state.set_flag(PolicyFlags::TRACK_REACTIONS, false);
    });
    let mut tracker = PhaseTracker::with_states(TrackerConfig::default(), builder.build());
    let mut world = InMemoryWorld::new()
        .with_physics(support_physics)
        .with_block(base, BlockKind::Stone)
        .with_block(base.up(), BlockKind::Torch);
    let mut listener = RecordingListener::new();

    let report = {
        let mut env = Env::new(&mut world, &mut listener);
        tracker
            .push_phase(kind, PhaseContext::packet(&Steve, PacketPhase::BreakBlock))
            .unwrap();
        tracker.set_block(&mut env, base, BlockState::AIR);
        tracker.pop_phase(&mut env).unwrap()
    };

    assert_eq!(listener.block_positions(), vec![base]);
    assert_eq!(report.blocks.committed, 1);
    assert_eq!(world.kind_at(base.up()), BlockKind::Air);
    assert_eq!(world.items().len(), 1);
}
