//! Simulation worker that owns the phase tracker and the world.
//!
//! Receives commands from [`crate::HostHandle`], runs every mutation inside
//! the phase that explains it and publishes unwind results to the EventBus.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use phase_core::{
    BlockKind, BlockPos, BlockSnapshot, BlockState, BlockStorage, EntityId, EntityKind,
    EntitySpawn, Env, GenerationPhase, ItemDrop, ItemStack, PhaseContext, PhaseError, PhaseKind,
    PhaseTracker, PluginId, PluginPhase, TrackerError, UnwindReport,
};

use crate::api::{HostError, Result};
use crate::events::{
    BlockEvent, EntityEvent, Event, EventBus, PhaseEvent, PhaseSummary, TickSummary,
};
use crate::listeners::ListenerRegistry;
use crate::session::{Packet, Session};
use crate::world::{self, MIN_Y, Mob, SURFACE_Y, TERRAIN_LAYERS, VoxelWorld};

/// Ticks between breeding attempts.
const BREEDING_INTERVAL: u64 = 4;

/// Breeding stops once this many mobs are alive.
const MOB_CAP: usize = 64;

/// Plugin id the host uses for commands issued through its handle.
const HOST_PLUGIN: &str = "phase-host";

/// Mobs placed on the surface when the spawn area is populated.
const POPULATION: [EntityKind; 4] = [
    EntityKind::Cow,
    EntityKind::Sheep,
    EntityKind::Cow,
    EntityKind::Zombie,
];

/// Commands that can be sent to the simulation worker
pub enum Command {
    /// Handle one client packet inside its packet phase.
    Packet {
        session: Session,
        packet: Packet,
        reply: oneshot::Sender<Result<PhaseSummary>>,
    },
    /// Advance the simulation by one tick.
    Tick {
        reply: oneshot::Sender<Result<TickSummary>>,
    },
    /// Read a block (read-only).
    QueryBlock {
        pos: BlockPos,
        reply: oneshot::Sender<BlockSnapshot>,
    },
    /// Spawn an entity on behalf of the host itself.
    SpawnEntity {
        kind: EntityKind,
        pos: BlockPos,
        reply: oneshot::Sender<Result<Option<EntityId>>>,
    },
    /// Verify the phase stack is empty and stop the worker.
    Shutdown { reply: oneshot::Sender<Result<()>> },
}

/// Background task that owns the tracker, the world and the listener chain.
///
/// All phase work is synchronous inside this task; the tracker is never
/// shared.
pub struct SimulationWorker {
    tracker: PhaseTracker,
    world: VoxelWorld,
    listeners: ListenerRegistry,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
    tick: u64,
}

impl SimulationWorker {
    pub fn new(
        tracker: PhaseTracker,
        world: VoxelWorld,
        listeners: ListenerRegistry,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
    ) -> Self {
        info!(
            target: "phase_host::worker",
            world = %world.id(),
            listeners = listeners.len(),
            max_phase_depth = tracker.config().max_phase_depth,
            "simulation worker initialized"
        );

        Self {
            tracker,
            world,
            listeners,
            command_rx,
            event_bus,
            tick: 0,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        let mut stopped = false;
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    if !self.handle_command(cmd) {
                        stopped = true;
                        break;
                    }
                }
                else => break,
            }
        }

        if !stopped && self.tracker.shutdown().is_err() {
            warn!(
                target: "phase_host::worker",
                "command channel closed with phases still open"
            );
        }
        info!(target: "phase_host::worker", tick = self.tick, "simulation worker stopped");
    }

    /// Returns false once the worker should stop.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Packet {
                session,
                packet,
                reply,
            } => {
                let result = self.handle_packet(session, packet);
                if reply.send(result).is_err() {
                    debug!("Packet reply channel closed (caller dropped)");
                }
            }
            Command::Tick { reply } => {
                let result = self.run_tick();
                if reply.send(result).is_err() {
                    debug!("Tick reply channel closed (caller dropped)");
                }
            }
            Command::QueryBlock { pos, reply } => {
                if reply.send(self.world.read_block(pos)).is_err() {
                    debug!("QueryBlock reply channel closed (caller dropped)");
                }
            }
            Command::SpawnEntity { kind, pos, reply } => {
                let result = self.handle_spawn(kind, pos);
                if reply.send(result).is_err() {
                    debug!("SpawnEntity reply channel closed (caller dropped)");
                }
            }
            Command::Shutdown { reply } => {
                let result = self.tracker.shutdown().map_err(HostError::from);
                if reply.send(result).is_err() {
                    debug!("Shutdown reply channel closed (caller dropped)");
                }
                return false;
            }
        }
        true
    }

    /// Lays out flat terrain around spawn and populates it.
    ///
    /// Terrain writes bypass tracking; the population spawns reach listeners
    /// as one batch.
    pub fn generate(&mut self, radius: u32) -> Result<Vec<PhaseSummary>> {
        let world_id = self.world.id();
        let reach = radius.min(1024) as i32;
        let bus = &self.event_bus;

        let mut env = Env::new(&mut self.world, &mut self.listeners);

        let kind = PhaseKind::Generation(GenerationPhase::Terrain);
        let mut terrain = self
            .tracker
            .switch_to_phase(&mut env, kind, PhaseContext::generation(world_id))
            .map_err(|error| rejected(bus, kind, error))?;
        let (tracker, env_ref) = terrain.parts();
        for x in -reach..=reach {
            for z in -reach..=reach {
                for (dy, layer) in (0..).zip(TERRAIN_LAYERS) {
                    let pos = BlockPos::new(x, MIN_Y + dy, z);
                    tracker.set_block(env_ref, pos, BlockState::of(layer));
                }
            }
        }
        let terrain = terrain.finish()?;

        let kind = PhaseKind::Generation(GenerationPhase::Population);
        let mut population = self
            .tracker
            .switch_to_phase(&mut env, kind, PhaseContext::generation(world_id))
            .map_err(|error| rejected(bus, kind, error))?;
        let (tracker, env_ref) = population.parts();
        let spawn_type = tracker.current_state().spawn_type();
        for (i, mob) in (0..).zip(POPULATION) {
            let pos = BlockPos::new(-reach + 2 * i, SURFACE_Y + 1, reach);
            tracker.spawn_entity(env_ref, EntitySpawn::new(mob, pos, spawn_type));
        }
        let population = population.finish()?;

        info!(
            target: "phase_host::worker",
            radius,
            blocks = self.world.block_count(),
            chunks = self.world.chunk_count(),
            mobs = population.spawned.len(),
            "spawn area generated"
        );

        let reports = [terrain, population];
        for report in &reports {
            self.publish(report);
        }
        Ok(reports.iter().map(PhaseSummary::from).collect())
    }

    fn handle_packet(&mut self, session: Session, packet: Packet) -> Result<PhaseSummary> {
        self.listeners.observe_session(&session);

        let kind = PhaseKind::Packet(packet.phase());
        let mut context = PhaseContext::packet(&session, packet.phase());
        if let Some(pos) = packet.target() {
            context = context.with_block_hit(pos);
        }

        let bus = &self.event_bus;
        let report = {
            let mut env = Env::new(&mut self.world, &mut self.listeners);
            let mut phase = self
                .tracker
                .switch_to_phase(&mut env, kind, context)
                .map_err(|error| rejected(bus, kind, error))?;
            let (tracker, env) = phase.parts();
            apply_packet(tracker, env, &packet)?;
            phase.finish()?
        };

        debug!(
            target: "phase_host::worker",
            player = %session.player,
            phase = %report.phase,
            phase_kind = %report.kind,
            committed = report.blocks.committed,
            cancelled = report.blocks.cancelled,
            "packet handled"
        );
        self.publish(&report);
        Ok(PhaseSummary::from(&report))
    }

    /// Dimension tick, then due block ticks, then entity ticks.
    fn run_tick(&mut self) -> Result<TickSummary> {
        self.tick += 1;
        let tick = self.tick;
        let due = self.world.take_due_ticks(tick);
        let mobs = self.world.mobs();
        let crowded = mobs.len() >= MOB_CAP;
        let world_id = self.world.id();
        let bus = &self.event_bus;

        let mut reports = Vec::new();
        let mut steps = Vec::new();
        {
            let mut env = Env::new(&mut self.world, &mut self.listeners);
            let mut dimension = self
                .tracker
                .switch_to_phase(
                    &mut env,
                    PhaseKind::DimensionTick,
                    PhaseContext::dimension_tick(world_id),
                )
                .map_err(|error| rejected(bus, PhaseKind::DimensionTick, error))?;

            for pos in due {
                let (tracker, env) = dimension.parts();
                reports.push(tick_block(tracker, env, bus, pos)?);
            }
            for mob in &mobs {
                let (tracker, env) = dimension.parts();
                let (report, step) = tick_entity(tracker, env, bus, mob, tick, crowded)?;
                reports.push(report);
                steps.extend(step.map(|to| (mob.id, to)));
            }
            reports.push(dimension.finish()?);
        }

        for (id, to) in steps {
            self.world.move_mob(id, to);
        }
        for report in &reports {
            self.publish(report);
        }

        debug!(
            target: "phase_host::worker",
            tick,
            phases = reports.len(),
            pending_ticks = self.world.pending_ticks(),
            "tick complete"
        );
        Ok(TickSummary {
            tick,
            phases: reports.iter().map(PhaseSummary::from).collect(),
        })
    }

    fn handle_spawn(&mut self, kind: EntityKind, pos: BlockPos) -> Result<Option<EntityId>> {
        let phase_kind = PhaseKind::Plugin(PluginPhase::Command);
        let bus = &self.event_bus;
        let report = {
            let mut env = Env::new(&mut self.world, &mut self.listeners);
            let mut phase = self
                .tracker
                .switch_to_phase(
                    &mut env,
                    phase_kind,
                    PhaseContext::plugin(PluginId::new(HOST_PLUGIN)),
                )
                .map_err(|error| rejected(bus, phase_kind, error))?;
            let (tracker, env) = phase.parts();
            let spawn_type = tracker.current_state().spawn_type();
            tracker.spawn_entity(env, EntitySpawn::new(kind, pos, spawn_type));
            phase.finish()?
        };
        self.publish(&report);
        Ok(report.spawned.first().copied())
    }

    fn publish(&self, report: &UnwindReport) {
        let phase = report.kind;
        for tx in report.committed_blocks() {
            let state = tx.committed().map_or(tx.proposed().state, |snapshot| snapshot.state);
            self.event_bus.publish(Event::Block(BlockEvent::Committed {
                phase,
                pos: tx.pos(),
                state,
            }));
        }
        for tx in report.cancelled_blocks() {
            self.event_bus.publish(Event::Block(BlockEvent::RolledBack {
                phase,
                pos: tx.pos(),
            }));
        }
        if !report.spawned.is_empty() {
            self.event_bus.publish(Event::Entity(EntityEvent::Spawned {
                phase,
                ids: report.spawned.clone(),
            }));
        }
        if !report.dropped.is_empty() {
            self.event_bus.publish(Event::Entity(EntityEvent::ItemsDropped {
                phase,
                ids: report.dropped.clone(),
            }));
        }
        self.event_bus
            .publish(Event::Phase(PhaseEvent::Unwound(PhaseSummary::from(report))));
    }
}

/// Publishes a rejected push and converts the error.
fn rejected(bus: &EventBus, kind: PhaseKind, error: PhaseError) -> HostError {
    bus.publish(Event::Phase(PhaseEvent::Rejected {
        kind,
        code: error.error_code().to_owned(),
        reason: error.to_string(),
    }));
    HostError::Phase(error)
}

fn apply_packet(tracker: &mut PhaseTracker, env: &mut Env<'_>, packet: &Packet) -> Result<()> {
    match packet {
        Packet::PlaceBlock { pos, state } => {
            let mut snapshot = BlockSnapshot::new(*pos, *state);
            if state.kind.has_tile_data() {
                snapshot = snapshot.with_tile_data(Vec::new());
            }
            tracker.set_block_snapshot(env, snapshot);
        }
        Packet::BreakBlock { pos } => match env.world.read_block(*pos).kind() {
            BlockKind::Air => {}
            BlockKind::Bedrock => return Err(HostError::Unbreakable { pos: *pos }),
            kind => {
                tracker.set_block(env, *pos, BlockState::AIR);
                if let Some(item) = world::item_for(kind) {
                    tracker.drop_item(env, ItemDrop::new(ItemStack::one(item), *pos));
                }
            }
        },
        Packet::DropItem { stack, pos } => {
            tracker.drop_item(env, ItemDrop::new(*stack, *pos));
        }
    }
    Ok(())
}

/// Scheduled tick of the block at `pos`: unsupported falling blocks drop one.
fn tick_block(
    tracker: &mut PhaseTracker,
    env: &mut Env<'_>,
    bus: &EventBus,
    pos: BlockPos,
) -> Result<UnwindReport> {
    let snapshot = env.world.read_block(pos);
    let state = snapshot.state;
    let mut phase = tracker
        .switch_to_phase(env, PhaseKind::BlockTick, PhaseContext::block_tick(snapshot))
        .map_err(|error| rejected(bus, PhaseKind::BlockTick, error))?;
    let (tracker, env) = phase.parts();

    let below = pos.down();
    if state.kind.has_gravity()
        && below.y >= MIN_Y
        && env.world.read_block(below).kind().is_air()
    {
        tracker.set_block(env, pos, BlockState::AIR);
        tracker.set_block(env, below, state);
    }
    Ok(phase.finish()?)
}

/// One entity tick: wanderers step forward, zombies dig through what blocks
/// them, animals breed.
fn tick_entity(
    tracker: &mut PhaseTracker,
    env: &mut Env<'_>,
    bus: &EventBus,
    mob: &Mob,
    tick: u64,
    crowded: bool,
) -> Result<(UnwindReport, Option<BlockPos>)> {
    let mut phase = tracker
        .switch_to_phase(
            env,
            PhaseKind::EntityTick,
            PhaseContext::entity_tick(mob.id, mob.kind),
        )
        .map_err(|error| rejected(bus, PhaseKind::EntityTick, error))?;
    let (tracker, env) = phase.parts();

    let ahead = mob.pos.offset(1, 0, 0);
    let obstacle = env.world.read_block(ahead).kind();
    let blocked =
        !obstacle.is_air() && !tracker.current_state().ignores_entity_collisions();

    if blocked && mob.kind == EntityKind::Zombie && obstacle != BlockKind::Bedrock {
        tracker.set_block(env, ahead, BlockState::AIR);
    }
    if mob.breeds() && !crowded && tick % BREEDING_INTERVAL == 0 {
        let spawn_type = tracker.current_state().spawn_type();
        tracker.spawn_entity(env, EntitySpawn::new(mob.kind, mob.pos, spawn_type));
    }

    let step = (mob.wanders() && !blocked).then_some(ahead);
    Ok((phase.finish()?, step))
}
