use std::collections::BTreeSet;

use tracing::debug;

use phase_core::{
    BlockPos, Cause, ChangeBlockEvent, DropItemEvent, EntityId, EventListener, ListenerError,
    PlayerSession,
};

use super::HostListener;

/// Cancels block changes and item drops a non-operator player causes near
/// spawn.
///
/// The player is whoever appears first in the cause chain, so reactions to a
/// player's change are protected as well.
pub struct SpawnProtection {
    center: BlockPos,
    radius: u32,
    operators: BTreeSet<EntityId>,
}

impl SpawnProtection {
    pub fn new(center: BlockPos, radius: u32) -> Self {
        Self {
            center,
            radius,
            operators: BTreeSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.radius > 0
    }

    pub fn protects(&self, pos: BlockPos) -> bool {
        self.is_enabled() && pos.horizontal_distance(self.center) <= self.radius
    }
}

impl EventListener for SpawnProtection {
    fn name(&self) -> &str {
        "spawn_protection"
    }

    fn on_change_block(
        &mut self,
        cause: &Cause,
        event: &mut ChangeBlockEvent,
    ) -> Result<(), ListenerError> {
        let Some(player) = cause.first_player() else {
            return Ok(());
        };
        if self.operators.contains(&player) {
            return Ok(());
        }
        for change in &mut event.changes {
            if self.protects(change.pos()) {
                debug!(
                    target: "phase_host::listeners",
                    %player,
                    pos = %change.pos(),
                    "block change inside spawn protection cancelled"
                );
                change.proposal.cancel();
            }
        }
        Ok(())
    }

    fn on_drop_item(
        &mut self,
        cause: &Cause,
        event: &mut DropItemEvent,
    ) -> Result<(), ListenerError> {
        let Some(player) = cause.first_player() else {
            return Ok(());
        };
        if self.operators.contains(&player) {
            return Ok(());
        }
        for drop in &mut event.drops {
            if self.protects(drop.value().pos) {
                drop.cancel();
            }
        }
        Ok(())
    }
}

impl HostListener for SpawnProtection {
    fn priority(&self) -> i32 {
        -100
    }

    fn observe_session(&mut self, session: &dyn PlayerSession) {
        if session.is_operator() {
            self.operators.insert(session.player_id());
        } else {
            self.operators.remove(&session.player_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use phase_core::{
        BlockKind, BlockState, BlockStorage, Env, PacketPhase, PhaseContext, PhaseKind,
        PhaseTracker, WorldId,
    };

    use super::*;
    use crate::session::Session;
    use crate::world::VoxelWorld;

    const NEAR: BlockPos = BlockPos::new(1, 5, -2);
    const FAR: BlockPos = BlockPos::new(6, 5, 0);

    fn place_both(protection: &mut SpawnProtection, session: &Session) -> VoxelWorld {
        let mut world = VoxelWorld::new(WorldId(0));
        let mut tracker = PhaseTracker::default();
        protection.observe_session(session);
        {
            let mut env = Env::new(&mut world, protection);
            let mut phase = tracker
                .switch_to_phase(
                    &mut env,
                    PhaseKind::Packet(PacketPhase::PlaceBlock),
                    PhaseContext::packet(session, PacketPhase::PlaceBlock),
                )
                .unwrap();
            let (tracker, env) = phase.parts();
            tracker.set_block(env, NEAR, BlockState::STONE);
            tracker.set_block(env, FAR, BlockState::STONE);
            phase.finish().unwrap();
        }
        world
    }

    #[test]
    fn players_cannot_build_near_spawn() {
        let mut protection = SpawnProtection::new(BlockPos::ORIGIN, 2);
        let world = place_both(&mut protection, &Session::new(EntityId(900)));

        assert_eq!(world.read_block(NEAR).kind(), BlockKind::Air);
        assert_eq!(world.read_block(FAR).kind(), BlockKind::Stone);
    }

    #[test]
    fn operators_bypass_protection_until_demoted() {
        let mut protection = SpawnProtection::new(BlockPos::ORIGIN, 2);
        let operator = Session::new(EntityId(901)).as_operator();
        let world = place_both(&mut protection, &operator);
        assert_eq!(world.read_block(NEAR).kind(), BlockKind::Stone);

        let demoted = Session::new(EntityId(901));
        let world = place_both(&mut protection, &demoted);
        assert_eq!(world.read_block(NEAR).kind(), BlockKind::Air);
    }

    #[test]
    fn zero_radius_disables_protection() {
        let protection = SpawnProtection::new(BlockPos::ORIGIN, 0);
        assert!(!protection.protects(BlockPos::ORIGIN));
        assert!(SpawnProtection::new(BlockPos::ORIGIN, 1).protects(BlockPos::new(1, 90, 1)));
    }
}
