//! Phase states: immutable policy descriptors, one per [`PhaseKind`].
//!
//! A [`PhaseState`] is configured once (flags, compatible parents), then
//! baked. The tracker only ever holds baked states, looked up by kind from a
//! [`PhaseStates`] registry.
mod kind;
mod policy;
mod registry;

pub use kind::{GenerationPhase, PacketPhase, PhaseKind, PluginPhase};
pub use policy::{BufferKind, PolicyFlags, UnwindPlan};
pub use registry::{PhaseStates, PhaseStatesBuilder};

use std::collections::BTreeSet;
use std::fmt;

use crate::world::SpawnType;

/// Identifier of one phase activation (unique per tracker).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseId(pub u64);

impl PhaseId {
    /// Id of the idle sentinel.
    pub const SENTINEL: Self = Self(0);
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase#{}", self.0)
    }
}

/// Policy descriptor for one phase kind.
#[derive(Clone, Debug)]
pub struct PhaseState {
    kind: PhaseKind,
    flags: PolicyFlags,
    compatible: BTreeSet<PhaseKind>,
    baked: bool,
}

impl PhaseState {
    /// Unbaked state carrying the kind's default policy.
    pub fn new(kind: PhaseKind) -> Self {
        Self {
            kind,
            flags: kind.default_policy(),
            compatible: BTreeSet::new(),
            baked: false,
        }
    }

    /// Declares that this state may be pushed while `parent` is on top.
    ///
    /// # Panics
    ///
    /// Panics if the state is already baked.
    pub fn allow_parent(&mut self, parent: PhaseKind) -> &mut Self {
        self.assert_unbaked("add a compatible state");
        self.compatible.insert(parent);
        self
    }

    /// Overrides one policy flag.
    ///
    /// # Panics
    ///
    /// Panics if the state is already baked.
    pub fn set_flag(&mut self, flag: PolicyFlags, enabled: bool) -> &mut Self {
        self.assert_unbaked("change a policy flag");
        self.flags.set(flag, enabled);
        self
    }

    /// Freezes the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the state is already baked.
    pub fn bake(&mut self) {
        self.assert_unbaked("bake");
        self.baked = true;
    }

    fn assert_unbaked(&self, action: &str) {
        assert!(
            !self.baked,
            "attempted to {action} on baked phase state {}",
            self.kind
        );
    }

    pub fn is_baked(&self) -> bool {
        self.baked
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    pub fn flags(&self) -> PolicyFlags {
        self.flags
    }

    pub fn compatible_parents(&self) -> impl Iterator<Item = PhaseKind> + '_ {
        self.compatible.iter().copied()
    }

    /// Whether pushing this state over `parent` is expected.
    pub fn is_compatible_with(&self, parent: PhaseKind) -> bool {
        parent.is_idle()
            || self.flags.contains(PolicyFlags::QUIET_NESTING)
            || self.compatible.contains(&parent)
    }

    // ===== capture-or-apply questions =====

    pub fn captures_block_changes(&self) -> bool {
        self.flags.contains(PolicyFlags::CAPTURE_BLOCKS)
    }

    pub fn ignores_block_changes(&self) -> bool {
        self.flags.contains(PolicyFlags::IGNORE_BLOCKS)
    }

    pub fn captures_entity_spawns(&self) -> bool {
        self.flags.contains(PolicyFlags::CAPTURE_ENTITY_SPAWNS)
    }

    pub fn captures_item_drops(&self) -> bool {
        self.flags.contains(PolicyFlags::CAPTURE_ITEM_DROPS)
    }

    pub fn pre_merges_item_drops(&self) -> bool {
        self.flags.contains(PolicyFlags::PRE_MERGE_ITEM_DROPS)
    }

    // ===== attribution =====

    pub fn tracks_block_owner(&self) -> bool {
        self.flags.contains(PolicyFlags::TRACK_BLOCK_OWNER)
    }

    pub fn tracks_block_notifier(&self) -> bool {
        self.flags.contains(PolicyFlags::TRACK_BLOCK_NOTIFIER)
    }

    pub fn tracks_reactions(&self) -> bool {
        self.flags.contains(PolicyFlags::TRACK_REACTIONS)
    }

    pub fn dispatches_events(&self) -> bool {
        self.flags.contains(PolicyFlags::DISPATCH_EVENTS)
    }

    // ===== engine hints =====

    pub fn ignores_entity_collisions(&self) -> bool {
        self.flags.contains(PolicyFlags::IGNORE_ENTITY_COLLISIONS)
    }

    pub fn is_world_generation(&self) -> bool {
        self.flags.contains(PolicyFlags::WORLD_GENERATION)
    }

    pub fn is_tick(&self) -> bool {
        self.flags.contains(PolicyFlags::TICK)
    }

    pub fn is_packet(&self) -> bool {
        self.flags.contains(PolicyFlags::PACKET)
    }

    pub fn is_plugin(&self) -> bool {
        self.flags.contains(PolicyFlags::PLUGIN)
    }

    pub fn spawn_type(&self) -> SpawnType {
        self.kind.spawn_type()
    }

    pub fn unwind_plan(&self) -> UnwindPlan {
        self.kind.unwind_plan()
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}
