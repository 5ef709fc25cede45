//! Event payloads published on the bus.
use serde::{Deserialize, Serialize};

use phase_core::{
    BlockPos, BlockState, EntityId, EntityKind, ItemStack, PhaseId, PhaseKind, SpawnType,
    UnwindReport, Verdict,
};

/// Listener verdict without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictKind {
    Accepted,
    Cancelled,
    Replaced,
}

impl<T> From<&Verdict<T>> for VerdictKind {
    fn from(verdict: &Verdict<T>) -> Self {
        match verdict {
            Verdict::Accept => Self::Accepted,
            Verdict::Cancel => Self::Cancelled,
            Verdict::Replace(_) => Self::Replaced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockEvent {
    /// Final verdict the listener chain reached for one block change.
    Verdict {
        phase: PhaseKind,
        pos: BlockPos,
        player: Option<EntityId>,
        reaction: bool,
        verdict: VerdictKind,
    },
    Committed {
        phase: PhaseKind,
        pos: BlockPos,
        state: BlockState,
    },
    RolledBack {
        phase: PhaseKind,
        pos: BlockPos,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityEvent {
    SpawnVerdict {
        phase: PhaseKind,
        kind: EntityKind,
        spawn_type: SpawnType,
        verdict: VerdictKind,
    },
    DropVerdict {
        phase: PhaseKind,
        stack: ItemStack,
        pos: BlockPos,
        verdict: VerdictKind,
    },
    Spawned {
        phase: PhaseKind,
        ids: Vec<EntityId>,
    },
    ItemsDropped {
        phase: PhaseKind,
        ids: Vec<EntityId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhaseEvent {
    Unwound(PhaseSummary),
    /// A phase could not be pushed.
    Rejected {
        kind: PhaseKind,
        code: String,
        reason: String,
    },
}

/// Serializable digest of an [`UnwindReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: PhaseId,
    pub kind: PhaseKind,
    pub passes: u32,
    pub committed_blocks: usize,
    pub cancelled_blocks: usize,
    pub dropped_reactions: usize,
    pub spawned: Vec<EntityId>,
    pub cancelled_spawns: usize,
    pub dropped: Vec<EntityId>,
    pub cancelled_drops: usize,
    pub leaked: usize,
    pub abandoned: bool,
}

impl PhaseSummary {
    pub fn is_clean(&self) -> bool {
        self.leaked == 0 && !self.abandoned
    }
}

impl From<&UnwindReport> for PhaseSummary {
    fn from(report: &UnwindReport) -> Self {
        Self {
            phase: report.phase,
            kind: report.kind,
            passes: report.passes,
            committed_blocks: report.blocks.committed,
            cancelled_blocks: report.blocks.cancelled,
            dropped_reactions: report.blocks.dropped_reactions,
            spawned: report.spawned.clone(),
            cancelled_spawns: report.cancelled_spawns,
            dropped: report.dropped.clone(),
            cancelled_drops: report.cancelled_drops,
            leaked: report.leaked,
            abandoned: report.abandoned,
        }
    }
}

/// Everything one simulation tick unwound, innermost phases first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: u64,
    pub phases: Vec<PhaseSummary>,
}

impl TickSummary {
    pub fn of_kind(&self, kind: PhaseKind) -> impl Iterator<Item = &PhaseSummary> {
        self.phases.iter().filter(move |summary| summary.kind == kind)
    }
}
