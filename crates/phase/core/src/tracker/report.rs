//! Results of unwinding a phase and diagnostics of the live stack.
use std::fmt;

use crate::state::{BufferKind, PhaseId, PhaseKind};
use crate::transaction::{BlockTransaction, TxStatus};
use crate::world::EntityId;

use super::PhaseStatus;

/// Outcome of processing one transaction tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeOutcome {
    pub committed: usize,
    pub cancelled: usize,
    /// Reactions discarded because a cascade bound was reached.
    pub dropped_reactions: usize,
}

impl TreeOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.committed == 0 && self.cancelled > 0
    }

    pub(crate) fn absorb(&mut self, other: Self) {
        self.committed += other.committed;
        self.cancelled += other.cancelled;
        self.dropped_reactions += other.dropped_reactions;
    }
}

/// Everything that happened while one phase unwound.
#[derive(Clone, Debug)]
pub struct UnwindReport {
    pub phase: PhaseId,
    pub kind: PhaseKind,
    /// Drain passes performed.
    pub passes: u32,
    /// Every block transaction processed, in pre-order per pass.
    pub transactions: Vec<BlockTransaction>,
    pub blocks: TreeOutcome,
    pub spawned: Vec<EntityId>,
    pub cancelled_spawns: usize,
    pub dropped: Vec<EntityId>,
    pub cancelled_drops: usize,
    /// Captures still buffered at close, force-applied without dispatch.
    pub leaked: usize,
    /// Frame was torn down during a panic without dispatch.
    pub abandoned: bool,
}

impl UnwindReport {
    pub(crate) fn new(phase: PhaseId, kind: PhaseKind) -> Self {
        Self {
            phase,
            kind,
            passes: 0,
            transactions: Vec::new(),
            blocks: TreeOutcome::default(),
            spawned: Vec::new(),
            cancelled_spawns: 0,
            dropped: Vec::new(),
            cancelled_drops: 0,
            leaked: 0,
            abandoned: false,
        }
    }

    pub fn committed_blocks(&self) -> impl Iterator<Item = &BlockTransaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.status() == TxStatus::Committed)
    }

    pub fn cancelled_blocks(&self) -> impl Iterator<Item = &BlockTransaction> {
        self.transactions.iter().filter(|tx| tx.is_cancelled())
    }

    pub fn is_clean(&self) -> bool {
        self.leaked == 0 && !self.abandoned
    }
}

/// One frame in a [`StackDump`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSummary {
    pub id: PhaseId,
    pub kind: PhaseKind,
    pub status: PhaseStatus,
    pub pending_blocks: usize,
    pub pending_entities: usize,
    pub pending_items: usize,
}

/// Snapshot of the phase stack, top first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackDump {
    pub frames: Vec<FrameSummary>,
    pub cause_depth: usize,
}

impl FrameSummary {
    pub fn pending(&self, buffer: BufferKind) -> usize {
        match buffer {
            BufferKind::Blocks => self.pending_blocks,
            BufferKind::Entities => self.pending_entities,
            BufferKind::Items => self.pending_items,
        }
    }
}

impl fmt::Display for StackDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "phase stack ({} frame(s), {} cause(s)):",
            self.frames.len(),
            self.cause_depth
        )?;
        for frame in &self.frames {
            write!(f, "  {} {} [{}]", frame.id, frame.kind, frame.status)?;
            for buffer in BufferKind::ALL {
                let pending = frame.pending(buffer);
                if pending > 0 {
                    write!(f, " {buffer}={pending}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
