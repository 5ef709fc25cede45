use crate::state::PhaseKind;
use crate::transaction::{ChangeKind, TxId};
use crate::world::{BlockPos, BlockSnapshot, EntitySpawn, ItemDrop, SpawnType};

/// Outcome a listener assigns to one proposal.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Verdict<T> {
    #[default]
    Accept,
    Cancel,
    /// Apply this value instead of the proposal.
    Replace(T),
}

/// A proposed value plus the verdict listeners have assigned so far.
///
/// Later listeners see earlier verdicts and may override them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal<T> {
    value: T,
    verdict: Verdict<T>,
}

impl<T> Proposal<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            verdict: Verdict::Accept,
        }
    }

    /// The value as originally proposed.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn verdict(&self) -> &Verdict<T> {
        &self.verdict
    }

    pub fn accept(&mut self) {
        self.verdict = Verdict::Accept;
    }

    pub fn cancel(&mut self) {
        self.verdict = Verdict::Cancel;
    }

    pub fn replace(&mut self, value: T) {
        self.verdict = Verdict::Replace(value);
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.verdict, Verdict::Cancel)
    }

    /// The value that will be applied, if any.
    pub fn effective(&self) -> Option<&T> {
        match &self.verdict {
            Verdict::Accept => Some(&self.value),
            Verdict::Cancel => None,
            Verdict::Replace(value) => Some(value),
        }
    }

    pub fn into_effective(self) -> Option<T> {
        match self.verdict {
            Verdict::Accept => Some(self.value),
            Verdict::Cancel => None,
            Verdict::Replace(value) => Some(value),
        }
    }
}

/// One block transaction as presented to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockChange {
    pub tx: TxId,
    pub kind: ChangeKind,
    /// Distance from the root of the transaction tree; zero for direct changes.
    pub depth: u32,
    pub original: BlockSnapshot,
    pub proposal: Proposal<BlockSnapshot>,
}

impl BlockChange {
    pub fn pos(&self) -> BlockPos {
        self.original.pos
    }

    pub fn is_reaction(&self) -> bool {
        self.depth > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeBlockEvent {
    pub phase: PhaseKind,
    pub changes: Vec<BlockChange>,
}

impl ChangeBlockEvent {
    pub fn cancel_all(&mut self) {
        for change in &mut self.changes {
            change.proposal.cancel();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnEntityEvent {
    pub phase: PhaseKind,
    pub spawn_type: SpawnType,
    pub entities: Vec<Proposal<EntitySpawn>>,
}

impl SpawnEntityEvent {
    pub fn new(phase: PhaseKind, spawn_type: SpawnType, entities: Vec<EntitySpawn>) -> Self {
        Self {
            phase,
            spawn_type,
            entities: entities.into_iter().map(Proposal::new).collect(),
        }
    }

    pub fn cancel_all(&mut self) {
        for entity in &mut self.entities {
            entity.cancel();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropItemEvent {
    pub phase: PhaseKind,
    pub drops: Vec<Proposal<ItemDrop>>,
}

impl DropItemEvent {
    pub fn new(phase: PhaseKind, drops: Vec<ItemDrop>) -> Self {
        Self {
            phase,
            drops: drops.into_iter().map(Proposal::new).collect(),
        }
    }

    pub fn cancel_all(&mut self) {
        for drop in &mut self.drops {
            drop.cancel();
        }
    }
}
