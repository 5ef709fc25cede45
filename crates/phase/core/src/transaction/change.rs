use std::fmt;

use crate::state::{PhaseId, PhaseKind};
use crate::world::{BlockPos, BlockSnapshot};

/// Index of a transaction inside its [`super::TransactionForest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub(crate) u32);

impl TxId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// What a transaction does to its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Place,
    Break,
    Modify,
    /// Originated from engine physics reacting to another change.
    Reaction,
}

impl ChangeKind {
    pub fn classify(original: &BlockSnapshot, proposed: &BlockSnapshot) -> Self {
        match (original.kind().is_air(), proposed.kind().is_air()) {
            (true, false) => Self::Place,
            (false, true) => Self::Break,
            _ => Self::Modify,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Committed,
    Cancelled,
}

/// The phase activation a transaction was recorded under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxOrigin {
    pub phase: PhaseId,
    pub kind: PhaseKind,
}

/// One attempted block mutation.
///
/// Everything except the status, the committed snapshot and the child list is
/// fixed when the transaction is recorded.
#[derive(Clone, Debug)]
pub struct BlockTransaction {
    id: TxId,
    original: BlockSnapshot,
    proposed: BlockSnapshot,
    kind: ChangeKind,
    origin: TxOrigin,
    parent: Option<TxId>,
    depth: u32,
    /// Proposed state was written to storage when it was captured.
    written_through: bool,
    children: Vec<TxId>,
    status: TxStatus,
    committed: Option<BlockSnapshot>,
}

impl BlockTransaction {
    pub(super) fn new(
        id: TxId,
        original: BlockSnapshot,
        proposed: BlockSnapshot,
        kind: ChangeKind,
        origin: TxOrigin,
        parent: Option<(TxId, u32)>,
    ) -> Self {
        Self {
            id,
            original,
            proposed,
            kind,
            origin,
            parent: parent.map(|(id, _)| id),
            depth: parent.map_or(0, |(_, depth)| depth + 1),
            written_through: false,
            children: Vec::new(),
            status: TxStatus::Pending,
            committed: None,
        }
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    pub fn pos(&self) -> BlockPos {
        self.proposed.pos
    }

    /// Snapshot read from storage when the transaction was recorded.
    pub fn original(&self) -> &BlockSnapshot {
        &self.original
    }

    pub fn proposed(&self) -> &BlockSnapshot {
        &self.proposed
    }

    /// Snapshot actually written, which differs from [`Self::proposed`] when a
    /// listener substituted its own.
    pub fn committed(&self) -> Option<&BlockSnapshot> {
        self.committed.as_ref()
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn origin(&self) -> TxOrigin {
        self.origin
    }

    pub fn parent(&self) -> Option<TxId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Distance from the root of its tree.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn children(&self) -> &[TxId] {
        &self.children
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == TxStatus::Cancelled
    }

    pub fn is_written_through(&self) -> bool {
        self.written_through
    }

    pub(crate) fn mark_written_through(&mut self) {
        self.written_through = true;
    }

    pub(crate) fn mark_committed(&mut self, committed: BlockSnapshot) {
        self.status = TxStatus::Committed;
        self.committed = Some(committed);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.status = TxStatus::Cancelled;
        self.committed = None;
    }

    pub(super) fn push_child(&mut self, child: TxId) {
        self.children.push(child);
    }
}

impl fmt::Display for BlockTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {} ({})",
            self.id, self.kind, self.original, self.proposed.state, self.status
        )
    }
}
