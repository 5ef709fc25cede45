use super::{BlockTransaction, ChangeKind, TxId, TxOrigin};
use crate::world::BlockSnapshot;

/// Arena of block transactions organised as a forest.
///
/// Transactions are only ever appended. A child is always inserted after its
/// parent and its parent never changes, so the structure cannot form cycles.
#[derive(Clone, Debug, Default)]
pub struct TransactionForest {
    nodes: Vec<BlockTransaction>,
    roots: Vec<TxId>,
}

impl TransactionForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new root transaction.
    pub fn push_root(
        &mut self,
        original: BlockSnapshot,
        proposed: BlockSnapshot,
        origin: TxOrigin,
    ) -> TxId {
        let id = self.next_id();
        let kind = ChangeKind::classify(&original, &proposed);
        self.nodes.push(BlockTransaction::new(
            id, original, proposed, kind, origin, None,
        ));
        self.roots.push(id);
        id
    }

    /// Records a reaction caused by `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this forest.
    pub fn push_child(
        &mut self,
        parent: TxId,
        original: BlockSnapshot,
        proposed: BlockSnapshot,
        origin: TxOrigin,
    ) -> TxId {
        let id = self.next_id();
        let parent_depth = self.nodes[parent.index()].depth();
        self.nodes.push(BlockTransaction::new(
            id,
            original,
            proposed,
            ChangeKind::Reaction,
            origin,
            Some((parent, parent_depth)),
        ));
        self.nodes[parent.index()].push_child(id);
        id
    }

    fn next_id(&self) -> TxId {
        TxId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX))
    }

    pub fn get(&self, id: TxId) -> Option<&BlockTransaction> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: TxId) -> Option<&mut BlockTransaction> {
        self.nodes.get_mut(id.index())
    }

    pub fn roots(&self) -> &[TxId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Transactions in recording order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &BlockTransaction> {
        self.nodes.iter()
    }

    /// Pre-order walk over every tree, roots in recording order.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            forest: self,
            work: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Pre-order walk over the tree rooted at `root`.
    pub fn tree(&self, root: TxId) -> PreOrder<'_> {
        PreOrder {
            forest: self,
            work: vec![root],
        }
    }
}

/// Pre-order iterator driven by an explicit work-list.
pub struct PreOrder<'a> {
    forest: &'a TransactionForest,
    work: Vec<TxId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a BlockTransaction;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.work.pop()?;
        let node = self.forest.get(id)?;
        self.work.extend(node.children().iter().rev().copied());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PhaseId, PhaseKind};
    use crate::world::{BlockKind, BlockPos, BlockState};

    fn origin() -> TxOrigin {
        TxOrigin {
            phase: PhaseId(1),
            kind: PhaseKind::BlockTick,
        }
    }

    fn snap(x: i32, kind: BlockKind) -> BlockSnapshot {
        BlockSnapshot::new(BlockPos::new(x, 0, 0), BlockState::of(kind))
    }

    #[test]
    fn pre_order_visits_children_before_next_root() {
        let mut forest = TransactionForest::new();
        let a = forest.push_root(snap(0, BlockKind::Air), snap(0, BlockKind::Stone), origin());
        let b = forest.push_root(snap(1, BlockKind::Air), snap(1, BlockKind::Dirt), origin());
        let a1 = forest.push_child(a, snap(2, BlockKind::Air), snap(2, BlockKind::Sand), origin());
        let a1x = forest.push_child(a1, snap(3, BlockKind::Sand), snap(3, BlockKind::Air), origin());
        let a2 = forest.push_child(a, snap(4, BlockKind::Air), snap(4, BlockKind::Torch), origin());

        let order: Vec<TxId> = forest.pre_order().map(BlockTransaction::id).collect();
        assert_eq!(order, vec![a, a1, a1x, a2, b]);

        let tree: Vec<TxId> = forest.tree(a1).map(BlockTransaction::id).collect();
        assert_eq!(tree, vec![a1, a1x]);
    }

    #[test]
    fn children_record_parent_and_depth() {
        let mut forest = TransactionForest::new();
        let root = forest.push_root(snap(0, BlockKind::Stone), snap(0, BlockKind::Air), origin());
        let child = forest.push_child(root, snap(1, BlockKind::Sand), snap(1, BlockKind::Air), origin());

        let root_tx = forest.get(root).unwrap();
        assert_eq!(root_tx.kind(), ChangeKind::Break);
        assert_eq!(root_tx.children(), &[child]);

        let child_tx = forest.get(child).unwrap();
        assert_eq!(child_tx.parent(), Some(root));
        assert_eq!(child_tx.depth(), 1);
        assert_eq!(child_tx.kind(), ChangeKind::Reaction);
        assert_eq!(forest.roots(), &[root]);
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let mut forest = TransactionForest::new();
        let mut parent = forest.push_root(snap(0, BlockKind::Air), snap(0, BlockKind::Sand), origin());
        for x in 1..10_000 {
            parent = forest.push_child(parent, snap(x, BlockKind::Air), snap(x, BlockKind::Sand), origin());
        }
        assert_eq!(forest.pre_order().count(), 10_000);
    }
}
