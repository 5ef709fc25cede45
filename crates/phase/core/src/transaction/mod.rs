//! Block transactions and the forest they are recorded in.
//!
//! A transaction is one attempted block mutation. Physics reactions to a
//! committed transaction become its children, so a single player action can
//! grow a tree (break block → sand falls → torch pops off). Trees are walked in
//! pre-order with an explicit work-list; depth is bounded by configuration, not
//! by the call stack.
mod change;
mod forest;

pub use change::{BlockTransaction, ChangeKind, TxId, TxOrigin, TxStatus};
pub use forest::{PreOrder, TransactionForest};
