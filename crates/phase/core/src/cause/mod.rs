//! Causal attribution exposed to listeners.
//!
//! The [`CauseStack`] is pushed and popped alongside phases. Listeners never
//! see it directly; they receive a detached [`Cause`] snapshot.
mod context;
mod stack;

pub use context::{Cause, CauseObject, ContextValue, EventContextKey};
pub use stack::{CauseStack, CauseStackFrame, FrameId};

use crate::error::{ErrorClass, TrackerError};

/// Misuse of the cause stack.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CauseStackError {
    #[error("cause stack is empty")]
    Empty,

    #[error("cannot pop cause at depth {depth}: the current frame starts at depth {floor}")]
    PopBelowFrame { depth: usize, floor: usize },

    #[error("cause frame is not open")]
    UnknownFrame,
}

impl TrackerError for CauseStackError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Programming
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "CAUSE_STACK_EMPTY",
            Self::PopBelowFrame { .. } => "CAUSE_POP_BELOW_FRAME",
            Self::UnknownFrame => "CAUSE_UNKNOWN_FRAME",
        }
    }
}
