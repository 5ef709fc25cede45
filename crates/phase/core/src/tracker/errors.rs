use crate::cause::CauseStackError;
use crate::error::{ErrorClass, TrackerError};
use crate::state::PhaseKind;

/// Errors returned by the phase stack machine.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("cannot push {kind}: phase depth {depth} reached the limit of {max}")]
    DepthExceeded {
        kind: PhaseKind,
        depth: usize,
        max: usize,
    },

    #[error("attempted to pop the idle sentinel")]
    PopSentinel,

    #[error("shutdown with {live} phase(s) still on the stack")]
    ShutdownWithActivePhases { live: usize },

    #[error("shutdown with {depth} cause(s) still on the cause stack")]
    CauseStackNotEmpty { depth: usize },

    #[error(transparent)]
    Cause(#[from] CauseStackError),
}

impl TrackerError for PhaseError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::DepthExceeded { .. } => ErrorClass::Capacity,
            Self::PopSentinel
            | Self::ShutdownWithActivePhases { .. }
            | Self::CauseStackNotEmpty { .. } => ErrorClass::Programming,
            Self::Cause(error) => error.class(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::DepthExceeded { .. } => "PHASE_DEPTH_EXCEEDED",
            Self::PopSentinel => "PHASE_POP_SENTINEL",
            Self::ShutdownWithActivePhases { .. } => "PHASE_SHUTDOWN_ACTIVE",
            Self::CauseStackNotEmpty { .. } => "PHASE_SHUTDOWN_CAUSES",
            Self::Cause(error) => error.error_code(),
        }
    }
}
