//! Error types surfaced by the host API.
//!
//! Wraps worker coordination failures and tracker errors so clients can bubble
//! them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use phase_core::{BlockPos, ErrorClass, PhaseError, TrackerError};

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("block at {pos} cannot be broken")]
    Unbreakable { pos: BlockPos },
}

impl TrackerError for HostError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Phase(error) => error.class(),
            Self::Unbreakable { .. } => ErrorClass::Capacity,
            _ => ErrorClass::Programming,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::CommandChannelClosed => "HOST_COMMAND_CLOSED",
            Self::ReplyChannelClosed(_) => "HOST_REPLY_CLOSED",
            Self::WorkerJoin(_) => "HOST_WORKER_JOIN",
            Self::Phase(error) => error.error_code(),
            Self::Unbreakable { .. } => "HOST_UNBREAKABLE",
        }
    }
}
