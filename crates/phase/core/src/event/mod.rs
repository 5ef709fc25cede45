//! Listener surface.
//!
//! Listeners receive a detached [`Cause`] and a mutable event. Every proposal
//! inside an event carries its own [`Verdict`]; the tracker applies accepted
//! and replaced proposals and drops cancelled ones.
mod types;

pub use types::{
    BlockChange, ChangeBlockEvent, DropItemEvent, Proposal, SpawnEntityEvent, Verdict,
};

use std::any::Any;

use crate::cause::Cause;
use crate::error::{ErrorClass, TrackerError};

/// Extension code failed while handling an event.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    #[error("listener {listener} failed: {reason}")]
    Failed { listener: String, reason: String },

    #[error("listener {listener} rejected a malformed replacement at {pos}")]
    InvalidReplacement {
        listener: String,
        pos: crate::world::BlockPos,
    },

    #[error("listener {listener} panicked: {message}")]
    Panicked { listener: String, message: String },
}

impl ListenerError {
    pub fn failed(listener: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            listener: listener.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a panic payload caught around a listener call.
    pub fn panicked(listener: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => payload
                .downcast_ref::<&str>()
                .map_or_else(|| "non-string panic payload".to_owned(), |s| (*s).to_owned()),
        };
        Self::Panicked {
            listener: listener.into(),
            message,
        }
    }
}

impl TrackerError for ListenerError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Listener
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "LISTENER_FAILED",
            Self::InvalidReplacement { .. } => "LISTENER_INVALID_REPLACEMENT",
            Self::Panicked { .. } => "LISTENER_PANICKED",
        }
    }
}

/// Observer of primitive world mutations.
///
/// An `Err` return cancels everything the event proposed.
pub trait EventListener {
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    fn on_change_block(
        &mut self,
        _cause: &Cause,
        _event: &mut ChangeBlockEvent,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_spawn_entity(
        &mut self,
        _cause: &Cause,
        _event: &mut SpawnEntityEvent,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_drop_item(
        &mut self,
        _cause: &Cause,
        _event: &mut DropItemEvent,
    ) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Accepts everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl EventListener for NoopListener {
    fn name(&self) -> &str {
        "noop"
    }
}
