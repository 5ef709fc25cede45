//! Common error infrastructure for phase-core.
//!
//! Every error the tracker can surface falls into one of four classes. The
//! class decides who handles it and how loudly:
//!
//! - **Programming**: engine-integration bugs (popping the sentinel, shutting
//!   down with live phases). Returned to the caller, logged at error level.
//! - **Capacity**: a safety bound was hit (phase depth, cascade size). The
//!   triggering mutation is rejected and the simulation carries on.
//! - **Listener**: extension code failed. Isolated to one transaction and
//!   treated as a cancellation.
//! - **Leak**: a capture buffer was still populated when its phase closed.
//!   Logged, then force-applied.
//!
//! Reading an unset context field and mutating a baked phase state are also
//! programming errors, but they panic at the call site instead of returning.

/// Classification used for handling strategy and log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorClass {
    /// Integration bug; the operation is refused.
    Programming,

    /// Safety bound reached; the mutation is rejected, the tick continues.
    Capacity,

    /// Extension code failed; the affected transaction is cancelled.
    Listener,

    /// Captured effects outlived their phase; they are applied best-effort.
    Leak,
}

impl ErrorClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Programming => "programming",
            Self::Capacity => "capacity",
            Self::Listener => "listener",
            Self::Leak => "leak",
        }
    }

    /// Returns true if the simulation can continue without intervention.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Programming)
    }
}

/// Common trait for all phase-core errors.
pub trait TrackerError: core::fmt::Display + core::fmt::Debug {
    fn class(&self) -> ErrorClass;

    /// Stable identifier for metrics and tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_programming_errors_are_unrecoverable() {
        assert!(!ErrorClass::Programming.is_recoverable());
        assert!(ErrorClass::Capacity.is_recoverable());
        assert!(ErrorClass::Listener.is_recoverable());
        assert!(ErrorClass::Leak.is_recoverable());
        assert_eq!(ErrorClass::Leak.as_str(), "leak");
    }
}
