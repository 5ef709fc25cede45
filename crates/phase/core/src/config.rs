/// Tracker safety bounds and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackerConfig {
    /// Maximum number of phases on the stack, the idle sentinel excluded.
    pub max_phase_depth: usize,
    /// Deepest reaction chain recorded below one root transaction.
    pub max_cascade_depth: u32,
    /// Maximum transactions one root tree may grow to.
    pub max_cascade_nodes: usize,
    /// Drain passes per unwind before remaining captures are treated as leaks.
    pub max_unwind_passes: u32,
    /// Log a warning when a phase is pushed over an incompatible parent.
    pub warn_incompatible_nesting: bool,
}

impl TrackerConfig {
    // ===== runtime-tunable defaults =====
    pub const DEFAULT_MAX_PHASE_DEPTH: usize = 32;
    pub const DEFAULT_MAX_CASCADE_DEPTH: u32 = 64;
    pub const DEFAULT_MAX_CASCADE_NODES: usize = 4096;
    pub const DEFAULT_MAX_UNWIND_PASSES: u32 = 8;

    pub fn new() -> Self {
        Self {
            max_phase_depth: Self::DEFAULT_MAX_PHASE_DEPTH,
            max_cascade_depth: Self::DEFAULT_MAX_CASCADE_DEPTH,
            max_cascade_nodes: Self::DEFAULT_MAX_CASCADE_NODES,
            max_unwind_passes: Self::DEFAULT_MAX_UNWIND_PASSES,
            warn_incompatible_nesting: true,
        }
    }

    pub fn with_max_phase_depth(mut self, max_phase_depth: usize) -> Self {
        self.max_phase_depth = max_phase_depth;
        self
    }

    pub fn with_cascade_limits(mut self, max_depth: u32, max_nodes: usize) -> Self {
        self.max_cascade_depth = max_depth;
        self.max_cascade_nodes = max_nodes;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}
