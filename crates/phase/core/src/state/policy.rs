use bitflags::bitflags;

bitflags! {
    /// Orthogonal policy switches answered by a phase state.
    ///
    /// Every mutation entrypoint consults these before deciding whether a
    /// change is captured, applied immediately, or bypasses tracking.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct PolicyFlags: u16 {
        /// Buffer block changes until unwind instead of processing them immediately.
        const CAPTURE_BLOCKS           = 1 << 0;
        /// Write block changes straight to storage with no transaction or event.
        const IGNORE_BLOCKS            = 1 << 1;
        /// Buffer entity spawns and dispatch them as one batch at unwind.
        const CAPTURE_ENTITY_SPAWNS    = 1 << 2;
        /// Buffer item drops and dispatch them as one batch at unwind.
        const CAPTURE_ITEM_DROPS       = 1 << 3;
        /// Merge equal item drops at the same position before dispatch.
        const PRE_MERGE_ITEM_DROPS     = 1 << 4;
        /// Stamp the context owner onto committed block snapshots.
        const TRACK_BLOCK_OWNER        = 1 << 5;
        /// Stamp the context notifier onto reaction snapshots.
        const TRACK_BLOCK_NOTIFIER     = 1 << 6;
        /// Record physics reactions as child transactions.
        ///
        /// Without it reaction chains are written straight to storage with no
        /// dispatch and the tree never grows past its root. The root is
        /// dispatched before anything is written, so a cancelled root leaves
        /// no part of a chain behind, and a committed root keeps the chain's
        /// drops and spawns.
        const TRACK_REACTIONS          = 1 << 7;
        /// Entities moved inside this phase skip collision checks.
        const IGNORE_ENTITY_COLLISIONS = 1 << 8;
        /// Listeners are consulted at all.
        const DISPATCH_EVENTS          = 1 << 9;
        /// World generation: most tracking is disabled for throughput.
        const WORLD_GENERATION         = 1 << 10;
        const TICK                     = 1 << 11;
        const PACKET                   = 1 << 12;
        const PLUGIN                   = 1 << 13;
        /// May nest under any phase without a compatibility warning.
        const QUIET_NESTING            = 1 << 14;
    }
}

impl PolicyFlags {
    /// Fully tracked, immediately applied: the baseline every kind starts from.
    pub const TRACKED: Self = Self::DISPATCH_EVENTS.union(Self::TRACK_REACTIONS);

    /// Everything a phase may buffer.
    pub const CAPTURE_ALL: Self = Self::CAPTURE_BLOCKS
        .union(Self::CAPTURE_ENTITY_SPAWNS)
        .union(Self::CAPTURE_ITEM_DROPS);
}

/// Capture buffers a phase context can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BufferKind {
    Blocks,
    Entities,
    Items,
}

impl BufferKind {
    pub const ALL: [Self; 3] = [Self::Blocks, Self::Entities, Self::Items];
}

/// Buffers a state drains during unwind, in drain order.
///
/// Blocks come first because committing them can produce drops and spawns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnwindPlan(&'static [BufferKind]);

impl UnwindPlan {
    pub const NONE: Self = Self(&[]);
    pub const ALL: Self = Self(&BufferKind::ALL);
    pub const ENTITIES_ONLY: Self = Self(&[BufferKind::Entities]);

    pub fn drains(&self, buffer: BufferKind) -> bool {
        self.0.contains(&buffer)
    }

    pub fn buffers(&self) -> &'static [BufferKind] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_all_covers_every_buffer_flag() {
        assert!(PolicyFlags::CAPTURE_ALL.contains(PolicyFlags::CAPTURE_BLOCKS));
        assert!(PolicyFlags::CAPTURE_ALL.contains(PolicyFlags::CAPTURE_ENTITY_SPAWNS));
        assert!(PolicyFlags::CAPTURE_ALL.contains(PolicyFlags::CAPTURE_ITEM_DROPS));
        assert!(!PolicyFlags::CAPTURE_ALL.contains(PolicyFlags::IGNORE_BLOCKS));
    }

    #[test]
    fn unwind_plan_keeps_block_first_order() {
        assert_eq!(UnwindPlan::ALL.buffers().first(), Some(&BufferKind::Blocks));
        assert!(UnwindPlan::ENTITIES_ONLY.drains(BufferKind::Entities));
        assert!(!UnwindPlan::ENTITIES_ONLY.drains(BufferKind::Items));
        assert!(!UnwindPlan::NONE.drains(BufferKind::Blocks));
    }
}
