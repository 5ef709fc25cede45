//! Registry holding one baked [`PhaseState`] per kind.
use std::collections::BTreeMap;

use super::{GenerationPhase, PacketPhase, PhaseKind, PhaseState, PluginPhase};

/// Baked phase states, one per kind.
#[derive(Clone, Debug)]
pub struct PhaseStates {
    states: BTreeMap<PhaseKind, PhaseState>,
}

impl PhaseStates {
    /// States with default policies and the standard nesting table.
    pub fn standard() -> Self {
        PhaseStatesBuilder::standard().build()
    }

    pub fn builder() -> PhaseStatesBuilder {
        PhaseStatesBuilder::standard()
    }

    /// Baked state for `kind`.
    pub fn get(&self, kind: PhaseKind) -> &PhaseState {
        self.states
            .get(&kind)
            .expect("registry is built from PhaseKind::all(), every kind is present")
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhaseState> {
        self.states.values()
    }
}

impl Default for PhaseStates {
    fn default() -> Self {
        Self::standard()
    }
}

/// Configures states before they are baked into a [`PhaseStates`].
#[derive(Debug)]
pub struct PhaseStatesBuilder {
    states: BTreeMap<PhaseKind, PhaseState>,
}

impl PhaseStatesBuilder {
    /// Unbaked states for every kind, wired with the standard nesting table.
    ///
    /// - packets run from the network loop or from plugins
    /// - block and entity ticks run inside a dimension tick
    /// - generation may be triggered from anywhere a chunk can be loaded
    /// - plugin work may nest anywhere
    pub fn standard() -> Self {
        let mut states: BTreeMap<PhaseKind, PhaseState> = PhaseKind::all()
            .map(|kind| (kind, PhaseState::new(kind)))
            .collect();

        let plugins = PluginPhase::ALL.map(PhaseKind::Plugin);
        let packets = PacketPhase::ALL.map(PhaseKind::Packet);
        let generation = GenerationPhase::ALL.map(PhaseKind::Generation);

        for (kind, state) in &mut states {
            match kind {
                PhaseKind::Idle => {}
                PhaseKind::Packet(_) => {
                    for parent in plugins {
                        state.allow_parent(parent);
                    }
                }
                PhaseKind::Generation(_) => {
                    for parent in packets.iter().chain(&generation).chain(&plugins) {
                        state.allow_parent(*parent);
                    }
                    state
                        .allow_parent(PhaseKind::DimensionTick)
                        .allow_parent(PhaseKind::BlockTick)
                        .allow_parent(PhaseKind::EntityTick);
                }
                PhaseKind::BlockTick | PhaseKind::EntityTick => {
                    state.allow_parent(PhaseKind::DimensionTick);
                    for parent in plugins {
                        state.allow_parent(parent);
                    }
                }
                PhaseKind::DimensionTick => {}
                PhaseKind::Plugin(_) => {
                    for parent in PhaseKind::all() {
                        state.allow_parent(parent);
                    }
                }
            }
        }

        Self { states }
    }

    /// Applies `configure` to the unbaked state for `kind`.
    pub fn configure(
        &mut self,
        kind: PhaseKind,
        configure: impl FnOnce(&mut PhaseState),
    ) -> &mut Self {
        if let Some(state) = self.states.get_mut(&kind) {
            configure(state);
        }
        self
    }

    /// Bakes every state.
    pub fn build(mut self) -> PhaseStates {
        for state in self.states.values_mut() {
            state.bake();
        }
        PhaseStates {
            states: self.states,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PolicyFlags;

    #[test]
    fn standard_registry_is_baked_and_complete() {
        let states = PhaseStates::standard();
        assert_eq!(states.iter().count(), PhaseKind::all().count());
        assert!(states.iter().all(PhaseState::is_baked));
    }

    #[test]
    fn ticks_nest_under_dimension_tick() {
        let states = PhaseStates::standard();
        assert!(states
            .get(PhaseKind::BlockTick)
            .is_compatible_with(PhaseKind::DimensionTick));
        assert!(!states
            .get(PhaseKind::DimensionTick)
            .is_compatible_with(PhaseKind::BlockTick));
        assert!(states
            .get(PhaseKind::Plugin(PluginPhase::Scheduled))
            .is_compatible_with(PhaseKind::EntityTick));
    }

    #[test]
    fn configure_overrides_before_bake() {
        let mut builder = PhaseStates::builder();
        builder.configure(PhaseKind::DimensionTick, |state| {
            state.set_flag(PolicyFlags::CAPTURE_BLOCKS, true);
        });
        let states = builder.build();
        assert!(states.get(PhaseKind::DimensionTick).captures_block_changes());
    }
}
