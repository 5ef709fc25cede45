//! Host configuration structures and loaders.
use std::env;

use phase_core::{BlockPos, TrackerConfig};

/// Everything needed to start a [`crate::Host`].
#[derive(Clone, Debug)]
pub struct HostConfig {
    pub tracker: TrackerConfig,
    pub channels: ChannelConfig,
    pub protection: ProtectionConfig,
    /// Entities accepted from one spawn batch; the rest are cancelled.
    pub max_spawns_per_batch: usize,
    /// Half-width, in blocks, of the terrain generated around spawn.
    pub spawn_area: u32,
}

impl HostConfig {
    pub const DEFAULT_MAX_SPAWNS_PER_BATCH: usize = 16;
    pub const DEFAULT_SPAWN_AREA: u32 = 8;

    pub fn new() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            channels: ChannelConfig::default(),
            protection: ProtectionConfig::default(),
            max_spawns_per_batch: Self::DEFAULT_MAX_SPAWNS_PER_BATCH,
            spawn_area: Self::DEFAULT_SPAWN_AREA,
        }
    }

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `PHASE_MAX_DEPTH` - Phase stack depth limit (default: 32)
    /// - `PHASE_MAX_CASCADE_DEPTH` - Deepest recorded reaction chain (default: 64)
    /// - `PHASE_MAX_CASCADE_NODES` - Transactions per reaction tree (default: 4096)
    /// - `HOST_COMMAND_BUFFER` - Worker command queue size (default: 32)
    /// - `HOST_EVENT_BUFFER` - Event bus capacity per topic (default: 100)
    /// - `HOST_SPAWN_PROTECTION_RADIUS` - Protected radius around spawn, 0 disables (default: 2)
    /// - `HOST_MAX_SPAWNS_PER_BATCH` - Spawn limiter cap (default: 16)
    /// - `HOST_SPAWN_AREA` - Generated terrain half-width (default: 8)
    pub fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary key lookup.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();

        // Tracker bounds
        if let Some(depth) = parse::<usize>(lookup("PHASE_MAX_DEPTH")) {
            config.tracker.max_phase_depth = depth.max(1);
        }
        if let Some(depth) = parse::<u32>(lookup("PHASE_MAX_CASCADE_DEPTH")) {
            config.tracker.max_cascade_depth = depth;
        }
        if let Some(nodes) = parse::<usize>(lookup("PHASE_MAX_CASCADE_NODES")) {
            config.tracker.max_cascade_nodes = nodes.max(1);
        }

        // Channel configuration
        if let Some(capacity) = parse::<usize>(lookup("HOST_COMMAND_BUFFER")) {
            config.channels.command_buffer = capacity.max(1);
        }
        if let Some(capacity) = parse::<usize>(lookup("HOST_EVENT_BUFFER")) {
            config.channels.event_buffer = capacity.max(1);
        }

        // Listeners
        if let Some(radius) = parse::<u32>(lookup("HOST_SPAWN_PROTECTION_RADIUS")) {
            config.protection.radius = radius;
        }
        if let Some(max) = parse::<usize>(lookup("HOST_MAX_SPAWNS_PER_BATCH")) {
            config.max_spawns_per_batch = max;
        }

        if let Some(area) = parse::<u32>(lookup("HOST_SPAWN_AREA")) {
            config.spawn_area = area;
        }

        config
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub command_buffer: usize,
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer: 32,
            event_buffer: 100,
        }
    }
}

/// Area around the spawn column where non-operators may not change blocks.
#[derive(Clone, Debug)]
pub struct ProtectionConfig {
    pub center: BlockPos,
    /// Horizontal radius; zero turns protection off.
    pub radius: u32,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            center: BlockPos::ORIGIN,
            radius: 2,
        }
    }
}

fn parse<T>(raw: Option<String>) -> Option<T>
where
    T: std::str::FromStr,
{
    raw?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = HostConfig::from_source(|_| None);
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.channels.command_buffer, 32);
        assert_eq!(config.protection.radius, 2);
        assert_eq!(
            config.max_spawns_per_batch,
            HostConfig::DEFAULT_MAX_SPAWNS_PER_BATCH
        );
    }

    #[test]
    fn variables_override_defaults() {
        let config = HostConfig::from_source(lookup(&[
            ("PHASE_MAX_DEPTH", "4"),
            ("PHASE_MAX_CASCADE_DEPTH", "3"),
            ("HOST_EVENT_BUFFER", " 7 "),
            ("HOST_SPAWN_PROTECTION_RADIUS", "0"),
            ("HOST_MAX_SPAWNS_PER_BATCH", "2"),
        ]));
        assert_eq!(config.tracker.max_phase_depth, 4);
        assert_eq!(config.tracker.max_cascade_depth, 3);
        assert_eq!(config.channels.event_buffer, 7);
        assert_eq!(config.protection.radius, 0);
        assert_eq!(config.max_spawns_per_batch, 2);
    }

    #[test]
    fn garbage_and_zero_buffers_are_clamped() {
        let config = HostConfig::from_source(lookup(&[
            ("PHASE_MAX_DEPTH", "lots"),
            ("HOST_COMMAND_BUFFER", "0"),
        ]));
        assert_eq!(
            config.tracker.max_phase_depth,
            TrackerConfig::DEFAULT_MAX_PHASE_DEPTH
        );
        assert_eq!(config.channels.command_buffer, 1);
    }
}
