//! Room configuration.

use std::time::Duration;

use jewelfall_tick::{TickConfig, TickPolicy};

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Gravity ticks per second.
    pub tick_rate_hz: u32,

    pub tick_policy: TickPolicy,

    /// Capacity of each room's command channel. Callers wait when it is full.
    pub command_channel_size: usize,

    /// Random delay (up to this much) before the first tick after a start
    /// or resume.
    pub tick_jitter: Duration,

    /// Fixed seed for piece generation. Each room mixes in its own id, so
    /// rooms still differ from one another. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TickConfig::DEFAULT_TICK_RATE_HZ,
            tick_policy: TickPolicy::Skip,
            command_channel_size: 64,
            tick_jitter: Duration::from_millis(5),
            seed: None,
        }
    }
}

impl RoomConfig {
    /// Scheduler settings derived from this config.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            tick_rate_hz: self.tick_rate_hz,
            policy: self.tick_policy,
            resume_jitter: self.tick_jitter,
            ..TickConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ticks_every_100ms() {
        let config = RoomConfig::default();
        assert_eq!(config.tick_config().interval(), Duration::from_millis(100));
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_tick_config_carries_policy_and_jitter() {
        let config = RoomConfig {
            tick_rate_hz: 20,
            tick_policy: TickPolicy::Drop,
            tick_jitter: Duration::ZERO,
            ..RoomConfig::default()
        };
        let tick = config.tick_config();
        assert_eq!(tick.tick_rate_hz, 20);
        assert_eq!(tick.policy, TickPolicy::Drop);
        assert_eq!(tick.resume_jitter, Duration::ZERO);
    }
}
