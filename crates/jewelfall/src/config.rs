//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use jewelfall_room::RoomConfig;

use crate::JewelfallError;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Settings for every room the server creates.
    pub room: RoomConfig,

    /// A connection that sends nothing for this long is dropped, which
    /// counts as leaving every room it joined. Pongs count as traffic, and
    /// the server pings every third of this period, so any client whose
    /// WebSocket stack answers pings stays connected.
    pub idle_timeout: Duration,

    /// Longest a single write may take. A peer that stops reading fills
    /// its socket buffer; once a write blocks this long the connection is
    /// dropped.
    pub send_timeout: Duration,

    /// How often empty rooms are swept. See [`RoomSweeper`](crate::RoomSweeper).
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room: RoomConfig::default(),
            idle_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub const ENV_BIND: &'static str = "JEWELFALL_BIND";
    pub const ENV_TICK_HZ: &'static str = "JEWELFALL_TICK_HZ";
    pub const ENV_IDLE_SECS: &'static str = "JEWELFALL_IDLE_SECS";
    pub const ENV_SEND_TIMEOUT_SECS: &'static str = "JEWELFALL_SEND_TIMEOUT_SECS";
    pub const ENV_SWEEP_SECS: &'static str = "JEWELFALL_SWEEP_SECS";

    /// Reads overrides from the process environment. Unset variables keep
    /// their defaults.
    ///
    /// # Errors
    /// Returns [`JewelfallError::Config`] when a variable is set but cannot
    /// be parsed, or is zero.
    pub fn from_env() -> Result<Self, JewelfallError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, JewelfallError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup(Self::ENV_BIND) {
            config.bind_addr = addr;
        }
        if let Some(hz) = parse_positive::<u32>(&lookup, Self::ENV_TICK_HZ)? {
            config.room.tick_rate_hz = hz;
        }
        if let Some(secs) = parse_positive::<u64>(&lookup, Self::ENV_IDLE_SECS)? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive::<u64>(&lookup, Self::ENV_SEND_TIMEOUT_SECS)? {
            config.send_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive::<u64>(&lookup, Self::ENV_SWEEP_SECS)? {
            config.sweep_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, JewelfallError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| JewelfallError::Config(format!("{key}={raw:?} is not a number")))?;
    if value == T::default() {
        return Err(JewelfallError::Config(format!("{key} must be greater than zero")));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.room.tick_rate_hz, 10);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("JEWELFALL_BIND", "0.0.0.0:9000"),
            ("JEWELFALL_TICK_HZ", "20"),
            ("JEWELFALL_IDLE_SECS", "5"),
            ("JEWELFALL_SEND_TIMEOUT_SECS", "2"),
            ("JEWELFALL_SWEEP_SECS", " 120 "),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.room.tick_rate_hz, 20);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.send_timeout, Duration::from_secs(2));
        assert_eq!(config.sweep_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[("JEWELFALL_TICK_HZ", "fast")])).unwrap_err();
        assert!(matches!(err, JewelfallError::Config(_)));
        assert!(err.to_string().contains("JEWELFALL_TICK_HZ"));
    }

    #[test]
    fn test_zero_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("JEWELFALL_IDLE_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
