//! Sizing and timing parameters of a [`ChannelPool`](super::ChannelPool).
use super::ids::{SLOT_ID_BASE, TEMPORARY_ID_BASE};
use serde::{Deserialize, Deserializer};
use serde_aux::field_attributes::deserialize_number_from_string;
use std::time::Duration;

const DEFAULT_CONNECTION_MAX: usize = 5;
const DEFAULT_CHANNEL_MAX: usize = 1023;
const DEFAULT_CHANNEL_ACTIVE: usize = 10;
const DEFAULT_CHANNEL_IDLE: usize = 1;
const DEFAULT_HEALTH: Duration = Duration::from_secs(30);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(15);
/// Durations at or below this value fall back to their default.
const DURATION_FLOOR: Duration = Duration::from_secs(1);

/// Configuration of a [`ChannelPool`](super::ChannelPool).
///
/// Zero counts and durations of one second or less are replaced by their default
/// when the pool is built, see [`PoolSettings::normalized`].
///
/// Durations are deserialized from whole seconds, e.g. `"health_seconds": 30`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Number of connections opened to the broker.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub connection_max: usize,
    /// Per-connection channel cap negotiated with the broker.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub channel_max: usize,
    /// Pooled channels per connection.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub channel_active: usize,
    /// Minimum number of open channels kept on every connection when evicting idle ones.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub channel_idle: usize,
    /// Interval between two health checks.
    #[serde(rename = "health_seconds", deserialize_with = "deserialize_seconds")]
    pub health: Duration,
    /// Channels unused for longer than this are closed by the health check.
    #[serde(rename = "timeout_seconds", deserialize_with = "deserialize_seconds")]
    pub timeout: Duration,
    /// Heartbeat interval negotiated with the broker.
    #[serde(rename = "heartbeat_seconds", deserialize_with = "deserialize_seconds")]
    pub heartbeat: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            connection_max: DEFAULT_CONNECTION_MAX,
            channel_max: DEFAULT_CHANNEL_MAX,
            channel_active: DEFAULT_CHANNEL_ACTIVE,
            channel_idle: DEFAULT_CHANNEL_IDLE,
            health: DEFAULT_HEALTH,
            timeout: DEFAULT_TIMEOUT,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }
}

impl PoolSettings {
    #[must_use]
    pub fn connection_max(self, connection_max: usize) -> Self {
        Self {
            connection_max,
            ..self
        }
    }

    #[must_use]
    pub fn channel_max(self, channel_max: usize) -> Self {
        Self {
            channel_max,
            ..self
        }
    }

    #[must_use]
    pub fn channel_active(self, channel_active: usize) -> Self {
        Self {
            channel_active,
            ..self
        }
    }

    #[must_use]
    pub fn channel_idle(self, channel_idle: usize) -> Self {
        Self {
            channel_idle,
            ..self
        }
    }

    #[must_use]
    pub fn health(self, health: Duration) -> Self {
        Self { health, ..self }
    }

    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    #[must_use]
    pub fn heartbeat(self, heartbeat: Duration) -> Self {
        Self { heartbeat, ..self }
    }

    /// Replace every unset or too small value with its default.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn count(value: usize, default: usize) -> usize {
            if value == 0 {
                default
            } else {
                value
            }
        }
        fn duration(value: Duration, default: Duration) -> Duration {
            if value <= DURATION_FLOOR {
                default
            } else {
                value
            }
        }
        Self {
            connection_max: count(self.connection_max, DEFAULT_CONNECTION_MAX),
            channel_max: count(self.channel_max, DEFAULT_CHANNEL_MAX),
            channel_active: count(self.channel_active, DEFAULT_CHANNEL_ACTIVE),
            channel_idle: count(self.channel_idle, DEFAULT_CHANNEL_IDLE),
            health: duration(self.health, DEFAULT_HEALTH),
            timeout: duration(self.timeout, DEFAULT_TIMEOUT),
            heartbeat: duration(self.heartbeat, DEFAULT_HEARTBEAT),
        }
    }

    /// Check the values fit the channel id layout.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let max_connections = (TEMPORARY_ID_BASE / SLOT_ID_BASE - 1) as usize;
        if self.connection_max > max_connections {
            return Err(format!(
                "connection_max must be at most {max_connections}, got {}",
                self.connection_max
            ));
        }
        if self.channel_active >= SLOT_ID_BASE as usize {
            return Err(format!(
                "channel_active must be lower than {SLOT_ID_BASE}, got {}",
                self.channel_active
            ));
        }
        Ok(())
    }

    /// `channel_max` as negotiated on the wire.
    pub(crate) fn wire_channel_max(&self) -> u16 {
        u16::try_from(self.channel_max).unwrap_or(u16::MAX)
    }
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_number_from_string::<u64, D>(deserializer).map(Duration::from_secs)
}
