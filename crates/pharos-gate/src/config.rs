//! Gate configuration
//!
//! Two windows control debouncing. The settle wait applies to every offline
//! verdict and covers device wake-up and link renegotiation. The
//! online-to-offline wait replaces it with a longer hold when the device was
//! recently online, because those transitions usually resolve themselves.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameter name overriding the settle wait, in milliseconds.
pub const SETTLE_WAIT_MS_PARAM: &str = "settle_wait_ms";

/// Parameter name overriding the online-to-offline wait, in milliseconds.
pub const ONLINE_TO_OFFLINE_WAIT_MS_PARAM: &str = "online_to_offline_wait_ms";

/// Default settle wait applied to every offline verdict.
pub const DEFAULT_SETTLE_WAIT_MS: u64 = 2_000;

/// Default hold before trusting offline on a device that was recently online.
pub const DEFAULT_ONLINE_TO_OFFLINE_WAIT_MS: u64 = 10_000;

/// Named parameter lookup backed by a field trial, remote config, or test map.
///
/// Lookups are total. A provider that cannot answer falls back to the default
/// it was handed; misconfiguration never surfaces as an error.
pub trait ParamProvider: Send + Sync {
    /// Value of `name` in milliseconds, or `default_ms` if unset.
    fn duration_ms(&self, name: &str, default_ms: u64) -> u64;
}

/// Provider that always answers with the built-in default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultParams;

impl ParamProvider for DefaultParams {
    fn duration_ms(&self, _name: &str, default_ms: u64) -> u64 {
        default_ms
    }
}

/// Debounce windows for the offline gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum continuous time foregrounded, offline, and signal-stable
    /// before an offline verdict is committed.
    #[serde(with = "duration_serde")]
    pub settle_wait: Duration,

    /// Minimum time since the device was last known online before an offline
    /// verdict is committed. Only applies once an online episode has been
    /// observed.
    #[serde(with = "duration_serde")]
    pub online_to_offline_wait: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            settle_wait: Duration::from_millis(DEFAULT_SETTLE_WAIT_MS),
            online_to_offline_wait: Duration::from_millis(DEFAULT_ONLINE_TO_OFFLINE_WAIT_MS),
        }
    }
}

impl GateConfig {
    /// Build a config from a parameter provider, falling back to defaults
    /// for anything the provider does not override.
    pub fn from_provider(params: &dyn ParamProvider) -> Self {
        Self {
            settle_wait: Duration::from_millis(
                params.duration_ms(SETTLE_WAIT_MS_PARAM, DEFAULT_SETTLE_WAIT_MS),
            ),
            online_to_offline_wait: Duration::from_millis(params.duration_ms(
                ONLINE_TO_OFFLINE_WAIT_MS_PARAM,
                DEFAULT_ONLINE_TO_OFFLINE_WAIT_MS,
            )),
        }
    }
}

/// Serde helpers for Duration as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
