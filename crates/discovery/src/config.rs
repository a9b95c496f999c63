use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::ContentDescriptor;
use crate::types::InfoHash;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// WebRTC settings handed through to trackers that connect peers over
/// data channels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcConfig {
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

/// Static options of a [`crate::Coordinator`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub peer_id: String,
    pub port: u16,
    pub info_hash: Option<InfoHash>,
    pub descriptor: Option<ContentDescriptor>,
    /// Tracker URLs announced to on top of whatever the descriptor carries
    pub announce: Vec<String>,
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    pub tracker: bool,
    pub dht: bool,
    pub dht_port: Option<u16>,
    pub rtc_config: Option<RtcConfig>,
    /// Without native networking (e.g. wasm in a browser) there is no
    /// listening port to require
    pub native_networking: bool,
    pub event_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            peer_id: String::new(),
            port: 0,
            info_hash: None,
            descriptor: None,
            announce: Vec::new(),
            interval: DEFAULT_INTERVAL,
            tracker: true,
            dht: true,
            dht_port: None,
            rtc_config: None,
            native_networking: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl DiscoveryConfig {
    pub fn new(peer_id: impl Into<String>, port: u16) -> Self {
        Self {
            peer_id: peer_id.into(),
            port,
            ..Default::default()
        }
    }

    /// Re-announce period actually used; zero means the default.
    pub fn announce_interval(&self) -> Duration {
        if self.interval.is_zero() {
            DEFAULT_INTERVAL
        } else {
            self.interval
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peer_id.is_empty() {
            return Err(ConfigError::MissingPeerId);
        }
        if self.native_networking && self.port == 0 {
            return Err(ConfigError::MissingPort);
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
