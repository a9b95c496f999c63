use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InfoHashError;

pub const INFO_HASH_LEN: usize = 20;

/// Identifier of the swarm, shared by every backend as the discovery key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; INFO_HASH_LEN]);

impl InfoHash {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InfoHashError> {
        let array: [u8; INFO_HASH_LEN] = bytes
            .try_into()
            .map_err(|_| InfoHashError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; INFO_HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; INFO_HASH_LEN]> for InfoHash {
    fn from(bytes: [u8; INFO_HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl FromStr for InfoHash {
    type Err = InfoHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != INFO_HASH_LEN * 2 {
            return Err(InfoHashError::InvalidLength(s.len() / 2));
        }
        let mut bytes = [0u8; INFO_HASH_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Peer reported by the DHT. Rendered as `host:port` on the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhtPeer {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for DhtPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Peer reported by a tracker. WebRTC trackers hand out peers that only
/// carry an id, so neither field is guaranteed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerPeer {
    pub addr: Option<String>,
    pub peer_id: Option<String>,
}

/// Swarm statistics returned by a tracker announce.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerUpdate {
    pub announce: String,
    pub complete: u64,
    pub incomplete: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    Dht(String),
    Tracker(TrackerPeer),
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

    #[test]
    fn parses_hex_in_either_case() {
        let lower: InfoHash = HEX.parse().unwrap();
        let upper: InfoHash = HEX.to_uppercase().parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), HEX);
        assert_eq!(lower.as_bytes()[..4], [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            "deadbeef".parse::<InfoHash>(),
            Err(InfoHashError::InvalidLength(4))
        );
        assert!(matches!(
            "zz".repeat(20).parse::<InfoHash>(),
            Err(InfoHashError::InvalidHex(_))
        ));
        assert_eq!(
            InfoHash::from_bytes(&[1, 2, 3]),
            Err(InfoHashError::InvalidLength(3))
        );
    }

    #[test]
    fn serializes_as_hex_string() {
        let hash: InfoHash = HEX.parse().unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", HEX));
        let back: InfoHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn dht_peer_renders_host_port() {
        let peer = DhtPeer {
            host: "10.0.0.7".to_string(),
            port: 6881,
        };
        assert_eq!(peer.to_string(), "10.0.0.7:6881");
    }
}
