use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use crate::config::RtcConfig;
use crate::error::BackendError;
use crate::types::{DhtPeer, InfoHash, TrackerPeer, TrackerUpdate};

#[derive(Debug, Clone)]
pub enum DhtEvent {
    Peer { peer: DhtPeer, info_hash: InfoHash },
    Warning(BackendError),
    Error(BackendError),
}

#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Peer(TrackerPeer),
    Update(TrackerUpdate),
    Warning(BackendError),
    Error(BackendError),
}

/// A running DHT node
#[async_trait]
pub trait DhtBackend: Send + Sync {
    /// Bind the node, on `port` if given, otherwise wherever the node likes
    async fn listen(&self, port: Option<u16>) -> Result<(), BackendError>;

    /// Announce that we serve `info_hash` on `port`
    async fn announce(&self, info_hash: InfoHash, port: u16) -> Result<(), BackendError>;

    async fn destroy(&self) -> Result<(), BackendError>;

    /// Subscribe to the node's events. Every call returns an independent receiver.
    fn events(&self) -> broadcast::Receiver<DhtEvent>;
}

/// Builds DHT nodes the coordinator owns and destroys itself
pub trait DhtFactory: Send + Sync {
    fn create(&self) -> Arc<dyn DhtBackend>;
}

/// Everything a tracker client needs at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerParams {
    pub peer_id: String,
    pub port: u16,
    pub info_hash: InfoHash,
    pub length: Option<u64>,
    pub announce: Vec<Url>,
    pub rtc_config: Option<RtcConfig>,
}

/// Client for a set of tracker servers announcing a single info hash
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Interval between periodic announces once started
    fn set_interval(&self, interval: Duration);

    /// Content length reported to the trackers as `left`
    fn set_content_length(&self, length: u64);

    async fn start(&self) -> Result<(), BackendError>;

    async fn stop(&self) -> Result<(), BackendError>;

    async fn destroy(&self) -> Result<(), BackendError>;

    fn events(&self) -> broadcast::Receiver<TrackerEvent>;
}

pub trait TrackerFactory: Send + Sync {
    fn create(&self, params: TrackerParams) -> Arc<dyn TrackerClient>;
}

/// Where the coordinator gets its DHT node from
#[derive(Clone, Default)]
pub enum DhtSource {
    /// Never use a DHT
    Disabled,
    /// No DHT implementation exists in this environment
    #[default]
    Unavailable,
    /// A node the caller runs and keeps ownership of
    External(Arc<dyn DhtBackend>),
    /// Create a node internally; it is destroyed on stop
    Factory(Arc<dyn DhtFactory>),
}

impl fmt::Debug for DhtSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhtSource::Disabled => write!(f, "Disabled"),
            DhtSource::Unavailable => write!(f, "Unavailable"),
            DhtSource::External(_) => write!(f, "External"),
            DhtSource::Factory(_) => write!(f, "Factory"),
        }
    }
}

/// Backend collaborators injected into a coordinator
#[derive(Clone, Default)]
pub struct Backends {
    pub dht: DhtSource,
    pub tracker: Option<Arc<dyn TrackerFactory>>,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("dht", &self.dht)
            .field("tracker", &self.tracker.is_some())
            .finish()
    }
}

/// Lifecycle of a backend handle
#[derive(Debug, Clone, Default)]
pub enum Slot<T> {
    Disabled,
    #[default]
    Pending,
    Live(T),
}

impl<T> Slot<T> {
    pub fn live(&self) -> Option<&T> {
        match self {
            Slot::Live(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Slot::Disabled)
    }

    /// Take the live handle out, leaving `next` in its place. Non-live slots
    /// are left untouched.
    pub fn take_live(&mut self, next: Slot<T>) -> Option<T> {
        if !matches!(self, Slot::Live(_)) {
            return None;
        }
        match std::mem::replace(self, next) {
            Slot::Live(handle) => Some(handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_live_only_moves_live_handles() {
        let mut pending: Slot<u8> = Slot::Pending;
        assert_eq!(pending.take_live(Slot::Disabled), None);
        assert!(pending.is_pending());

        let mut live = Slot::Live(7u8);
        assert_eq!(live.take_live(Slot::Disabled), Some(7));
        assert!(live.is_disabled());
        assert_eq!(live.take_live(Slot::Pending), None);
    }
}
