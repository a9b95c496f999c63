use crate::error::BackendError;
use crate::types::{Peer, TrackerUpdate};

/// Normalized events re-emitted by a [`crate::Coordinator`]
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A peer from either backend. The same peer may be reported by both.
    Peer(Peer),
    TrackerAnnounce(TrackerUpdate),
    /// A DHT announce attempt finished, successfully or not
    DhtAnnounce,
    Warning(BackendError),
    Error(BackendError),
}

impl DiscoveryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryEvent::Peer(_) => "peer",
            DiscoveryEvent::TrackerAnnounce(_) => "trackerAnnounce",
            DiscoveryEvent::DhtAnnounce => "dhtAnnounce",
            DiscoveryEvent::Warning(_) => "warning",
            DiscoveryEvent::Error(_) => "error",
        }
    }
}
