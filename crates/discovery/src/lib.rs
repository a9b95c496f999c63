//! Peer discovery for a single swarm over a DHT and a set of trackers.
//!
//! A [`Coordinator`] owns the announce schedule and the backend lifecycles
//! and re-emits everything the backends find as [`DiscoveryEvent`]s.

mod backend;
mod config;
mod coordinator;
mod error;
mod event;
mod identity;
mod scheduler;
mod subscription;
mod types;

pub mod mock;


pub use backend::{
    Backends, DhtBackend, DhtEvent, DhtFactory, DhtSource, Slot, TrackerClient, TrackerEvent,
    TrackerFactory, TrackerParams,
};
pub use config::{DiscoveryConfig, IceServer, RtcConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_INTERVAL};
pub use coordinator::Coordinator;
pub use error::{BackendError, ConfigError, InfoHashError};
pub use event::DiscoveryEvent;
pub use identity::{ContentDescriptor, Identity, IdentityInput};
pub use scheduler::{jittered_delay, AnnounceScheduler};
pub use subscription::{Disposer, Source, Subscriptions};
pub use types::{DhtPeer, InfoHash, Peer, TrackerPeer, TrackerUpdate, INFO_HASH_LEN};
