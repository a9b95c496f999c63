use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::backend::{
    Backends, DhtBackend, DhtEvent, DhtSource, Slot, TrackerClient, TrackerEvent, TrackerFactory,
    TrackerParams,
};
use crate::config::{DiscoveryConfig, RtcConfig};
use crate::error::ConfigError;
use crate::event::DiscoveryEvent;
use crate::identity::{ContentDescriptor, Identity, IdentityInput};
use crate::scheduler::AnnounceScheduler;
use crate::subscription::{Source, Subscriptions};
use crate::types::{InfoHash, Peer};

/// Unifies DHT and tracker peer discovery for one info hash.
///
/// Must be created inside a tokio runtime. Background work only holds weak
/// references, so dropping the coordinator without [`Coordinator::stop`]
/// still cancels its timer and listeners, but leaves backends running.
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct DhtHandle {
    backend: Arc<dyn DhtBackend>,
    // created by us, so destroyed by us
    owned: bool,
}

struct State {
    port: u16,
    identity: Identity,
    dht: Slot<DhtHandle>,
    tracker: Slot<Arc<dyn TrackerClient>>,
    // destroy-then-recreate of the tracker after a port change
    tracker_replacement: Option<JoinHandle<()>>,
    announce_task: Option<JoinHandle<()>>,
    scheduler: AnnounceScheduler,
    subscriptions: Subscriptions,
    stopped: bool,
}

struct Inner {
    peer_id: String,
    announce: Vec<String>,
    rtc_config: Option<RtcConfig>,
    interval: Duration,
    tracker_factory: Option<Arc<dyn TrackerFactory>>,
    events: broadcast::Sender<DiscoveryEvent>,
    state: Mutex<State>,
}

impl Coordinator {
    pub fn new(config: DiscoveryConfig, backends: Backends) -> Result<Self, ConfigError> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let interval = config.announce_interval();
        let tracker = match (&backends.tracker, config.tracker) {
            (Some(_), true) => Slot::Pending,
            _ => Slot::Disabled,
        };

        let inner = Arc::new(Inner {
            peer_id: config.peer_id,
            announce: config.announce,
            rtc_config: config.rtc_config,
            interval,
            tracker_factory: backends.tracker,
            events,
            state: Mutex::new(State {
                port: config.port,
                identity: Identity::default(),
                dht: Slot::Pending,
                tracker,
                tracker_replacement: None,
                announce_task: None,
                scheduler: AnnounceScheduler::new(interval),
                subscriptions: Subscriptions::new(),
                stopped: false,
            }),
        });

        let dht = match (config.dht, backends.dht) {
            (true, DhtSource::External(backend)) => Slot::Live(DhtHandle {
                backend,
                owned: false,
            }),
            (true, DhtSource::Factory(factory)) => {
                let backend = factory.create();
                inner.spawn_listen(backend.clone(), config.dht_port);
                Slot::Live(DhtHandle {
                    backend,
                    owned: true,
                })
            }
            _ => Slot::Disabled,
        };
        {
            let mut state = inner.state();
            if let Some(handle) = dht.live() {
                inner.wire_dht(&mut state, handle.backend.as_ref());
            }
            state.dht = dht;
        }

        let coordinator = Self { inner };
        if let Some(descriptor) = config.descriptor {
            coordinator.set_identity(descriptor);
        }
        if let Some(info_hash) = config.info_hash {
            coordinator.set_identity(info_hash);
        }
        Ok(coordinator)
    }

    /// Supply the content identity. Only the first valid hash or descriptor
    /// takes effect; anything else is ignored.
    pub fn set_identity(&self, input: impl Into<IdentityInput>) {
        self.inner.set_identity(input.into());
    }

    /// Switch the announced port. Retries the DHT announce and replaces a
    /// live tracker with one announcing the new port.
    pub fn update_port(&self, port: u16) {
        self.inner.update_port(port);
    }

    /// Tear down both backends and cancel the re-announce timer. An
    /// in-flight DHT announce is abandoned, so no `dhtAnnounce` follows.
    /// Resolves once every teardown has completed; teardown failures are
    /// logged, not returned. A DHT node supplied by the caller is left running.
    pub async fn stop(&self) {
        self.inner.stop().await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.inner.events.subscribe()
    }

    pub fn info_hash(&self) -> Option<InfoHash> {
        self.inner.state().identity.info_hash()
    }

    pub fn descriptor(&self) -> Option<ContentDescriptor> {
        self.inner.state().identity.descriptor().cloned()
    }

    pub fn port(&self) -> u16 {
        self.inner.state().port
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state().stopped
    }

    pub fn has_pending_reannounce(&self) -> bool {
        self.inner.state().scheduler.has_pending_timer()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: DiscoveryEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn emit_weak(weak: &Weak<Inner>, event: DiscoveryEvent) {
        if let Some(inner) = weak.upgrade() {
            inner.emit(event);
        }
    }

    fn spawn_listen(self: &Arc<Self>, backend: Arc<dyn DhtBackend>, port: Option<u16>) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            if let Err(e) = backend.listen(port).await {
                Inner::emit_weak(&weak, DiscoveryEvent::Warning(e));
            }
        });
    }

    fn wire_dht(self: &Arc<Self>, state: &mut State, backend: &dyn DhtBackend) {
        let weak = Arc::downgrade(self);
        state
            .subscriptions
            .listen(Source::Dht, "peer", backend.events(), move |e| {
                let DhtEvent::Peer { peer, info_hash } = e else {
                    return;
                };
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.state().identity.info_hash() != Some(info_hash) {
                    return;
                }
                inner.emit(DiscoveryEvent::Peer(Peer::Dht(peer.to_string())));
            });

        let events = self.events.clone();
        state
            .subscriptions
            .listen(Source::Dht, "warning", backend.events(), move |e| {
                if let DhtEvent::Warning(e) = e {
                    let _ = events.send(DiscoveryEvent::Warning(e));
                }
            });

        let events = self.events.clone();
        state
            .subscriptions
            .listen(Source::Dht, "error", backend.events(), move |e| {
                if let DhtEvent::Error(e) = e {
                    let _ = events.send(DiscoveryEvent::Error(e));
                }
            });
    }

    fn wire_tracker(&self, state: &mut State, tracker: &dyn TrackerClient) {
        let events = self.events.clone();
        state
            .subscriptions
            .listen(Source::Tracker, "peer", tracker.events(), move |e| {
                if let TrackerEvent::Peer(peer) = e {
                    let _ = events.send(DiscoveryEvent::Peer(Peer::Tracker(peer)));
                }
            });

        let events = self.events.clone();
        state
            .subscriptions
            .listen(Source::Tracker, "warning", tracker.events(), move |e| {
                if let TrackerEvent::Warning(e) = e {
                    let _ = events.send(DiscoveryEvent::Warning(e));
                }
            });

        let events = self.events.clone();
        state
            .subscriptions
            .listen(Source::Tracker, "error", tracker.events(), move |e| {
                if let TrackerEvent::Error(e) = e {
                    let _ = events.send(DiscoveryEvent::Error(e));
                }
            });

        let events = self.events.clone();
        state
            .subscriptions
            .listen(Source::Tracker, "update", tracker.events(), move |e| {
                if let TrackerEvent::Update(update) = e {
                    let _ = events.send(DiscoveryEvent::TrackerAnnounce(update));
                }
            });
    }

    fn set_identity(self: &Arc<Self>, input: IdentityInput) {
        {
            let mut state = self.state();
            if !state.identity.resolve(input) {
                return;
            }
            tracing::debug!(info_hash = ?state.identity.info_hash(), "identity set");

            if let Some(tracker) = state.tracker.live().cloned() {
                // created from a bare hash earlier, so it only lacks the length
                if let Some(length) = state.identity.length() {
                    tracker.set_content_length(length);
                }
            } else if state.tracker.is_pending()
                && state.tracker_replacement.is_none()
                && !state.stopped
            {
                self.create_tracker(&mut state);
            }
        }
        self.try_announce();
    }

    fn create_tracker(self: &Arc<Self>, state: &mut State) {
        let Some(factory) = self.tracker_factory.as_ref() else {
            return;
        };
        let Some(info_hash) = state.identity.info_hash() else {
            return;
        };

        let params = TrackerParams {
            peer_id: self.peer_id.clone(),
            port: state.port,
            info_hash,
            length: state.identity.length(),
            announce: state.identity.announce_list(&self.announce),
            rtc_config: self.rtc_config.clone(),
        };
        let trackers = params.announce.len();
        let tracker = factory.create(params);
        self.wire_tracker(state, tracker.as_ref());
        tracker.set_interval(self.interval);
        state.tracker = Slot::Live(tracker.clone());
        tracing::info!(%info_hash, port = state.port, trackers, "tracker created");

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            if let Err(e) = tracker.start().await {
                Inner::emit_weak(&weak, DiscoveryEvent::Warning(e));
            }
        });
    }

    fn try_announce(self: &Arc<Self>) {
        let mut state = self.state();
        if state.stopped || state.port == 0 {
            return;
        }
        let Some(info_hash) = state.identity.info_hash() else {
            return;
        };
        let Some(dht) = state.dht.live().map(|handle| handle.backend.clone()) else {
            return;
        };
        if !state.scheduler.begin() {
            return;
        }

        let port = state.port;
        let weak = Arc::downgrade(self);
        let announce = tokio::spawn(async move {
            let result = dht.announce(info_hash, port).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.state().scheduler.finish();
            if let Err(e) = result {
                inner.emit(DiscoveryEvent::Warning(e));
            }
            tracing::debug!(%info_hash, port, "dht announce complete");
            inner.emit(DiscoveryEvent::DhtAnnounce);
        });
        state.announce_task = Some(announce);

        // armed now, not on completion: a hung announce must not stall the cadence
        let weak = Arc::downgrade(self);
        let delay = state.scheduler.rearm(move || {
            if let Some(inner) = weak.upgrade() {
                inner.try_announce();
            }
        });
        tracing::trace!(?delay, "dht re-announce scheduled");
    }

    fn update_port(self: &Arc<Self>, port: u16) {
        {
            let mut state = self.state();
            if state.port == port {
                return;
            }
            state.port = port;
        }
        self.try_announce();

        let mut state = self.state();
        if state.stopped {
            return;
        }
        let Some(old) = state.tracker.take_live(Slot::Pending) else {
            return;
        };
        state.subscriptions.dispose_source(Source::Tracker);
        tracing::info!(port, "replacing tracker after port change");

        let weak = Arc::downgrade(self);
        let replacement = tokio::spawn(async move {
            if let Err(e) = old.stop().await {
                tracing::debug!(error = %e, "stopping replaced tracker failed");
            }
            if let Err(e) = old.destroy().await {
                tracing::warn!(error = %e, "destroying replaced tracker failed");
            }
            drop(old);

            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.state();
            state.tracker_replacement = None;
            if state.stopped || !state.tracker.is_pending() {
                return;
            }
            inner.create_tracker(&mut state);
        });
        state.tracker_replacement = Some(replacement);
    }

    async fn stop(&self) {
        let mut teardown: Vec<BoxFuture<'static, ()>> = Vec::new();
        {
            let mut state = self.state();
            state.stopped = true;
            state.scheduler.cancel();
            if let Some(announce) = state.announce_task.take() {
                announce.abort();
            }
            let disposed = state.subscriptions.dispose_all();
            tracing::debug!(disposed, "listeners removed");

            if let Some(tracker) = state.tracker.take_live(Slot::Disabled) {
                teardown.push(Box::pin(async move {
                    if let Err(e) = tracker.stop().await {
                        tracing::warn!(error = %e, "tracker stop failed");
                    }
                    if let Err(e) = tracker.destroy().await {
                        tracing::warn!(error = %e, "tracker destroy failed");
                    }
                }));
            }
            state.tracker = Slot::Disabled;

            if state.dht.live().is_some_and(|handle| handle.owned) {
                if let Some(handle) = state.dht.take_live(Slot::Disabled) {
                    teardown.push(Box::pin(async move {
                        if let Err(e) = handle.backend.destroy().await {
                            tracing::warn!(error = %e, "dht destroy failed");
                        }
                    }));
                }
            }

            if let Some(replacement) = state.tracker_replacement.take() {
                teardown.push(Box::pin(async move {
                    if let Err(e) = replacement.await {
                        tracing::warn!(error = %e, "tracker replacement task failed");
                    }
                }));
            }
        }

        let tasks = teardown.len();
        join_all(teardown).await;
        tracing::debug!(tasks, "discovery stopped");
    }
}
