use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::backend::{
    DhtBackend, DhtEvent, DhtFactory, TrackerClient, TrackerEvent, TrackerFactory, TrackerParams,
};
use crate::error::BackendError;
use crate::types::{DhtPeer, InfoHash, TrackerPeer, TrackerUpdate};

const EVENT_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn delay(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default)]
struct MockDhtState {
    announces: Vec<(InfoHash, u16)>,
    listened: Option<Option<u16>>,
    destroyed: usize,
    announce_delay: Duration,
    destroy_delay: Duration,
    fail_announces: bool,
    hang_announces: bool,
    // answer each announce with ourselves as a peer on this host
    loopback_host: Option<String>,
}

/// In-memory DHT node with scriptable latency and failures
pub struct MockDht {
    state: Mutex<MockDhtState>,
    events: broadcast::Sender<DhtEvent>,
}

impl Default for MockDht {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDht {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(MockDhtState::default()),
            events,
        }
    }

    /// A node that reports `host` as a peer for every hash it announces
    pub fn loopback(host: impl Into<String>) -> Self {
        let dht = Self::new();
        lock(&dht.state).loopback_host = Some(host.into());
        dht
    }

    pub fn set_announce_delay(&self, duration: Duration) {
        lock(&self.state).announce_delay = duration;
    }

    pub fn set_destroy_delay(&self, duration: Duration) {
        lock(&self.state).destroy_delay = duration;
    }

    pub fn fail_announces(&self, fail: bool) {
        lock(&self.state).fail_announces = fail;
    }

    /// Announces issued from now on never complete
    pub fn hang_announces(&self, hang: bool) {
        lock(&self.state).hang_announces = hang;
    }

    pub fn announces(&self) -> Vec<(InfoHash, u16)> {
        lock(&self.state).announces.clone()
    }

    pub fn announce_count(&self) -> usize {
        lock(&self.state).announces.len()
    }

    /// `None` if never listened, otherwise the requested port
    pub fn listened(&self) -> Option<Option<u16>> {
        lock(&self.state).listened
    }

    pub fn destroy_count(&self) -> usize {
        lock(&self.state).destroyed
    }

    pub fn emit_peer(&self, host: impl Into<String>, port: u16, info_hash: InfoHash) {
        let peer = DhtPeer {
            host: host.into(),
            port,
        };
        let _ = self.events.send(DhtEvent::Peer { peer, info_hash });
    }

    pub fn emit_warning(&self, message: &'static str) {
        let _ = self.events.send(DhtEvent::Warning(BackendError::msg(message)));
    }

    pub fn emit_error(&self, message: &'static str) {
        let _ = self.events.send(DhtEvent::Error(BackendError::msg(message)));
    }
}

#[async_trait]
impl DhtBackend for MockDht {
    async fn listen(&self, port: Option<u16>) -> Result<(), BackendError> {
        lock(&self.state).listened = Some(port);
        Ok(())
    }

    async fn announce(&self, info_hash: InfoHash, port: u16) -> Result<(), BackendError> {
        let (wait, fail, hang) = {
            let mut state = lock(&self.state);
            state.announces.push((info_hash, port));
            (state.announce_delay, state.fail_announces, state.hang_announces)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        delay(wait).await;
        if fail {
            return Err(BackendError::msg("dht announce failed"));
        }

        let loopback = lock(&self.state).loopback_host.clone();
        if let Some(host) = loopback {
            self.emit_peer(host, port, info_hash);
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        let wait = lock(&self.state).destroy_delay;
        delay(wait).await;
        lock(&self.state).destroyed += 1;
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<DhtEvent> {
        self.events.subscribe()
    }
}

/// Creates [`MockDht`] nodes and keeps them around for inspection
#[derive(Default)]
pub struct MockDhtFactory {
    loopback_host: Option<String>,
    created: Mutex<Vec<Arc<MockDht>>>,
}

impl MockDhtFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loopback(host: impl Into<String>) -> Self {
        Self {
            loopback_host: Some(host.into()),
            ..Default::default()
        }
    }

    pub fn created(&self) -> Vec<Arc<MockDht>> {
        lock(&self.created).clone()
    }
}

impl DhtFactory for MockDhtFactory {
    fn create(&self) -> Arc<dyn DhtBackend> {
        let dht = Arc::new(match &self.loopback_host {
            Some(host) => MockDht::loopback(host.clone()),
            None => MockDht::new(),
        });
        lock(&self.created).push(dht.clone());
        dht
    }
}

#[derive(Debug, Default)]
struct MockTrackerState {
    interval: Option<Duration>,
    content_length: Option<u64>,
    started: usize,
    stopped: usize,
    destroyed: usize,
    destroy_delay: Duration,
    loopback: bool,
}

/// In-memory tracker client recording every lifecycle call
pub struct MockTracker {
    params: TrackerParams,
    state: Mutex<MockTrackerState>,
    events: broadcast::Sender<TrackerEvent>,
}

impl MockTracker {
    pub fn new(params: TrackerParams) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            params,
            state: Mutex::new(MockTrackerState::default()),
            events,
        }
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    pub fn interval(&self) -> Option<Duration> {
        lock(&self.state).interval
    }

    pub fn content_length(&self) -> Option<u64> {
        lock(&self.state).content_length
    }

    pub fn start_count(&self) -> usize {
        lock(&self.state).started
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.state).stopped
    }

    pub fn destroy_count(&self) -> usize {
        lock(&self.state).destroyed
    }

    pub fn emit_peer(&self, peer: TrackerPeer) {
        let _ = self.events.send(TrackerEvent::Peer(peer));
    }

    pub fn emit_update(&self, update: TrackerUpdate) {
        let _ = self.events.send(TrackerEvent::Update(update));
    }

    pub fn emit_warning(&self, message: &'static str) {
        let _ = self
            .events
            .send(TrackerEvent::Warning(BackendError::msg(message)));
    }

    pub fn emit_error(&self, message: &'static str) {
        let _ = self.events.send(TrackerEvent::Error(BackendError::msg(message)));
    }
}

#[async_trait]
impl TrackerClient for MockTracker {
    fn set_interval(&self, interval: Duration) {
        lock(&self.state).interval = Some(interval);
    }

    fn set_content_length(&self, length: u64) {
        lock(&self.state).content_length = Some(length);
    }

    async fn start(&self) -> Result<(), BackendError> {
        let loopback = {
            let mut state = lock(&self.state);
            state.started += 1;
            state.loopback
        };
        if loopback {
            for url in &self.params.announce {
                self.emit_update(TrackerUpdate {
                    announce: url.to_string(),
                    complete: 0,
                    incomplete: 1,
                });
            }
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        lock(&self.state).stopped += 1;
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        let wait = lock(&self.state).destroy_delay;
        delay(wait).await;
        lock(&self.state).destroyed += 1;
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }
}

/// Creates [`MockTracker`]s in order and keeps them for inspection
#[derive(Default)]
pub struct MockTrackerFactory {
    loopback: bool,
    destroy_delay: Mutex<Duration>,
    trackers: Mutex<Vec<Arc<MockTracker>>>,
}

impl MockTrackerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trackers that answer `start` with one update per announce url
    pub fn loopback() -> Self {
        Self {
            loopback: true,
            ..Default::default()
        }
    }

    /// Applies to trackers created after the call
    pub fn set_destroy_delay(&self, duration: Duration) {
        *lock(&self.destroy_delay) = duration;
    }

    pub fn trackers(&self) -> Vec<Arc<MockTracker>> {
        lock(&self.trackers).clone()
    }

    pub fn last(&self) -> Option<Arc<MockTracker>> {
        lock(&self.trackers).last().cloned()
    }
}

impl TrackerFactory for MockTrackerFactory {
    fn create(&self, params: TrackerParams) -> Arc<dyn TrackerClient> {
        let tracker = MockTracker::new(params);
        {
            let mut state = lock(&tracker.state);
            state.destroy_delay = *lock(&self.destroy_delay);
            state.loopback = self.loopback;
        }
        let tracker = Arc::new(tracker);
        lock(&self.trackers).push(tracker.clone());
        tracker
    }
}
