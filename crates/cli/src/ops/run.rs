use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swarm_discovery::mock::{MockDhtFactory, MockTrackerFactory};
use swarm_discovery::{
    Backends, ConfigError, Coordinator, DhtSource, DiscoveryEvent, InfoHash, InfoHashError, Peer,
};
use tokio::sync::broadcast::error::RecvError;

use crate::utils;
use crate::{AppState, Op};

const LOOPBACK_HOST: &str = "127.0.0.1";

/// Run discovery for one info hash against in-process loopback backends
#[derive(Debug, clap::Args, Clone)]
pub struct Run {
    /// Hex encoded info hash
    #[arg(long)]
    pub hash: String,

    /// Overrides the configured port
    #[arg(long)]
    pub port: Option<u16>,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("app state error: {0}")]
    AppState(#[from] crate::state::AppStateSetupError),
    #[error("invalid hash: {0}")]
    InfoHash(#[from] InfoHashError),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("could not install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub info_hash: String,
    pub dht_peers: usize,
    pub tracker_peers: usize,
    pub dht_announces: usize,
    pub tracker_announces: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl RunOutput {
    fn record(&mut self, event: &DiscoveryEvent) {
        match event {
            DiscoveryEvent::Peer(Peer::Dht(_)) => self.dht_peers += 1,
            DiscoveryEvent::Peer(Peer::Tracker(_)) => self.tracker_peers += 1,
            DiscoveryEvent::DhtAnnounce => self.dht_announces += 1,
            DiscoveryEvent::TrackerAnnounce(_) => self.tracker_announces += 1,
            DiscoveryEvent::Warning(_) => self.warnings += 1,
            DiscoveryEvent::Error(_) => self.errors += 1,
        }
    }
}

impl fmt::Display for RunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "info hash:         {}", self.info_hash)?;
        writeln!(f, "dht peers:         {}", self.dht_peers)?;
        writeln!(f, "tracker peers:     {}", self.tracker_peers)?;
        writeln!(f, "dht announces:     {}", self.dht_announces)?;
        writeln!(f, "tracker announces: {}", self.tracker_announces)?;
        writeln!(f, "warnings:          {}", self.warnings)?;
        write!(f, "errors:            {}", self.errors)
    }
}

fn loopback_backends() -> Backends {
    Backends {
        dht: DhtSource::Factory(Arc::new(MockDhtFactory::loopback(LOOPBACK_HOST))),
        tracker: Some(Arc::new(MockTrackerFactory::loopback())),
    }
}

#[async_trait]
impl Op for Run {
    type Error = RunError;
    type Output = RunOutput;

    async fn execute(&self, state: &AppState) -> Result<Self::Output, Self::Error> {
        let _guard = utils::init_logging(state.log_level());
        utils::register_panic_logger();
        utils::report_version();

        let info_hash = InfoHash::from_str(&self.hash)?;
        let mut config = state.load_config()?;
        if let Some(port) = self.port {
            config.port = port;
        }
        tracing::debug!(config_dir = %state.config_dir().display(), "loaded config");

        let coordinator = Coordinator::new(config, loopback_backends())?;
        let mut events = coordinator.subscribe();
        coordinator.set_identity(info_hash);
        tracing::info!(%info_hash, port = coordinator.port(), "discovery running");

        let (shutdown_handle, mut shutdown_rx) = utils::graceful_shutdown_blocker()?;
        let duration = self.duration_secs.map(Duration::from_secs);
        let deadline = async move {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut output = RunOutput {
            info_hash: info_hash.to_hex(),
            ..Default::default()
        };
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        tracing::info!(event = event.name(), ?event, "discovery event");
                        output.record(&event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.changed() => break,
                _ = &mut deadline => break,
            }
        }

        coordinator.stop().await;
        shutdown_handle.abort();
        tracing::info!("discovery stopped");

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use swarm_discovery::{BackendError, TrackerPeer, TrackerUpdate};

    use super::*;

    #[test]
    fn output_tallies_each_event_kind() {
        let mut output = RunOutput::default();
        let events = [
            DiscoveryEvent::Peer(Peer::Dht("127.0.0.1:6881".to_string())),
            DiscoveryEvent::Peer(Peer::Tracker(TrackerPeer::default())),
            DiscoveryEvent::DhtAnnounce,
            DiscoveryEvent::DhtAnnounce,
            DiscoveryEvent::TrackerAnnounce(TrackerUpdate::default()),
            DiscoveryEvent::Warning(BackendError::msg("slow")),
        ];
        for event in &events {
            output.record(event);
        }

        assert_eq!(output.dht_peers, 1);
        assert_eq!(output.tracker_peers, 1);
        assert_eq!(output.dht_announces, 2);
        assert_eq!(output.tracker_announces, 1);
        assert_eq!(output.warnings, 1);
        assert_eq!(output.errors, 0);
    }

    #[tokio::test]
    async fn run_finds_itself_through_loopback_backends() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().to_path_buf(), tracing::Level::WARN);
        let mut config = swarm_discovery::DiscoveryConfig::new("peer", 6881);
        config.announce = vec!["wss://tracker.example".to_string()];
        state.init_on_disk_config(&config, false).unwrap();

        let op = Run {
            hash: "ab".repeat(20),
            port: None,
            duration_secs: Some(1),
        };
        let output = op.execute(&state).await.unwrap();

        assert_eq!(output.info_hash, "ab".repeat(20));
        assert_eq!(output.dht_announces, 1);
        assert_eq!(output.dht_peers, 1);
        assert_eq!(output.tracker_announces, 1);
        assert_eq!(output.errors, 0);
    }

    #[tokio::test]
    async fn run_rejects_a_malformed_hash() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().to_path_buf(), tracing::Level::WARN);
        let op = Run {
            hash: "not-a-hash".to_string(),
            port: None,
            duration_secs: Some(0),
        };
        assert!(matches!(
            op.execute(&state).await,
            Err(RunError::InfoHash(_))
        ));
    }
}
