use std::path::PathBuf;

use async_trait::async_trait;
use rand::RngCore;
use swarm_discovery::DiscoveryConfig;

use crate::{AppState, Op};

const DEFAULT_PORT: u16 = 6881;
const PEER_ID_LEN: usize = 20;

#[derive(Debug, clap::Args, Clone)]
pub struct Init {
    /// Replace an existing config
    #[arg(long)]
    pub overwrite: bool,

    /// Peer id to announce with, random if omitted
    #[arg(long)]
    pub peer_id: Option<String>,

    /// Port peers should connect to
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("default error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("app state error: {0}")]
    AppState(#[from] crate::state::AppStateSetupError),
}

fn random_peer_id() -> String {
    let mut bytes = [0u8; PEER_ID_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl Op for Init {
    type Error = InitError;
    type Output = PathBuf;

    async fn execute(&self, state: &AppState) -> Result<Self::Output, Self::Error> {
        let peer_id = self.peer_id.clone().unwrap_or_else(random_peer_id);
        let config = DiscoveryConfig::new(peer_id, self.port);
        config
            .validate()
            .map_err(|e| InitError::Default(e.into()))?;

        let path = state.init_on_disk_config(&config, self.overwrite)?;
        tracing::info!(path = %path.display(), "wrote discovery config");
        Ok(path)
    }
}
