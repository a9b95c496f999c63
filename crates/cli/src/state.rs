use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use dotenvy::dotenv;
use swarm_discovery::DiscoveryConfig;

use crate::args::Args;

pub const DEFAULT_HOME_ENV: &str = "HOME";
pub const DEFAULT_XDG_CONFIG_DIR: &str = ".config";
pub const DEFAULT_XDG_CONFIG_DIR_NAME: &str = "swarm-discovery";
pub const DEFAULT_CONFIG_NAME: &str = "discovery.conf";
pub const CONFIG_PATH_ENV: &str = "SWARM_DISCOVERY_CONFIG_PATH";

pub const PEER_ID_ENV: &str = "DISCOVERY_PEER_ID";
pub const PORT_ENV: &str = "DISCOVERY_PORT";
pub const INTERVAL_ENV: &str = "DISCOVERY_INTERVAL_MS";
pub const ANNOUNCE_ENV: &str = "DISCOVERY_ANNOUNCE";
pub const DHT_PORT_ENV: &str = "DISCOVERY_DHT_PORT";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

pub struct AppState {
    config_dir: PathBuf,
    log_level: tracing::Level,
}

impl AppState {
    pub fn new(config_dir: PathBuf, log_level: tracing::Level) -> Self {
        Self {
            config_dir,
            log_level,
        }
    }

    pub fn try_from(args: &Args) -> Result<Self, AppStateSetupError> {
        // a missing .env is normal
        let _ = dotenv();

        let config_dir = match &args.config_dir {
            Some(dir) => dir.clone(),
            None => Self::find_xdg_config_dir()?,
        };
        let log_level = env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|level| tracing::Level::from_str(&level).ok())
            .unwrap_or(tracing::Level::INFO);

        Ok(Self::new(config_dir, log_level))
    }

    fn find_xdg_config_dir() -> Result<PathBuf, AppStateSetupError> {
        let home_dir_env =
            env::var(DEFAULT_HOME_ENV).map_err(|_| AppStateSetupError::MissingHome)?;
        let home_dir = PathBuf::from(home_dir_env);
        let xdg_dir = home_dir.join(DEFAULT_XDG_CONFIG_DIR);
        Ok(xdg_dir.join(DEFAULT_XDG_CONFIG_DIR_NAME))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(DEFAULT_CONFIG_NAME)
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level
    }

    pub fn init_on_disk_config(
        &self,
        config: &DiscoveryConfig,
        overwrite: bool,
    ) -> Result<PathBuf, AppStateSetupError> {
        let path = self.config_dir.clone();
        let config_path = self.config_path();
        if config_path.exists() && !overwrite {
            return Err(AppStateSetupError::ConfigAlreadyExists);
        }
        std::fs::create_dir_all(&path).map_err(|e| AppStateSetupError::Io(e, path.clone()))?;

        let config_json = serde_json::to_string_pretty(config)?;
        std::fs::write(&config_path, config_json)
            .map_err(|e| AppStateSetupError::Io(e, config_path.clone()))?;
        Ok(config_path)
    }

    pub fn load_on_disk_config(&self) -> Result<DiscoveryConfig, AppStateSetupError> {
        let config_path = self.config_path();
        if !config_path.exists() {
            return Err(AppStateSetupError::MissingConfig);
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| AppStateSetupError::Io(e, config_path))?;
        let config: DiscoveryConfig = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// On-disk config with environment overrides applied
    pub fn load_config(&self) -> Result<DiscoveryConfig, AppStateSetupError> {
        let mut config = self.load_on_disk_config()?;
        apply_env_overrides(&mut config, |name| env::var(name).ok())?;
        Ok(config)
    }
}

fn parse_env<T: FromStr>(name: &'static str, value: String) -> Result<T, AppStateSetupError> {
    value
        .parse()
        .map_err(|_| AppStateSetupError::InvalidEnv { name, value })
}

pub fn apply_env_overrides(
    config: &mut DiscoveryConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), AppStateSetupError> {
    if let Some(peer_id) = var(PEER_ID_ENV) {
        config.peer_id = peer_id;
    }
    if let Some(port) = var(PORT_ENV) {
        config.port = parse_env(PORT_ENV, port)?;
    }
    if let Some(interval) = var(INTERVAL_ENV) {
        let millis: u64 = parse_env(INTERVAL_ENV, interval)?;
        config.interval = std::time::Duration::from_millis(millis);
    }
    if let Some(announce) = var(ANNOUNCE_ENV) {
        config.announce = announce
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(dht_port) = var(DHT_PORT_ENV) {
        config.dht_port = Some(parse_env(DHT_PORT_ENV, dht_port)?);
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum AppStateSetupError {
    #[error("io: {0:?} path: {1:?}")]
    Io(std::io::Error, PathBuf),
    #[error("invalid config: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config already exists")]
    ConfigAlreadyExists,
    #[error("missing config, run `swarm-discovery init` first")]
    MissingConfig,
    #[error("HOME is not set")]
    MissingHome,
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}
