use std::fmt::{Debug, Display};
use std::sync::Arc;

/// Raised synchronously by [`crate::Coordinator::new`]; no backend is touched
/// when construction fails.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("peer id required")]
    MissingPeerId,
    #[error("port required")]
    MissingPort,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InfoHashError {
    #[error("info hash must be 20 bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex in info hash: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Error surfaced by a DHT or tracker backend.
///
/// Backend failures fan out through broadcast channels, so the underlying
/// error is shared rather than owned.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(Arc<anyhow::Error>);

impl BackendError {
    pub fn msg<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }
}

impl From<anyhow::Error> for BackendError {
    fn from(e: anyhow::Error) -> Self {
        Self(Arc::new(e))
    }
}
