use async_trait::async_trait;

use crate::{AppState, Op};

/// Print the effective config, environment overrides included
#[derive(Debug, clap::Args, Clone)]
pub struct Show {}

#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    #[error("app state error: {0}")]
    AppState(#[from] crate::state::AppStateSetupError),
    #[error("could not render config: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
impl Op for Show {
    type Error = ShowError;
    type Output = String;

    async fn execute(&self, state: &AppState) -> Result<Self::Output, Self::Error> {
        let config = state.load_config()?;
        Ok(serde_json::to_string_pretty(&config)?)
    }
}
