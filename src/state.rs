use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::AgentSession;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<AgentSession>,
    /// Cancelled on shutdown; in-flight run polling watches child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, session: AgentSession) -> Self {
        Self {
            config: Arc::new(config),
            session: Arc::new(session),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let session = AgentSession::from_config(&config.agent_service)?;
        Ok(Self::new(config, session))
    }
}
