use market_core::AgentId;

use crate::config::ConfigError;
use crate::fsm::ConfigurationError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("behavior graph is invalid: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no live agent {0}")]
    UnknownAgent(AgentId),
}

pub type SimResult<T> = Result<T, SimError>;
