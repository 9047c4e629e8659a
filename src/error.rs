use std::time::Duration;

use thiserror::Error;

use crate::types::{AgentId, RunStatus};

/// Rejected configuration. Reported synchronously, never partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("roster is empty")]
    EmptyRoster,

    #[error("duplicate agent id '{0}'")]
    DuplicateAgentId(AgentId),

    #[error("link {from} -> {to} references an unknown agent")]
    DanglingLink { from: AgentId, to: AgentId },

    #[error("first agent '{0}' is not in the roster")]
    UnknownFirstAgent(AgentId),

    #[error("agent '{0}' cannot link to itself")]
    SelfLink(AgentId),

    #[error("agent id '{0}' is reserved")]
    ReservedAgentId(AgentId),

    #[error("run already started; roster and graph are frozen")]
    RunAlreadyStarted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider rate limited")]
    RateLimited,

    #[error("no backend for model label '{0}'")]
    InvalidModelLabel(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            ProviderError::RateLimited
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("cannot {operation} while run is {from}")]
    InvalidTransition {
        from: RunStatus,
        operation: &'static str,
    },

    #[error("request budget exceeded: {used} of {limit} used, round needs {requested}")]
    RequestBudgetExceeded { limit: u64, used: u64, requested: u64 },

    #[error("agent '{agent_id}' failed to generate: {source}")]
    Provider {
        agent_id: AgentId,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RunError {
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, RunError::RequestBudgetExceeded { .. })
    }
}

pub type RunResult<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = RunError::InvalidTransition {
            from: RunStatus::Stopped,
            operation: "tick",
        };
        assert_eq!(err.to_string(), "cannot tick while run is STOPPED");
    }

    #[test]
    fn test_provider_error_is_source() {
        let err = RunError::Provider {
            agent_id: "b".to_string(),
            source: ProviderError::RateLimited,
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "provider rate limited");
    }
}
