use serde::{Deserialize, Serialize};

use super::{Agent, AgentId, Link, Message, RunId, RunStatus};

/// Everything `configure` needs to build a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub links: Vec<Link>,
    pub first_agent_id: AgentId,
    pub initial_prompt: String,
    #[serde(default)]
    pub max_requests: Option<u64>,
}

impl RunSpec {
    pub fn new(
        agents: Vec<Agent>,
        links: Vec<Link>,
        first_agent_id: impl Into<AgentId>,
        initial_prompt: impl Into<String>,
    ) -> Self {
        Self {
            agents,
            links,
            first_agent_id: first_agent_id.into(),
            initial_prompt: initial_prompt.into(),
            max_requests: None,
        }
    }

    pub fn with_max_requests(mut self, max_requests: u64) -> Self {
        self.max_requests = Some(max_requests);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub current_tick: u64,
    pub active_agent_id: Option<AgentId>,
    pub first_agent_id: AgentId,
    pub initial_prompt: String,
    pub request_count: u64,
    pub max_requests: Option<u64>,
    pub autorun_enabled: bool,
}

impl Run {
    pub fn new(first_agent_id: AgentId, initial_prompt: String, max_requests: Option<u64>) -> Self {
        Self {
            id: RunId::new_v4(),
            status: RunStatus::Configured,
            current_tick: 0,
            active_agent_id: None,
            first_agent_id,
            initial_prompt,
            request_count: 0,
            max_requests,
            autorun_enabled: false,
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.id,
            status: self.status,
            current_tick: self.current_tick,
            active_agent_id: self.active_agent_id.clone(),
            request_count: self.request_count,
            max_requests: self.max_requests,
            autorun_enabled: self.autorun_enabled,
        }
    }
}

/// Read model returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub status: RunStatus,
    pub current_tick: u64,
    pub active_agent_id: Option<AgentId>,
    pub request_count: u64,
    pub max_requests: Option<u64>,
    pub autorun_enabled: bool,
}

impl RunSnapshot {
    /// Requests still available under the cap, `None` when uncapped.
    pub fn remaining_requests(&self) -> Option<u64> {
        self.max_requests
            .map(|max| max.saturating_sub(self.request_count))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickResult {
    pub new_messages: Vec<Message>,
    pub current_tick: u64,
    pub status: RunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_starts_configured_at_tick_zero() {
        let run = Run::new("a".to_string(), "hello".to_string(), None);
        assert_eq!(run.status, RunStatus::Configured);
        assert_eq!(run.current_tick, 0);
        assert_eq!(run.request_count, 0);
        assert!(run.active_agent_id.is_none());
        assert!(!run.autorun_enabled);
    }

    #[test]
    fn test_remaining_requests() {
        let mut run = Run::new("a".to_string(), "hello".to_string(), Some(5));
        run.request_count = 3;
        assert_eq!(run.snapshot().remaining_requests(), Some(2));

        run.request_count = 9;
        assert_eq!(run.snapshot().remaining_requests(), Some(0));

        run.max_requests = None;
        assert_eq!(run.snapshot().remaining_requests(), None);
    }
}
