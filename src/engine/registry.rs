use std::collections::HashMap;

use crate::error::ConfigError;
use crate::types::{Agent, AgentId, USER_SENDER_ID};

/// Roster of agents for one run. Insertion order is preserved for display.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
    frozen: bool,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a full roster, rejecting empty or colliding input.
    pub fn from_agents(agents: Vec<Agent>) -> Result<Self, ConfigError> {
        if agents.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }

        let mut registry = Self::new();
        for agent in agents {
            registry.insert(agent)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, agent: Agent) -> Result<(), ConfigError> {
        if self.frozen {
            return Err(ConfigError::RunAlreadyStarted);
        }
        if agent.id == USER_SENDER_ID {
            return Err(ConfigError::ReservedAgentId(agent.id));
        }
        if self.index.contains_key(&agent.id) {
            return Err(ConfigError::DuplicateAgentId(agent.id));
        }

        self.index.insert(agent.id.clone(), self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    pub fn get(&self, agent_id: &str) -> Option<&Agent> {
        self.index.get(agent_id).map(|&i| &self.agents[i])
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.index.contains_key(agent_id)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}
