pub mod agent;
pub mod message;
pub mod run;

pub use agent::{Agent, Link};
pub use message::{Message, MessageDraft, MessageFilter, TickRange};
pub use run::{Run, RunSnapshot, RunSpec, TickResult};

use serde::{Deserialize, Serialize};
use std::fmt;

pub type AgentId = String;
pub type RunId = uuid::Uuid;

/// Sender id of the synthetic tick-0 message. Not a registry member.
pub const USER_SENDER_ID: &str = "user";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Orchestrator,
    Foreman,
    Worker,
    Reviewer,
    Fixer,
    #[default]
    Unspecified,
}

impl AgentRole {
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Orchestrator => "orchestrator",
            AgentRole::Foreman => "foreman",
            AgentRole::Worker => "worker",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Fixer => "fixer",
            AgentRole::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Configured, // Roster and graph still mutable
    Running,    // Frozen, ticks allowed
    Stopped,    // Terminal, operator stop
    Complete,   // Terminal, no legal deliveries left
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Configured => "CONFIGURED",
            RunStatus::Running => "RUNNING",
            RunStatus::Stopped => "STOPPED",
            RunStatus::Complete => "COMPLETE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Complete)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducedBy {
    Seed,
    Stub,
    Live,
}

impl ProducedBy {
    pub fn as_str(&self) -> &str {
        match self {
            ProducedBy::Seed => "seed",
            ProducedBy::Stub => "stub",
            ProducedBy::Live => "live",
        }
    }
}
