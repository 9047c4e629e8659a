use serde::{Deserialize, Serialize};

use super::{AgentId, AgentRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    #[serde(default)]
    pub role: AgentRole,
    /// Opaque to the runtime; resolved by the live provider only.
    pub model_label: String,
}

impl Agent {
    pub fn new(id: impl Into<AgentId>, role: AgentRole, model_label: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            role,
            model_label: model_label.into(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

/// Directed edge `from -> to`. No implicit reverse edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub from: AgentId,
    pub to: AgentId,
}

impl Link {
    pub fn new(from: impl Into<AgentId>, to: impl Into<AgentId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}
