use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentId, AgentRole, ProducedBy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sequence_no: u64,
    pub tick_index: u64,
    pub from_agent_id: AgentId,
    pub to_agent_id: AgentId,
    /// `None` for the seed message, whose sender is not in the roster.
    pub role_of_sender: Option<AgentRole>,
    pub model_label_of_sender: Option<String>,
    pub content: String,
    pub produced_by: ProducedBy,
    pub recorded_at: DateTime<Utc>,
}

impl Message {
    pub fn involves(&self, agent_id: &str) -> bool {
        self.from_agent_id == agent_id || self.to_agent_id == agent_id
    }
}

/// A message before the ledger has assigned its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub from_agent_id: AgentId,
    pub to_agent_id: AgentId,
    pub role_of_sender: Option<AgentRole>,
    pub model_label_of_sender: Option<String>,
    pub content: String,
    pub produced_by: ProducedBy,
}

impl MessageDraft {
    pub fn into_message(self, sequence_no: u64, tick_index: u64) -> Message {
        Message {
            sequence_no,
            tick_index,
            from_agent_id: self.from_agent_id,
            to_agent_id: self.to_agent_id,
            role_of_sender: self.role_of_sender,
            model_label_of_sender: self.model_label_of_sender,
            content: self.content,
            produced_by: self.produced_by,
            recorded_at: Utc::now(),
        }
    }
}

/// Inclusive range of tick indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub start: u64,
    pub end: u64,
}

impl TickRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn single(tick: u64) -> Self {
        Self::new(tick, tick)
    }

    pub fn contains(&self, tick: u64) -> bool {
        self.start <= tick && tick <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Matches messages sent or received by this agent.
    pub agent_id: Option<AgentId>,
    pub tick_range: Option<TickRange>,
}

impl MessageFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_agent(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn within(mut self, range: TickRange) -> Self {
        self.tick_range = Some(range);
        self
    }

    pub fn matches(&self, message: &Message) -> bool {
        let agent_ok = self
            .agent_id
            .as_deref()
            .map(|id| message.involves(id))
            .unwrap_or(true);
        let tick_ok = self
            .tick_range
            .map(|range| range.contains(message.tick_index))
            .unwrap_or(true);
        agent_ok && tick_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_message(from: &str, to: &str, tick: u64) -> Message {
        MessageDraft {
            from_agent_id: from.to_string(),
            to_agent_id: to.to_string(),
            role_of_sender: Some(AgentRole::Worker),
            model_label_of_sender: Some("stub".to_string()),
            content: "payload".to_string(),
            produced_by: ProducedBy::Stub,
        }
        .into_message(0, tick)
    }

    #[test]
    fn test_filter_by_agent_matches_either_endpoint() {
        let filter = MessageFilter::all().for_agent("b");
        assert!(filter.matches(&create_test_message("a", "b", 1)));
        assert!(filter.matches(&create_test_message("b", "c", 2)));
        assert!(!filter.matches(&create_test_message("a", "c", 2)));
    }

    #[test]
    fn test_filter_by_tick_range_is_inclusive() {
        let filter = MessageFilter::all().within(TickRange::new(1, 2));
        assert!(!filter.matches(&create_test_message("a", "b", 0)));
        assert!(filter.matches(&create_test_message("a", "b", 1)));
        assert!(filter.matches(&create_test_message("a", "b", 2)));
        assert!(!filter.matches(&create_test_message("a", "b", 3)));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(MessageFilter::all().matches(&create_test_message("x", "y", 7)));
    }
}
