use crate::types::{Message, MessageDraft, MessageFilter};

/// Append-only record of every exchange in a run.
///
/// Sequence numbers start at 1 and strictly increase; tick indices never go
/// backwards. Messages are never mutated or removed once appended.
#[derive(Debug, Clone, Default)]
pub struct MessageLedger {
    messages: Vec<Message>,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a draft at `tick_index` and returns its sequence number.
    ///
    /// # Panics
    ///
    /// Panics if `tick_index` is lower than the last recorded tick. The tick
    /// engine never does this; hitting it is a bug in the caller.
    pub fn append(&mut self, draft: MessageDraft, tick_index: u64) -> u64 {
        let last_tick = self.last_tick();
        assert!(
            last_tick.map_or(true, |last| tick_index >= last),
            "ledger tick regression: {} after {:?}",
            tick_index,
            last_tick
        );

        let sequence_no = self.next_sequence_no();
        self.messages.push(draft.into_message(sequence_no, tick_index));
        sequence_no
    }

    /// Lazily yields matching messages in ascending sequence order.
    pub fn list<'a>(&'a self, filter: &'a MessageFilter) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| filter.matches(m))
    }

    /// Messages recorded at exactly `tick_index`, in insertion order.
    pub fn at_tick(&self, tick_index: u64) -> impl Iterator<Item = &Message> {
        // Ticks are non-decreasing, so the tail holds the latest round.
        let start = self
            .messages
            .partition_point(|m| m.tick_index < tick_index);
        self.messages[start..]
            .iter()
            .take_while(move |m| m.tick_index == tick_index)
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.messages.last().map(|m| m.tick_index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn next_sequence_no(&self) -> u64 {
        self.messages.last().map_or(1, |m| m.sequence_no + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentRole, ProducedBy, TickRange};

    fn create_test_draft(from: &str, to: &str) -> MessageDraft {
        MessageDraft {
            from_agent_id: from.to_string(),
            to_agent_id: to.to_string(),
            role_of_sender: Some(AgentRole::Worker),
            model_label_of_sender: Some("stub".to_string()),
            content: format!("{} to {}", from, to),
            produced_by: ProducedBy::Stub,
        }
    }

    fn create_test_ledger() -> MessageLedger {
        let mut ledger = MessageLedger::new();
        ledger.append(create_test_draft("user", "a"), 0);
        ledger.append(create_test_draft("a", "b"), 1);
        ledger.append(create_test_draft("a", "c"), 1);
        ledger.append(create_test_draft("b", "c"), 2);
        ledger
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let mut ledger = MessageLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.append(create_test_draft("user", "a"), 0), 1);
        assert_eq!(ledger.append(create_test_draft("a", "b"), 1), 2);
        assert_eq!(ledger.append(create_test_draft("a", "c"), 1), 3);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    #[should_panic(expected = "ledger tick regression")]
    fn test_tick_regression_panics() {
        let mut ledger = MessageLedger::new();
        ledger.append(create_test_draft("a", "b"), 2);
        ledger.append(create_test_draft("b", "c"), 1);
    }

    #[test]
    fn test_list_filters_and_keeps_order() {
        let ledger = create_test_ledger();

        let filter = MessageFilter::all().for_agent("c");
        let seqs: Vec<u64> = ledger.list(&filter).map(|m| m.sequence_no).collect();
        assert_eq!(seqs, vec![3, 4]);

        let filter = MessageFilter::all().within(TickRange::single(1));
        let seqs: Vec<u64> = ledger.list(&filter).map(|m| m.sequence_no).collect();
        assert_eq!(seqs, vec![2, 3]);
    }

    #[test]
    fn test_list_is_restartable() {
        let ledger = create_test_ledger();
        let filter = MessageFilter::all();

        let first: Vec<Message> = ledger.list(&filter).cloned().collect();
        let second: Vec<Message> = ledger.list(&filter).cloned().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_at_tick() {
        let ledger = create_test_ledger();

        let tick_one: Vec<&str> = ledger.at_tick(1).map(|m| m.to_agent_id.as_str()).collect();
        assert_eq!(tick_one, vec!["b", "c"]);
        assert_eq!(ledger.at_tick(5).count(), 0);
        assert_eq!(ledger.last_tick(), Some(2));
    }
}
