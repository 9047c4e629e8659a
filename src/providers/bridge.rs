use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::ProviderError;
use crate::providers::registry::ModelRegistry;
use crate::types::{Agent, AgentRole, Message, ProducedBy};

/// Everything a provider sees when an agent responds along one edge.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// Tick the response will be recorded at.
    pub tick_index: u64,
    pub sender: Agent,
    pub recipient: Agent,
    /// Messages delivered to `sender` in the previous round, in ledger order.
    pub inbound: Vec<Message>,
}

impl GenerationContext {
    pub fn prompt(&self) -> String {
        self.inbound
            .iter()
            .map(|m| format!("{}: {}", m.from_agent_id, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub text: String,
}

impl Content {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Blank content produces no ledger message.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Response generation for one `(sender, recipient, prompt)` exchange.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    fn kind(&self) -> ProducedBy;

    async fn generate(&self, context: &GenerationContext) -> Result<Content, ProviderError>;
}

/// Deterministic, offline provider used in safe mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubProvider;

impl StubProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn render(
        sender_role: AgentRole,
        recipient_role: AgentRole,
        tick_index: u64,
        prompt: &str,
    ) -> String {
        let verb = match sender_role {
            AgentRole::Orchestrator => "Delegating",
            AgentRole::Foreman => "Assigning",
            AgentRole::Worker => "Delivering",
            AgentRole::Reviewer => "Reviewed",
            AgentRole::Fixer => "Patched",
            AgentRole::Unspecified => "Forwarding",
        };
        format!(
            "{} for {} at tick {} [{}]",
            verb,
            recipient_role,
            tick_index,
            prompt_digest(prompt)
        )
    }
}

fn prompt_digest(prompt: &str) -> String {
    Sha256::digest(prompt.as_bytes())
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[async_trait]
impl ResponseProvider for StubProvider {
    fn kind(&self) -> ProducedBy {
        ProducedBy::Stub
    }

    async fn generate(&self, context: &GenerationContext) -> Result<Content, ProviderError> {
        Ok(Content::new(Self::render(
            context.sender.role,
            context.recipient.role,
            context.tick_index,
            &context.prompt(),
        )))
    }
}

/// Delegates to the chat backend registered for the sender's model label.
pub struct LiveProvider {
    registry: ModelRegistry,
}

impl LiveProvider {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    fn framing(context: &GenerationContext) -> String {
        format!(
            "You are {}, acting as the {} in a multi-agent exchange. \
             Write the message you send next to {} (the {}). \
             Reply with the message text only.",
            context.sender.display_name,
            context.sender.role,
            context.recipient.display_name,
            context.recipient.role,
        )
    }
}

#[async_trait]
impl ResponseProvider for LiveProvider {
    fn kind(&self) -> ProducedBy {
        ProducedBy::Live
    }

    async fn generate(&self, context: &GenerationContext) -> Result<Content, ProviderError> {
        let label = &context.sender.model_label;
        let backend = self
            .registry
            .get(label)
            .ok_or_else(|| ProviderError::InvalidModelLabel(label.clone()))?;

        let text = backend.complete(&Self::framing(context), &context.prompt()).await?;
        Ok(Content::new(text))
    }
}

/// Run-level selection: safe mode stubs every agent, otherwise every agent is live.
pub fn select_provider(safe_mode: bool, registry: ModelRegistry) -> Arc<dyn ResponseProvider> {
    if safe_mode {
        log::info!("Safe mode on: all agents use the stub provider");
        Arc::new(StubProvider::new())
    } else {
        log::info!(
            "Safe mode off: live provider with {} model backend(s)",
            registry.len()
        );
        Arc::new(LiveProvider::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::MockLLMProvider;
    use crate::types::MessageDraft;

    fn create_test_context(prompt: &str, tick_index: u64) -> GenerationContext {
        let inbound = MessageDraft {
            from_agent_id: "user".to_string(),
            to_agent_id: "a".to_string(),
            role_of_sender: None,
            model_label_of_sender: None,
            content: prompt.to_string(),
            produced_by: ProducedBy::Seed,
        }
        .into_message(1, 0);

        GenerationContext {
            tick_index,
            sender: Agent::new("a", AgentRole::Orchestrator, "mock-model"),
            recipient: Agent::new("b", AgentRole::Worker, "mock-model"),
            inbound: vec![inbound],
        }
    }

    #[tokio::test]
    async fn test_stub_is_deterministic() {
        let stub = StubProvider::new();
        let first = stub.generate(&create_test_context("hello", 1)).await.unwrap();
        let second = stub.generate(&create_test_context("hello", 1)).await.unwrap();
        assert_eq!(first, second);
        assert!(first.text.starts_with("Delegating for worker at tick 1 ["));
    }

    #[tokio::test]
    async fn test_stub_varies_with_inputs() {
        let stub = StubProvider::new();
        let base = stub.generate(&create_test_context("hello", 1)).await.unwrap();
        let other_prompt = stub.generate(&create_test_context("goodbye", 1)).await.unwrap();
        let other_tick = stub.generate(&create_test_context("hello", 2)).await.unwrap();

        assert_ne!(base, other_prompt);
        assert_ne!(base, other_tick);
    }

    #[test]
    fn test_prompt_digest_is_short_hex() {
        let digest = prompt_digest("hello");
        assert_eq!(digest.len(), 8);
        // SHA-256("hello") begins 2cf24dba.
        assert_eq!(digest, "2cf24dba");
    }

    #[tokio::test]
    async fn test_live_uses_sender_model_label() {
        let mut registry = ModelRegistry::new();
        registry.register(
            "mock-model",
            Arc::new(MockLLMProvider::with_response("live reply".to_string())),
        );
        let live = LiveProvider::new(registry);

        let content = live.generate(&create_test_context("hello", 1)).await.unwrap();
        assert_eq!(content.text, "live reply");
        assert_eq!(live.kind(), ProducedBy::Live);
    }

    #[tokio::test]
    async fn test_live_unknown_label() {
        let live = LiveProvider::new(ModelRegistry::new());
        let err = live
            .generate(&create_test_context("hello", 1))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::InvalidModelLabel("mock-model".to_string()));
    }

    #[test]
    fn test_select_provider() {
        assert_eq!(select_provider(true, ModelRegistry::new()).kind(), ProducedBy::Stub);
        assert_eq!(select_provider(false, ModelRegistry::new()).kind(), ProducedBy::Live);
    }

    #[test]
    fn test_blank_content() {
        assert!(Content::new("  \n").is_blank());
        assert!(!Content::new("ok").is_blank());
    }
}
