use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::providers::llm::{ChatBackend, LLMProvider};

const OLLAMA_PREFIX: &str = "ollama/";

/// Resolves agent model labels to chat backends.
#[derive(Default)]
pub struct ModelRegistry {
    backends: HashMap<String, Arc<dyn LLMProvider>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds backends for every label it knows how to serve. Labels without a
    /// matching vendor or credential are left out and fail at generation time.
    pub fn from_config<'a>(config: &Config, labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut registry = Self::new();

        for label in labels {
            if registry.contains(label) {
                continue;
            }
            match Self::create_backend(config, label) {
                Some(backend) => {
                    log::info!("Registered live backend for model label '{}'", label);
                    registry.register(label, backend);
                }
                None => {
                    log::warn!("No live backend available for model label '{}'", label);
                }
            }
        }

        registry
    }

    fn create_backend(config: &Config, label: &str) -> Option<Arc<dyn LLMProvider>> {
        if let Some(model) = label.strip_prefix(OLLAMA_PREFIX) {
            return Some(Arc::new(ChatBackend::ollama(config.ollama_base_url.clone(), model)));
        }

        if label.starts_with("claude") {
            let key = config.anthropic_api_key.clone()?;
            return Some(Arc::new(ChatBackend::anthropic(key, label)));
        }

        if ["gpt", "o1", "o3", "o4"]
            .iter()
            .any(|prefix| label.starts_with(prefix))
        {
            let key = config.openai_api_key.clone()?;
            return Some(Arc::new(ChatBackend::openai(key, label)));
        }

        None
    }

    pub fn register(&mut self, label: impl Into<String>, backend: Arc<dyn LLMProvider>) {
        self.backends.insert(label.into(), backend);
    }

    pub fn get(&self, label: &str) -> Option<Arc<dyn LLMProvider>> {
        self.backends.get(label).cloned()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.backends.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::MockLLMProvider;

    fn create_test_config() -> Config {
        Config {
            anthropic_api_key: Some("anthropic-key".to_string()),
            openai_api_key: None,
            ..Config::default()
        }
    }

    #[test]
    fn test_resolves_known_families() {
        let config = create_test_config();
        let registry = ModelRegistry::from_config(
            &config,
            ["claude-3-5-sonnet-20240620", "ollama/llama3.1", "gpt-4o", "mystery"],
        );

        assert!(registry.contains("claude-3-5-sonnet-20240620"));
        assert!(registry.contains("ollama/llama3.1"));
        // No OpenAI key configured.
        assert!(!registry.contains("gpt-4o"));
        assert!(!registry.contains("mystery"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_labels_register_once() {
        let config = create_test_config();
        let registry = ModelRegistry::from_config(&config, ["ollama/qwen", "ollama/qwen"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_manual_register() {
        let mut registry = ModelRegistry::new();
        assert!(registry.is_empty());

        registry.register("mock", Arc::new(MockLLMProvider::new()));
        assert!(registry.get("mock").is_some());
        assert!(registry.get("other").is_none());
    }
}
