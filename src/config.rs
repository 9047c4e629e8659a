use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::types::{Agent, AgentRole, Link, RunSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub ollama_base_url: Option<String>,
    /// Forces the stub provider for every agent, whatever its model label.
    pub safe_mode: bool,
    pub provider_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            ollama_base_url: None,
            safe_mode: true,
            provider_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL").ok(),
            safe_mode: std::env::var("SWITCHBOARD_SAFE_MODE")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.safe_mode),
            provider_timeout_secs: std::env::var("SWITCHBOARD_PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.provider_timeout_secs),
        }
    }

    pub fn engine_config(&self, max_requests: Option<u64>) -> EngineConfig {
        EngineConfig {
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            max_requests,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// On-disk description of a run, in TOML or YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub first_agent: String,
    pub initial_prompt: String,
    #[serde(default)]
    pub max_requests: Option<u64>,
    pub agents: Vec<ScenarioAgent>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAgent {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: AgentRole,
    #[serde(default = "default_model_label")]
    pub model: String,
}

fn default_model_label() -> String {
    "stub".to_string()
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&raw),
            Some("yaml") | Some("yml") => Self::from_yaml(&raw),
            other => Err(anyhow!(
                "unsupported scenario format {:?} for {}",
                other,
                path.display()
            )),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("parsing TOML scenario")
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("parsing YAML scenario")
    }

    pub fn into_run_spec(self) -> RunSpec {
        let agents = self
            .agents
            .into_iter()
            .map(|a| {
                let agent = Agent::new(a.id, a.role, a.model);
                match a.display_name {
                    Some(name) => agent.with_display_name(name),
                    None => agent,
                }
            })
            .collect();

        RunSpec {
            agents,
            links: self.links,
            first_agent_id: self.first_agent,
            initial_prompt: self.initial_prompt,
            max_requests: self.max_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TOML_SCENARIO: &str = r#"
first_agent = "a"
initial_prompt = "hello"
max_requests = 10

[[agents]]
id = "a"
display_name = "Planner"
role = "orchestrator"
model = "claude-3-5-sonnet-20240620"

[[agents]]
id = "b"
role = "worker"

[[links]]
from = "a"
to = "b"
"#;

    const YAML_SCENARIO: &str = r#"
first_agent: a
initial_prompt: hello
agents:
  - id: a
    role: foreman
  - id: b
links:
  - from: a
    to: b
"#;

    #[test]
    fn test_config_defaults_to_safe_mode() {
        let config = Config::default();
        assert!(config.safe_mode);
        assert_eq!(config.provider_timeout_secs, 30);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(" False "));
        assert!(!parse_flag("off"));
    }

    #[test]
    fn test_engine_config_from_config() {
        let config = Config {
            provider_timeout_secs: 5,
            ..Config::default()
        };
        let engine = config.engine_config(Some(3));
        assert_eq!(engine.provider_timeout, Duration::from_secs(5));
        assert_eq!(engine.max_requests, Some(3));
    }

    #[test]
    fn test_toml_scenario() {
        let spec = ScenarioFile::from_toml(TOML_SCENARIO).unwrap().into_run_spec();

        assert_eq!(spec.first_agent_id, "a");
        assert_eq!(spec.max_requests, Some(10));
        assert_eq!(spec.agents.len(), 2);
        assert_eq!(spec.agents[0].display_name, "Planner");
        assert_eq!(spec.agents[0].role, AgentRole::Orchestrator);
        assert_eq!(spec.agents[1].display_name, "b");
        assert_eq!(spec.agents[1].model_label, "stub");
        assert_eq!(spec.links, vec![Link::new("a", "b")]);
    }

    #[test]
    fn test_yaml_scenario() {
        let spec = ScenarioFile::from_yaml(YAML_SCENARIO).unwrap().into_run_spec();

        assert_eq!(spec.agents[0].role, AgentRole::Foreman);
        assert_eq!(spec.agents[1].role, AgentRole::Unspecified);
        assert_eq!(spec.max_requests, None);
        assert_eq!(spec.links.len(), 1);
    }

    #[test]
    fn test_load_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML_SCENARIO.as_bytes()).unwrap();

        let scenario = ScenarioFile::load(file.path()).unwrap();
        assert_eq!(scenario.first_agent, "a");

        let mut unknown = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        unknown.write_all(b"{}").unwrap();
        assert!(ScenarioFile::load(unknown.path()).is_err());
    }
}
