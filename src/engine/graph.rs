use std::collections::{HashMap, HashSet};

use crate::engine::registry::AgentRegistry;
use crate::error::ConfigError;
use crate::types::{AgentId, Link};

/// Directed communication graph. Legality is checked per edge; cycles are allowed.
#[derive(Debug, Clone, Default)]
pub struct CommunicationGraph {
    links: Vec<Link>,
    // Targets per sender, in the order the links were added.
    adjacency: HashMap<AgentId, Vec<AgentId>>,
    lookup: HashMap<AgentId, HashSet<AgentId>>,
    frozen: bool,
}

impl CommunicationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_links(links: Vec<Link>, registry: &AgentRegistry) -> Result<Self, ConfigError> {
        let mut graph = Self::new();
        for link in links {
            graph.insert(link, registry)?;
        }
        Ok(graph)
    }

    /// Adds a link whose endpoints must both be registered. Re-adding an edge is a no-op.
    pub fn insert(&mut self, link: Link, registry: &AgentRegistry) -> Result<(), ConfigError> {
        if self.frozen {
            return Err(ConfigError::RunAlreadyStarted);
        }
        if link.from == link.to {
            return Err(ConfigError::SelfLink(link.from));
        }
        if !registry.contains(&link.from) || !registry.contains(&link.to) {
            return Err(ConfigError::DanglingLink {
                from: link.from,
                to: link.to,
            });
        }

        let targets = self.lookup.entry(link.from.clone()).or_default();
        if targets.insert(link.to.clone()) {
            self.adjacency
                .entry(link.from.clone())
                .or_default()
                .push(link.to.clone());
            self.links.push(link);
        }
        Ok(())
    }

    pub fn is_permitted(&self, from: &str, to: &str) -> bool {
        self.lookup
            .get(from)
            .map(|targets| targets.contains(to))
            .unwrap_or(false)
    }

    pub fn outgoing(&self, from: &str) -> &[AgentId] {
        self.adjacency
            .get(from)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_outgoing(&self, from: &str) -> bool {
        !self.outgoing(from).is_empty()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn edge_count(&self) -> usize {
        self.links.len()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}
