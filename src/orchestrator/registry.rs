//! Agent Registry
//!
//! Name → agent mapping populated at startup and shared read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::agent::Agent;

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Bind `agent` to `name`. An existing binding is replaced.
    pub async fn register(&self, name: impl Into<String>, agent: Arc<dyn Agent>) {
        let name = name.into();
        let mut agents = self.agents.write().await;
        if agents.insert(name.clone(), agent).is_some() {
            debug!("Replaced agent binding '{}'", name);
        } else {
            info!("Registered agent '{}'", name);
        }
    }

    /// Register under the agent's own name.
    pub async fn register_instance<A: Agent + 'static>(&self, agent: A) {
        let name = agent.name().to_string();
        self.register(name, Arc::new(agent)).await;
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        let agents = self.agents.read().await;
        agents.get(name).cloned()
    }

    /// Registered names, sorted so prompts and listings are stable.
    pub async fn list_names(&self) -> Vec<String> {
        let agents = self.agents.read().await;
        let mut names: Vec<String> = agents.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn purpose(&self, name: &str) -> Option<String> {
        let agents = self.agents.read().await;
        agents.get(name).map(|a| a.purpose().to_string())
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// One `- name: purpose` line per agent, for the classifier prompt.
    pub async fn generate_agents_prompt(&self) -> String {
        let agents = self.agents.read().await;
        if agents.is_empty() {
            return "No agents available.\n".to_string();
        }

        let mut names: Vec<_> = agents.keys().collect();
        names.sort();

        let mut prompt = String::new();
        for name in names {
            prompt.push_str(&format!("- {}: {}\n", name, agents[name].purpose()));
        }
        prompt
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentOutcome;
    use async_trait::async_trait;

    struct NamedAgent(&'static str, &'static str);

    #[async_trait]
    impl Agent for NamedAgent {
        fn name(&self) -> &str {
            self.0
        }
        fn purpose(&self) -> &str {
            self.1
        }
        async fn process(&self, _query: &str) -> AgentOutcome {
            AgentOutcome::success(self.1)
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = AgentRegistry::new();
        registry.register_instance(NamedAgent("web", "news")).await;
        registry.register_instance(NamedAgent("finance", "quotes")).await;

        assert_eq!(registry.list_names().await, vec!["finance", "web"]);
        assert!(registry.get("web").await.is_some());
        assert!(registry.get("Web").await.is_none());
        assert_eq!(registry.purpose("finance").await.as_deref(), Some("quotes"));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = AgentRegistry::new();
        registry.register("pdf", Arc::new(NamedAgent("pdf", "old"))).await;
        registry.register("pdf", Arc::new(NamedAgent("pdf", "new"))).await;

        assert_eq!(registry.len().await, 1);
        let agent = registry.get("pdf").await.unwrap();
        assert_eq!(agent.process("q").await, AgentOutcome::success("new"));
    }

    #[tokio::test]
    async fn test_generate_agents_prompt() {
        let registry = AgentRegistry::new();
        assert_eq!(registry.generate_agents_prompt().await, "No agents available.\n");
        registry.register_instance(NamedAgent("web", "news")).await;
        assert_eq!(registry.generate_agents_prompt().await, "- web: news\n");
    }
}
