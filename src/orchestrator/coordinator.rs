//! Execution Coordinator
//!
//! Runs the routed agents and writes accepted output into a fresh workpad.
//! A failing, panicking or missing agent never aborts the rest of the list.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::event_bus::{EventBus, OrchestratorEvent};
use super::{AgentRegistry, Workpad};
use crate::agent::{truncate, Agent, AgentOutcome};

/// How successful-looking output is screened before it reaches the workpad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMarkerPolicy {
    /// Also reject success text containing "error" (case-insensitive).
    /// Catches agents that report failures as ordinary text, at the cost of
    /// dropping answers that merely discuss errors.
    #[default]
    Substring,
    /// Trust the outcome tag alone.
    StructuredOnly,
}

impl ErrorMarkerPolicy {
    /// Accepted text, or the reason it was rejected.
    pub fn screen(&self, outcome: AgentOutcome) -> Result<String, String> {
        match outcome {
            AgentOutcome::Failure(reason) => Err(reason),
            AgentOutcome::Success(text) if text.trim().is_empty() => Err("empty output".to_string()),
            AgentOutcome::Success(text) => match self {
                ErrorMarkerPolicy::Substring if text.to_lowercase().contains("error") => {
                    Err("output carries an error marker".to_string())
                }
                _ => Ok(text),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// At most `limit` agents in flight; workpad still written in selection order.
    Concurrent { limit: usize },
}

/// Drop repeated names, keeping the first occurrence.
pub fn dedupe(agents: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(agents.len());
    for agent in agents {
        if !out.contains(agent) {
            out.push(agent.clone());
        }
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    mode: ExecutionMode,
    policy: ErrorMarkerPolicy,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: ErrorMarkerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    #[tracing::instrument(skip(self, query, registry, events))]
    pub async fn execute(
        &self,
        query_id: &str,
        query: &str,
        agents: &[String],
        registry: &AgentRegistry,
        events: &EventBus,
    ) -> Workpad {
        let mut resolved: Vec<(String, Arc<dyn Agent>)> = Vec::new();
        for name in dedupe(agents) {
            match registry.get(&name).await {
                Some(agent) => resolved.push((name, agent)),
                None => {
                    debug!("Agent '{}' is not registered; skipping", name);
                    events.publish(OrchestratorEvent::AgentSkipped {
                        query_id: query_id.to_string(),
                        agent: name,
                    });
                }
            }
        }

        let outcomes = match self.mode {
            ExecutionMode::Sequential => self.run_sequential(query_id, query, resolved, events).await,
            ExecutionMode::Concurrent { limit } => self.run_concurrent(query_id, query, resolved, limit, events).await,
        };

        let mut workpad = Workpad::new();
        for (name, outcome, elapsed) in outcomes {
            match self.policy.screen(outcome) {
                Ok(text) => {
                    info!("Agent '{}' accepted ({} ms): {}", name, elapsed, truncate(&text, 80));
                    workpad.write(name.clone(), text);
                    events.publish(OrchestratorEvent::AgentAccepted {
                        query_id: query_id.to_string(),
                        agent: name,
                        latency_ms: elapsed,
                    });
                }
                Err(reason) => {
                    warn!("Agent '{}' rejected: {}", name, reason);
                    events.publish(OrchestratorEvent::AgentRejected {
                        query_id: query_id.to_string(),
                        agent: name,
                        reason,
                    });
                }
            }
        }
        workpad
    }

    async fn run_sequential(
        &self,
        query_id: &str,
        query: &str,
        resolved: Vec<(String, Arc<dyn Agent>)>,
        events: &EventBus,
    ) -> Vec<(String, AgentOutcome, u128)> {
        let mut outcomes = Vec::with_capacity(resolved.len());
        for (name, agent) in resolved {
            events.publish(OrchestratorEvent::AgentStarted {
                query_id: query_id.to_string(),
                agent: name.clone(),
            });
            let start = Instant::now();
            let outcome = AssertUnwindSafe(agent.process(query))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| AgentOutcome::failure("agent panicked"));
            outcomes.push((name, outcome, start.elapsed().as_millis()));
        }
        outcomes
    }

    async fn run_concurrent(
        &self,
        query_id: &str,
        query: &str,
        resolved: Vec<(String, Arc<dyn Agent>)>,
        limit: usize,
        events: &EventBus,
    ) -> Vec<(String, AgentOutcome, u128)> {
        let semaphore = Arc::new(Semaphore::new(limit.max(1)));
        let mut handles = Vec::with_capacity(resolved.len());

        for (name, agent) in resolved {
            let semaphore = semaphore.clone();
            let events = events.clone();
            let query = query.to_string();
            let query_id = query_id.to_string();
            let agent_name = name.clone();
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (AgentOutcome::failure("concurrency limiter closed"), 0),
                };
                events.publish(OrchestratorEvent::AgentStarted { query_id, agent: agent_name });
                let start = Instant::now();
                let outcome = agent.process(&query).await;
                (outcome, start.elapsed().as_millis())
            });
            handles.push((name, handle));
        }

        // Awaited in selection order so workpad order matches the route.
        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let (outcome, elapsed) = match handle.await {
                Ok(result) => result,
                Err(e) => (AgentOutcome::failure(format!("agent task failed: {}", e)), 0),
            };
            outcomes.push((name, outcome, elapsed));
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Scripted {
        name: &'static str,
        reply: AgentOutcome,
        delay_ms: u64,
    }

    #[async_trait]
    impl Agent for Scripted {
        fn name(&self) -> &str {
            self.name
        }
        fn purpose(&self) -> &str {
            "scripted"
        }
        async fn process(&self, _query: &str) -> AgentOutcome {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.reply.clone()
        }
    }

    struct Panicky;

    #[async_trait]
    impl Agent for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }
        fn purpose(&self) -> &str {
            "always panics"
        }
        async fn process(&self, _query: &str) -> AgentOutcome {
            panic!("boom")
        }
    }

    async fn registry(agents: Vec<Scripted>) -> AgentRegistry {
        let registry = AgentRegistry::new();
        for agent in agents {
            registry.register_instance(agent).await;
        }
        registry
    }

    fn ok(name: &'static str, text: &str, delay_ms: u64) -> Scripted {
        Scripted { name, reply: AgentOutcome::success(text), delay_ms }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_screen_policies() {
        let text = AgentOutcome::success("Margin call errors explained");
        assert!(ErrorMarkerPolicy::Substring.screen(text.clone()).is_err());
        assert!(ErrorMarkerPolicy::StructuredOnly.screen(text).is_ok());
        assert!(ErrorMarkerPolicy::StructuredOnly.screen(AgentOutcome::success("  \n")).is_err());
        assert!(ErrorMarkerPolicy::StructuredOnly.screen(AgentOutcome::failure("x")).is_err());
    }

    #[test]
    fn test_dedupe_keeps_first() {
        assert_eq!(dedupe(&names(&["web", "pdf", "web"])), names(&["web", "pdf"]));
    }

    #[tokio::test]
    async fn test_missing_agent_skipped() {
        let registry = registry(vec![ok("web", "news", 0)]).await;
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let pad = Coordinator::new().execute("q", "query", &names(&["pdf", "web"]), &registry, &bus).await;

        assert_eq!(pad.agents(), names(&["web"]));
        assert!(matches!(rx.recv().await.unwrap(), OrchestratorEvent::AgentSkipped { agent, .. } if agent == "pdf"));
    }

    #[tokio::test]
    async fn test_error_shaped_output_excluded() {
        let registry = registry(vec![
            ok("pdf", "{\"error\": \"index unavailable\"}", 0),
            ok("web", "fresh news", 0),
        ])
        .await;

        let pad = Coordinator::new()
            .execute("q", "query", &names(&["pdf", "web"]), &registry, &EventBus::new())
            .await;
        assert_eq!(pad.agents(), names(&["web"]));
    }

    #[tokio::test]
    async fn test_structured_only_keeps_error_word() {
        let registry = registry(vec![ok("pdf", "Common order errors and how to avoid them", 0)]).await;
        let pad = Coordinator::new()
            .with_policy(ErrorMarkerPolicy::StructuredOnly)
            .execute("q", "query", &names(&["pdf"]), &registry, &EventBus::new())
            .await;
        assert_eq!(pad.len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_agent_does_not_abort() {
        let registry = registry(vec![ok("web", "still here", 0)]).await;
        registry.register_instance(Panicky).await;

        let pad = Coordinator::new()
            .execute("q", "query", &names(&["panicky", "web"]), &registry, &EventBus::new())
            .await;
        assert_eq!(pad.agents(), names(&["web"]));
    }

    #[tokio::test]
    async fn test_concurrent_preserves_selection_order() {
        let registry = registry(vec![ok("finance", "quote", 40), ok("web", "news", 0)]).await;
        registry.register_instance(Panicky).await;

        let pad = Coordinator::new()
            .with_mode(ExecutionMode::Concurrent { limit: 3 })
            .execute("q", "query", &names(&["finance", "panicky", "web", "finance"]), &registry, &EventBus::new())
            .await;

        assert_eq!(pad.agents(), names(&["finance", "web"]));
        assert_eq!(pad.read("finance"), Some("quote"));
    }
}
