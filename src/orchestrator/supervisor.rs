//! Supervisor
//!
//! Top-level entry point. Drives one query through
//! `Routing -> Executing -> Synthesizing -> Done`, with `Error` reachable only
//! for conditions the lower layers could not absorb.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{error, info};

use super::event_bus::{EventBus, OrchestratorEvent};
use super::{AgentRegistry, Answer, Coordinator, ErrorPayload, Router, RoutingDecision, Synthesizer, Workpad};
use crate::agent::{AgentError, AgentResult, ModelInvoker, TokenSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Routing,
    Executing,
    Synthesizing,
    Done,
    Error,
}

impl QueryState {
    fn component(&self) -> &'static str {
        match self {
            QueryState::Routing => "router",
            QueryState::Executing => "coordinator",
            QueryState::Synthesizing => "synthesizer",
            QueryState::Done | QueryState::Error => "supervisor",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorResult {
    pub query_id: String,
    pub started_at: DateTime<Utc>,
    pub answer: Answer,
    pub decision: Option<RoutingDecision>,
    /// Accepted agent outputs, kept for auditing
    pub workpad: Workpad,
    pub state: QueryState,
    pub latency_ms: u128,
}

impl SupervisorResult {
    pub fn render(&self) -> String {
        self.answer.render()
    }

    pub fn success(&self) -> bool {
        self.state == QueryState::Done && self.answer.is_answer()
    }
}

struct Completed {
    decision: RoutingDecision,
    workpad: Workpad,
    answer: Answer,
}

pub struct Supervisor {
    registry: Arc<AgentRegistry>,
    router: Router,
    coordinator: Coordinator,
    synthesizer: Synthesizer,
    events: EventBus,
}

impl Supervisor {
    /// Classifier-enabled router and synthesizer sharing one invoker.
    pub fn new(registry: Arc<AgentRegistry>, invoker: ModelInvoker) -> Self {
        Self {
            registry,
            router: Router::new().with_classifier(invoker.clone()),
            coordinator: Coordinator::new(),
            synthesizer: Synthesizer::new(invoker),
            events: EventBus::new(),
        }
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn with_coordinator(mut self, coordinator: Coordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub async fn handle(&self, query: &str) -> SupervisorResult {
        self.handle_streaming(query, None).await
    }

    /// Process one query. Synthesis tokens go to `sink` as they arrive.
    /// Never panics or errors; failures come back as tagged answers.
    #[tracing::instrument(skip(self, query, sink), fields(query_len = query.len()))]
    pub async fn handle_streaming(&self, query: &str, sink: Option<&dyn TokenSink>) -> SupervisorResult {
        let start = Instant::now();
        let started_at = Utc::now();
        let query_id = uuid::Uuid::new_v4().to_string();
        self.events.publish(OrchestratorEvent::QueryStarted {
            query_id: query_id.clone(),
            query: query.to_string(),
        });

        let mut state = QueryState::Routing;
        let outcome = AssertUnwindSafe(self.run(&query_id, query, sink, &mut state))
            .catch_unwind()
            .await;

        let (answer, decision, workpad, state) = match outcome {
            Ok(Ok(done)) => (done.answer, Some(done.decision), done.workpad, QueryState::Done),
            Ok(Err(e)) => {
                error!("Query {} failed in {:?}: {}", query_id, state, e);
                (Answer::system_failure(&e), None, Workpad::new(), QueryState::Error)
            }
            Err(_) => {
                error!("Query {} panicked in {:?}", query_id, state);
                let payload = ErrorPayload::new("internal failure while processing query", "system_error", state.component());
                (Answer::SystemFailure(payload), None, Workpad::new(), QueryState::Error)
            }
        };

        let latency_ms = start.elapsed().as_millis();
        let result = SupervisorResult {
            query_id: query_id.clone(),
            started_at,
            answer,
            decision,
            workpad,
            state,
            latency_ms,
        };
        info!("Query {} finished in {} ms (success: {})", query_id, latency_ms, result.success());
        self.events.publish(OrchestratorEvent::QueryFinished {
            query_id,
            success: result.success(),
            latency_ms,
        });
        result
    }

    async fn run(
        &self,
        query_id: &str,
        query: &str,
        sink: Option<&dyn TokenSink>,
        state: &mut QueryState,
    ) -> AgentResult<Completed> {
        if query.trim().is_empty() {
            return Err(AgentError::InvalidQuery("query is empty".into()));
        }
        if self.registry.is_empty().await {
            return Err(AgentError::Registry("no agents registered".into()));
        }

        *state = QueryState::Routing;
        let decision = self.router.route(query, &self.registry).await;
        self.events.publish(OrchestratorEvent::Routed {
            query_id: query_id.to_string(),
            agents: decision.agents(),
            tier: decision.tier,
        });

        *state = QueryState::Executing;
        let workpad = self
            .coordinator
            .execute(query_id, query, &decision.agents(), &self.registry, &self.events)
            .await;

        *state = QueryState::Synthesizing;
        self.events.publish(OrchestratorEvent::SynthesisStarted {
            query_id: query_id.to_string(),
            inputs: workpad.len(),
        });
        let answer = self.synthesizer.synthesize(query, &workpad, sink).await;

        Ok(Completed { decision, workpad, answer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentOutcome, LLMProvider};
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl LLMProvider for Silent {
        async fn generate(&self, _model: &str, _prompt: String, _system: Option<String>) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    struct Echo;

    #[async_trait]
    impl Agent for Echo {
        fn name(&self) -> &str {
            "web"
        }
        fn purpose(&self) -> &str {
            "echo"
        }
        async fn process(&self, query: &str) -> AgentOutcome {
            AgentOutcome::success(format!("about: {}", query))
        }
    }

    fn invoker() -> ModelInvoker {
        ModelInvoker::new(Arc::new(Silent), "test").with_max_retries(0)
    }

    #[tokio::test]
    async fn test_empty_registry_is_system_failure() {
        let supervisor = Supervisor::new(Arc::new(AgentRegistry::new()), invoker());
        let result = supervisor.handle("latest news").await;

        assert_eq!(result.state, QueryState::Error);
        match result.answer {
            Answer::SystemFailure(payload) => assert_eq!(payload.component, "registry"),
            other => panic!("unexpected answer {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register_instance(Echo).await;
        let result = Supervisor::new(registry, invoker()).handle("   ").await;
        assert_eq!(result.state, QueryState::Error);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_events_follow_state_machine() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register_instance(Echo).await;
        let supervisor = Supervisor::new(registry, invoker());
        let mut rx = supervisor.subscribe();

        let result = supervisor.handle("breaking news").await;
        assert!(result.success());
        assert_eq!(result.render(), "about: breaking news");

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.query_id(), result.query_id);
            kinds.push(match event {
                OrchestratorEvent::QueryStarted { .. } => "started",
                OrchestratorEvent::Routed { .. } => "routed",
                OrchestratorEvent::AgentStarted { .. } => "agent",
                OrchestratorEvent::AgentAccepted { .. } => "accepted",
                OrchestratorEvent::SynthesisStarted { .. } => "synthesis",
                OrchestratorEvent::QueryFinished { .. } => "finished",
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["started", "routed", "agent", "accepted", "synthesis", "finished"]);
    }
}
