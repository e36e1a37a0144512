//! Orchestrator Event Bus
//!
//! Broadcast channel carrying per-query progress. Presentation only; nothing
//! in the pipeline reads these back.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::router::RoutingTier;

/// Progress events for one supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum OrchestratorEvent {
    QueryStarted { query_id: String, query: String },
    Routed { query_id: String, agents: Vec<String>, tier: RoutingTier },
    AgentStarted { query_id: String, agent: String },
    /// Output was written to the workpad
    AgentAccepted { query_id: String, agent: String, latency_ms: u128 },
    /// Call finished but produced nothing usable
    AgentRejected { query_id: String, agent: String, reason: String },
    /// Selected but not registered
    AgentSkipped { query_id: String, agent: String },
    SynthesisStarted { query_id: String, inputs: usize },
    QueryFinished { query_id: String, success: bool, latency_ms: u128 },
}

impl OrchestratorEvent {
    pub fn query_id(&self) -> &str {
        match self {
            OrchestratorEvent::QueryStarted { query_id, .. }
            | OrchestratorEvent::Routed { query_id, .. }
            | OrchestratorEvent::AgentStarted { query_id, .. }
            | OrchestratorEvent::AgentAccepted { query_id, .. }
            | OrchestratorEvent::AgentRejected { query_id, .. }
            | OrchestratorEvent::AgentSkipped { query_id, .. }
            | OrchestratorEvent::SynthesisStarted { query_id, .. }
            | OrchestratorEvent::QueryFinished { query_id, .. } => query_id,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to all subscribers. Having none is fine.
    pub fn publish(&self, event: OrchestratorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
