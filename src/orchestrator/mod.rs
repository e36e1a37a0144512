//! Orchestrator Module
//!
//! Routes a query to agents, runs them, and turns their output into one
//! answer.

mod answer;
pub mod coordinator;
pub mod event_bus;
mod registry;
pub mod router;
mod supervisor;
mod synthesizer;
mod workpad;

pub use answer::{Answer, ErrorPayload};
pub use coordinator::{dedupe, Coordinator, ErrorMarkerPolicy, ExecutionMode};
pub use event_bus::{EventBus, OrchestratorEvent};
pub use registry::AgentRegistry;
pub use router::{parse_agent_plan, LexicalRule, Router, RoutingDecision, RoutingTier, TermSet, WorkflowStep};
pub use supervisor::{QueryState, Supervisor, SupervisorResult};
pub use synthesizer::Synthesizer;
pub use workpad::{Workpad, WorkpadEntry};
