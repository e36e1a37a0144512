//! Expert Agency
//!
//! Multi-agent query orchestration:
//! - lexical, model-assisted and fallback routing
//! - fault-tolerant agent execution into a per-query workpad
//! - pass-through or model-blended synthesis
//! - document, web and market-data agents

pub mod agent;
pub mod bootstrap;
pub mod config;
pub mod orchestrator;
pub mod tools;
pub mod utils;

pub use agent::{Agent, AgentOutcome};
pub use config::{ConfigManager, ExpertConfig};
pub use orchestrator::{AgentRegistry, Answer, Supervisor, SupervisorResult};
