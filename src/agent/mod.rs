//! Agent Module
//!
//! The capability boundary between the orchestrator and the responders, plus
//! the model-invocation layer every responder shares.

mod document;
mod error;
mod finance;
mod invoker;
pub mod prompts;
mod provider;
mod web;

pub use document::DocumentAgent;
pub use error::{AgentError, AgentResult};
pub use finance::{extract_symbol_candidates, FinanceAgent};
pub use invoker::{CollectingSink, ModelInvoker, StdoutSink, TokenSink};
pub use provider::{LLMProvider, OllamaProvider, OpenAICompatibleProvider, TokenStream};
pub use web::WebAgent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Canonical registry names of the built-in agents.
pub const PDF_AGENT: &str = "pdf";
pub const WEB_AGENT: &str = "web";
pub const FINANCE_AGENT: &str = "finance";

/// What an agent hands back for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum AgentOutcome {
    Success(String),
    Failure(String),
}

impl AgentOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        AgentOutcome::Success(text.into())
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        AgentOutcome::Failure(reason.into())
    }

    /// Collapse an internal `anyhow` pipeline into an outcome.
    pub fn from_result(result: anyhow::Result<String>) -> Self {
        match result {
            Ok(text) => AgentOutcome::Success(text),
            Err(e) => AgentOutcome::Failure(format!("{:#}", e)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Success(_))
    }
}

/// A responder backed by one information source.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Registry name
    fn name(&self) -> &str;

    /// Human-readable description, used for diagnostics and the classifier prompt
    fn purpose(&self) -> &str;

    async fn process(&self, query: &str) -> AgentOutcome;
}

/// Single-line preview of `s`, at most `max_len` bytes.
pub fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.len() <= max_len {
        s
    } else {
        let target_len = max_len.saturating_sub(3);
        let mut end = target_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
