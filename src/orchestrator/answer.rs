//! Final answers and tagged error payloads.

use serde::{Deserialize, Serialize};

use crate::agent::AgentError;

/// Body of a `{"error": {...}}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub component: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>, kind: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            component: component.into(),
        }
    }

    /// Pretty JSON wrapped in an `error` object.
    pub fn to_json(&self) -> String {
        let wrapped = serde_json::json!({ "error": self });
        serde_json::to_string_pretty(&wrapped).unwrap_or_else(|_| format!("{{\"error\": {{\"message\": {:?}}}}}", self.message))
    }
}

impl From<&AgentError> for ErrorPayload {
    fn from(e: &AgentError) -> Self {
        ErrorPayload::new(e.to_string(), "system_error", e.component())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    /// The only accepted agent output, unchanged.
    PassThrough { agent: String, text: String },
    /// One model call blended several agent outputs.
    Synthesized { agents: Vec<String>, text: String },
    /// No agent produced usable output.
    NoInformation,
    SynthesisFailed(ErrorPayload),
    SystemFailure(ErrorPayload),
}

impl Answer {
    pub fn no_information_payload() -> ErrorPayload {
        ErrorPayload::new(
            "No information gathered: none of the selected agents produced a usable answer",
            "no_information",
            "coordinator",
        )
    }

    pub fn synthesis_failed(message: impl Into<String>) -> Self {
        Answer::SynthesisFailed(ErrorPayload::new(message, "synthesis_error", "synthesizer"))
    }

    pub fn system_failure(e: &AgentError) -> Self {
        Answer::SystemFailure(ErrorPayload::from(e))
    }

    /// True for a real answer, false for any tagged payload.
    pub fn is_answer(&self) -> bool {
        matches!(self, Answer::PassThrough { .. } | Answer::Synthesized { .. })
    }

    /// User-facing text. A pass-through answer is the agent's text byte for
    /// byte, even when it is JSON. Synthesized JSON comes back pretty-printed.
    pub fn render(&self) -> String {
        match self {
            Answer::PassThrough { text, .. } => text.clone(),
            Answer::Synthesized { text, .. } => pretty_if_json(text),
            Answer::NoInformation => Self::no_information_payload().to_json(),
            Answer::SynthesisFailed(payload) | Answer::SystemFailure(payload) => payload.to_json(),
        }
    }
}

fn pretty_if_json(text: &str) -> String {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return text.to_string();
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string()),
        Err(_) => text.to_string(),
    }
}
