use thiserror::Error;

/// Errors raised at the orchestration seams.
///
/// Leaf components (providers, tools, config) use `anyhow` and are converted
/// into one of these variants when they cross into the orchestrator.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("routing error: {0}")]
    Routing(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl AgentError {
    /// Name of the component that owns this class of failure.
    pub fn component(&self) -> &'static str {
        match self {
            AgentError::Provider(_) => "provider",
            AgentError::Routing(_) => "router",
            AgentError::Registry(_) => "registry",
            AgentError::InvalidQuery(_) => "supervisor",
        }
    }
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;
