use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{prompts, Agent, AgentOutcome, ModelInvoker, WEB_AGENT};
use crate::tools::{format_results, SearchBackend};

/// Situates a query in current events via live web search.
pub struct WebAgent {
    invoker: ModelInvoker,
    search: Arc<dyn SearchBackend>,
    num_results: usize,
}

impl WebAgent {
    pub fn new(invoker: ModelInvoker, search: Arc<dyn SearchBackend>) -> Self {
        Self { invoker, search, num_results: 5 }
    }

    pub fn with_num_results(mut self, n: usize) -> Self {
        self.num_results = n.clamp(1, 10);
        self
    }

    async fn answer(&self, query: &str) -> Result<String> {
        let results = self.search.search(query, self.num_results).await?;
        if results.is_empty() {
            anyhow::bail!("web search via {} returned no results", self.search.name());
        }
        info!("Web agent got {} results from {}", results.len(), self.search.name());

        let prompt = prompts::web_prompt(&format_results(&results), query);
        let response = self.invoker.invoke(prompt, None).await?;
        Ok(response.trim().to_string())
    }
}

#[async_trait]
impl Agent for WebAgent {
    fn name(&self) -> &str {
        WEB_AGENT
    }

    fn purpose(&self) -> &str {
        "Searches the live web for current events, breaking news and recent market commentary."
    }

    async fn process(&self, query: &str) -> AgentOutcome {
        match self.answer(query).await {
            Ok(text) if text.is_empty() => AgentOutcome::failure("No response generated"),
            Ok(text) => AgentOutcome::Success(text),
            Err(e) => {
                warn!("Web agent failed: {:#}", e);
                AgentOutcome::failure(format!("web agent failed: {:#}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LLMProvider;
    use crate::tools::SearchResult;

    struct FixedSearch(Vec<SearchResult>);

    #[async_trait]
    impl SearchBackend for FixedSearch {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, _query: &str, n: usize) -> Result<Vec<SearchResult>> {
            Ok(self.0.iter().take(n).cloned().collect())
        }
    }

    struct Summarizer;

    #[async_trait]
    impl LLMProvider for Summarizer {
        async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> Result<String> {
            if prompt.contains("Rates unchanged") {
                Ok("  The Fed held rates steady.  \n".into())
            } else {
                Ok("   ".into())
            }
        }
    }

    fn agent(results: Vec<SearchResult>) -> WebAgent {
        let invoker = ModelInvoker::new(Arc::new(Summarizer), "test").with_max_retries(0);
        WebAgent::new(invoker, Arc::new(FixedSearch(results)))
    }

    #[tokio::test]
    async fn test_summarizes_search_results() {
        let agent = agent(vec![SearchResult { title: "Fed".into(), snippet: "Rates unchanged".into(), url: "u".into() }]);
        assert_eq!(agent.process("fed news").await, AgentOutcome::success("The Fed held rates steady."));
    }

    #[tokio::test]
    async fn test_blank_model_reply_is_failure() {
        let agent = agent(vec![SearchResult { title: "X".into(), snippet: "other".into(), url: "u".into() }]);
        assert_eq!(agent.process("q").await, AgentOutcome::failure("No response generated"));
    }

    #[tokio::test]
    async fn test_no_results_is_failure() {
        assert!(!agent(vec![]).process("q").await.is_success());
    }
}
