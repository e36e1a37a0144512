use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{prompts, Agent, AgentOutcome, ModelInvoker, PDF_AGENT};
use crate::tools::DocumentStore;
use crate::utils::{truncate_text, TruncationPolicy};

/// Answers from the indexed document collection.
pub struct DocumentAgent {
    invoker: ModelInvoker,
    store: Arc<dyn DocumentStore>,
    top_k: usize,
    chunk_budget: TruncationPolicy,
}

impl DocumentAgent {
    pub fn new(invoker: ModelInvoker, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            invoker,
            store,
            top_k: 12,
            chunk_budget: TruncationPolicy::Tokens(400),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    async fn answer(&self, query: &str) -> Result<Option<String>> {
        let chunks = self.store.search(query, self.top_k).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        info!("Document agent retrieved {} chunks", chunks.len());

        let context = chunks
            .iter()
            .map(|c| format!("[{}]\n{}", c.citation(), truncate_text(&c.content, self.chunk_budget)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = prompts::document_prompt(&context, query);
        debug!("Document prompt: {} bytes", prompt.len());

        let answer = self.invoker.invoke(prompt, None).await?;
        Ok(Some(answer.trim().to_string()))
    }
}

#[async_trait]
impl Agent for DocumentAgent {
    fn name(&self) -> &str {
        PDF_AGENT
    }

    fn purpose(&self) -> &str {
        "Answers from the indexed document collection: reports, filings, textbooks and \
         educational material on finance and investing concepts."
    }

    async fn process(&self, query: &str) -> AgentOutcome {
        match self.answer(query).await {
            Ok(Some(answer)) if !answer.is_empty() => AgentOutcome::Success(answer),
            Ok(Some(_)) => AgentOutcome::failure("model returned an empty answer"),
            Ok(None) => AgentOutcome::failure("No relevant documents found for this query."),
            Err(e) => AgentOutcome::failure(format!("document agent failed: {:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LLMProvider;
    use crate::tools::{DocumentChunk, IndexedDocumentStore};

    struct ContextEcho;

    #[async_trait]
    impl LLMProvider for ContextEcho {
        async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> Result<String> {
            Ok(if prompt.contains("options.pdf (p. 4)") { "Covered calls cap upside. [options.pdf]".into() } else { "".into() })
        }
    }

    fn agent(chunks: Vec<DocumentChunk>) -> DocumentAgent {
        let invoker = ModelInvoker::new(Arc::new(ContextEcho), "test").with_max_retries(0);
        DocumentAgent::new(invoker, Arc::new(IndexedDocumentStore::new(chunks)))
    }

    #[tokio::test]
    async fn test_answers_with_citations_in_prompt() {
        let agent = agent(vec![DocumentChunk::new("options.pdf", "covered call strategy").with_page(4)]);
        let outcome = agent.process("covered call strategy").await;
        assert_eq!(outcome, AgentOutcome::success("Covered calls cap upside. [options.pdf]"));
    }

    #[tokio::test]
    async fn test_no_documents_is_failure() {
        let agent = agent(vec![]);
        assert!(!agent.process("anything at all").await.is_success());
    }

    #[tokio::test]
    async fn test_empty_model_answer_is_failure() {
        let agent = agent(vec![DocumentChunk::new("bonds.pdf", "bond duration")]);
        assert_eq!(agent.process("bond duration").await, AgentOutcome::failure("model returned an empty answer"));
    }
}
