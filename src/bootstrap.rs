//! Startup wiring: concrete agents and the supervisor built from config.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::agent::{DocumentAgent, FinanceAgent, ModelInvoker, WebAgent};
use crate::config::ExpertConfig;
use crate::orchestrator::{AgentRegistry, Coordinator, Router, Supervisor, Synthesizer};
use crate::tools::{DocumentStore, DuckDuckGoSearch, IndexedDocumentStore, SearchBackend, SerperSearch, YahooQuoteSource};

/// Register the built-in `pdf`, `finance` and `web` agents.
pub async fn build_registry(config: &ExpertConfig, invoker: &ModelInvoker) -> Result<AgentRegistry> {
    let registry = AgentRegistry::new();

    let store = IndexedDocumentStore::load(&config.paths.index_dir).await?;
    if store.count().await.unwrap_or(0) == 0 {
        info!(
            "No indexed documents under {:?}; files in {:?} must be indexed before the pdf agent can use them",
            config.paths.index_dir, config.paths.documents_dir
        );
    }
    registry
        .register_instance(DocumentAgent::new(invoker.clone(), Arc::new(store)).with_top_k(config.agents.document_top_k))
        .await;

    registry
        .register_instance(FinanceAgent::new(invoker.clone(), Arc::new(YahooQuoteSource::new())))
        .await;

    let search: Arc<dyn SearchBackend> = match config.api.serper_api_key.as_deref() {
        Some(key) => Arc::new(SerperSearch::new(key)),
        None => Arc::new(DuckDuckGoSearch::new()),
    };
    registry
        .register_instance(WebAgent::new(invoker.clone(), search).with_num_results(config.agents.web_results))
        .await;

    Ok(registry)
}

pub async fn build_supervisor(config: &ExpertConfig) -> Result<Supervisor> {
    let invoker = config.build_invoker()?;
    let registry = Arc::new(build_registry(config, &invoker).await?);

    let mut router = Router::new().with_max_classifier_agents(config.routing.max_classifier_agents);
    if config.routing.llm_routing {
        router = router.with_classifier(invoker.clone());
    }
    let coordinator = Coordinator::new()
        .with_mode(config.execution.mode())
        .with_policy(config.routing.error_marker_policy);
    let synthesizer = Synthesizer::new(invoker.clone()).with_per_agent_budget(config.execution.synthesis_budget());

    Ok(Supervisor::new(registry, invoker)
        .with_router(router)
        .with_coordinator(coordinator)
        .with_synthesizer(synthesizer))
}
