use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use expert_agency::agent::{Agent, AgentOutcome, CollectingSink, FinanceAgent, LLMProvider, ModelInvoker};
use expert_agency::orchestrator::{
    AgentRegistry, Answer, Coordinator, ErrorMarkerPolicy, ExecutionMode, QueryState, RoutingTier, Supervisor,
};
use expert_agency::tools::{MarketDataSource, Quote};

/// Answers by prompt shape: classifier, synthesis, symbol validation, finance analysis.
struct ScriptedModel {
    routing_reply: String,
    fail_synthesis: bool,
    synthesis_calls: AtomicUsize,
    routing_calls: AtomicUsize,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            routing_reply: "REQUIRED_AGENTS: [web]".into(),
            fail_synthesis: false,
            synthesis_calls: AtomicUsize::new(0),
            routing_calls: AtomicUsize::new(0),
        }
    }

    fn routing(mut self, reply: &str) -> Self {
        self.routing_reply = reply.to_string();
        self
    }

    fn failing_synthesis(mut self) -> Self {
        self.fail_synthesis = true;
        self
    }
}

#[async_trait]
impl LLMProvider for ScriptedModel {
    async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> Result<String> {
        debug!("MOCK PROMPT: {}", prompt);

        if prompt.contains("Available agents:") {
            self.routing_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(self.routing_reply.clone());
        }
        if prompt.contains("Agent responses (in execution order):") {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_synthesis {
                anyhow::bail!("model went away");
            }
            let agents: Vec<&str> = ["pdf", "web", "finance"]
                .into_iter()
                .filter(|a| prompt.contains(&format!("\"agent\": \"{}\"", a)))
                .collect();
            return Ok(format!("Combined answer drawing on {}", agents.join(" and ")));
        }
        if prompt.contains("Candidates:") {
            return Ok("VALID_SYMBOLS: AAPL".into());
        }
        if prompt.contains("AAPL (Apple Inc.): 189.84 USD") {
            return Ok("AAPL is currently trading at $189.84.".into());
        }
        Ok(String::new())
    }
}

struct StaticAgent {
    name: &'static str,
    reply: AgentOutcome,
    calls: AtomicUsize,
}

impl StaticAgent {
    fn ok(name: &'static str, text: &str) -> Self {
        Self { name, reply: AgentOutcome::success(text), calls: AtomicUsize::new(0) }
    }

    fn failing(name: &'static str, reason: &str) -> Self {
        Self { name, reply: AgentOutcome::failure(reason), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Agent for StaticAgent {
    fn name(&self) -> &str {
        self.name
    }

    fn purpose(&self) -> &str {
        "test double"
    }

    async fn process(&self, _query: &str) -> AgentOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

/// Echoes the query back, to prove per-query isolation.
struct EchoAgent(&'static str);

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        self.0
    }

    fn purpose(&self) -> &str {
        "echo"
    }

    async fn process(&self, query: &str) -> AgentOutcome {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        AgentOutcome::success(format!("{} saw: {}", self.0, query))
    }
}

struct AppleQuotes;

#[async_trait]
impl MarketDataSource for AppleQuotes {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        anyhow::ensure!(symbol == "AAPL", "unknown symbol {}", symbol);
        Ok(Quote {
            symbol: "AAPL".into(),
            name: Some("Apple Inc.".into()),
            currency: Some("USD".into()),
            exchange: Some("NMS".into()),
            price: 189.84,
            previous_close: Some(187.0),
            day_high: None,
            day_low: None,
            volume: Some(51_000_000),
            fifty_two_week_high: None,
            fifty_two_week_low: None,
            as_of: None,
        })
    }
}

fn invoker(model: Arc<ScriptedModel>) -> ModelInvoker {
    ModelInvoker::new(model, "mock").with_max_retries(0)
}

async fn registry_with(agents: Vec<Arc<dyn Agent>>) -> Arc<AgentRegistry> {
    let registry = AgentRegistry::new();
    for agent in agents {
        registry.register(agent.name().to_string(), agent).await;
    }
    Arc::new(registry)
}

#[tokio::test]
async fn test_price_query_passes_finance_answer_through() {
    let model = Arc::new(ScriptedModel::new());
    let finance: Arc<dyn Agent> = Arc::new(FinanceAgent::new(invoker(model.clone()), Arc::new(AppleQuotes)));
    let web = Arc::new(StaticAgent::ok("web", "web text"));
    let pdf = Arc::new(StaticAgent::ok("pdf", "pdf text"));
    let registry = registry_with(vec![finance, web.clone() as Arc<dyn Agent>, pdf.clone() as Arc<dyn Agent>]).await;

    let supervisor = Supervisor::new(registry, invoker(model.clone()));
    let result = supervisor.handle("What is AAPL's current price?").await;

    let decision = result.decision.clone().unwrap();
    assert_eq!(decision.agents(), vec!["finance"]);
    assert_eq!(decision.tier, RoutingTier::Lexical);
    assert_eq!(result.workpad.agents(), vec!["finance"]);
    assert_eq!(result.render(), "AAPL is currently trading at $189.84.");
    assert!(matches!(result.answer, Answer::PassThrough { ref agent, .. } if agent == "finance"));
    assert_eq!(model.synthesis_calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.routing_calls.load(Ordering::SeqCst), 0);
    assert_eq!(web.calls.load(Ordering::SeqCst), 0);
    assert_eq!(pdf.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_market_concept_without_ticker_answers_from_documents() {
    let model = Arc::new(ScriptedModel::new());
    let finance: Arc<dyn Agent> = Arc::new(FinanceAgent::new(invoker(model.clone()), Arc::new(AppleQuotes)));
    let pdf = Arc::new(StaticAgent::ok("pdf", "Dividend investing buys companies that pay out part of their earnings."));
    let registry = registry_with(vec![finance, pdf.clone() as Arc<dyn Agent>]).await;

    let result = Supervisor::new(registry, invoker(model.clone()))
        .handle("Explain how dividend investing works")
        .await;

    assert_eq!(result.decision.clone().unwrap().agents(), vec!["pdf", "finance"]);
    assert_eq!(result.workpad.agents(), vec!["pdf"]);
    assert!(matches!(result.answer, Answer::PassThrough { ref agent, .. } if agent == "pdf"));
    assert_eq!(model.synthesis_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_knowledge_plus_news_is_synthesized() {
    let model = Arc::new(ScriptedModel::new());
    let registry = registry_with(vec![
        Arc::new(StaticAgent::ok("pdf", "Covered calls and protective puts are common strategies.")),
        Arc::new(StaticAgent::ok("web", "Implied volatility rose this week.")),
        Arc::new(StaticAgent::ok("finance", "unused")),
    ])
    .await;

    let supervisor = Supervisor::new(registry, invoker(model.clone()));
    let sink = CollectingSink::new();
    let result = supervisor
        .handle_streaming("Explain options trading strategies with the latest market updates", Some(&sink))
        .await;

    assert_eq!(result.state, QueryState::Done);
    assert_eq!(result.workpad.agents(), vec!["pdf", "web"]);
    assert_eq!(result.render(), "Combined answer drawing on pdf and web");
    assert_eq!(sink.text(), "Combined answer drawing on pdf and web");
    assert_eq!(model.synthesis_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_agent_yields_no_information() {
    let model = Arc::new(ScriptedModel::new());
    let registry = registry_with(vec![Arc::new(StaticAgent::ok("finance", "quotes"))]).await;

    let result = Supervisor::new(registry, invoker(model)).handle("Any breaking news today?").await;

    assert_eq!(result.decision.unwrap().agents(), vec!["web"]);
    assert_eq!(result.state, QueryState::Done);
    assert_eq!(result.answer, Answer::NoInformation);
    let payload: serde_json::Value = serde_json::from_str(&result.answer.render()).unwrap();
    assert_eq!(payload["error"]["type"], "no_information");
}

#[tokio::test]
async fn test_error_shaped_success_is_excluded() {
    let model = Arc::new(ScriptedModel::new());
    let registry = registry_with(vec![
        Arc::new(StaticAgent::ok("pdf", "Options give the right, not the obligation, to trade.")),
        Arc::new(StaticAgent::ok("web", "Error: search quota exceeded")),
    ])
    .await;

    let result = Supervisor::new(registry, invoker(model.clone()))
        .handle("Explain options with the latest news")
        .await;

    assert_eq!(result.workpad.agents(), vec!["pdf"]);
    assert_eq!(result.render(), "Options give the right, not the obligation, to trade.");
    assert_eq!(model.synthesis_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_structured_only_policy_keeps_error_word() {
    let model = Arc::new(ScriptedModel::new());
    let registry = registry_with(vec![
        Arc::new(StaticAgent::ok("pdf", "Margin call errors happen when equity falls.")),
        Arc::new(StaticAgent::failing("web", "search backend unreachable")),
    ])
    .await;

    let supervisor = Supervisor::new(registry, invoker(model))
        .with_coordinator(Coordinator::new().with_policy(ErrorMarkerPolicy::StructuredOnly));
    let result = supervisor.handle("Explain margin calls with the latest news").await;

    assert_eq!(result.workpad.agents(), vec!["pdf"]);
    assert_eq!(result.render(), "Margin call errors happen when equity falls.");
}

#[tokio::test]
async fn test_synthesis_failure_is_tagged_not_raised() {
    let model = Arc::new(ScriptedModel::new().failing_synthesis());
    let registry = registry_with(vec![
        Arc::new(StaticAgent::ok("finance", "TSLA at 250")),
        Arc::new(StaticAgent::ok("web", "Deliveries beat estimates")),
    ])
    .await;

    let result = Supervisor::new(registry, invoker(model))
        .handle("TSLA stock price and today's headlines")
        .await;

    assert_eq!(result.state, QueryState::Done);
    assert!(!result.success());
    match &result.answer {
        Answer::SynthesisFailed(payload) => {
            assert_eq!(payload.component, "synthesizer");
            assert_eq!(payload.kind, "synthesis_error");
        }
        other => panic!("expected synthesis failure, got {:?}", other),
    }
    assert_eq!(result.workpad.len(), 2);
}

#[tokio::test]
async fn test_classifier_tier_discards_unknown_agents() {
    let model = Arc::new(ScriptedModel::new().routing("WORKFLOW:\noracle -> sees the future\nfinance -> fundamentals\nweb -> context\npdf -> too many\n"));
    let registry = registry_with(vec![
        Arc::new(StaticAgent::ok("finance", "Fundamentals look solid")),
        Arc::new(StaticAgent::ok("web", "Board reshuffle announced")),
        Arc::new(StaticAgent::ok("pdf", "unused")),
    ])
    .await;

    let result = Supervisor::new(registry, invoker(model.clone()))
        .handle("Tell me about Tesla's board")
        .await;

    let decision = result.decision.as_ref().unwrap();
    assert_eq!(decision.tier, RoutingTier::Classifier);
    assert_eq!(decision.agents(), vec!["finance", "web"]);
    assert_eq!(model.routing_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.render(), "Combined answer drawing on web and finance");
}

#[tokio::test]
async fn test_unparseable_classifier_reply_falls_back() {
    let model = Arc::new(ScriptedModel::new().routing("Hmm, hard to say."));
    let registry = registry_with(vec![
        Arc::new(StaticAgent::ok("pdf", "Board structures vary.")),
        Arc::new(StaticAgent::ok("web", "A shakeup was reported.")),
    ])
    .await;
    let supervisor = Supervisor::new(registry, invoker(model.clone()));

    let result = supervisor.handle("Who sits on corporate boards").await;
    let decision = result.decision.as_ref().unwrap();
    assert_eq!(decision.tier, RoutingTier::Fallback);
    assert_eq!(decision.agents(), vec!["pdf"]);
    assert_eq!(result.render(), "Board structures vary.");

    let result = supervisor.handle("Tesla board shakeup").await;
    let decision = result.decision.as_ref().unwrap();
    assert_eq!(decision.tier, RoutingTier::Fallback);
    assert_eq!(result.render(), "A shakeup was reported.");
    assert_eq!(model.routing_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_queries_keep_private_workpads() {
    let model = Arc::new(ScriptedModel::new());
    let registry = registry_with(vec![Arc::new(EchoAgent("web")), Arc::new(EchoAgent("pdf"))]).await;
    let supervisor = Arc::new(
        Supervisor::new(registry, invoker(model))
            .with_coordinator(Coordinator::new().with_mode(ExecutionMode::Concurrent { limit: 2 })),
    );

    let mut handles = Vec::new();
    for i in 0..6 {
        let supervisor = supervisor.clone();
        handles.push(tokio::spawn(async move {
            let query = format!("breaking news item {}", i);
            (query.clone(), supervisor.handle(&query).await)
        }));
    }

    for handle in handles {
        let (query, result) = handle.await.unwrap();
        assert_eq!(result.workpad.len(), 1);
        assert_eq!(result.render(), format!("web saw: {}", query));
    }
}
