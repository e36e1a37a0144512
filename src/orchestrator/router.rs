//! Router - Query routing to appropriate agents
//!
//! Three tiers, first hit wins:
//! 1. lexical rule table (deterministic, evaluated top to bottom),
//! 2. model-assisted classification over the registered agent names,
//! 3. a single default agent.
//!
//! Routing never fails; every path ends in a non-empty agent list.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::prompts::{self, REQUIRED_AGENTS_MARKER, WORKFLOW_MARKER};
use crate::agent::{AgentError, AgentResult, ModelInvoker, FINANCE_AGENT, PDF_AGENT, WEB_AGENT};
use crate::orchestrator::AgentRegistry;

/// Upper bound on agents accepted from the classifier.
pub const MAX_CLASSIFIER_AGENTS: usize = 2;

/// One selected agent and why it was picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub agent: String,
    pub reason: String,
}

impl WorkflowStep {
    pub fn new(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingTier {
    Lexical,
    Classifier,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub steps: Vec<WorkflowStep>,
    pub tier: RoutingTier,
    /// Name of the lexical rule that fired, if any
    pub rule: Option<String>,
}

impl RoutingDecision {
    fn new(steps: Vec<WorkflowStep>, tier: RoutingTier, rule: Option<String>) -> Self {
        Self { steps: dedup_steps(steps), tier, rule }
    }

    /// Agent names in execution order.
    pub fn agents(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.agent.clone()).collect()
    }
}

pub fn dedup_steps(steps: Vec<WorkflowStep>) -> Vec<WorkflowStep> {
    let mut out: Vec<WorkflowStep> = Vec::with_capacity(steps.len());
    for step in steps {
        if !out.iter().any(|s| s.agent == step.agent) {
            out.push(step);
        }
    }
    out
}

// ──────────────────────────────────────────────────────────────────────────────
// LEXICAL RULES
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermSet {
    Knowledge,
    CurrentEvents,
    MarketData,
    DocumentSpecific,
}

impl TermSet {
    pub fn terms(&self) -> &'static [&'static str] {
        match self {
            TermSet::Knowledge => &[
                "explain", "definition", "define", "concept", "strategy", "strategies", "how does",
                "how do", "theory", "principle", "fundamental", "learn", "tutorial", "understand",
                "meaning of", "difference between", "overview of", "introduction to",
            ],
            TermSet::CurrentEvents => &[
                "latest", "news", "today", "recent", "this week", "this month", "breaking", "update",
                "headline", "right now", "yesterday", "announced",
            ],
            TermSet::MarketData => &[
                "price", "ticker", "quote", "market cap", "dividend", "earnings", "p/e", "trading at",
                "52-week", "trading volume",
            ],
            TermSet::DocumentSpecific => &[
                "document", "pdf", "report", "filing", "10-k", "10-q", "according to", "in the book",
                "chapter", "prospectus", "whitepaper", "white paper",
            ],
        }
    }

    /// `query` must already be lowercased.
    pub fn matches(&self, query: &str) -> bool {
        self.terms().iter().any(|t| query.contains(t))
    }
}

/// A rule fires when the query hits every term set in `requires`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalRule {
    pub name: String,
    pub requires: Vec<TermSet>,
    pub agents: Vec<String>,
    pub reason: String,
}

impl LexicalRule {
    pub fn new(name: &str, requires: &[TermSet], agents: &[&str], reason: &str) -> Self {
        Self {
            name: name.to_string(),
            requires: requires.to_vec(),
            agents: agents.iter().map(|a| a.to_string()).collect(),
            reason: reason.to_string(),
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        !self.requires.is_empty() && self.requires.iter().all(|set| set.matches(query))
    }

    /// Domain rules paired with current events come first, so the domain
    /// agent runs before the web agent adds context.
    pub fn default_table() -> Vec<LexicalRule> {
        use TermSet::*;
        vec![
            LexicalRule::new("market_data_with_news", &[MarketData, CurrentEvents], &[FINANCE_AGENT, WEB_AGENT], "market data with current events"),
            LexicalRule::new("documents_with_news", &[DocumentSpecific, CurrentEvents], &[PDF_AGENT, WEB_AGENT], "document question with current events"),
            LexicalRule::new("knowledge_with_news", &[Knowledge, CurrentEvents], &[PDF_AGENT, WEB_AGENT], "background knowledge with current events"),
            LexicalRule::new("knowledge_market", &[Knowledge, MarketData], &[PDF_AGENT, FINANCE_AGENT], "market concept, with quotes if a ticker is named"),
            LexicalRule::new("market_data", &[MarketData], &[FINANCE_AGENT], "market data request"),
            LexicalRule::new("documents", &[DocumentSpecific], &[PDF_AGENT], "document-specific question"),
            LexicalRule::new("knowledge", &[Knowledge], &[PDF_AGENT], "knowledge or educational question"),
            LexicalRule::new("current_events", &[CurrentEvents], &[WEB_AGENT], "current events"),
        ]
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// CLASSIFIER OUTPUT PARSER
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Open,
    Close,
    Comma,
    Arrow,
    /// Free text following an arrow
    Text(String),
}

lazy_static! {
    static ref LIST_BULLET: Regex = Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").unwrap();
    static ref SECTION_MARKER: Regex = Regex::new(r"^\s*\**[A-Z][A-Z_ ]*[A-Z]\**:").unwrap();
}

fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*' || c == '.')
        .trim()
        .to_string()
}

fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.char_indices().peekable();

    fn flush(current: &mut String, tokens: &mut Vec<Token>) {
        let name = clean_name(current);
        if !name.is_empty() {
            tokens.push(Token::Name(name));
        }
        current.clear();
    }

    while let Some((idx, c)) = chars.next() {
        let arrow_len = match c {
            '-' if matches!(chars.peek(), Some((_, '>'))) => Some(2),
            '→' => Some(c.len_utf8()),
            _ => None,
        };
        if let Some(len) = arrow_len {
            flush(&mut current, &mut tokens);
            tokens.push(Token::Arrow);
            let rest = line[idx + len..].trim();
            if !rest.is_empty() {
                tokens.push(Token::Text(rest.to_string()));
            }
            return tokens;
        }
        match c {
            '[' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::Open);
            }
            ']' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::Close);
            }
            ',' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token::Comma);
            }
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn find_reason(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let line = line.trim().trim_start_matches('*');
        line.strip_prefix("REASON:")
            .map(|r| r.trim().trim_end_matches('*').trim().to_string())
            .filter(|r| !r.is_empty())
    })
}

/// Parse `REQUIRED_AGENTS: [a, b]` or a `WORKFLOW:` block of `name -> reason`
/// lines. Returns `None` when neither marker is present. Names come back
/// unvalidated.
pub fn parse_agent_plan(response: &str) -> Option<Vec<WorkflowStep>> {
    let required = response.find(REQUIRED_AGENTS_MARKER);
    let workflow = response.find(WORKFLOW_MARKER);

    match (required, workflow) {
        (Some(r), Some(w)) if w < r => Some(parse_workflow(&response[w + WORKFLOW_MARKER.len()..])),
        (Some(r), _) => Some(parse_required(&response[r + REQUIRED_AGENTS_MARKER.len()..], find_reason(response))),
        (None, Some(w)) => Some(parse_workflow(&response[w + WORKFLOW_MARKER.len()..])),
        (None, None) => None,
    }
}

fn parse_required(rest: &str, reason: Option<String>) -> Vec<WorkflowStep> {
    let reason = reason.unwrap_or_else(|| "selected by classifier".to_string());
    let mut steps = Vec::new();
    let mut bracket_open = false;

    for (i, line) in rest.lines().enumerate() {
        if i > 0 && !bracket_open {
            break;
        }
        for token in tokenize(line) {
            match token {
                Token::Open => bracket_open = true,
                Token::Close => return steps,
                Token::Name(name) => steps.push(WorkflowStep::new(name, reason.clone())),
                Token::Comma | Token::Arrow | Token::Text(_) => {}
            }
        }
    }
    steps
}

fn parse_workflow(rest: &str) -> Vec<WorkflowStep> {
    let mut steps = Vec::new();

    for (i, line) in rest.lines().enumerate() {
        if line.trim().is_empty() {
            if i == 0 {
                continue;
            }
            break;
        }
        if i > 0 && SECTION_MARKER.is_match(line) {
            break;
        }

        let line = LIST_BULLET.replace(line, "");
        let mut tokens = tokenize(&line).into_iter();
        let Some(Token::Name(agent)) = tokens.next() else {
            continue;
        };
        let reason = match (tokens.next(), tokens.next()) {
            (Some(Token::Arrow), Some(Token::Text(text))) => text,
            _ => String::new(),
        };
        steps.push(WorkflowStep::new(agent, reason));
    }
    steps
}

/// Map a classifier-proposed name onto a registered one.
fn resolve_name(proposed: &str, known: &[String]) -> Option<String> {
    let lowered = proposed.to_lowercase();
    let stripped = lowered
        .trim_end_matches(" agent")
        .trim_end_matches("_agent")
        .trim();
    known
        .iter()
        .find(|k| k.as_str() == proposed)
        .or_else(|| known.iter().find(|k| k.to_lowercase() == lowered || k.to_lowercase() == stripped))
        .cloned()
}

// ──────────────────────────────────────────────────────────────────────────────
// ROUTER
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Router {
    classifier: Option<ModelInvoker>,
    rules: Vec<LexicalRule>,
    max_classifier_agents: usize,
    knowledge_agent: String,
    default_agent: String,
}

impl Router {
    /// Lexical rules and fallback only.
    pub fn new() -> Self {
        Self {
            classifier: None,
            rules: LexicalRule::default_table(),
            max_classifier_agents: MAX_CLASSIFIER_AGENTS,
            knowledge_agent: PDF_AGENT.to_string(),
            default_agent: WEB_AGENT.to_string(),
        }
    }

    pub fn with_classifier(mut self, invoker: ModelInvoker) -> Self {
        self.classifier = Some(invoker);
        self
    }

    pub fn with_rules(mut self, rules: Vec<LexicalRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_max_classifier_agents(mut self, max: usize) -> Self {
        self.max_classifier_agents = max.max(1);
        self
    }

    pub fn with_fallback_agents(mut self, knowledge: impl Into<String>, default: impl Into<String>) -> Self {
        self.knowledge_agent = knowledge.into();
        self.default_agent = default.into();
        self
    }

    /// Route a query to the agents that should handle it.
    pub async fn route(&self, query: &str, registry: &AgentRegistry) -> RoutingDecision {
        let q_lower = query.to_lowercase();

        if let Some(decision) = self.lexical_route(&q_lower) {
            info!("Lexical rule {:?} selected {:?}", decision.rule, decision.agents());
            return decision;
        }

        if let Some(ref invoker) = self.classifier {
            match self.classify(query, invoker, registry).await {
                Ok(steps) if !steps.is_empty() => {
                    let decision = RoutingDecision::new(steps, RoutingTier::Classifier, None);
                    info!("Classifier selected {:?}", decision.agents());
                    return decision;
                }
                Ok(_) => warn!("Classifier produced no usable agents; falling back"),
                Err(e) => warn!("Classifier failed; falling back: {}", e),
            }
        }

        let decision = self.fallback(&q_lower);
        info!("Fallback selected {:?}", decision.agents());
        decision
    }

    /// First matching rule of the table, if any. `q_lower` must be lowercased.
    pub fn lexical_route(&self, q_lower: &str) -> Option<RoutingDecision> {
        let rule = self.rules.iter().find(|r| r.matches(q_lower))?;
        let steps = rule
            .agents
            .iter()
            .map(|a| WorkflowStep::new(a.clone(), rule.reason.clone()))
            .collect();
        Some(RoutingDecision::new(steps, RoutingTier::Lexical, Some(rule.name.clone())))
    }

    async fn classify(&self, query: &str, invoker: &ModelInvoker, registry: &AgentRegistry) -> AgentResult<Vec<WorkflowStep>> {
        let known = registry.list_names().await;
        if known.is_empty() {
            return Err(AgentError::Routing("no registered agents to classify against".into()));
        }

        let prompt = prompts::routing_prompt(query, &registry.generate_agents_prompt().await);
        let response = invoker
            .invoke(prompt, None)
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;
        debug!("Classifier response: {}", response);

        let proposed = parse_agent_plan(&response)
            .ok_or_else(|| AgentError::Routing("classifier response carried no agent marker".into()))?;

        let mut steps = Vec::new();
        for step in proposed {
            match resolve_name(&step.agent, &known) {
                Some(agent) => steps.push(WorkflowStep::new(agent, step.reason)),
                None => debug!("Discarding unknown agent '{}' from classifier", step.agent),
            }
        }

        let mut steps = dedup_steps(steps);
        steps.truncate(self.max_classifier_agents);
        Ok(steps)
    }

    fn fallback(&self, q_lower: &str) -> RoutingDecision {
        let (agent, reason) = if is_knowledge_shaped(q_lower) {
            (self.knowledge_agent.clone(), "fallback: knowledge-shaped query")
        } else {
            (self.default_agent.clone(), "fallback: default agent")
        };
        RoutingDecision::new(vec![WorkflowStep::new(agent, reason)], RoutingTier::Fallback, None)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn is_knowledge_shaped(q_lower: &str) -> bool {
    let openers = ["what", "why", "how", "who", "which", "define", "describe", "explain", "when"];
    let first = q_lower.split_whitespace().next().unwrap_or_default();
    let first = first.trim_matches(|c: char| !c.is_alphanumeric());
    openers.contains(&first)
}
