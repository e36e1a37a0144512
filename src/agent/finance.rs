use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{prompts, Agent, AgentOutcome, ModelInvoker, FINANCE_AGENT};
use crate::tools::MarketDataSource;

lazy_static::lazy_static! {
    static ref DOLLAR_TICKER: Regex = Regex::new(r"\$([A-Za-z]{1,5})\b").unwrap();
    static ref PAREN_TICKER: Regex = Regex::new(r"\(([A-Za-z]{1,5})\)").unwrap();
    static ref UPPER_TICKER: Regex = Regex::new(r"\b([A-Z]{2,5})\b").unwrap();
}

/// Uppercase words that are almost never tickers on their own.
const NOT_TICKERS: &[&str] = &[
    "AI", "CEO", "CFO", "ETF", "EPS", "GDP", "IPO", "USA", "US", "USD", "EUR", "SEC", "FED", "API",
    "PDF", "OK", "ROI", "YTD", "CPI", "FAQ", "ATH",
];

/// Candidate ticker symbols in order of first appearance, uppercased.
///
/// Picks up `$tsla`, `(msft)` and bare uppercase tokens such as `AAPL's`.
pub fn extract_symbol_candidates(query: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for re in [&*DOLLAR_TICKER, &*PAREN_TICKER] {
        for caps in re.captures_iter(query) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str().to_uppercase()));
            }
        }
    }
    for caps in UPPER_TICKER.captures_iter(query) {
        if let Some(m) = caps.get(1) {
            if !NOT_TICKERS.contains(&m.as_str()) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    let mut symbols: Vec<String> = Vec::new();
    for (_, s) in found {
        if !symbols.contains(&s) {
            symbols.push(s);
        }
    }
    symbols
}

/// Pull the validated list out of a `VALID_SYMBOLS:` reply, keeping only
/// symbols that were offered as candidates.
fn parse_valid_symbols(response: &str, candidates: &[String]) -> Vec<String> {
    let Some(idx) = response.find(prompts::VALID_SYMBOLS_MARKER) else {
        return Vec::new();
    };
    let rest = &response[idx + prompts::VALID_SYMBOLS_MARKER.len()..];
    let line = rest.lines().next().unwrap_or_default();

    let mut symbols = Vec::new();
    for raw in line.split(',') {
        let sym = raw
            .trim()
            .trim_matches(|c: char| c == '(' || c == ')' || c == '$' || c == '[' || c == ']')
            .to_uppercase();
        if candidates.contains(&sym) && !symbols.contains(&sym) {
            symbols.push(sym);
        }
    }
    symbols
}

/// Answers market-data questions from live quotes.
pub struct FinanceAgent {
    invoker: ModelInvoker,
    market: Arc<dyn MarketDataSource>,
    validate_symbols: bool,
    max_symbols: usize,
}

impl FinanceAgent {
    pub fn new(invoker: ModelInvoker, market: Arc<dyn MarketDataSource>) -> Self {
        Self {
            invoker,
            market,
            validate_symbols: true,
            max_symbols: 5,
        }
    }

    /// Skip the model pass that filters out non-ticker candidates.
    pub fn without_symbol_validation(mut self) -> Self {
        self.validate_symbols = false;
        self
    }

    async fn resolve_symbols(&self, query: &str) -> Vec<String> {
        let candidates = extract_symbol_candidates(query);
        if candidates.is_empty() || !self.validate_symbols {
            return candidates;
        }

        let prompt = prompts::symbol_extraction_prompt(query, &candidates);
        match self.invoker.invoke(prompt, None).await {
            Ok(reply) => {
                let valid = parse_valid_symbols(&reply, &candidates);
                if valid.is_empty() {
                    debug!("Symbol validation gave nothing usable; keeping {:?}", candidates);
                    candidates
                } else {
                    valid
                }
            }
            Err(e) => {
                warn!("Symbol validation failed, keeping lexical candidates: {}", e);
                candidates
            }
        }
    }

    async fn answer(&self, query: &str) -> Result<String> {
        let symbols = self.resolve_symbols(query).await;
        if symbols.is_empty() {
            anyhow::bail!("no ticker symbols found in query");
        }

        let mut blocks = Vec::new();
        for symbol in symbols.iter().take(self.max_symbols) {
            match self.market.quote(symbol).await {
                Ok(quote) => blocks.push(quote.describe()),
                Err(e) => warn!("Quote lookup for {} failed: {}", symbol, e),
            }
        }
        if blocks.is_empty() {
            anyhow::bail!("no market data available for {}", symbols.join(", "));
        }
        info!("Finance agent fetched {} quotes", blocks.len());

        let prompt = prompts::finance_prompt(&blocks.join("\n\n"), query);
        let response = self.invoker.invoke(prompt, None).await?;
        Ok(response.trim().to_string())
    }
}

#[async_trait]
impl Agent for FinanceAgent {
    fn name(&self) -> &str {
        FINANCE_AGENT
    }

    fn purpose(&self) -> &str {
        "Looks up live market data for ticker symbols: prices, daily moves, ranges and volume."
    }

    async fn process(&self, query: &str) -> AgentOutcome {
        match self.answer(query).await {
            Ok(text) if text.is_empty() => AgentOutcome::failure("model returned an empty answer"),
            Ok(text) => AgentOutcome::Success(text),
            Err(e) => AgentOutcome::failure(format!("finance agent failed: {:#}", e)),
        }
    }
}
