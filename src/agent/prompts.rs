//! Prompt Templates
//!
//! Wording here is policy, not contract. The only structural requirements are
//! the literal markers the router and finance agent parse back out.

/// Marker introducing a bracketed agent list in classifier output.
pub const REQUIRED_AGENTS_MARKER: &str = "REQUIRED_AGENTS:";
/// Marker introducing `agent -> reason` lines in classifier output.
pub const WORKFLOW_MARKER: &str = "WORKFLOW:";
/// Marker introducing validated ticker symbols.
pub const VALID_SYMBOLS_MARKER: &str = "VALID_SYMBOLS:";

pub fn routing_prompt(query: &str, agents_listing: &str) -> String {
    format!(
        r#"You coordinate a team of specialised agents and decide which of them a query needs.

Available agents:
{agents}

Query: {query}

Pick the agents whose information sources are needed, in the order they should run.
Domain agents (documents, market data) come before agents that add current context.
Use only the agent names listed above.

Answer in exactly this form:
{marker} [agent1, agent2]
REASON: one sentence on why these agents are needed"#,
        agents = agents_listing,
        query = query,
        marker = REQUIRED_AGENTS_MARKER,
    )
}

/// Agent outputs arrive pre-serialised as a JSON array of `{agent, response}`.
pub fn synthesis_prompt(query: &str, agent_responses: &str) -> String {
    format!(
        r#"You integrate answers produced by several specialised agents into one response.

Original query: {query}

Agent responses (in execution order):
{responses}

Write one coherent answer that:
- reconciles contradictions between the agents and says which source is more reliable,
- notes which agent each kind of claim comes from,
- states remaining gaps or uncertainty briefly.

Answer in clear natural language, no JSON."#,
        query = query,
        responses = agent_responses,
    )
}

pub fn document_prompt(context: &str, query: &str) -> String {
    format!(
        r#"You are a financial document analyst.

Context documents:
{context}

Question: {query}

Answer from the documents above. Reference the specific passages you rely on,
connect information across sources, explain your reasoning, and say where the
documents are silent or uncertain. Write naturally, without a fixed format."#,
        context = context,
        query = query,
    )
}

pub fn web_prompt(search_results: &str, query: &str) -> String {
    format!(
        r#"You are a web information analyst focused on current financial and market news.

Search results:
{results}

Query: {query}

Judge how credible and recent the sources are, pull out the key facts and the
prevailing sentiment, and then give a clear natural-language answer to the query.
No JSON."#,
        results = search_results,
        query = query,
    )
}

pub fn finance_prompt(market_data: &str, query: &str) -> String {
    format!(
        r#"You are a financial analyst. Answer the query using only the market data below.

Market data:
{data}

Query: {query}

Be direct. For price questions say e.g. "AAPL is currently trading at $X".
For comparisons quote both figures."#,
        data = market_data,
        query = query,
    )
}

pub fn symbol_extraction_prompt(query: &str, candidates: &[String]) -> String {
    format!(
        r#"Decide which of these candidate tokens are stock ticker symbols in the context of the query.

Query: {query}
Candidates: {candidates}

Return only symbols from the candidate list, comma separated, on one line:
{marker} SYMBOL1, SYMBOL2"#,
        query = query,
        candidates = candidates.join(", "),
        marker = VALID_SYMBOLS_MARKER,
    )
}
