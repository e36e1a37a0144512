//! Web Search Backends
//!
//! Serper (Google results, API key) when configured, DuckDuckGo HTML otherwise.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Formats results as a numbered list for prompt embedding.
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. **{}**\n   {}\n   URL: {}", i + 1, r.title, r.snippet, r.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>>;
}

pub struct DuckDuckGoSearch {
    client: Client,
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
                .build()
                .unwrap_or_default(),
        }
    }

    fn parse_html(html: &str, max_results: usize) -> Vec<SearchResult> {
        lazy_static::lazy_static! {
            static ref SNIPPET_RE: regex::Regex = regex::Regex::new(r#"class="result__snippet"[^>]*>([^<]+)"#).unwrap();
            static ref TITLE_RE: regex::Regex = regex::Regex::new(r#"class="result__a"[^>]*>([^<]+)"#).unwrap();
            static ref URL_RE: regex::Regex = regex::Regex::new(r#"class="result__url"[^>]*>([^<]+)"#).unwrap();
        }

        let snippets: Vec<_> = SNIPPET_RE.captures_iter(html).collect();
        let titles: Vec<_> = TITLE_RE.captures_iter(html).collect();
        let urls: Vec<_> = URL_RE.captures_iter(html).collect();

        let count = snippets.len().min(titles.len()).min(max_results);
        let mut results = Vec::with_capacity(count);

        for i in 0..count {
            let title = titles[i]
                .get(1)
                .map(|m| html_escape::decode_html_entities(m.as_str()).trim().to_string())
                .unwrap_or_default();
            let snippet = snippets[i]
                .get(1)
                .map(|m| html_escape::decode_html_entities(m.as_str()).trim().to_string())
                .unwrap_or_default();
            let url = urls
                .get(i)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();

            if !title.is_empty() && !snippet.is_empty() {
                results.push(SearchResult { title, snippet, url });
            }
        }

        results
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let url = format!("https://html.duckduckgo.com/html/?q={}", urlencoding::encode(query));
        debug!("Searching DuckDuckGo: {}", query);

        let html = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send search request")?
            .text()
            .await
            .context("Failed to read response")?;

        let results = Self::parse_html(&html, num_results);
        if results.is_empty() {
            warn!("DuckDuckGo returned no parseable results for '{}'", query);
        }
        Ok(results)
    }
}

pub struct SerperSearch {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: "https://google.serper.dev/search".to_string(),
        }
    }

    fn parse_response(body: &serde_json::Value, max_results: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if let Some(answer) = body["answerBox"]["answer"].as_str().or_else(|| body["answerBox"]["snippet"].as_str()) {
            results.push(SearchResult {
                title: body["answerBox"]["title"].as_str().unwrap_or("Answer").to_string(),
                snippet: answer.to_string(),
                url: body["answerBox"]["link"].as_str().unwrap_or_default().to_string(),
            });
        }

        if let Some(organic) = body["organic"].as_array() {
            for item in organic {
                let title = item["title"].as_str().unwrap_or_default();
                let snippet = item["snippet"].as_str().unwrap_or_default();
                if title.is_empty() || snippet.is_empty() {
                    continue;
                }
                results.push(SearchResult {
                    title: title.to_string(),
                    snippet: snippet.to_string(),
                    url: item["link"].as_str().unwrap_or_default().to_string(),
                });
            }
        }

        results.truncate(max_results);
        results
    }
}

#[async_trait]
impl SearchBackend for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        debug!("Searching Serper: {}", query);

        let body: serde_json::Value = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": num_results }))
            .send()
            .await
            .context("Failed to send Serper request")?
            .error_for_status()
            .context("Serper rejected the request")?
            .json()
            .await
            .context("Failed to decode Serper response")?;

        Ok(Self::parse_response(&body, num_results))
    }
}
