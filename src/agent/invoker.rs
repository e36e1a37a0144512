//! Model Invocation
//!
//! Binds a provider to a model name and applies the retry policy. Token
//! delivery goes to a sink passed with each call, so concurrent queries
//! never share streaming state.

use anyhow::Result;
use futures_util::StreamExt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::LLMProvider;

/// Receives incremental model output for a single invocation.
pub trait TokenSink: Send + Sync {
    fn on_token(&self, token: &str);
}

/// Writes tokens straight to stdout.
pub struct StdoutSink;

impl TokenSink for StdoutSink {
    fn on_token(&self, token: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(token.as_bytes());
        let _ = out.flush();
    }
}

impl TokenSink for mpsc::UnboundedSender<String> {
    fn on_token(&self, token: &str) {
        let _ = self.send(token.to_string());
    }
}

/// Accumulates every token it sees.
#[derive(Default)]
pub struct CollectingSink {
    tokens: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.tokens().concat()
    }
}

impl TokenSink for CollectingSink {
    fn on_token(&self, token: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.push(token.to_string());
        }
    }
}

#[derive(Clone)]
pub struct ModelInvoker {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_retries: usize,
    retry_delay: Duration,
}

impl ModelInvoker {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_retries: 2,
            retry_delay: Duration::from_millis(250),
        }
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run one prompt to completion.
    ///
    /// With a sink the provider is streamed and every chunk is forwarded as it
    /// arrives. A failed attempt is retried only if nothing reached the sink yet.
    pub async fn invoke(&self, prompt: String, sink: Option<&dyn TokenSink>) -> Result<String> {
        let mut attempt = 0;
        loop {
            let result = match sink {
                Some(sink) => self.invoke_streaming(prompt.clone(), sink).await,
                None => self
                    .provider
                    .generate(&self.model, prompt.clone(), None)
                    .await
                    .map_err(|e| (e, false)),
            };

            match result {
                Ok(text) => return Ok(text),
                Err((e, delivered)) => {
                    if delivered || attempt >= self.max_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!("Model call to {} failed (attempt {}/{}): {}", self.model, attempt, self.max_retries + 1, e);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn invoke_streaming(&self, prompt: String, sink: &dyn TokenSink) -> std::result::Result<String, (anyhow::Error, bool)> {
        let mut stream = self
            .provider
            .generate_stream(&self.model, prompt, None)
            .await
            .map_err(|e| (e, false))?;

        let mut full = String::new();
        let mut delivered = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| (e, delivered))?;
            if chunk.is_empty() {
                continue;
            }
            sink.on_token(&chunk);
            delivered = true;
            full.push_str(&chunk);
        }

        debug!("Streamed {} bytes from {}", full.len(), self.model);
        Ok(full)
    }
}
