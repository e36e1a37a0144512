//! Model Providers
//!
//! The opaque "prompt in, text out" capability. Providers may stream tokens;
//! callers that only need the final text use `generate`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, Stream};
use futures_util::StreamExt;
use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};
use ollama_rs::models::ModelOptions;
use reqwest::{Client, Url};
use serde_json::json;
use std::pin::Pin;

/// Stream of text chunks produced by a model.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;

    /// Incremental variant. Providers without native streaming deliver the
    /// whole answer as a single chunk.
    async fn generate_stream(&self, model: &str, prompt: String, system: Option<String>) -> Result<TokenStream> {
        let text = self.generate(model, prompt, system).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }
}

pub struct OllamaProvider {
    client: ollama_rs::Ollama,
    options: Option<ModelOptions>,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client, options: None }
    }

    /// Connect to the Ollama server at `url`, port included.
    pub fn with_url(url: Url) -> Self {
        Self::new(ollama_rs::Ollama::from_url(url))
    }

    /// Sampling options sent with every chat request.
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn url(&self) -> &Url {
        self.client.url()
    }

    fn request(&self, model: &str, prompt: String, system: Option<String>) -> ChatMessageRequest {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(ChatMessage::system(sys));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatMessageRequest::new(model.to_string(), messages);
        match &self.options {
            Some(options) => request.options(options.clone()),
            None => request,
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(ollama_rs::Ollama::default())
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let res = self
            .client
            .send_chat_messages(self.request(model, prompt, system))
            .await
            .context("Ollama chat request failed")?;

        Ok(res.message.content)
    }

    async fn generate_stream(&self, model: &str, prompt: String, system: Option<String>) -> Result<TokenStream> {
        let stream = self
            .client
            .send_chat_messages_stream(self.request(model, prompt, system))
            .await
            .context("Ollama streaming request failed")?;

        Ok(Box::pin(stream.map(|chunk| {
            chunk
                .map(|res| res.message.content)
                .map_err(|_| anyhow::anyhow!("Ollama stream interrupted"))
        })))
    }
}

pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({ "role": "system", "content": sys }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?.error_for_status()?;
        let json: serde_json::Value = res.json().await?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .context("Failed to parse content from OpenAI response")?;

        Ok(content.to_string())
    }
}
