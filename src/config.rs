//! Configuration
//!
//! JSON file with per-section defaults, overridable from the environment.

use anyhow::{Context, Result};
use ollama_rs::models::ModelOptions;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::agent::{LLMProvider, ModelInvoker, OllamaProvider, OpenAICompatibleProvider};
use crate::orchestrator::{ErrorMarkerPolicy, ExecutionMode};
use crate::utils::TruncationPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "expert_agency.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Ollama,
    /// Any server exposing `/v1/chat/completions`
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub name: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            name: "llama3.2".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 3000,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub serper_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub documents_dir: PathBuf,
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./data/documents"),
            index_dir: PathBuf::from("./data/indexes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Ask the model when no lexical rule matches
    pub llm_routing: bool,
    pub max_classifier_agents: usize,
    pub error_marker_policy: ErrorMarkerPolicy,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            llm_routing: true,
            max_classifier_agents: 2,
            error_marker_policy: ErrorMarkerPolicy::Substring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub concurrent: bool,
    pub concurrency_limit: usize,
    /// Per-agent token budget inside the synthesis prompt
    pub synthesis_budget_tokens: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            concurrency_limit: 3,
            synthesis_budget_tokens: 1500,
        }
    }
}

impl ExecutionConfig {
    pub fn mode(&self) -> ExecutionMode {
        if self.concurrent {
            ExecutionMode::Concurrent { limit: self.concurrency_limit.max(1) }
        } else {
            ExecutionMode::Sequential
        }
    }

    pub fn synthesis_budget(&self) -> TruncationPolicy {
        TruncationPolicy::Tokens(self.synthesis_budget_tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Chunks retrieved per document query
    pub document_top_k: usize,
    /// Search results handed to the web agent
    pub web_results: usize,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            document_top_k: 12,
            web_results: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpertConfig {
    pub model: ModelConfig,
    pub api: ApiConfig,
    pub paths: PathsConfig,
    pub routing: RoutingConfig,
    pub execution: ExecutionConfig,
    pub agents: AgentsConfig,
    pub logging: LoggingConfig,
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Parse an Ollama host the way the `ollama` CLI accepts it: a missing
/// scheme means `http://` and a missing port means 11434.
pub fn ollama_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).with_context(|| format!("Invalid Ollama host '{}'", raw))?;
    if url.host_str().map_or(true, str::is_empty) {
        anyhow::bail!("Ollama host '{}' has no hostname", raw);
    }
    if url.port().is_none() {
        url.set_port(Some(DEFAULT_OLLAMA_PORT))
            .map_err(|_| anyhow::anyhow!("Ollama host '{}' cannot carry a port", raw))?;
    }
    Ok(url)
}

impl ExpertConfig {
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Override fields from a variable lookup. Blank values are ignored.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = get("EXPERT_MODEL") {
            self.model.name = model;
        }
        if let Some(provider) = get("EXPERT_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "ollama" => self.model.provider = ProviderKind::Ollama,
                "openai" | "open_ai" => self.model.provider = ProviderKind::OpenAi,
                other => tracing::warn!("Ignoring unknown EXPERT_PROVIDER '{}'", other),
            }
        }
        match self.model.provider {
            ProviderKind::Ollama => {
                if let Some(host) = get("OLLAMA_HOST") {
                    self.model.base_url = Some(host);
                }
            }
            ProviderKind::OpenAi => {
                if let Some(url) = get("OPENAI_BASE_URL") {
                    self.model.base_url = Some(url);
                }
            }
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(key) = get("SERPER_API_KEY") {
            self.api.serper_api_key = Some(key);
        }
        if let Some(flag) = get("EXPERT_CONCURRENT") {
            self.execution.concurrent = truthy(&flag);
        }
    }

    pub fn build_provider(&self) -> Result<Arc<dyn LLMProvider>> {
        match self.model.provider {
            ProviderKind::Ollama => {
                let options = ModelOptions::default()
                    .temperature(self.model.temperature)
                    .num_predict(i32::try_from(self.model.max_tokens).unwrap_or(i32::MAX));
                let provider = match self.model.base_url.as_deref() {
                    Some(raw) => OllamaProvider::with_url(ollama_url(raw)?),
                    None => OllamaProvider::default(),
                };
                info!("Using Ollama at {}", provider.url());
                Ok(Arc::new(provider.with_options(options)))
            }
            ProviderKind::OpenAi => {
                let base_url = self
                    .model
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com".to_string());
                Ok(Arc::new(
                    OpenAICompatibleProvider::new(base_url, self.model.api_key.clone())
                        .with_temperature(self.model.temperature)
                        .with_max_tokens(self.model.max_tokens),
                ))
            }
        }
    }

    pub fn build_invoker(&self) -> Result<ModelInvoker> {
        Ok(ModelInvoker::new(self.build_provider()?, self.model.name.clone()).with_max_retries(self.model.max_retries))
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config file, writing defaults first if it does not exist.
    pub async fn load(&self) -> Result<ExpertConfig> {
        if !self.path.exists() {
            let default = ExpertConfig::default();
            self.save(&default).await?;
            info!("Wrote default configuration to {:?}", self.path);
            return Ok(default);
        }
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read config {:?}", self.path))?;
        let config = serde_json::from_str(&content).with_context(|| format!("Failed to parse config {:?}", self.path))?;
        Ok(config)
    }

    pub async fn save(&self, config: &ExpertConfig) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write config {:?}", self.path))?;
        Ok(())
    }
}
