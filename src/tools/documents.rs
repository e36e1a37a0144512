//! Document Chunk Store
//!
//! Read-only view over a pre-built chunk index (`chunks.json` in the index
//! directory). Building that index is someone else's job; this side only loads
//! and ranks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const INDEX_FILE: &str = "chunks.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// File the chunk came from
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub content: String,
    /// Relevance to the last query (only set on search results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl DocumentChunk {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: None,
            content: content.into(),
            score: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn citation(&self) -> String {
        match self.page {
            Some(page) => format!("{} (p. {})", self.source, page),
            None => self.source.clone(),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Most relevant chunks first; an empty vector means nothing matched.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<DocumentChunk>>;

    async fn count(&self) -> Result<usize>;
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was", "one",
    "our", "out", "has", "have", "his", "how", "its", "may", "who", "what", "when", "where", "which",
    "why", "with", "this", "that", "from", "they", "will", "would", "there", "their", "about", "into",
    "does", "did", "is", "of", "to", "in", "on", "a", "an", "me", "tell", "explain", "please",
];

fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(t))
        .map(String::from)
        .collect()
}

/// Term-overlap ranking over an in-memory chunk list.
pub struct IndexedDocumentStore {
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl IndexedDocumentStore {
    pub fn new(chunks: Vec<DocumentChunk>) -> Self {
        Self { chunks: RwLock::new(chunks) }
    }

    /// Load `<index_dir>/chunks.json`. A missing index yields an empty store.
    pub async fn load(index_dir: impl AsRef<Path>) -> Result<Self> {
        let path: PathBuf = index_dir.as_ref().join(INDEX_FILE);
        if !path.exists() {
            warn!("Document index not found at {:?}; document agent will find nothing", path);
            return Ok(Self::new(Vec::new()));
        }

        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read document index {:?}", path))?;
        let chunks: Vec<DocumentChunk> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse document index {:?}", path))?;

        info!("Loaded {} document chunks from {:?}", chunks.len(), path);
        Ok(Self::new(chunks))
    }

    fn score(query_terms: &HashSet<String>, chunk: &DocumentChunk) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let chunk_terms: HashSet<String> = terms(&chunk.content).into_iter().collect();
        let hits = query_terms.iter().filter(|t| chunk_terms.contains(*t)).count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl DocumentStore for IndexedDocumentStore {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<DocumentChunk>> {
        let query_terms: HashSet<String> = terms(query).into_iter().collect();
        let chunks = self.chunks.read().await;

        let mut scored: Vec<(f32, &DocumentChunk)> = chunks
            .iter()
            .map(|c| (Self::score(&query_terms, c), c))
            .filter(|(s, _)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(s, c)| {
                let mut chunk = c.clone();
                chunk.score = Some(s);
                chunk
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.chunks.read().await.len())
    }
}
