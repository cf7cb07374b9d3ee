//! Vector-similarity retrieval capability.
//!
//! [`VectorSearchAgent`] validates `{"query": "...", "top_k": n}` input and
//! delegates to a [`VectorIndex`] collaborator. The crate ships
//! [`InMemoryIndex`], a bag-of-words cosine index, as the reference
//! implementation for tests and demos; production deployments plug in a real
//! index behind the same trait.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::agent::{Agent, AgentContext, AgentError};

/// Default number of documents returned when the input omits `top_k`.
pub const DEFAULT_TOP_K: usize = 5;

/// A retrieved document with its similarity score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// Searches an index for documents similar to a text query.
///
/// External collaborator boundary: embedding and index layout are invisible
/// to the engine. Implementations must be safe for concurrent invocation.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, VectorIndexError>;
}

/// Failures surfaced by a [`VectorIndex`] implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum VectorIndexError {
    #[error("index unavailable: {0}")]
    #[diagnostic(code(reagent::vector::unavailable))]
    Unavailable(String),

    #[error("search failed: {0}")]
    #[diagnostic(code(reagent::vector::search))]
    Search(String),
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

/// The vector retrieval capability agent.
pub struct VectorSearchAgent {
    index: Arc<dyn VectorIndex>,
}

impl VectorSearchAgent {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Agent for VectorSearchAgent {
    async fn execute(&self, input: Value, ctx: AgentContext) -> Result<Value, AgentError> {
        let input: SearchInput = serde_json::from_value(input).map_err(|e| {
            AgentError::InvalidInput(format!(
                "expected {{\"query\": string, \"top_k\": integer?}}: {e}"
            ))
        })?;
        if input.query.trim().is_empty() {
            return Err(AgentError::InvalidInput("empty query".to_string()));
        }
        if input.top_k == 0 {
            return Err(AgentError::InvalidInput("top_k must be > 0".to_string()));
        }

        ctx.emit(
            "vector_search",
            format!("retrieving top {} for: {}", input.top_k, input.query),
        )?;
        let hits = self
            .index
            .search(&input.query, input.top_k)
            .await
            .map_err(|e| AgentError::Collaborator {
                collaborator: "vector_index",
                message: e.to_string(),
            })?;

        let match_count = hits.len();
        Ok(json!({ "matches": hits, "match_count": match_count }))
    }
}

/// Reference in-memory index: cosine similarity over bag-of-words vectors.
///
/// Good enough for tests and demos; not meant for large corpora.
#[derive(Clone, Default)]
pub struct InMemoryIndex {
    documents: Vec<(String, String)>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `(id, text)` pairs.
    pub fn with_documents(documents: Vec<(String, String)>) -> Self {
        Self { documents }
    }

    /// Add one document.
    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.documents.push((id.into(), text.into()));
    }

    fn term_counts(text: &str) -> FxHashMap<String, f32> {
        let mut counts = FxHashMap::default();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *counts.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
        }
        counts
    }

    fn cosine(a: &FxHashMap<String, f32>, b: &FxHashMap<String, f32>) -> f32 {
        let dot: f32 = a
            .iter()
            .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
            .sum();
        let norm_a: f32 = a.values().map(|w| w * w).sum::<f32>().sqrt();
        let norm_b: f32 = b.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, VectorIndexError> {
        let query_vector = Self::term_counts(query);
        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .map(|(id, text)| ScoredDocument {
                id: id.clone(),
                score: Self::cosine(&query_vector, &Self::term_counts(text)),
                text: text.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}
