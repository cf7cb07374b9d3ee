//! Structured-query capability.
//!
//! [`SqlAgent`] validates the reasoner-chosen input (`{"query": "..."}`),
//! enforces a read-only guard, and delegates execution to a [`SqlExecutor`]
//! collaborator. Row data comes back as JSON objects and is wrapped with a
//! row count so the reasoner sees the result size without counting.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::agent::{Agent, AgentContext, AgentError};

/// Default clamp on the number of rows returned by one query.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Executes a read-only SQL statement against some backing store.
///
/// This is the external collaborator boundary: the engine never sees
/// connection handling or driver types, only rows as JSON objects.
/// Implementations must be safe for concurrent invocation.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a SELECT and return at most `max_rows` rows.
    async fn select(&self, query: &str, max_rows: usize) -> Result<Vec<Value>, SqlExecutorError>;
}

/// Failures surfaced by a [`SqlExecutor`] implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum SqlExecutorError {
    /// The statement failed to execute.
    #[error("query failed: {0}")]
    #[diagnostic(code(reagent::sql::query))]
    Query(String),

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    #[diagnostic(code(reagent::sql::unavailable))]
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
struct SqlInput {
    query: String,
}

/// The SQL capability agent.
pub struct SqlAgent {
    executor: Arc<dyn SqlExecutor>,
    max_rows: usize,
}

impl SqlAgent {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            executor,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Override the row clamp.
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Read-only guard: exactly one statement, and it must be a SELECT.
    /// A single trailing semicolon is tolerated.
    fn check_read_only(query: &str) -> Result<(), AgentError> {
        let trimmed = query.trim().trim_end_matches(';').trim();
        if trimmed.is_empty() {
            return Err(AgentError::InvalidInput("empty query".to_string()));
        }
        if trimmed.contains(';') {
            return Err(AgentError::Unsupported {
                what: "multiple SQL statements in one request".to_string(),
            });
        }
        let head = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if head != "select" {
            return Err(AgentError::Unsupported {
                what: format!("non-SELECT statement '{head}'"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Agent for SqlAgent {
    async fn execute(&self, input: Value, ctx: AgentContext) -> Result<Value, AgentError> {
        let input: SqlInput = serde_json::from_value(input)
            .map_err(|e| AgentError::InvalidInput(format!("expected {{\"query\": string}}: {e}")))?;
        Self::check_read_only(&input.query)?;

        ctx.emit("sql", format!("executing: {}", input.query))?;
        let rows = self
            .executor
            .select(&input.query, self.max_rows)
            .await
            .map_err(|e| AgentError::Collaborator {
                collaborator: "sql",
                message: e.to_string(),
            })?;

        let row_count = rows.len();
        Ok(json!({ "rows": rows, "row_count": row_count }))
    }
}
