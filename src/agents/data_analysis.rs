//! Tabular analysis capability.
//!
//! [`DataAnalysisAgent`] aggregates JSON row sets produced by earlier steps:
//! count, numeric reductions over a named column, and per-value group
//! counts. The computation is self-contained — rows arrive in the action
//! input, so there is no external collaborator to fail.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::agent::{Agent, AgentContext, AgentError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Operation {
    Count,
    Sum,
    Mean,
    Min,
    Max,
    GroupCount,
}

impl Operation {
    fn needs_column(self) -> bool {
        !matches!(self, Operation::Count)
    }

    fn name(self) -> &'static str {
        match self {
            Operation::Count => "count",
            Operation::Sum => "sum",
            Operation::Mean => "mean",
            Operation::Min => "min",
            Operation::Max => "max",
            Operation::GroupCount => "group_count",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisInput {
    operation: Operation,
    #[serde(default)]
    column: Option<String>,
    rows: Vec<Value>,
}

/// The tabular aggregation capability agent.
#[derive(Clone, Copy, Debug, Default)]
pub struct DataAnalysisAgent;

impl DataAnalysisAgent {
    pub fn new() -> Self {
        Self
    }

    fn numeric_column(rows: &[Value], column: &str) -> Result<Vec<f64>, AgentError> {
        let mut values = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let cell = row.get(column).ok_or_else(|| {
                AgentError::InvalidInput(format!("row {i} has no column '{column}'"))
            })?;
            let number = cell.as_f64().ok_or_else(|| {
                AgentError::InvalidInput(format!("row {i} column '{column}' is not numeric"))
            })?;
            values.push(number);
        }
        Ok(values)
    }

    fn group_counts(rows: &[Value], column: &str) -> Result<Map<String, Value>, AgentError> {
        let mut groups: Map<String, Value> = Map::new();
        for (i, row) in rows.iter().enumerate() {
            let cell = row.get(column).ok_or_else(|| {
                AgentError::InvalidInput(format!("row {i} has no column '{column}'"))
            })?;
            let key = match cell {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let counter = groups.entry(key).or_insert(json!(0));
            *counter = json!(counter.as_u64().unwrap_or(0) + 1);
        }
        Ok(groups)
    }
}

#[async_trait]
impl Agent for DataAnalysisAgent {
    async fn execute(&self, input: Value, ctx: AgentContext) -> Result<Value, AgentError> {
        let input: AnalysisInput = serde_json::from_value(input).map_err(|e| {
            AgentError::InvalidInput(format!(
                "expected {{\"operation\", \"column\"?, \"rows\"}}: {e}"
            ))
        })?;

        let column = match (&input.column, input.operation.needs_column()) {
            (Some(column), _) => Some(column.as_str()),
            (None, false) => None,
            (None, true) => {
                return Err(AgentError::InvalidInput(format!(
                    "operation '{}' requires a column",
                    input.operation.name()
                )));
            }
        };

        ctx.emit(
            "data_analysis",
            format!(
                "{} over {} rows",
                input.operation.name(),
                input.rows.len()
            ),
        )?;

        let result = match input.operation {
            Operation::Count => json!(input.rows.len()),
            Operation::GroupCount => {
                Value::Object(Self::group_counts(&input.rows, column.unwrap_or_default())?)
            }
            numeric => {
                let values =
                    Self::numeric_column(&input.rows, column.unwrap_or_default())?;
                if values.is_empty() {
                    return Err(AgentError::InvalidInput(
                        "cannot aggregate an empty row set".to_string(),
                    ));
                }
                match numeric {
                    Operation::Sum => json!(values.iter().sum::<f64>()),
                    Operation::Mean => json!(values.iter().sum::<f64>() / values.len() as f64),
                    Operation::Min => json!(values.iter().cloned().fold(f64::INFINITY, f64::min)),
                    Operation::Max => {
                        json!(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
                    }
                    Operation::Count | Operation::GroupCount => unreachable!(),
                }
            }
        };

        Ok(json!({
            "operation": input.operation.name(),
            "result": result,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::RunEvent;

    fn test_ctx() -> (AgentContext, flume::Receiver<RunEvent>) {
        let (tx, rx) = flume::unbounded();
        (
            AgentContext {
                run_id: "run-t".to_string(),
                step: 1,
                event_sender: tx,
            },
            rx,
        )
    }

    fn orders() -> Vec<Value> {
        vec![
            json!({"user": "ann", "total": 10.0}),
            json!({"user": "bob", "total": 4.5}),
            json!({"user": "ann", "total": 3.5}),
        ]
    }

    #[tokio::test]
    async fn count_ignores_column() {
        let (ctx, _rx) = test_ctx();
        let out = DataAnalysisAgent::new()
            .execute(json!({"operation": "count", "rows": orders()}), ctx)
            .await
            .unwrap();
        assert_eq!(out["result"], 3);
    }

    #[tokio::test]
    async fn sum_and_mean_over_column() {
        let (ctx, _rx) = test_ctx();
        let out = DataAnalysisAgent::new()
            .execute(
                json!({"operation": "sum", "column": "total", "rows": orders()}),
                ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["result"], 18.0);

        let (ctx, _rx) = test_ctx();
        let out = DataAnalysisAgent::new()
            .execute(
                json!({"operation": "mean", "column": "total", "rows": orders()}),
                ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["result"], 6.0);
    }

    #[tokio::test]
    async fn group_count_by_string_column() {
        let (ctx, _rx) = test_ctx();
        let out = DataAnalysisAgent::new()
            .execute(
                json!({"operation": "group_count", "column": "user", "rows": orders()}),
                ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["result"]["ann"], 2);
        assert_eq!(out["result"]["bob"], 1);
    }

    #[tokio::test]
    async fn missing_column_is_invalid_input() {
        let (ctx, _rx) = test_ctx();
        let err = DataAnalysisAgent::new()
            .execute(json!({"operation": "sum", "rows": orders()}), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn non_numeric_cell_is_invalid_input() {
        let (ctx, _rx) = test_ctx();
        let err = DataAnalysisAgent::new()
            .execute(
                json!({"operation": "max", "column": "user", "rows": orders()}),
                ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }
}
