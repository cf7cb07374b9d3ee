//! Shared helpers for the integration test suite: stub agents, canned
//! executors, and engine construction with an in-memory event sink.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use reagent::agent::{Agent, AgentContext, AgentError};
use reagent::agents::{SqlAgent, SqlExecutor, SqlExecutorError, VectorSearchAgent};
use reagent::agents::InMemoryIndex;
use reagent::backend::ScriptedBackend;
use reagent::engine::{GraphEngine, RunConfig};
use reagent::event_bus::{EventBus, MemorySink};
use reagent::registry::CapabilityRegistry;
use reagent::trace::Trace;

/// Agent that returns its input untouched.
pub struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    async fn execute(&self, input: Value, _ctx: AgentContext) -> Result<Value, AgentError> {
        Ok(input)
    }
}

/// Agent that always fails.
pub struct FailingAgent;

#[async_trait]
impl Agent for FailingAgent {
    async fn execute(&self, _input: Value, _ctx: AgentContext) -> Result<Value, AgentError> {
        Err(AgentError::Collaborator {
            collaborator: "test",
            message: "deliberate failure".to_string(),
        })
    }
}

/// Agent that sleeps longer than any reasonable step budget.
pub struct SleepyAgent {
    pub sleep: Duration,
}

#[async_trait]
impl Agent for SleepyAgent {
    async fn execute(&self, _input: Value, _ctx: AgentContext) -> Result<Value, AgentError> {
        tokio::time::sleep(self.sleep).await;
        Ok(Value::Null)
    }
}

/// SQL collaborator that answers every query with one fixed row.
pub struct StaticSqlExecutor;

#[async_trait]
impl SqlExecutor for StaticSqlExecutor {
    async fn select(&self, _query: &str, _max_rows: usize) -> Result<Vec<Value>, SqlExecutorError> {
        Ok(vec![json!({"user_id": 42, "order_count": 17})])
    }
}

/// Registry with the standard capability lineup used across scenarios.
pub fn standard_registry() -> CapabilityRegistry {
    let index = InMemoryIndex::with_documents(vec![
        ("d1".to_string(), "Pushkin wrote Eugene Onegin".to_string()),
        ("d2".to_string(), "Tolstoy wrote War and Peace".to_string()),
    ]);
    CapabilityRegistry::builder()
        .register(
            "sql_agent",
            "Run a read-only SQL query against the orders database.",
            SqlAgent::new(Arc::new(StaticSqlExecutor)),
        )
        .register(
            "vector_search",
            "Retrieve documents similar to a text query.",
            VectorSearchAgent::new(Arc::new(index)),
        )
        .register(
            "sleepy",
            "Never answers within the step budget.",
            SleepyAgent {
                sleep: Duration::from_secs(120),
            },
        )
        .register("failing", "Always errors.", FailingAgent)
        .build()
        .expect("standard registry builds")
}

/// Engine wired to a memory sink so tests can assert on emitted events
/// without stdout noise.
pub fn quiet_engine(
    registry: CapabilityRegistry,
    backend: Arc<ScriptedBackend>,
    config: RunConfig,
) -> (GraphEngine, MemorySink) {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    let engine = GraphEngine::with_event_bus(Arc::new(registry), backend, config, bus);
    (engine, sink)
}

/// A scripted decision that invokes a capability.
pub fn action_json(capability: &str, input: Value) -> String {
    json!({
        "thought": format!("use {capability}"),
        "action": {"capability": capability, "input": input},
    })
    .to_string()
}

/// A scripted decision that finishes the run.
pub fn finish_json(answer: &str) -> String {
    json!({"thought": "done", "final_answer": answer}).to_string()
}

/// Every step except the seed carries both an action and an observation;
/// the seed carries neither.
pub fn assert_step_pairing(trace: &Trace) {
    for step in trace.steps() {
        assert_eq!(
            step.action.is_some(),
            step.observation.is_some(),
            "step {} is half-populated",
            step.index
        );
    }
    let seed = &trace.steps()[0];
    assert!(seed.action.is_none(), "seed step must not carry an action");
}
