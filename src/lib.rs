//! # Reagent: a ReAct Task-Execution Engine
//!
//! Reagent drives the ReAct (Reason + Act) pattern as an explicit state
//! machine: each iteration renders the run's history into a prompt, asks a
//! completion backend for a decision, and either dispatches the chosen tool
//! capability or finishes with an answer. The loop is bounded, cancellable,
//! and isolates every per-tool failure as data in the trace.
//!
//! ## Core Concepts
//!
//! - **Trace**: the append-only history of thoughts, actions, and
//!   observations for one run
//! - **Capabilities**: named, registered agents (SQL, vector retrieval,
//!   tabular analysis) behind one narrow execution trait
//! - **Reasoner**: prompt assembly plus strict parsing of model output into
//!   a closed decision type
//! - **Router**: the single source of truth for termination, including the
//!   anti-thrash guard for unparsable output
//! - **GraphEngine**: the control loop with iteration budgets, timeouts, and
//!   cancellation points
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reagent::agents::{DataAnalysisAgent, InMemoryIndex, VectorSearchAgent};
//! use reagent::backend::ScriptedBackend;
//! use reagent::engine::{GraphEngine, RunConfig};
//! use reagent::registry::CapabilityRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let index = InMemoryIndex::with_documents(vec![
//!     ("d1".into(), "Pushkin wrote Eugene Onegin".into()),
//! ]);
//!
//! let registry = CapabilityRegistry::builder()
//!     .register(
//!         "vector_search",
//!         "Retrieve documents similar to a text query.",
//!         VectorSearchAgent::new(Arc::new(index)),
//!     )
//!     .register(
//!         "data_analysis",
//!         "Aggregate JSON rows (count, sum, mean, min, max, group_count).",
//!         DataAnalysisAgent::new(),
//!     )
//!     .build()?;
//!
//! // Swap ScriptedBackend for an HTTP backend in production.
//! let backend = Arc::new(ScriptedBackend::with_responses([
//!     r#"{"thought": "look it up", "action": {"capability": "vector_search",
//!         "input": {"query": "Eugene Onegin author", "top_k": 1}}}"#,
//!     r#"{"thought": "found it", "final_answer": "Pushkin wrote Eugene Onegin."}"#,
//! ]));
//!
//! let engine = GraphEngine::new(Arc::new(registry), backend, RunConfig::default());
//! let result = engine.start_run("who wrote Eugene Onegin?").await;
//!
//! assert!(result.status.is_success());
//! println!("{}", result.trace.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Callers never catch control-flow exceptions: `start_run` always returns a
//! `RunResult` whose status tag distinguishes success, backend failure,
//! budget exhaustion, and cancellation. Within a run, agent failures —
//! unknown capability, timeout, agent error — are recorded as failure
//! observations and fed back to the reasoner, which may recover by choosing
//! a different action.
//!
//! ## Module Guide
//!
//! - [`trace`] - Run history: steps, actions, observations
//! - [`decision`] - The closed decision type parsed from model output
//! - [`message`] - Prompt-assembly messages
//! - [`agent`] - The capability execution trait and error taxonomy
//! - [`agents`] - Built-in capability variants
//! - [`registry`] - Capability registration and the prompt roster
//! - [`backend`] - The completion backend seam
//! - [`reasoner`] - Prompt rendering and decision parsing
//! - [`router`] - Termination policy
//! - [`dispatcher`] - The dispatch failure boundary
//! - [`engine`] - The run state machine
//! - [`settings`] - Environment-sourced configuration
//! - [`event_bus`] - Run event streaming to pluggable sinks
//! - [`telemetry`] - Formatting and tracing setup

pub mod agent;
pub mod agents;
pub mod backend;
pub mod decision;
pub mod dispatcher;
pub mod engine;
pub mod event_bus;
pub mod message;
pub mod reasoner;
pub mod registry;
pub mod router;
pub mod settings;
pub mod telemetry;
pub mod trace;
pub mod types;
pub mod utils;
