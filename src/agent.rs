//! The capability execution seam of the engine.
//!
//! This module defines the [`Agent`] trait every tool capability implements,
//! the [`AgentContext`] handed to agents at dispatch time, and the
//! [`AgentError`] taxonomy. The trait is deliberately narrow — one async
//! `execute` over JSON in, JSON out — so new tool types are a pure-addition
//! change that never touches the control loop.

// Standard library and external crates
use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

// Internal crate modules
use crate::event_bus::RunEvent;

// ============================================================================
// Core Trait
// ============================================================================

/// A single delegated unit of work the engine can dispatch to.
///
/// Agents receive the action input chosen by the reasoner and an execution
/// context for observability. They return a JSON payload on success or an
/// [`AgentError`] on failure; the dispatcher converts either outcome into an
/// observation, so a failing agent can never abort the surrounding run.
///
/// # Requirements
///
/// - **Concurrency-safe**: the registry is shared across runs, so agents
///   must be stateless or internally synchronized.
/// - **Input validation**: agents own their input schema and must reject
///   payloads that do not match it with [`AgentError::InvalidInput`].
/// - **Observable**: use [`AgentContext::emit`] for progress events rather
///   than writing to stdout directly.
///
/// # Examples
///
/// ```rust,no_run
/// use reagent::agent::{Agent, AgentContext, AgentError};
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// struct ClockAgent;
///
/// #[async_trait]
/// impl Agent for ClockAgent {
///     async fn execute(&self, _input: Value, ctx: AgentContext) -> Result<Value, AgentError> {
///         ctx.emit("clock", "reading wall clock")?;
///         Ok(json!({"now": chrono::Utc::now().to_rfc3339()}))
///     }
/// }
/// ```
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute this capability with the given input payload.
    async fn execute(&self, input: Value, ctx: AgentContext) -> Result<Value, AgentError>;
}

// ============================================================================
// Execution Context
// ============================================================================

/// Execution context passed to agents at dispatch time.
///
/// Identifies the run and step being executed and carries the channel for
/// emitting events into the run's event bus.
#[derive(Clone, Debug)]
pub struct AgentContext {
    /// Identifier of the run this dispatch belongs to.
    pub run_id: String,
    /// Index the resulting step will occupy in the trace.
    pub step: u32,
    /// Channel for emitting events to the run's event system.
    pub event_sender: flume::Sender<RunEvent>,
}

impl AgentContext {
    /// Emit a step-scoped event enriched with this context's metadata.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), AgentContextError> {
        self.event_sender
            .send(RunEvent::step_with_meta(
                self.run_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(|_| AgentContextError::EventBusUnavailable)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when using AgentContext methods.
#[derive(Debug, Error, Diagnostic)]
pub enum AgentContextError {
    /// Event could not be sent due to event bus disconnection.
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(reagent::agent::event_bus_unavailable),
        help("The event bus listener may have shut down. Check engine state.")
    )]
    EventBusUnavailable,
}

/// Errors raised by agent implementations.
///
/// Every variant is recoverable from the run's perspective: the dispatcher
/// converts it into a `Failure{AgentError}` observation and the loop
/// continues, giving the reasoner a chance to choose a different action.
#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    /// The input payload did not match this agent's schema.
    #[error("invalid input payload: {0}")]
    #[diagnostic(
        code(reagent::agent::invalid_input),
        help("Check the capability's input schema; the reasoner may have hallucinated fields.")
    )]
    InvalidInput(String),

    /// The requested operation is outside what this agent allows.
    #[error("unsupported operation: {what}")]
    #[diagnostic(code(reagent::agent::unsupported))]
    Unsupported { what: String },

    /// An external collaborator (database, index, service) failed.
    #[error("collaborator error ({collaborator}): {message}")]
    #[diagnostic(code(reagent::agent::collaborator))]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(reagent::agent::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(reagent::agent::event_bus))]
    EventBus(#[from] AgentContextError),
}
