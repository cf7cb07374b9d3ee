use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scope label of the diagnostic event emitted when a run terminates.
pub const RUN_END_SCOPE: &str = "__reagent_run_end__";

/// An event emitted during run execution.
///
/// Two shapes exist: [`StepEvent`]s are tied to a specific run/step (agent
/// progress, decisions, observations), while [`DiagnosticEvent`]s carry
/// engine-level notices such as run start and termination.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunEvent {
    Step(StepEvent),
    Diagnostic(DiagnosticEvent),
}

impl RunEvent {
    /// Step-scoped event without run metadata.
    pub fn step_message(scope: impl Into<String>, message: impl Into<String>) -> Self {
        RunEvent::Step(StepEvent::new(None, None, scope.into(), message.into()))
    }

    /// Step-scoped event with run id and step index attached.
    pub fn step_with_meta(
        run_id: impl Into<String>,
        step: u32,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RunEvent::Step(StepEvent::new(
            Some(run_id.into()),
            Some(step),
            scope.into(),
            message.into(),
        ))
    }

    /// Engine-level diagnostic event.
    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        RunEvent::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            RunEvent::Step(step) => Some(step.scope()),
            RunEvent::Diagnostic(diag) => Some(diag.scope()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RunEvent::Step(step) => step.message(),
            RunEvent::Diagnostic(diag) => diag.message(),
        }
    }

    /// Convert the event to a structured JSON value with a normalized
    /// schema: `type`, `scope`, `message`, `timestamp`, `metadata`.
    pub fn to_json_value(&self) -> Value {
        use serde_json::json;

        let (event_type, metadata) = match self {
            RunEvent::Step(step) => {
                let mut meta = serde_json::Map::new();
                if let Some(run_id) = step.run_id() {
                    meta.insert("run_id".to_string(), json!(run_id));
                }
                if let Some(index) = step.step() {
                    meta.insert("step".to_string(), json!(index));
                }
                ("step", Value::Object(meta))
            }
            RunEvent::Diagnostic(_) => ("diagnostic", Value::Object(serde_json::Map::new())),
        };

        let timestamp: DateTime<Utc> = Utc::now();
        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": timestamp.to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Compact JSON string representation.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Step(step) => match (step.run_id(), step.step()) {
                (Some(id), Some(index)) => write!(f, "[{id}@{index}] {}", step.message()),
                (Some(id), None) => write!(f, "[{id}] {}", step.message()),
                (None, Some(index)) => write!(f, "[step {index}] {}", step.message()),
                (None, None) => write!(f, "{}", step.message()),
            },
            RunEvent::Diagnostic(diag) => write!(f, "{}", diag.message()),
        }
    }
}

/// Event tied to a specific run and step.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepEvent {
    run_id: Option<String>,
    step: Option<u32>,
    scope: String,
    message: String,
}

impl StepEvent {
    pub fn new(run_id: Option<String>, step: Option<u32>, scope: String, message: String) -> Self {
        Self {
            run_id,
            step,
            scope,
            message,
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn step(&self) -> Option<u32> {
        self.step
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Engine-level notice not tied to a single step.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
