//! Run history for the reagent execution engine.
//!
//! A [`Trace`] is the full ordered record of one run: the seed step holding
//! the user's initial request, followed by one step per executed action. It
//! is append-only while the run is in flight, exclusively owned by the
//! engine, and handed back read-only inside the run result.
//!
//! # Core Types
//!
//! - [`Trace`]: ordered sequence of steps plus run identity
//! - [`Step`]: one iteration's thought / action / observation
//! - [`Observation`]: a capability invocation's outcome with provenance
//! - [`ObservationResult`]: success payload or classified failure
//!
//! # Examples
//!
//! ```
//! use reagent::trace::{Trace, Step, Observation, ObservationResult};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let mut trace = Trace::seeded("run-1", "list the books by Pushkin");
//! let observation = Observation::new(
//!     "sql".into(),
//!     Duration::from_millis(12),
//!     ObservationResult::success(json!({"rows": 3})),
//! );
//! trace.push_step(Step::action(
//!     "the library capability can answer this",
//!     "sql".into(),
//!     json!({"query": "SELECT title FROM books"}),
//!     observation,
//! ));
//!
//! assert_eq!(trace.len(), 2);
//! assert_eq!(trace.action_step_count(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::types::CapabilityName;

/// Classification of a failed capability invocation.
///
/// Every failure the dispatcher can produce is one of these kinds; nothing
/// else crosses the dispatch boundary. All three are recoverable: they are
/// recorded in the trace and the loop continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The requested capability is not present in the registry.
    UnknownCapability,
    /// The agent exceeded the per-step time budget.
    Timeout,
    /// The agent itself returned an error.
    AgentError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::UnknownCapability => write!(f, "unknown_capability"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::AgentError => write!(f, "agent_error"),
        }
    }
}

/// Outcome of a single capability invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ObservationResult {
    /// The agent completed and produced a payload.
    Success {
        payload: Value,
        /// Optional human-readable recap of what the agent did, rendered
        /// into the next reasoning prompt alongside the payload.
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    /// The invocation failed; the failure is data, not an exception.
    Failure { kind: FailureKind, message: String },
}

impl ObservationResult {
    /// Successful outcome without a summary.
    pub fn success(payload: Value) -> Self {
        Self::Success {
            payload,
            summary: None,
        }
    }

    /// Successful outcome with a human-readable summary.
    pub fn success_with_summary(payload: Value, summary: impl Into<String>) -> Self {
        Self::Success {
            payload,
            summary: Some(summary.into()),
        }
    }

    /// Failed outcome of the given kind.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Returns true for [`ObservationResult::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure kind, if this outcome is a failure.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            Self::Success { .. } => None,
        }
    }
}

/// The result of one capability invocation, with provenance.
///
/// Besides the outcome itself the observation records which capability
/// produced it and how long the invocation took, so exported traces can be
/// audited without consulting external logs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Capability that produced this observation.
    pub capability: CapabilityName,
    /// Wall-clock time spent inside the dispatch boundary.
    pub elapsed: Duration,
    /// Success payload or classified failure.
    pub outcome: ObservationResult,
}

impl Observation {
    pub fn new(capability: CapabilityName, elapsed: Duration, outcome: ObservationResult) -> Self {
        Self {
            capability,
            elapsed,
            outcome,
        }
    }
}

/// The action half of a step: which capability to invoke, with what input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub capability: CapabilityName,
    pub input: Value,
}

impl ActionRequest {
    pub fn new(capability: CapabilityName, input: Value) -> Self {
        Self { capability, input }
    }
}

/// One entry in the run history.
///
/// Two shapes exist:
/// - the **seed step** (index 0) carries the user's initial request as its
///   thought and has neither action nor observation;
/// - **action steps** carry the reasoner's thought plus both the action and
///   the observation it produced. The two are always populated together —
///   the engine never appends a half-finished action step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Position in the trace; assigned by [`Trace::push_step`].
    pub index: u32,
    /// The reasoner's thought, or the initial request for the seed step.
    pub thought: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<Observation>,
}

impl Step {
    /// Seed step holding the user's initial request. Index is assigned on
    /// append.
    pub fn seed(initial_request: impl Into<String>) -> Self {
        Self {
            index: 0,
            thought: initial_request.into(),
            action: None,
            observation: None,
        }
    }

    /// A completed action step: thought, the dispatched action, and the
    /// observation it yielded.
    pub fn action(
        thought: impl Into<String>,
        capability: CapabilityName,
        input: Value,
        observation: Observation,
    ) -> Self {
        Self {
            index: 0,
            thought: thought.into(),
            action: Some(ActionRequest::new(capability, input)),
            observation: Some(observation),
        }
    }

    /// Returns true if this step carries an action (and therefore an
    /// observation).
    #[must_use]
    pub fn is_action(&self) -> bool {
        self.action.is_some()
    }
}

/// The full ordered history of one run.
///
/// Owned exclusively by the engine for the duration of the run; returned
/// read-only in the run result afterwards. The trace has no behavior beyond
/// mutation and serialization — termination policy lives in the router and
/// engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Identifier of the run this trace belongs to.
    pub run_id: String,
    /// When the run was seeded.
    pub started_at: DateTime<Utc>,
    steps: Vec<Step>,
}

impl Trace {
    /// Create a trace seeded with the user's initial request as step 0.
    pub fn seeded(run_id: impl Into<String>, initial_request: &str) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            steps: vec![Step::seed(initial_request)],
        }
    }

    /// Append a step, assigning it the next index.
    pub fn push_step(&mut self, mut step: Step) {
        step.index = self.steps.len() as u32;
        self.steps.push(step);
    }

    /// All steps in append order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The most recently appended step.
    #[must_use]
    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// The seed step's thought: the user's initial request.
    #[must_use]
    pub fn initial_request(&self) -> &str {
        self.steps
            .first()
            .map(|s| s.thought.as_str())
            .unwrap_or_default()
    }

    /// Total number of steps including the seed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True only before seeding — a seeded trace always has at least one
    /// step.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of action steps (excludes the seed).
    #[must_use]
    pub fn action_step_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_action()).count()
    }

    /// Serialize the trace to a JSON value for export.
    pub fn to_json_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Serialize the trace to pretty-printed JSON for logs and inspection.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize the steps as JSON lines, one compact object per step.
    /// Suited to appending run histories to a shared log file.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&serde_json::to_string(step)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_observation(ok: bool) -> Observation {
        let outcome = if ok {
            ObservationResult::success(json!({"rows": 1}))
        } else {
            ObservationResult::failure(FailureKind::Timeout, "deadline exceeded")
        };
        Observation::new("sql".into(), Duration::from_millis(5), outcome)
    }

    #[test]
    /// A seeded trace starts with exactly the seed step and no actions.
    fn seeded_trace_shape() {
        let trace = Trace::seeded("run-1", "what is 2 + 2?");
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.action_step_count(), 0);
        assert_eq!(trace.initial_request(), "what is 2 + 2?");
        let seed = trace.last_step().unwrap();
        assert!(seed.action.is_none());
        assert!(seed.observation.is_none());
    }

    #[test]
    /// Appended steps receive contiguous indices regardless of the index
    /// value they were constructed with.
    fn push_step_assigns_indices() {
        let mut trace = Trace::seeded("run-1", "q");
        for _ in 0..3 {
            trace.push_step(Step::action(
                "look it up",
                "sql".into(),
                json!({"query": "SELECT 1"}),
                sample_observation(true),
            ));
        }
        let indices: Vec<u32> = trace.steps().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    /// Action steps always carry both halves; the seed carries neither.
    fn action_and_observation_are_paired() {
        let mut trace = Trace::seeded("run-1", "q");
        trace.push_step(Step::action(
            "t",
            "sql".into(),
            json!({}),
            sample_observation(false),
        ));
        for step in trace.steps() {
            assert_eq!(step.action.is_some(), step.observation.is_some());
        }
    }

    #[test]
    fn failure_kind_is_preserved() {
        let obs = sample_observation(false);
        assert_eq!(obs.outcome.failure_kind(), Some(FailureKind::Timeout));
        assert!(!obs.outcome.is_success());
    }

    #[test]
    fn trace_exports_as_json() {
        let mut trace = Trace::seeded("run-7", "q");
        trace.push_step(Step::action(
            "t",
            "vector_search".into(),
            json!({"query": "pushkin", "top_k": 2}),
            sample_observation(true),
        ));
        let value = trace.to_json_value().unwrap();
        assert_eq!(value["run_id"], "run-7");
        assert_eq!(value["steps"][1]["action"]["capability"], "vector_search");
        assert_eq!(value["steps"][1]["observation"]["outcome"]["status"], "success");
    }

    #[test]
    fn json_lines_emit_one_step_per_line() {
        let mut trace = Trace::seeded("run-9", "q");
        trace.push_step(Step::action(
            "t",
            "sql".into(),
            json!({}),
            sample_observation(true),
        ));
        let lines = trace.to_json_lines().unwrap();
        let parsed: Vec<Step> = lines
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].index, 1);
    }

    proptest! {
        /// For any number of appended action steps, indices stay contiguous
        /// and the seed remains step 0.
        #[test]
        fn indices_stay_contiguous(count in 0usize..32) {
            let mut trace = Trace::seeded("run-p", "seed");
            for _ in 0..count {
                trace.push_step(Step::action(
                    "t",
                    "sql".into(),
                    json!({}),
                    sample_observation(true),
                ));
            }
            prop_assert_eq!(trace.len(), count + 1);
            for (expected, step) in trace.steps().iter().enumerate() {
                prop_assert_eq!(step.index as usize, expected);
            }
            prop_assert!(!trace.steps()[0].is_action());
        }
    }
}
