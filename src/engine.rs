//! The execution graph: an explicit state machine driving the ReAct loop.
//!
//! [`GraphEngine`] owns the control flow
//! `Init → Reasoning → Routing → Dispatching → (loop) → Terminating → Done`
//! and nothing else: reasoning lives in [`crate::reasoner`], termination
//! policy in [`crate::router`], and the failure boundary in
//! [`crate::dispatcher`]. The engine contributes the iteration budget, the
//! cancellation points, trace ownership, and event emission.
//!
//! A run always produces a [`RunResult`]; callers branch on
//! [`RunStatus`], never on caught exceptions.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reagent::backend::ScriptedBackend;
//! use reagent::engine::{GraphEngine, RunConfig, RunStatus};
//! use reagent::registry::CapabilityRegistry;
//! use reagent::agents::DataAnalysisAgent;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = CapabilityRegistry::builder()
//!     .register("data_analysis", "Aggregate JSON rows.", DataAnalysisAgent::new())
//!     .build()
//!     .expect("valid registry");
//!
//! let backend = Arc::new(ScriptedBackend::with_responses([
//!     r#"{"thought": "done", "final_answer": "4"}"#,
//! ]));
//!
//! let engine = GraphEngine::new(Arc::new(registry), backend, RunConfig::default());
//! let result = engine.start_run("what is 2 + 2?").await;
//! assert!(matches!(result.status, RunStatus::Succeeded));
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::instrument;

use crate::backend::CompletionBackend;
use crate::dispatcher::Dispatcher;
use crate::event_bus::{EventBus, RunEvent, RUN_END_SCOPE};
use crate::reasoner::{Reasoner, ReasonerConfig};
use crate::registry::{CapabilityDescriptor, CapabilityRegistry};
use crate::router::{Routed, Router, DEFAULT_INVALID_STREAK_LIMIT};
use crate::trace::{ActionRequest, Step, Trace};
use crate::types::CapabilityName;
use crate::utils::id_generator::IdGenerator;
use crate::agent::AgentContext;

/// Per-run limits and tuning. Immutable for the lifetime of one run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Maximum number of action steps before the run is exhausted. Must be
    /// positive; validated by the settings layer before construction.
    pub max_iterations: u32,
    /// Time budget for one capability invocation.
    pub per_step_timeout: Duration,
    /// Consecutive unparsable decisions tolerated before giving up.
    pub invalid_streak_limit: u32,
    /// Prompt assembly and backend-call tuning.
    pub reasoner: ReasonerConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            per_step_timeout: Duration::from_secs(30),
            invalid_streak_limit: DEFAULT_INVALID_STREAK_LIMIT,
            reasoner: ReasonerConfig::default(),
        }
    }
}

/// Terminal status of one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// The reasoner declared a final answer.
    Succeeded,
    /// The reasoning backend failed; the run could not continue.
    Failed { error: String },
    /// A budget ran out: iteration limit reached, or consecutive unparsable
    /// decisions hit the streak limit. The partial trace is preserved.
    Exhausted { reason: String },
    /// The caller aborted the run. The partial trace is preserved.
    Cancelled,
}

impl RunStatus {
    /// Returns true for [`RunStatus::Succeeded`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }

    /// Short label for logging and the run-end event.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed { .. } => "failed",
            RunStatus::Exhausted { .. } => "exhausted",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// Everything a caller gets back from a run.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    /// Present only when `status` is [`RunStatus::Succeeded`].
    pub final_answer: Option<String>,
    /// The full (possibly partial) history; read-only from here on.
    pub trace: Trace,
}

/// States of the execution graph. The engine funnels every terminal path
/// through `Terminating` before reporting `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Reasoning,
    Routing,
    Dispatching,
    Terminating,
    Done,
}

/// Cancellation handle pair. The source side is held by the caller; the
/// signal side is consumed by the engine.
pub fn cancellation_pair() -> (CancellationSource, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (CancellationSource { tx }, CancellationSignal { rx })
}

/// Caller-held side of a cancellation pair.
#[derive(Clone, Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    /// Request that the run stop at its next cancellation point.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Engine-held side of a cancellation pair.
#[derive(Clone, Debug)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Non-blocking check, used at the top of each iteration.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation is requested. If the source is dropped
    /// without cancelling, never resolves — the run simply proceeds.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Source dropped without cancelling; park forever.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// The ReAct control loop.
///
/// One engine can serve many sequential runs; each `start_run` call builds a
/// fresh trace and router. Concurrent runs should use one engine per run
/// sharing the same `Arc<CapabilityRegistry>` and backend.
pub struct GraphEngine {
    registry: Arc<CapabilityRegistry>,
    dispatcher: Dispatcher,
    reasoner: Reasoner,
    config: RunConfig,
    event_bus: EventBus,
    roster: Vec<CapabilityDescriptor>,
    id_generator: IdGenerator,
}

impl GraphEngine {
    /// Create an engine with the default event bus (stdout sink).
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        backend: Arc<dyn CompletionBackend>,
        config: RunConfig,
    ) -> Self {
        Self::with_event_bus(registry, backend, config, EventBus::default())
    }

    /// Create an engine with a custom event bus (memory/channel sinks for
    /// streaming run progress).
    pub fn with_event_bus(
        registry: Arc<CapabilityRegistry>,
        backend: Arc<dyn CompletionBackend>,
        config: RunConfig,
        event_bus: EventBus,
    ) -> Self {
        event_bus.listen_for_events();
        let dispatcher = Dispatcher::new(Arc::clone(&registry), config.per_step_timeout);
        let reasoner = Reasoner::new(backend, config.reasoner.clone());
        let roster = registry.roster();
        Self {
            registry,
            dispatcher,
            reasoner,
            config,
            event_bus,
            roster,
            id_generator: IdGenerator::new(),
        }
    }

    /// The shared registry this engine dispatches against.
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Execute a run to completion without external cancellation.
    pub async fn start_run(&self, initial_request: &str) -> RunResult {
        let (_source, signal) = cancellation_pair();
        self.start_run_with_cancel(initial_request, signal).await
    }

    /// Execute a run, honoring the given cancellation signal at the top of
    /// every iteration and while blocked on the backend or an agent.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn start_run_with_cancel(
        &self,
        initial_request: &str,
        mut signal: CancellationSignal,
    ) -> RunResult {
        let run_id = self.id_generator.generate_run_id();
        tracing::Span::current().record("run_id", run_id.as_str());
        tracing::info!(request = initial_request, "run started");

        let events = self.event_bus.sender();
        let _ = events.send(RunEvent::diagnostic(
            "run",
            format!("run {run_id} started: {initial_request}"),
        ));

        let mut trace = Trace::seeded(run_id.clone(), initial_request);
        let mut router = Router::new(self.config.invalid_streak_limit);
        let mut iterations: u32 = 0;
        let mut correction: Option<String> = None;
        let mut pending_decision = None;
        let mut pending_action: Option<(String, CapabilityName, serde_json::Value)> = None;
        let mut final_answer: Option<String> = None;
        let mut state = EngineState::Init;

        let status = loop {
            state = match state {
                EngineState::Init => EngineState::Reasoning,

                EngineState::Reasoning => {
                    // Cancellation point: iteration boundary.
                    if signal.is_cancelled() {
                        break RunStatus::Cancelled;
                    }
                    let outcome = tokio::select! {
                        outcome = self.reasoner.reason(&trace, &self.roster, correction.as_deref()) => outcome,
                        // Cancellation point: backend suspension.
                        _ = signal.cancelled() => break RunStatus::Cancelled,
                    };
                    match outcome {
                        Err(error) => {
                            tracing::error!(%error, "reasoning failed; run cannot continue");
                            break RunStatus::Failed {
                                error: error.to_string(),
                            };
                        }
                        Ok(decision) => {
                            let _ = events.send(RunEvent::step_with_meta(
                                run_id.clone(),
                                trace.len() as u32,
                                "reason",
                                format!("decision: {}", decision.label()),
                            ));
                            pending_decision = Some(decision);
                            EngineState::Routing
                        }
                    }
                }

                EngineState::Routing => {
                    let decision = pending_decision.take().unwrap_or_else(|| {
                        crate::decision::RouterDecision::invalid("router reached without a decision")
                    });
                    match router.route(decision) {
                        Routed::Finish {
                            final_answer: answer,
                            ..
                        } => {
                            final_answer = Some(answer);
                            break RunStatus::Succeeded;
                        }
                        Routed::Exhausted { reason } => {
                            break RunStatus::Exhausted { reason };
                        }
                        Routed::Correct { hint } => {
                            correction = Some(hint);
                            EngineState::Reasoning
                        }
                        Routed::Dispatch {
                            thought,
                            capability,
                            input,
                        } => {
                            correction = None;
                            pending_action = Some((thought, capability, input));
                            EngineState::Dispatching
                        }
                    }
                }

                EngineState::Dispatching => {
                    let (thought, capability, input) = match pending_action.take() {
                        Some(action) => action,
                        None => break RunStatus::Failed {
                            error: "dispatch state reached without an action".to_string(),
                        },
                    };
                    let request = ActionRequest::new(capability, input);
                    let ctx = AgentContext {
                        run_id: run_id.clone(),
                        step: trace.len() as u32,
                        event_sender: events.clone(),
                    };
                    let observation = tokio::select! {
                        observation = self.dispatcher.dispatch(&request, ctx) => observation,
                        // Cancellation point: agent suspension.
                        _ = signal.cancelled() => break RunStatus::Cancelled,
                    };
                    let _ = events.send(RunEvent::step_with_meta(
                        run_id.clone(),
                        trace.len() as u32,
                        "dispatch",
                        format!(
                            "{} -> {}",
                            observation.capability,
                            if observation.outcome.is_success() { "ok" } else { "failure" }
                        ),
                    ));
                    trace.push_step(Step::action(
                        thought,
                        request.capability,
                        request.input,
                        observation,
                    ));
                    iterations += 1;
                    if iterations >= self.config.max_iterations {
                        break RunStatus::Exhausted {
                            reason: format!(
                                "iteration budget of {} reached without a final answer",
                                self.config.max_iterations
                            ),
                        };
                    }
                    EngineState::Reasoning
                }

                // All terminal paths break out of the loop before this.
                EngineState::Terminating | EngineState::Done => unreachable!(),
            };
        };

        // Terminating: seal the trace and report.
        let _ = events.send(RunEvent::diagnostic(
            RUN_END_SCOPE,
            format!(
                "run={run_id} status={} steps={}",
                status.label(),
                trace.len()
            ),
        ));
        tracing::info!(status = status.label(), steps = trace.len(), "run finished");

        RunResult {
            run_id,
            status,
            final_answer,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_signal_observes_source() {
        let (source, signal) = cancellation_pair();
        assert!(!signal.is_cancelled());
        source.cancel();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let (source, mut signal) = cancellation_pair();
        source.cancel();
        // Must resolve immediately.
        signal.cancelled().await;
    }

    #[test]
    fn run_config_defaults_are_positive() {
        let config = RunConfig::default();
        assert!(config.max_iterations > 0);
        assert!(config.per_step_timeout > Duration::ZERO);
        assert!(config.invalid_streak_limit > 0);
    }

    #[test]
    fn run_status_labels() {
        assert_eq!(RunStatus::Succeeded.label(), "succeeded");
        assert!(RunStatus::Succeeded.is_success());
        assert!(!RunStatus::Cancelled.is_success());
        let status = RunStatus::Exhausted {
            reason: "budget".to_string(),
        };
        assert_eq!(status.label(), "exhausted");
    }
}
