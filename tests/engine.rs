//! End-to-end coverage of the run state machine: the scripted scenarios and
//! the termination/failure-isolation properties of the control loop.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use reagent::backend::{ScriptedBackend, UnreachableBackend};
use reagent::engine::{cancellation_pair, GraphEngine, RunConfig, RunStatus};
use reagent::event_bus::RUN_END_SCOPE;
use reagent::trace::FailureKind;

mod common;
use common::*;

fn small_config(max_iterations: u32) -> RunConfig {
    RunConfig {
        max_iterations,
        per_step_timeout: Duration::from_millis(200),
        ..RunConfig::default()
    }
}

#[tokio::test]
async fn sql_then_finish_succeeds() {
    let backend = Arc::new(ScriptedBackend::with_responses([
        action_json(
            "sql_agent",
            json!({"query": "SELECT user_id, COUNT(*) FROM orders GROUP BY user_id ORDER BY COUNT(*) DESC LIMIT 1"}),
        ),
        finish_json("User 42 has the most orders."),
    ]));
    let (engine, _sink) = quiet_engine(standard_registry(), backend, small_config(8));

    let result = engine.start_run("find the user with the most orders").await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(
        result.final_answer.as_deref(),
        Some("User 42 has the most orders.")
    );
    assert_eq!(result.trace.len(), 2);
    assert_step_pairing(&result.trace);

    let action_step = &result.trace.steps()[1];
    let action = action_step.action.as_ref().unwrap();
    assert_eq!(action.capability.as_str(), "sql_agent");
    let observation = action_step.observation.as_ref().unwrap();
    assert!(observation.outcome.is_success());
}

#[tokio::test]
async fn iteration_budget_exhausts_with_partial_trace() {
    // max_iterations = 3, the reasoner keeps asking for vector_search and
    // never finishes: seed + 3 action steps, status Exhausted.
    let backend = Arc::new(ScriptedBackend::with_responses([
        action_json("vector_search", json!({"query": "orders", "top_k": 1})),
        action_json("vector_search", json!({"query": "orders", "top_k": 1})),
        action_json("vector_search", json!({"query": "orders", "top_k": 1})),
    ]));
    let (engine, _sink) = quiet_engine(standard_registry(), backend, small_config(3));

    let result = engine.start_run("an unanswerable request").await;

    assert!(matches!(result.status, RunStatus::Exhausted { .. }));
    assert_eq!(result.trace.len(), 4);
    assert_eq!(result.trace.action_step_count(), 3);
    assert_step_pairing(&result.trace);
}

#[tokio::test]
async fn trace_length_never_exceeds_budget_plus_seed() {
    for max_iterations in [1u32, 2, 5] {
        let responses: Vec<String> = (0..max_iterations)
            .map(|_| action_json("vector_search", json!({"query": "x", "top_k": 1})))
            .collect();
        let backend = Arc::new(ScriptedBackend::with_responses(responses));
        let (engine, _sink) =
            quiet_engine(standard_registry(), backend, small_config(max_iterations));

        let result = engine.start_run("loop forever").await;
        assert!(result.trace.len() <= max_iterations as usize + 1);
    }
}

#[tokio::test]
async fn unparsable_output_terminates_after_one_correction() {
    let backend = Arc::new(ScriptedBackend::with_responses([
        "I would rather ramble than emit JSON.",
        "Still rambling.",
    ]));
    let (engine, _sink) = quiet_engine(standard_registry(), backend.clone(), small_config(8));

    let result = engine.start_run("anything").await;

    match &result.status {
        RunStatus::Exhausted { reason } => assert!(reason.contains("unparsable")),
        other => panic!("expected Exhausted, got {other:?}"),
    }
    // Seed only: no action ever dispatched.
    assert_eq!(result.trace.len(), 1);
    // Exactly two reasoner rounds: the original and the one-shot correction.
    assert_eq!(backend.remaining().await, 0);
    let prompts = backend.recorded_prompts().await;
    assert_eq!(prompts.len(), 2);
    assert!(
        prompts[1].contains("could not be used"),
        "second prompt must carry the correction hint"
    );
}

#[tokio::test]
async fn invalid_then_valid_recovers() {
    // First reply names a capability that does not exist -> Invalid -> one
    // correction re-prompt -> valid finish. The run still succeeds.
    let backend = Arc::new(ScriptedBackend::with_responses([
        action_json("shell", json!({"cmd": "rm -rf /"})),
        finish_json("nothing to do"),
    ]));
    let (engine, _sink) = quiet_engine(standard_registry(), backend, small_config(8));

    let result = engine.start_run("anything").await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.final_answer.as_deref(), Some("nothing to do"));
    assert_eq!(result.trace.len(), 1);
}

#[tokio::test]
async fn agent_timeouts_are_recorded_not_fatal() {
    let backend = Arc::new(ScriptedBackend::with_responses([
        action_json("sleepy", json!({})),
        action_json("sleepy", json!({})),
    ]));
    let (engine, _sink) = quiet_engine(standard_registry(), backend, small_config(2));

    let result = engine.start_run("take your time").await;

    assert!(matches!(result.status, RunStatus::Exhausted { .. }));
    assert_eq!(result.trace.action_step_count(), 2);
    for step in result.trace.steps().iter().filter(|s| s.is_action()) {
        let observation = step.observation.as_ref().unwrap();
        assert_eq!(observation.outcome.failure_kind(), Some(FailureKind::Timeout));
    }
}

#[tokio::test]
async fn agent_errors_feed_back_into_the_loop() {
    let backend = Arc::new(ScriptedBackend::with_responses([
        action_json("failing", json!({})),
        finish_json("gave up gracefully"),
    ]));
    let (engine, _sink) = quiet_engine(standard_registry(), backend, small_config(8));

    let result = engine.start_run("try the flaky tool").await;

    assert_eq!(result.status, RunStatus::Succeeded);
    let failed_step = &result.trace.steps()[1];
    assert_eq!(
        failed_step.observation.as_ref().unwrap().outcome.failure_kind(),
        Some(FailureKind::AgentError)
    );
}

#[tokio::test]
async fn backend_failure_is_fatal() {
    let registry = standard_registry();
    let engine = GraphEngine::new(
        Arc::new(registry),
        Arc::new(UnreachableBackend),
        small_config(8),
    );

    let result = engine.start_run("anything").await;

    match &result.status {
        RunStatus::Failed { error } => assert!(error.contains("unreachable")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(result.trace.len(), 1);
    assert!(result.final_answer.is_none());
}

#[tokio::test]
async fn control_loop_is_deterministic_for_identical_scripts() {
    let script = || {
        Arc::new(ScriptedBackend::with_responses([
            action_json("sql_agent", json!({"query": "SELECT 1"})),
            action_json("vector_search", json!({"query": "orders", "top_k": 1})),
            finish_json("done"),
        ]))
    };

    let (engine_a, _) = quiet_engine(standard_registry(), script(), small_config(8));
    let (engine_b, _) = quiet_engine(standard_registry(), script(), small_config(8));

    let a = engine_a.start_run("same request").await;
    let b = engine_b.start_run("same request").await;

    assert_eq!(a.status, b.status);
    assert_eq!(a.trace.len(), b.trace.len());
    let shape = |trace: &reagent::trace::Trace| -> Vec<(String, bool)> {
        trace
            .steps()
            .iter()
            .filter(|s| s.is_action())
            .map(|s| {
                (
                    s.action.as_ref().unwrap().capability.to_string(),
                    s.observation.as_ref().unwrap().outcome.is_success(),
                )
            })
            .collect()
    };
    assert_eq!(shape(&a.trace), shape(&b.trace));
}

#[tokio::test]
async fn cancellation_yields_partial_trace() {
    let backend = Arc::new(ScriptedBackend::with_responses([
        action_json("sleepy", json!({})),
    ]));
    let config = RunConfig {
        max_iterations: 8,
        per_step_timeout: Duration::from_secs(60),
        ..RunConfig::default()
    };
    let (engine, _sink) = quiet_engine(standard_registry(), backend, config);
    let (source, signal) = cancellation_pair();

    let run = tokio::spawn(async move {
        engine
            .start_run_with_cancel("slow work", signal)
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    source.cancel();

    let result = run.await.expect("run task joins");
    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.final_answer.is_none());
    // Cancelled mid-dispatch: only the seed step was committed.
    assert_eq!(result.trace.len(), 1);
    assert_step_pairing(&result.trace);
}

#[tokio::test]
async fn run_end_event_is_emitted() {
    let backend = Arc::new(ScriptedBackend::with_responses([finish_json("instant")]));
    let (engine, sink) = quiet_engine(standard_registry(), backend, small_config(8));

    let result = engine.start_run("anything").await;
    assert_eq!(result.status, RunStatus::Succeeded);

    // The listener drains asynchronously; wait for the terminal event.
    let mut saw_run_end = false;
    for _ in 0..200 {
        if sink
            .snapshot()
            .iter()
            .any(|e| e.scope_label() == Some(RUN_END_SCOPE))
        {
            saw_run_end = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(saw_run_end, "expected a run-end diagnostic event");
}
