//! The reasoning step: render the trace into a bounded prompt, call the
//! completion backend, and parse the reply into a [`RouterDecision`].
//!
//! Parsing is strict at the boundary: the model must produce a single JSON
//! decision object (markdown code fences are tolerated and stripped), and
//! the named capability must exist in the roster. Anything else becomes
//! [`RouterDecision::Invalid`] — the reasoner never guesses a capability.

use miette::Diagnostic;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

use crate::backend::{BackendError, CompletionBackend, CompletionRequest};
use crate::decision::RouterDecision;
use crate::message::Message;
use crate::registry::CapabilityDescriptor;
use crate::trace::{Observation, ObservationResult, Step, Trace};

/// Tuning for prompt assembly and the backend call.
#[derive(Clone, Debug)]
pub struct ReasonerConfig {
    /// Upper bound on rendered prompt size; oldest action steps are elided
    /// first when the transcript would exceed it.
    pub max_prompt_chars: usize,
    /// Token budget passed through to the backend.
    pub max_tokens: u32,
    /// Stop sequences passed through to the backend.
    pub stop_sequences: Vec<String>,
    /// Deadline for one backend call.
    pub timeout: Duration,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 12_000,
            max_tokens: 512,
            stop_sequences: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Fatal failures of the reasoning step.
///
/// Unlike agent failures these end the run: without a working backend there
/// is no way to make progress, and the no-retry policy means the engine
/// reports the failure rather than spinning.
#[derive(Debug, Error, Diagnostic)]
pub enum ReasoningError {
    /// The backend call itself failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),

    /// The backend did not answer within the configured deadline.
    #[error("reasoning timed out after {limit:?}")]
    #[diagnostic(
        code(reagent::reasoner::timeout),
        help("Raise the reasoner timeout or use a faster backend/model.")
    )]
    Timeout { limit: Duration },
}

/// Marker inserted where elided steps used to be.
const ELISION_MARKER: &str = "[earlier steps elided to fit the context budget]";

/// Renders prompts and parses decisions.
pub struct Reasoner {
    backend: Arc<dyn CompletionBackend>,
    config: ReasonerConfig,
}

impl Reasoner {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: ReasonerConfig) -> Self {
        Self { backend, config }
    }

    /// One reasoning turn: prompt the backend with the current trace and
    /// parse its reply.
    ///
    /// `correction` carries the router's one-shot hint after an `Invalid`
    /// decision; it is appended to the transcript as an extra user turn.
    #[instrument(skip_all, fields(run_id = %trace.run_id, steps = trace.len()), err)]
    pub async fn reason(
        &self,
        trace: &Trace,
        roster: &[CapabilityDescriptor],
        correction: Option<&str>,
    ) -> Result<RouterDecision, ReasoningError> {
        let prompt = self.render_prompt(trace, roster, correction);
        let request = CompletionRequest {
            prompt,
            max_tokens: self.config.max_tokens,
            stop_sequences: self.config.stop_sequences.clone(),
        };
        let response = tokio::time::timeout(self.config.timeout, self.backend.complete(request))
            .await
            .map_err(|_| ReasoningError::Timeout {
                limit: self.config.timeout,
            })??;

        let decision = Self::parse_decision(&response.text, roster);
        tracing::debug!(decision = decision.label(), "parsed reasoner decision");
        Ok(decision)
    }

    /// Render the trace into the backend prompt.
    ///
    /// Layout: system preamble (roster + decision grammar), the user's
    /// request, then one assistant/user message pair per action step. When
    /// the transcript would exceed `max_prompt_chars`, the oldest action
    /// steps are dropped first and an elision marker takes their place; the
    /// most recent step is never dropped.
    pub fn render_prompt(
        &self,
        trace: &Trace,
        roster: &[CapabilityDescriptor],
        correction: Option<&str>,
    ) -> String {
        let mut base = vec![
            Message::system(&Self::preamble(roster)),
            Message::user(trace.initial_request()),
        ];
        let tail = correction.map(|reason| {
            Message::user(&format!(
                "Your previous reply could not be used: {reason}. \
                 Reply with exactly one JSON decision object and nothing else."
            ))
        });

        let step_pairs: Vec<[Message; 2]> = trace
            .steps()
            .iter()
            .filter(|s| s.is_action())
            .map(Self::render_step)
            .collect();

        let fixed_len: usize = base
            .iter()
            .chain(tail.iter())
            .map(|m| m.render().len() + 2)
            .sum();
        let mut budget = self.config.max_prompt_chars.saturating_sub(fixed_len);

        // Walk newest-first so the most recent step always survives.
        let mut kept: Vec<&[Message; 2]> = Vec::new();
        for (position, pair) in step_pairs.iter().rev().enumerate() {
            let cost: usize = pair.iter().map(|m| m.render().len() + 2).sum();
            if position == 0 || cost <= budget {
                budget = budget.saturating_sub(cost);
                kept.push(pair);
            } else {
                break;
            }
        }
        let elided = step_pairs.len() - kept.len();

        if elided > 0 {
            base.push(Message::user(ELISION_MARKER));
        }
        for pair in kept.iter().rev() {
            base.extend(pair.iter().cloned());
        }
        if let Some(tail) = tail {
            base.push(tail);
        }
        Message::render_transcript(&base)
    }

    /// Parse raw backend text into a decision, strictly.
    ///
    /// Tolerated shapes around the object: markdown code fences, or prose
    /// surrounding exactly one top-level `{...}` span. The object itself
    /// must contain `thought` plus exactly one of `action` / `final_answer`,
    /// and the action's capability must be present in the roster.
    pub fn parse_decision(text: &str, roster: &[CapabilityDescriptor]) -> RouterDecision {
        let cleaned = strip_code_fences(text);
        let candidate = match extract_object_span(&cleaned) {
            Some(span) => span,
            None => {
                return RouterDecision::invalid("reply contains no JSON object");
            }
        };

        let wire: DecisionWire = match serde_json::from_str(candidate) {
            Ok(wire) => wire,
            Err(e) => {
                return RouterDecision::invalid(format!("reply is not a valid decision object: {e}"));
            }
        };

        let thought = wire.thought.unwrap_or_default();
        match (wire.action, wire.final_answer) {
            (Some(_), Some(_)) => {
                RouterDecision::invalid("decision contains both an action and a final_answer")
            }
            (None, None) => {
                RouterDecision::invalid("decision contains neither an action nor a final_answer")
            }
            (None, Some(final_answer)) => {
                RouterDecision::finishing(thought, final_answer.trim().to_string())
            }
            (Some(action), None) => {
                let known = roster.iter().any(|d| d.name.as_str() == action.capability);
                if !known {
                    return RouterDecision::invalid(format!(
                        "unknown capability '{}'",
                        action.capability
                    ));
                }
                RouterDecision::continuing(
                    thought,
                    action.capability.as_str(),
                    action.input.unwrap_or(Value::Null),
                )
            }
        }
    }

    fn preamble(roster: &[CapabilityDescriptor]) -> String {
        let mut lines = vec![
            "You are the reasoning engine of a task-execution loop. Each turn you choose \
             exactly one next step toward answering the user's request."
                .to_string(),
            String::new(),
            "Available capabilities:".to_string(),
        ];
        for descriptor in roster {
            lines.push(format!("- {}: {}", descriptor.name, descriptor.description));
        }
        lines.push(String::new());
        lines.push(
            "Reply with exactly one JSON object and no other text. To invoke a capability:\n\
             {\"thought\": \"...\", \"action\": {\"capability\": \"<name>\", \"input\": <json>}}\n\
             When you can answer the request:\n\
             {\"thought\": \"...\", \"final_answer\": \"...\"}"
                .to_string(),
        );
        lines.join("\n")
    }

    fn render_step(step: &Step) -> [Message; 2] {
        // Steps passed here always carry both halves; render defensively
        // anyway so a malformed trace cannot panic prompt assembly.
        let decision_echo = match &step.action {
            Some(action) => json!({
                "thought": step.thought,
                "action": {"capability": action.capability, "input": action.input},
            })
            .to_string(),
            None => json!({"thought": step.thought}).to_string(),
        };
        let observation_line = match &step.observation {
            Some(observation) => Self::render_observation(observation),
            None => "Observation: none".to_string(),
        };
        [
            Message::assistant(&decision_echo),
            Message::user(&observation_line),
        ]
    }

    fn render_observation(observation: &Observation) -> String {
        match &observation.outcome {
            ObservationResult::Success { payload, summary } => {
                let rendered = payload.to_string();
                match summary {
                    Some(summary) => format!(
                        "Observation from {} (ok, {}ms): {summary} — {rendered}",
                        observation.capability,
                        observation.elapsed.as_millis()
                    ),
                    None => format!(
                        "Observation from {} (ok, {}ms): {rendered}",
                        observation.capability,
                        observation.elapsed.as_millis()
                    ),
                }
            }
            ObservationResult::Failure { kind, message } => format!(
                "Observation from {} (failed: {kind}): {message}",
                observation.capability
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DecisionWire {
    thought: Option<String>,
    action: Option<ActionWire>,
    final_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionWire {
    capability: String,
    input: Option<Value>,
}

/// Remove surrounding markdown code fences (triple or single backticks).
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() > 6 {
        let inner = &trimmed[3..trimmed.len() - 3];
        // Drop a language tag on the opening fence line, if any.
        match inner.find('\n') {
            Some(newline) => inner[newline + 1..].trim(),
            None => inner.trim(),
        }
    } else if trimmed.starts_with('`') && trimmed.ends_with('`') && trimmed.len() > 2 {
        trimmed.trim_matches('`').trim()
    } else {
        trimmed
    }
}

/// Locate the outermost `{...}` span, tolerating surrounding prose.
fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilityName;

    fn roster() -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor {
                name: CapabilityName::from("sql"),
                description: "run read-only queries".to_string(),
            },
            CapabilityDescriptor {
                name: CapabilityName::from("vector_search"),
                description: "retrieve similar documents".to_string(),
            },
        ]
    }

    #[test]
    fn parses_action_decision() {
        let text = r#"{"thought": "need data", "action": {"capability": "sql", "input": {"query": "SELECT 1"}}}"#;
        let decision = Reasoner::parse_decision(text, &roster());
        match decision {
            RouterDecision::Continue {
                thought,
                capability,
                input,
            } => {
                assert_eq!(thought, "need data");
                assert_eq!(capability.as_str(), "sql");
                assert_eq!(input["query"], "SELECT 1");
            }
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn parses_final_answer_decision() {
        let text = r#"{"thought": "done", "final_answer": "User 42 has the most orders."}"#;
        let decision = Reasoner::parse_decision(text, &roster());
        assert_eq!(
            decision,
            RouterDecision::finishing("done", "User 42 has the most orders.")
        );
    }

    #[test]
    fn strips_markdown_fences() {
        let text = "```json\n{\"thought\": \"t\", \"final_answer\": \"a\"}\n```";
        let decision = Reasoner::parse_decision(text, &roster());
        assert_eq!(decision, RouterDecision::finishing("t", "a"));
    }

    #[test]
    fn tolerates_surrounding_prose() {
        let text = "Sure, here is my decision: {\"thought\": \"t\", \"final_answer\": \"a\"} Hope that helps!";
        let decision = Reasoner::parse_decision(text, &roster());
        assert_eq!(decision, RouterDecision::finishing("t", "a"));
    }

    #[test]
    fn unknown_capability_is_invalid_not_guessed() {
        let text = r#"{"thought": "t", "action": {"capability": "shell", "input": null}}"#;
        let decision = Reasoner::parse_decision(text, &roster());
        assert!(matches!(
            decision,
            RouterDecision::Invalid { reason } if reason.contains("shell")
        ));
    }

    #[test]
    fn prose_without_json_is_invalid() {
        let decision = Reasoner::parse_decision("I think we should look at the data.", &roster());
        assert!(decision.is_invalid());
    }

    #[test]
    fn ambiguous_decision_is_invalid() {
        let text = r#"{"thought": "t", "action": {"capability": "sql"}, "final_answer": "a"}"#;
        let decision = Reasoner::parse_decision(text, &roster());
        assert!(matches!(
            decision,
            RouterDecision::Invalid { reason } if reason.contains("both")
        ));
    }

    #[test]
    fn missing_action_input_defaults_to_null() {
        let text = r#"{"thought": "t", "action": {"capability": "sql"}}"#;
        match Reasoner::parse_decision(text, &roster()) {
            RouterDecision::Continue { input, .. } => assert!(input.is_null()),
            other => panic!("expected Continue, got {other:?}"),
        }
    }
}
