//! Routing: the single source of truth for what counts as "finished".
//!
//! The router normalizes each [`RouterDecision`] into a [`Routed`] directive
//! for the engine and tracks the consecutive-`Invalid` streak. The first
//! unparsable decision earns one correction re-prompt; reaching the
//! configured streak limit ends the run as exhausted so an unparsable model
//! can never loop forever. (Iteration-budget exhaustion is enforced by the
//! engine, which owns the step counter.)

use crate::decision::RouterDecision;
use crate::types::CapabilityName;
use serde_json::Value;

/// The default consecutive-`Invalid` limit.
pub const DEFAULT_INVALID_STREAK_LIMIT: u32 = 2;

/// A normalized routing directive.
#[derive(Clone, Debug, PartialEq)]
pub enum Routed {
    /// Dispatch the chosen capability.
    Dispatch {
        thought: String,
        capability: CapabilityName,
        input: Value,
    },
    /// The run is done with a final answer.
    Finish {
        thought: String,
        final_answer: String,
    },
    /// Re-prompt the reasoner once with a correction hint.
    Correct { hint: String },
    /// Consecutive unparsable output reached the limit; stop the run.
    Exhausted { reason: String },
}

impl Routed {
    /// Whether this directive ends the run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Routed::Finish { .. } | Routed::Exhausted { .. })
    }
}

/// Decision normalizer with anti-thrash state for one run.
#[derive(Clone, Debug)]
pub struct Router {
    invalid_streak_limit: u32,
    invalid_streak: u32,
}

impl Router {
    /// Create a router with the given consecutive-`Invalid` limit (min 1).
    pub fn new(invalid_streak_limit: u32) -> Self {
        Self {
            invalid_streak_limit: invalid_streak_limit.max(1),
            invalid_streak: 0,
        }
    }

    /// Current consecutive-`Invalid` count.
    #[must_use]
    pub fn invalid_streak(&self) -> u32 {
        self.invalid_streak
    }

    /// Normalize a decision into a routing directive, updating the streak.
    pub fn route(&mut self, decision: RouterDecision) -> Routed {
        match decision {
            RouterDecision::Continue {
                thought,
                capability,
                input,
            } => {
                self.invalid_streak = 0;
                Routed::Dispatch {
                    thought: thought.trim().to_string(),
                    capability,
                    input,
                }
            }
            RouterDecision::Finish {
                thought,
                final_answer,
            } => {
                self.invalid_streak = 0;
                Routed::Finish {
                    thought: thought.trim().to_string(),
                    final_answer: final_answer.trim().to_string(),
                }
            }
            RouterDecision::Invalid { reason } => {
                self.invalid_streak += 1;
                if self.invalid_streak >= self.invalid_streak_limit {
                    tracing::warn!(
                        streak = self.invalid_streak,
                        limit = self.invalid_streak_limit,
                        "unparsable reasoner output reached streak limit"
                    );
                    Routed::Exhausted {
                        reason: format!(
                            "reasoner produced {} consecutive unparsable decisions (last: {reason})",
                            self.invalid_streak
                        ),
                    }
                } else {
                    tracing::debug!(streak = self.invalid_streak, %reason, "correcting reasoner");
                    Routed::Correct { hint: reason }
                }
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(DEFAULT_INVALID_STREAK_LIMIT)
    }
}
