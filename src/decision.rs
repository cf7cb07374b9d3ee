//! The closed decision type produced by the reasoner.
//!
//! Raw model text never crosses the reasoner boundary: it is parsed into a
//! [`RouterDecision`] exactly once, and every downstream component branches
//! on the variant tag only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::CapabilityName;

/// A parsed reasoning outcome: continue with an action, finish with an
/// answer, or report that the model's reply had neither shape.
///
/// `Invalid` is a first-class variant rather than an error because an
/// unparsable reply is a routing concern (correction re-prompt, then
/// terminal-by-exhaustion), not a failure of the reasoner call itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouterDecision {
    /// Invoke the named capability with the given input next.
    Continue {
        thought: String,
        capability: CapabilityName,
        input: Value,
    },
    /// The run is done; deliver the final answer.
    Finish {
        thought: String,
        final_answer: String,
    },
    /// The model's reply could not be parsed into either shape.
    Invalid { reason: String },
}

impl RouterDecision {
    pub fn continuing(
        thought: impl Into<String>,
        capability: impl Into<CapabilityName>,
        input: Value,
    ) -> Self {
        Self::Continue {
            thought: thought.into(),
            capability: capability.into(),
            input,
        }
    }

    pub fn finishing(thought: impl Into<String>, final_answer: impl Into<String>) -> Self {
        Self::Finish {
            thought: thought.into(),
            final_answer: final_answer.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Returns true for [`RouterDecision::Invalid`].
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// Short label for logging and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Continue { .. } => "continue",
            Self::Finish { .. } => "finish",
            Self::Invalid { .. } => "invalid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructors_and_labels() {
        let cont = RouterDecision::continuing("t", "sql", json!({"query": "SELECT 1"}));
        assert_eq!(cont.label(), "continue");
        assert!(!cont.is_invalid());

        let fin = RouterDecision::finishing("t", "42");
        assert_eq!(fin.label(), "finish");

        let inv = RouterDecision::invalid("no json object found");
        assert_eq!(inv.label(), "invalid");
        assert!(inv.is_invalid());
    }

    #[test]
    /// Decisions serialize with an explicit discriminator tag so exported
    /// logs can be filtered by decision kind.
    fn serialization_carries_tag() {
        let fin = RouterDecision::finishing("all done", "User 42 has the most orders.");
        let value = serde_json::to_value(&fin).unwrap();
        assert_eq!(value["decision"], "finish");
        assert_eq!(value["final_answer"], "User 42 has the most orders.");
    }
}
