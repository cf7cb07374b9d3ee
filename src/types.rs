//! Core identifier types for the reagent execution engine.
//!
//! The only identity the engine core needs is [`CapabilityName`]: the unique
//! key under which an agent is registered and by which the reasoner's parsed
//! decisions refer to it. Runtime identifiers (run ids) live in
//! [`crate::utils::id_generator`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique name of a registered capability.
///
/// Capability names are plain strings ("sql", "vector_search", ...) wrapped
/// in a newtype so registry keys, action requests, and observation
/// provenance cannot be confused with arbitrary text. Names are matched
/// exactly; no case folding is applied.
///
/// # Examples
///
/// ```
/// use reagent::types::CapabilityName;
///
/// let name = CapabilityName::from("sql");
/// assert_eq!(name.as_str(), "sql");
/// assert_eq!(name.to_string(), "sql");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityName(String);

impl CapabilityName {
    /// Create a capability name from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the underlying name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CapabilityName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CapabilityName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CapabilityName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Names compare by exact string content, with no normalization.
    fn name_equality_is_exact() {
        assert_eq!(CapabilityName::from("sql"), CapabilityName::new("sql"));
        assert_ne!(CapabilityName::from("sql"), CapabilityName::from("SQL"));
    }

    #[test]
    fn serializes_as_bare_string() {
        let name = CapabilityName::from("vector_search");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"vector_search\"");
        let back: CapabilityName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
