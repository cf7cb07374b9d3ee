//! The capability registry: name → agent lookup shared by router prompts
//! and the dispatcher.
//!
//! A registry is built once at process start through [`RegistryBuilder`],
//! validated, and then shared read-only (`Arc`) across every concurrent run.
//! Each entry carries the agent plus a short description; the descriptions
//! form the roster the reasoner renders into its prompt so the model only
//! ever sees capabilities that actually exist.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::agent::Agent;
use crate::types::CapabilityName;

/// One registered capability: the agent plus prompt-facing metadata.
#[derive(Clone)]
pub struct RegisteredCapability {
    description: String,
    agent: Arc<dyn Agent>,
}

impl RegisteredCapability {
    /// The one-line description rendered into the reasoner's roster.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The executable agent.
    #[must_use]
    pub fn agent(&self) -> Arc<dyn Agent> {
        Arc::clone(&self.agent)
    }
}

/// Name and description of a capability, as rendered into prompts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapabilityDescriptor {
    pub name: CapabilityName,
    pub description: String,
}

/// Read-only mapping from capability name to agent.
///
/// Constructed once via [`RegistryBuilder::build`]; lookups never mutate.
/// Agents must be safe for concurrent invocation since the registry is
/// shared by all runs.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    entries: FxHashMap<CapabilityName, RegisteredCapability>,
}

impl CapabilityRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a capability entry by name.
    #[must_use]
    pub fn get(&self, name: &CapabilityName) -> Option<&RegisteredCapability> {
        self.entries.get(name)
    }

    /// Returns true if the capability is registered.
    #[must_use]
    pub fn contains(&self, name: &CapabilityName) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The prompt roster: every capability's name and description, sorted by
    /// name so rendered prompts are deterministic across runs.
    #[must_use]
    pub fn roster(&self) -> Vec<CapabilityDescriptor> {
        let mut roster: Vec<CapabilityDescriptor> = self
            .entries
            .iter()
            .map(|(name, entry)| CapabilityDescriptor {
                name: name.clone(),
                description: entry.description.clone(),
            })
            .collect();
        roster.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        roster
    }
}

/// Errors detected while building a registry.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    /// The same capability name was registered twice.
    #[error("capability registered twice: {name}")]
    #[diagnostic(
        code(reagent::registry::duplicate),
        help("Capability names are unique keys; rename one of the registrations.")
    )]
    DuplicateCapability { name: CapabilityName },

    /// No capabilities were registered at all.
    #[error("registry has no capabilities")]
    #[diagnostic(
        code(reagent::registry::empty),
        help("Register at least one capability before building the registry.")
    )]
    Empty,
}

/// Builder for [`CapabilityRegistry`] with a fluent API.
///
/// Registrations are collected in call order; duplicates and empty
/// registries are rejected at [`build`](Self::build) time so configuration
/// mistakes surface before the first run starts.
///
/// # Examples
///
/// ```rust,no_run
/// use reagent::registry::CapabilityRegistry;
/// # use reagent::agent::{Agent, AgentContext, AgentError};
/// # use async_trait::async_trait;
/// # use serde_json::Value;
/// # struct SomeAgent;
/// # #[async_trait]
/// # impl Agent for SomeAgent {
/// #     async fn execute(&self, input: Value, _ctx: AgentContext) -> Result<Value, AgentError> {
/// #         Ok(input)
/// #     }
/// # }
///
/// let registry = CapabilityRegistry::builder()
///     .register("sql", "Run a read-only SQL query.", SomeAgent)
///     .register("vector_search", "Retrieve similar documents.", SomeAgent)
///     .build()
///     .expect("valid registry");
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    registrations: Vec<(CapabilityName, RegisteredCapability)>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under a unique name.
    #[must_use]
    pub fn register(
        mut self,
        name: impl Into<CapabilityName>,
        description: impl Into<String>,
        agent: impl Agent + 'static,
    ) -> Self {
        self.registrations.push((
            name.into(),
            RegisteredCapability {
                description: description.into(),
                agent: Arc::new(agent),
            },
        ));
        self
    }

    /// Register a capability that is already behind an `Arc`.
    #[must_use]
    pub fn register_arc(
        mut self,
        name: impl Into<CapabilityName>,
        description: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Self {
        self.registrations.push((
            name.into(),
            RegisteredCapability {
                description: description.into(),
                agent,
            },
        ));
        self
    }

    /// Validate and build the read-only registry.
    pub fn build(self) -> Result<CapabilityRegistry, RegistryError> {
        if self.registrations.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut entries = FxHashMap::default();
        for (name, entry) in self.registrations {
            if entries.insert(name.clone(), entry).is_some() {
                return Err(RegistryError::DuplicateCapability { name });
            }
        }
        Ok(CapabilityRegistry { entries })
    }
}
