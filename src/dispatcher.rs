//! The dispatch boundary: registry lookup, time budget, failure isolation.
//!
//! `dispatch` never returns an error and never panics — every outcome,
//! including an unknown capability, a timeout, or an agent blowing up, is
//! encoded as an [`Observation`] so the engine can append it to the trace
//! and keep the loop alive.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

use crate::agent::AgentContext;
use crate::registry::CapabilityRegistry;
use crate::trace::{ActionRequest, FailureKind, Observation, ObservationResult};

/// Executes one action request under the failure boundary.
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    per_step_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>, per_step_timeout: Duration) -> Self {
        Self {
            registry,
            per_step_timeout,
        }
    }

    /// The registry this dispatcher resolves capabilities against.
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Invoke the requested capability and convert the outcome into an
    /// observation.
    ///
    /// Outcomes, in order of checking:
    /// - capability not registered → `Failure{UnknownCapability}`
    /// - agent exceeded `per_step_timeout` → `Failure{Timeout}`
    /// - agent returned an error → `Failure{AgentError}`
    /// - otherwise → `Success` with the agent's payload
    #[instrument(
        skip(self, request, ctx),
        fields(run_id = %ctx.run_id, step = ctx.step, capability = %request.capability)
    )]
    pub async fn dispatch(&self, request: &ActionRequest, ctx: AgentContext) -> Observation {
        let started = Instant::now();

        let agent = match self.registry.get(&request.capability) {
            Some(entry) => entry.agent(),
            None => {
                tracing::warn!("capability not registered");
                return Observation::new(
                    request.capability.clone(),
                    started.elapsed(),
                    ObservationResult::failure(
                        FailureKind::UnknownCapability,
                        format!("no capability registered under '{}'", request.capability),
                    ),
                );
            }
        };

        let outcome = match tokio::time::timeout(
            self.per_step_timeout,
            agent.execute(request.input.clone(), ctx),
        )
        .await
        {
            Err(_) => {
                tracing::warn!(budget_ms = self.per_step_timeout.as_millis() as u64, "agent timed out");
                ObservationResult::failure(
                    FailureKind::Timeout,
                    format!(
                        "capability '{}' exceeded its {}ms budget",
                        request.capability,
                        self.per_step_timeout.as_millis()
                    ),
                )
            }
            Ok(Err(agent_error)) => {
                tracing::warn!(error = %agent_error, "agent failed");
                ObservationResult::failure(FailureKind::AgentError, agent_error.to_string())
            }
            Ok(Ok(payload)) => ObservationResult::success(payload),
        };

        Observation::new(request.capability.clone(), started.elapsed(), outcome)
    }
}
