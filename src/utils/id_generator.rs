//! Run identifier generation.

use chrono::Utc;
use uuid::Uuid;

/// Generates unique, sortable run identifiers.
///
/// Ids combine a UTC timestamp prefix (lexicographically sortable, handy in
/// logs and exported traces) with a short uuid-v4 suffix for uniqueness
/// within the same second.
///
/// # Examples
///
/// ```
/// use reagent::utils::id_generator::IdGenerator;
///
/// let id = IdGenerator::new().generate_run_id();
/// assert!(id.starts_with("run-"));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh run id, e.g. `run-20260807T101502-3f9a1c2d`.
    pub fn generate_run_id(&self) -> String {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        format!("run-{stamp}-{}", &suffix[..8])
    }
}
