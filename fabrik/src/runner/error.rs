use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RunError {
    /// Scenario artifact failed to load. Non-fatal: the caller logs and
    /// skips it.
    #[error("failed to load scenario {path}: {reason}")]
    ScenarioLoad { path: String, reason: String },
    /// A failed `saveRun` is fatal — the run already happened, so losing
    /// the trace silently would be worse than surfacing it.
    #[error(transparent)]
    TraceStore(#[from] StoreError),
    #[error("adapter failed: {0}")]
    Adapter(#[from] crate::adapter::AdapterError),
}
