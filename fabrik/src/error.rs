//! Root error aggregator. Individual modules return their own typed error
//! (see `gateway::GatewayError`, `adapter::AdapterError`, etc); this type
//! exists for the CLI boundary, which needs one `?`-able error across the
//! whole pipeline.

use thiserror::Error;

use crate::adapter::AdapterError;
use crate::generator::GeneratorError;
use crate::gateway::GatewayError;
use crate::runner::RunError;
use crate::store::StoreError;

// Note: `discovery::DiscoveryError` has no variant here on purpose — Discovery
// never surfaces it to callers, it always degrades to a lower-confidence
// profile instead.
#[derive(Debug, Error)]
pub enum FabrikError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
