use thiserror::Error;

/// Transport and auth failures from an [`LlmGateway`](super::LlmGateway) call.
/// Parse/validation failures are never represented here — `generate` simply
/// omits `parsed`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("authentication failed, reauthenticate: {0}")]
    AuthExpired(String),
    #[error("rate limited{}", .retry_after_ms.map(|ms| format!(", retry after {ms}ms")).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("request timed out")]
    Timeout,
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("transport not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
