use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("AUT response reported an error: {0}")]
    AutError(String),
    #[error("adapter is not configured for HTTP (got a {0} config)")]
    WrongKind(&'static str),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
