use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trace store I/O failed: {0}")]
    Storage(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("run not found for version {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}
