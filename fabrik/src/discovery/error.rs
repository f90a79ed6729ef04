use thiserror::Error;

/// Internal-only: Discovery never propagates these to its caller. Every
/// failure degrades to a lower-confidence profile instead.
#[derive(Debug, Error)]
pub(crate) enum DiscoveryError {
    #[error("ranking call failed: {0}")]
    RankingFailed(String),
    #[error("extraction call failed: {0}")]
    ExtractionFailed(String),
    #[error("synthesis call failed: {0}")]
    SynthesisFailed(String),
    #[error("no evidence could be gathered")]
    NoEvidence,
    #[error("repo fetch failed: {0}")]
    RepoFetchFailed(String),
}
