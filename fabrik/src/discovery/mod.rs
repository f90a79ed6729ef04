//! Discovery: produce an [`fabrik_types::AgentProfile`] from a repo, local
//! directory, or live HTTP endpoint.
//!
//! `DiscoveryError` is internal bookkeeping only — every public function
//! here always returns a profile, degrading its confidence rather than
//! propagating an error.

mod codebase;
mod error;
mod extraction;
mod file_reader;
mod http_probes;
mod ranking;

pub use codebase::discover_codebase;
pub use file_reader::{FileEntry, FileReader, LocalFileReader};
pub use http_probes::discover_http;

use std::path::Path;

use fabrik_types::{AgentProfile, ProfileSource};

use crate::adapter::HttpAdapter;
use crate::gateway::LlmGateway;
use error::DiscoveryError;

/// Dispatches on `source`, running the codebase or HTTP pipeline as
/// appropriate. `repo-url` runs the same codebase pipeline as `local-dir`,
/// against a shallow clone; `assistant-id` has no adapter in this crate and
/// degrades straight to a minimal profile.
pub async fn discover(
    gateway: &dyn LlmGateway,
    source: ProfileSource,
    description_hint: Option<&str>,
) -> AgentProfile {
    match &source {
        ProfileSource::LocalDir { path } => {
            discover_codebase(
                gateway,
                &LocalFileReader,
                Path::new(path),
                source.clone(),
                description_hint,
                None,
            )
            .await
        }
        ProfileSource::HttpEndpoint { url } => {
            match HttpAdapter::new(&fabrik_types::AdapterConfig::Http {
                url: url.clone(),
                headers: None,
                request_format: fabrik_types::RequestFormat::Messages,
                body_template: None,
                response_parser: None,
                streaming: false,
            }) {
                Ok(adapter) => discover_http(gateway, &adapter, url, description_hint).await,
                Err(_) => degraded_profile(source, description_hint),
            }
        }
        ProfileSource::RepoUrl { url } => match clone_repo(url).await {
            Ok(checkout) => {
                discover_codebase(
                    gateway,
                    &LocalFileReader,
                    checkout.path(),
                    source.clone(),
                    description_hint,
                    None,
                )
                .await
            }
            Err(_) => degraded_profile(source, description_hint),
        },
        ProfileSource::AssistantId { .. } => degraded_profile(source, description_hint),
    }
}

/// Shallow-clones `url` into a scratch directory that is removed once the
/// returned handle drops, so the codebase pipeline can read it the same
/// way it reads a local directory.
async fn clone_repo(url: &str) -> Result<tempfile::TempDir, DiscoveryError> {
    let dir = tempfile::tempdir()
        .map_err(|e| DiscoveryError::RepoFetchFailed(format!("failed to create scratch dir: {e}")))?;

    let mut cmd = tokio::process::Command::new("git");
    cmd.args(["clone", "--depth", "1", url, &dir.path().display().to_string()]);

    let output = tokio::time::timeout(std::time::Duration::from_secs(60), cmd.output())
        .await
        .map_err(|_| DiscoveryError::RepoFetchFailed("clone timed out".to_string()))?
        .map_err(|e| DiscoveryError::RepoFetchFailed(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(DiscoveryError::RepoFetchFailed(stderr));
    }
    Ok(dir)
}

fn degraded_profile(source: ProfileSource, description_hint: Option<&str>) -> AgentProfile {
    fabrik_types::AgentProfileBuilder::new(source, chrono::Utc::now())
        .confidence(0.2)
        .identity(
            "unknown agent",
            description_hint.unwrap_or("no evidence could be gathered"),
            "unknown",
        )
        .build()
        .expect("minimal profile with no evidence always validates")
}

/// Writes `profile` to `<cwd>/.fabrik/agent-profile.json`, pretty-printed.
/// Creates the `.fabrik` directory if absent.
pub fn persist_profile(cwd: &Path, profile: &AgentProfile) -> std::io::Result<()> {
    let dir = cwd.join(".fabrik");
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(profile)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(dir.join("agent-profile.json"), json)
}

const STALE_WARNING_DAYS: i64 = 7;

/// The "profile older than 7 days" warning the CLI prints before a run.
pub fn staleness_warning(profile: &AgentProfile) -> Option<String> {
    if profile.is_stale(chrono::Utc::now(), STALE_WARNING_DAYS) {
        Some(format!(
            "agent profile was discovered on {} (more than {STALE_WARNING_DAYS} days ago) — consider re-running discovery",
            profile.discovered_at.format("%Y-%m-%d"),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::gateway::{GatewayError, GenerateRequest, GenerateResponse};

    struct StubGateway;

    #[async_trait]
    impl LlmGateway for StubGateway {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
            Err(GatewayError::RequestFailed("unreachable in this test".to_string()))
        }
    }

    #[tokio::test]
    async fn repo_url_source_degrades_without_erroring_when_clone_fails() {
        // Not a real repo, so the clone step fails and discover() falls
        // back to a degraded profile instead of propagating an error.
        let profile = discover(
            &StubGateway,
            ProfileSource::RepoUrl {
                url: "https://example.invalid/not-a-repo".to_string(),
            },
            Some("a demo"),
        )
        .await;
        assert_eq!(profile.confidence, 0.2);
        assert_eq!(profile.description, "a demo");
    }

    #[test]
    fn staleness_warning_fires_past_seven_days() {
        let mut profile = degraded_profile(ProfileSource::LocalDir { path: ".".into() }, None);
        profile.discovered_at = chrono::Utc::now() - chrono::Duration::days(10);
        assert!(staleness_warning(&profile).is_some());

        profile.discovered_at = chrono::Utc::now();
        assert!(staleness_warning(&profile).is_none());
    }

    #[test]
    fn persist_profile_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = degraded_profile(ProfileSource::LocalDir { path: ".".into() }, None);
        persist_profile(tmp.path(), &profile).unwrap();

        let written = std::fs::read_to_string(tmp.path().join(".fabrik/agent-profile.json")).unwrap();
        assert!(written.contains("\"confidence\": 0.2"));
    }
}
