//! Step 2 of the codebase pipeline: rank the file tree by relevance to
//! understanding the agent, with a regex fallback when the gateway call
//! doesn't come back schema-valid.

use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::gateway::{decode_structured, GenerateRequest, LlmGateway};
use fabrik_types::{ChatMessage, Role};

use super::error::DiscoveryError;

const MAX_RANKED: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankedFile {
    pub path: String,
    pub reason: String,
    pub priority: Priority,
}

fn ranking_schema() -> serde_json::Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["path", "reason", "priority"],
            "properties": {
                "path": {"type": "string"},
                "reason": {"type": "string"},
                "priority": {"type": "string", "enum": ["high", "medium", "low"]},
            }
        },
        "maxItems": MAX_RANKED,
    })
}

/// One gateway call ranking the tree; on any failure (transport or schema)
/// falls back to [`heuristic_rank`] rather than aborting discovery.
pub async fn rank_files(
    gateway: &dyn LlmGateway,
    paths: &[String],
    readme: Option<&str>,
    manifest: Option<&str>,
) -> Result<Vec<RankedFile>, DiscoveryError> {
    let prompt = format!(
        "File tree:\n{}\n\nREADME:\n{}\n\nManifest:\n{}\n\nRank the files most useful for understanding what this agent does and how it is configured. Return at most {MAX_RANKED}.",
        paths.join("\n"),
        readme.unwrap_or("(none)"),
        manifest.unwrap_or("(none)"),
    );
    let schema = ranking_schema();
    let response = gateway
        .generate(GenerateRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: prompt,
            }],
            output_schema: Some(schema.clone()),
            ..Default::default()
        })
        .await
        .map_err(|e| DiscoveryError::RankingFailed(e.to_string()))?;

    let parsed = response
        .parsed
        .or_else(|| decode_structured(&response.text, Some(&schema)));

    match parsed.and_then(|v| serde_json::from_value::<Vec<RankedFile>>(v).ok()) {
        Some(mut ranked) => {
            ranked.truncate(MAX_RANKED);
            Ok(ranked)
        }
        None => Ok(heuristic_rank(paths)),
    }
}

/// Filename-regex fallback ranking: prompt/system/
/// instruction/config/tool/agent → high; route/handler/api/index/main →
/// medium; readme → high.
pub fn heuristic_rank(paths: &[String]) -> Vec<RankedFile> {
    let high = Regex::new(r"(?i)(prompt|system|instruction|config|tool|agent)").unwrap();
    let medium = Regex::new(r"(?i)(route|handler|api|index|main)").unwrap();
    let readme = Regex::new(r"(?i)readme").unwrap();

    let mut ranked: Vec<RankedFile> = paths
        .iter()
        .filter_map(|path| {
            let priority = if readme.is_match(path) || high.is_match(path) {
                Priority::High
            } else if medium.is_match(path) {
                Priority::Medium
            } else {
                return None;
            };
            Some(RankedFile {
                path: path.clone(),
                reason: "filename heuristic".to_string(),
                priority,
            })
        })
        .collect();
    ranked.truncate(MAX_RANKED);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_rank_scores_prompt_files_high() {
        let paths = vec!["src/system_prompt.rs".to_string(), "src/utils.rs".to_string()];
        let ranked = heuristic_rank(&paths);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].path, "src/system_prompt.rs");
        assert_eq!(ranked[0].priority, Priority::High);
    }

    #[test]
    fn heuristic_rank_scores_handlers_medium() {
        let paths = vec!["src/route_handler.rs".to_string()];
        let ranked = heuristic_rank(&paths);
        assert_eq!(ranked[0].priority, Priority::Medium);
    }

    #[test]
    fn heuristic_rank_caps_at_max_ranked() {
        let paths: Vec<String> = (0..40).map(|i| format!("config/file_{i}.rs")).collect();
        let ranked = heuristic_rank(&paths);
        assert_eq!(ranked.len(), MAX_RANKED);
    }

    #[test]
    fn heuristic_rank_scores_readme_high() {
        let paths = vec!["README.md".to_string()];
        assert_eq!(heuristic_rank(&paths)[0].priority, Priority::High);
    }
}
