//! [`AgentProfile`]: the canonical output of Discovery, input to Generation
//! and (optionally) Execution.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where an `AgentProfile` was discovered from. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProfileSource {
    RepoUrl { url: String },
    LocalDir { path: String },
    HttpEndpoint { url: String },
    AssistantId { id: String },
}

/// A tool the AUT exposes, as discovered from source or a live probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredTool {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Where this tool was found (file path, probe name, etc.).
    pub source_citation: String,
}

/// Model/provider hints extracted during discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A live HTTP surface for the AUT, when discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<std::collections::HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
}

/// One file Discovery read and cited as evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantFile {
    pub path: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Provenance of a codebase-sourced profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Codebase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub relevant_files: Vec<RelevantFile>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// One evidence record justifying a field on the profile. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub evidence_type: String,
    pub source: String,
    pub finding: String,
    pub confidence: f64,
}

/// Errors building or validating an [`AgentProfile`].
#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
    #[error("confidence {given} exceeds max evidence confidence {max}")]
    ConfidenceExceedsEvidence { given: f64, max: f64 },
    #[error("confidence {0} is out of range [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Canonical structured understanding of an agent under test (AUT).
///
/// Invariants (enforced by [`AgentProfileBuilder::build`]): tool names are
/// unique (case-sensitive, first-wins on merge); `confidence` never exceeds
/// the max confidence of any cited [`Evidence`]; `source` is immutable once
/// built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub discovered_at: DateTime<Utc>,
    pub source: ProfileSource,
    pub confidence: f64,

    pub name: String,
    pub description: String,
    pub domain: String,

    pub tools: Vec<DiscoveredTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,

    #[serde(default)]
    pub known_constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_tone: Option<String>,
    #[serde(default)]
    pub supported_languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebase: Option<Codebase>,

    pub evidence: Vec<Evidence>,
}

impl AgentProfile {
    /// True when this profile (and its evidence) was written more than
    /// `days` days before `now`. Used by the CLI to print the "profile
    /// older than 7 days" warning.
    pub fn is_stale(&self, now: DateTime<Utc>, days: i64) -> bool {
        now.signed_duration_since(self.discovered_at) > chrono::Duration::days(days)
    }
}

/// Builds an [`AgentProfile`], enforcing its construction invariants.
///
/// Evidence is append-only: the only way to add to it is
/// [`AgentProfileBuilder::push_evidence`]. `confidence` is validated (not
/// silently clamped) against the max evidence confidence at [`build`](Self::build)
/// time, so a caller that tries to fabricate confidence without evidence
/// gets a hard error rather than a quietly-wrong profile.
#[derive(Debug, Clone)]
pub struct AgentProfileBuilder {
    discovered_at: DateTime<Utc>,
    source: ProfileSource,
    confidence: f64,
    name: String,
    description: String,
    domain: String,
    tools: Vec<DiscoveredTool>,
    system_prompt: Option<String>,
    model_info: Option<ModelInfo>,
    known_constraints: Vec<String>,
    expected_tone: Option<String>,
    supported_languages: Vec<String>,
    max_turns: Option<u32>,
    endpoint: Option<Endpoint>,
    codebase: Option<Codebase>,
    evidence: Vec<Evidence>,
}

impl AgentProfileBuilder {
    pub fn new(source: ProfileSource, discovered_at: DateTime<Utc>) -> Self {
        Self {
            discovered_at,
            source,
            confidence: 0.0,
            name: String::new(),
            description: String::new(),
            domain: String::new(),
            tools: Vec::new(),
            system_prompt: None,
            model_info: None,
            known_constraints: Vec::new(),
            expected_tone: None,
            supported_languages: Vec::new(),
            max_turns: None,
            endpoint: None,
            codebase: None,
            evidence: Vec::new(),
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn identity(mut self, name: impl Into<String>, description: impl Into<String>, domain: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self.domain = domain.into();
        self
    }

    /// Adds a tool, keeping the first occurrence of a given name.
    pub fn add_tool(mut self, tool: DiscoveredTool) -> Self {
        if !self.tools.iter().any(|t| t.name == tool.name) {
            self.tools.push(tool);
        }
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn model_info(mut self, info: ModelInfo) -> Self {
        self.model_info = Some(info);
        self
    }

    pub fn known_constraints(mut self, constraints: Vec<String>) -> Self {
        self.known_constraints = constraints;
        self
    }

    pub fn expected_tone(mut self, tone: impl Into<String>) -> Self {
        self.expected_tone = Some(tone.into());
        self
    }

    pub fn supported_languages(mut self, languages: Vec<String>) -> Self {
        self.supported_languages = languages;
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn codebase(mut self, codebase: Codebase) -> Self {
        self.codebase = Some(codebase);
        self
    }

    /// Appends one evidence record. The only way to grow `evidence`.
    pub fn push_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// Validates and builds the profile. Fails if a tool name repeats
    /// (should be unreachable via `add_tool`'s dedup, checked again here
    /// in case tools were constructed by hand) or if `confidence` exceeds
    /// the evidence bound.
    pub fn build(self) -> Result<AgentProfile, ProfileError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ProfileError::ConfidenceOutOfRange(self.confidence));
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(ProfileError::DuplicateTool(tool.name.clone()));
            }
        }

        let max_evidence_confidence = self
            .evidence
            .iter()
            .map(|e| e.confidence)
            .fold(0.0_f64, f64::max);
        if !self.evidence.is_empty() && self.confidence > max_evidence_confidence {
            return Err(ProfileError::ConfidenceExceedsEvidence {
                given: self.confidence,
                max: max_evidence_confidence,
            });
        }

        Ok(AgentProfile {
            discovered_at: self.discovered_at,
            source: self.source,
            confidence: self.confidence,
            name: self.name,
            description: self.description,
            domain: self.domain,
            tools: self.tools,
            system_prompt: self.system_prompt,
            model_info: self.model_info,
            known_constraints: self.known_constraints,
            expected_tone: self.expected_tone,
            supported_languages: self.supported_languages,
            max_turns: self.max_turns,
            endpoint: self.endpoint,
            codebase: self.codebase,
            evidence: self.evidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(confidence: f64) -> Evidence {
        Evidence {
            evidence_type: "file".to_string(),
            source: "src/main.rs".to_string(),
            finding: "found a tool".to_string(),
            confidence,
        }
    }

    fn tool(name: &str) -> DiscoveredTool {
        DiscoveredTool {
            name: name.to_string(),
            description: "does a thing".to_string(),
            parameters: None,
            source_citation: "src/tools.rs".to_string(),
        }
    }

    #[test]
    fn dedups_tools_first_wins() {
        let profile = AgentProfileBuilder::new(
            ProfileSource::LocalDir { path: ".".into() },
            Utc::now(),
        )
        .confidence(0.5)
        .push_evidence(evidence(0.5))
        .add_tool(DiscoveredTool {
            name: "lookup_order".into(),
            description: "first".into(),
            parameters: None,
            source_citation: "a.rs".into(),
        })
        .add_tool(DiscoveredTool {
            name: "lookup_order".into(),
            description: "second".into(),
            parameters: None,
            source_citation: "b.rs".into(),
        })
        .build()
        .unwrap();

        assert_eq!(profile.tools.len(), 1);
        assert_eq!(profile.tools[0].description, "first");
    }

    #[test]
    fn rejects_confidence_above_evidence_bound() {
        let result = AgentProfileBuilder::new(
            ProfileSource::LocalDir { path: ".".into() },
            Utc::now(),
        )
        .confidence(0.9)
        .push_evidence(evidence(0.4))
        .build();

        assert_eq!(
            result.unwrap_err(),
            ProfileError::ConfidenceExceedsEvidence {
                given: 0.9,
                max: 0.4
            }
        );
    }

    #[test]
    fn rejects_duplicate_tool_constructed_by_hand() {
        let mut builder = AgentProfileBuilder::new(
            ProfileSource::LocalDir { path: ".".into() },
            Utc::now(),
        )
        .confidence(0.2)
        .push_evidence(evidence(0.2));
        builder.tools.push(tool("dup"));
        builder.tools.push(tool("dup"));

        assert_eq!(
            builder.build().unwrap_err(),
            ProfileError::DuplicateTool("dup".to_string())
        );
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let result = AgentProfileBuilder::new(
            ProfileSource::LocalDir { path: ".".into() },
            Utc::now(),
        )
        .confidence(1.5)
        .build();
        assert!(matches!(
            result,
            Err(ProfileError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn round_trip_through_json_is_structurally_equal() {
        let profile = AgentProfileBuilder::new(
            ProfileSource::RepoUrl {
                url: "https://example.com/repo".into(),
            },
            Utc::now(),
        )
        .confidence(0.7)
        .identity("Support Bot", "handles support tickets", "support")
        .push_evidence(evidence(0.7))
        .add_tool(tool("lookup_order"))
        .build()
        .unwrap();

        let json = serde_json::to_string_pretty(&profile).unwrap();
        let parsed: AgentProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, parsed);
    }

    #[test]
    fn is_stale_after_window() {
        let old = Utc::now() - chrono::Duration::days(10);
        let profile = AgentProfileBuilder::new(ProfileSource::LocalDir { path: ".".into() }, old)
            .confidence(0.2)
            .build()
            .unwrap();
        assert!(profile.is_stale(Utc::now(), 7));
        assert!(!profile.is_stale(Utc::now(), 30));
    }
}
