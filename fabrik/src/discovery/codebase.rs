//! Codebase pipeline orchestration: orient → rank → extract → synthesize →
//! persist.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use fabrik_types::{
    AgentProfileBuilder, ChatMessage, Codebase, DiscoveredTool, ModelInfo, ProfileSource,
    RelevantFile, Role,
};

use crate::gateway::{decode_structured, GenerateRequest, LlmGateway};

use super::error::DiscoveryError;
use super::extraction::{extract_files, ExtractedFile};
use super::file_reader::{read_first_existing, FileReader};
use super::ranking::{rank_files, Priority, RankedFile};

const MAX_EXTRACTED: usize = 20;
const README_CANDIDATES: [&str; 3] = ["README.md", "readme.md", "README"];
const MANIFEST_CANDIDATES: [&str; 3] = ["Cargo.toml", "package.json", "pyproject.toml"];

#[derive(Debug, Default, Deserialize)]
struct Synthesis {
    name: String,
    description: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default, rename = "systemPrompt")]
    system_prompt: Option<String>,
    #[serde(default, rename = "expectedTone")]
    expected_tone: Option<String>,
    #[serde(default, rename = "maxTurns")]
    max_turns: Option<u32>,
    #[serde(default, rename = "supportedLanguages")]
    supported_languages: Vec<String>,
}

fn synthesis_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["name", "description", "confidence"],
        "properties": {
            "name": {"type": "string"},
            "description": {"type": "string"},
            "domain": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "systemPrompt": {"type": ["string", "null"]},
            "expectedTone": {"type": ["string", "null"]},
            "maxTurns": {"type": ["integer", "null"]},
            "supportedLanguages": {"type": "array", "items": {"type": "string"}},
        }
    })
}

/// Runs the full codebase pipeline against `root`, falling back to a
/// minimal confidence-0.2 profile at any stage that produces no evidence.
pub async fn discover_codebase(
    gateway: &dyn LlmGateway,
    reader: &dyn FileReader,
    root: &Path,
    source: ProfileSource,
    description_hint: Option<&str>,
    extraction_concurrency: Option<usize>,
) -> fabrik_types::AgentProfile {
    let entries = reader.list_tree(root);
    if entries.is_empty() {
        return minimal_profile(source, description_hint);
    }
    let paths: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();

    let readme = read_first_existing(reader, root, &README_CANDIDATES);
    let manifest = read_first_existing(reader, root, &MANIFEST_CANDIDATES);

    let ranked = rank_files(gateway, &paths, readme.as_deref(), manifest.as_deref())
        .await
        .unwrap_or_else(|_| super::ranking::heuristic_rank(&paths));

    let top: Vec<RankedFile> = ranked
        .into_iter()
        .filter(|r| matches!(r.priority, Priority::High | Priority::Medium))
        .take(MAX_EXTRACTED)
        .collect();

    if top.is_empty() {
        return minimal_profile(source, description_hint);
    }

    let files_with_content: Vec<(String, String)> = top
        .iter()
        .filter_map(|r| {
            reader
                .read_to_string(&root.join(&r.path))
                .map(|content| (r.path.clone(), content))
        })
        .collect();

    let extracted = extract_files(gateway, files_with_content, extraction_concurrency).await;
    if extracted.is_empty() {
        return minimal_profile(source, description_hint);
    }

    synthesize(gateway, source, &top, &extracted, readme.as_deref())
        .await
        .unwrap_or_else(|_| minimal_profile_with_evidence(source, description_hint, &extracted))
}

/// Synthesis: flatten findings, dedupe tools (first wins), union
/// constraints, collect non-empty system prompts and model configs, one
/// gateway call for the final profile fields.
async fn synthesize(
    gateway: &dyn LlmGateway,
    source: ProfileSource,
    ranked: &[RankedFile],
    extracted: &[ExtractedFile],
    readme: Option<&str>,
) -> Result<fabrik_types::AgentProfile, DiscoveryError> {
    let findings: Vec<&str> = extracted
        .iter()
        .flat_map(|f| f.extraction.findings.iter().map(|s| s.as_str()))
        .collect();

    let system_prompt = extracted
        .iter()
        .find_map(|f| f.extraction.system_prompt.clone());

    let model_info = extracted.iter().find_map(|f| {
        f.extraction.model_config.as_ref().map(|m| ModelInfo {
            provider: m.provider.clone(),
            model: m.model.clone(),
        })
    });

    let mut constraints: Vec<String> = Vec::new();
    for f in extracted {
        for c in &f.extraction.constraints {
            if !constraints.contains(c) {
                constraints.push(c.clone());
            }
        }
    }

    let mut tools: Vec<DiscoveredTool> = Vec::new();
    for f in extracted {
        for t in &f.extraction.tools {
            if !tools.iter().any(|existing| existing.name == t.name) {
                tools.push(DiscoveredTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                    source_citation: f.path.clone(),
                });
            }
        }
    }

    let schema = synthesis_schema();
    let prompt = format!(
        "Synthesize an agent profile (name, description, domain, confidence, systemPrompt, expectedTone, maxTurns, supportedLanguages) from these findings.\n\nREADME:\n{}\n\nRanked files:\n{}\n\nFindings:\n{}\n\nKnown tools: {}\n\nPrefer what the code says over README claims over inference.",
        readme.unwrap_or("(none)"),
        ranked
            .iter()
            .map(|r| format!("{} ({:?}): {}", r.path, r.priority, r.reason))
            .collect::<Vec<_>>()
            .join("\n"),
        findings.join("\n"),
        tools
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );

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
        .map_err(|e| DiscoveryError::SynthesisFailed(e.to_string()))?;

    let parsed = response
        .parsed
        .or_else(|| decode_structured(&response.text, Some(&schema)))
        .ok_or(DiscoveryError::NoEvidence)?;
    let synthesis: Synthesis =
        serde_json::from_value(parsed).map_err(|e| DiscoveryError::SynthesisFailed(e.to_string()))?;

    let relevant_files: Vec<RelevantFile> = extracted
        .iter()
        .map(|f| RelevantFile {
            path: f.path.clone(),
            role: "extracted".to_string(),
            excerpt: None,
        })
        .collect();

    let codebase = Codebase {
        framework: None,
        entry_point: None,
        relevant_files,
        dependencies: Vec::new(),
    };

    let max_evidence_confidence = extracted
        .iter()
        .map(|f| f.evidence.confidence)
        .fold(0.0_f64, f64::max);
    let confidence = synthesis.confidence.clamp(0.0, 1.0).min(max_evidence_confidence);

    let mut builder = AgentProfileBuilder::new(source, Utc::now())
        .confidence(confidence)
        .identity(synthesis.name, synthesis.description, synthesis.domain)
        .known_constraints(constraints)
        .supported_languages(synthesis.supported_languages)
        .codebase(codebase);

    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(info) = model_info {
        builder = builder.model_info(info);
    }
    if let Some(tone) = synthesis.expected_tone {
        builder = builder.expected_tone(tone);
    }
    if let Some(max_turns) = synthesis.max_turns {
        builder = builder.max_turns(max_turns);
    }
    for tool in tools {
        builder = builder.add_tool(tool);
    }
    for f in extracted {
        builder = builder.push_evidence(f.evidence.clone());
    }

    builder
        .build()
        .map_err(|e| DiscoveryError::SynthesisFailed(e.to_string()))
}

fn minimal_profile(source: ProfileSource, description_hint: Option<&str>) -> fabrik_types::AgentProfile {
    AgentProfileBuilder::new(source, Utc::now())
        .confidence(0.2)
        .identity(
            "unknown agent",
            description_hint.unwrap_or("no evidence could be gathered"),
            "unknown",
        )
        .build()
        .expect("minimal profile with no evidence always validates")
}

fn minimal_profile_with_evidence(
    source: ProfileSource,
    description_hint: Option<&str>,
    extracted: &[ExtractedFile],
) -> fabrik_types::AgentProfile {
    let mut builder = AgentProfileBuilder::new(source, Utc::now())
        .confidence(0.2)
        .identity(
            "unknown agent",
            description_hint.unwrap_or("synthesis failed"),
            "unknown",
        );
    for f in extracted {
        builder = builder.push_evidence(f.evidence.clone());
    }
    builder
        .confidence(
            extracted
                .iter()
                .map(|f| f.evidence.confidence)
                .fold(0.0_f64, f64::max)
                .min(0.2),
        )
        .build()
        .unwrap_or_else(|_| minimal_profile(source, description_hint))
}
