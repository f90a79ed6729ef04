//! Step 3 of the codebase pipeline: per-file extraction, bounded to a fixed
//! concurrency so a large ranked set doesn't open unbounded gateway calls
//! at once.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;

use fabrik_types::{ChatMessage, Evidence, Role};

use crate::gateway::{decode_structured, GenerateRequest, LlmGateway};

const DEFAULT_CONCURRENCY: usize = 5;
const EXCERPT_LIMIT: usize = 15_000;

/// One file's extracted findings. Missing fields stay empty/None rather
/// than forcing the model to invent content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileExtraction {
    #[serde(default, rename = "systemPrompt")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: Vec<ExtractedTool>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default, rename = "modelConfig")]
    pub model_config: Option<ExtractedModelConfig>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub findings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedModelConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

fn extraction_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "systemPrompt": {"type": ["string", "null"]},
            "tools": {"type": "array"},
            "constraints": {"type": "array", "items": {"type": "string"}},
            "modelConfig": {"type": ["object", "null"]},
            "domain": {"type": ["string", "null"]},
            "findings": {"type": "array", "items": {"type": "string"}},
        }
    })
}

fn truncate_excerpt(content: &str) -> String {
    if content.len() <= EXCERPT_LIMIT {
        return content.to_string();
    }
    let mut truncated = content.chars().take(EXCERPT_LIMIT).collect::<String>();
    truncated.push_str("\n... (truncated)");
    truncated
}

/// One file's extraction result, paired with the evidence it produces
/// whether or not the call succeeded.
pub struct ExtractedFile {
    pub path: String,
    pub extraction: FileExtraction,
    pub evidence: Evidence,
}

async fn extract_one(gateway: &dyn LlmGateway, path: String, content: String) -> ExtractedFile {
    let schema = extraction_schema();
    let prompt = format!(
        "File: {path}\n\nContent:\n{}\n\nExtract the system prompt (if any), tools, constraints, model config, domain, and any other findings relevant to testing this agent.",
        truncate_excerpt(&content),
    );

    let result = gateway
        .generate(GenerateRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: prompt,
            }],
            output_schema: Some(schema.clone()),
            ..Default::default()
        })
        .await;

    match result {
        Ok(response) => {
            let parsed = response
                .parsed
                .or_else(|| decode_structured(&response.text, Some(&schema)));
            match parsed.and_then(|v| serde_json::from_value::<FileExtraction>(v).ok()) {
                Some(extraction) => {
                    let evidence = Evidence {
                        evidence_type: "file".to_string(),
                        source: path.clone(),
                        finding: format!("extracted {} finding(s)", extraction.findings.len()),
                        confidence: 0.7,
                    };
                    ExtractedFile {
                        path,
                        extraction,
                        evidence,
                    }
                }
                None => empty_extraction(path, "unparseable extraction response"),
            }
        }
        Err(e) => empty_extraction(path, &e.to_string()),
    }
}

/// Per-file failure becomes an empty extraction with low-confidence
/// evidence; it MUST NOT abort the pipeline.
fn empty_extraction(path: String, reason: &str) -> ExtractedFile {
    let evidence = Evidence {
        evidence_type: "file".to_string(),
        source: path.clone(),
        finding: format!("extraction failed: {reason}"),
        confidence: 0.1,
    };
    ExtractedFile {
        path,
        extraction: FileExtraction::default(),
        evidence,
    }
}

/// Runs one extraction call per `(path, content)` pair with bounded
/// concurrency, grounded on the `stream::iter(...).buffer_unordered(n)`
/// fan-out idiom.
pub async fn extract_files(
    gateway: &dyn LlmGateway,
    files: Vec<(String, String)>,
    concurrency: Option<usize>,
) -> Vec<ExtractedFile> {
    let concurrency = concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1);
    stream::iter(files.into_iter().map(|(path, content)| async move {
        extract_one(gateway, path, content).await
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await
}
