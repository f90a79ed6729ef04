//! The LLM gateway: one `generate` operation, three transports.

mod anthropic;
mod chatgpt_session;
mod error;
mod openai_compat;

pub use anthropic::AnthropicGateway;
pub use chatgpt_session::ChatGptSessionGateway;
pub use error::GatewayError;
pub use openai_compat::OpenAiCompatGateway;

use async_trait::async_trait;
use fabrik_types::ChatMessage;
use serde_json::Value;

/// Input to [`LlmGateway::generate`].
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub messages: Vec<ChatMessage>,
    pub output_schema: Option<Value>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Output of [`LlmGateway::generate`]. `parsed` is set only when
/// `output_schema` was supplied AND decoding + schema validation both
/// succeeded — it is never an error for `parsed` to be absent.
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: String,
    pub parsed: Option<Value>,
    pub token_usage: Option<TokenUsage>,
}

/// Structured generation against an optional JSON schema, with retry/parse
/// fallback owned by the caller.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError>;
}

/// Best-effort structured decode: strip a fenced code block if present,
/// parse as JSON, and validate against `schema` when given. Never fails —
/// returns `None` on any parse or validation failure so the caller can
/// decide whether to retry.
pub fn decode_structured(text: &str, schema: Option<&Value>) -> Option<Value> {
    let stripped = strip_fence(text);
    let parsed: Value = serde_json::from_str(stripped).ok()?;
    if let Some(schema) = schema {
        let compiled = jsonschema::validator_for(schema).ok()?;
        if !compiled.is_valid(&parsed) {
            return None;
        }
    }
    Some(parsed)
}

/// Strips a leading/trailing triple-backtick fence (optional `json` tag).
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_structured_parses_plain_json() {
        let value = decode_structured(r#"{"a": 1}"#, None).unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn decode_structured_strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        let value = decode_structured(text, None).unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn decode_structured_strips_bare_fence() {
        let text = "```\n{\"a\": 1}\n```";
        let value = decode_structured(text, None).unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn decode_structured_returns_none_on_invalid_json() {
        assert!(decode_structured("not json", None).is_none());
    }

    #[test]
    fn decode_structured_validates_against_schema() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}}
        });
        assert!(decode_structured(r#"{"name": "x"}"#, Some(&schema)).is_some());
        assert!(decode_structured(r#"{"other": 1}"#, Some(&schema)).is_none());
    }
}
