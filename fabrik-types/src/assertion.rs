//! [`AssertionResult`]: one entry in a scenario's append-only collector.

use serde::{Deserialize, Serialize};

/// Which assertion produced a result. Spans the local (synchronous) and
/// LLM-backed (asynchronous) check families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionType {
    Contains,
    NotContains,
    Matches,
    JsonSchema,
    Latency,
    TokenUsage,
    ToolCalled,
    ToolNotCalled,
    Sentiment,
    LlmJudge,
    Guardrail,
    Factuality,
    Custom,
}

/// One recorded assertion outcome. Append-only within a scenario execution;
/// never mutated after being pushed to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    #[serde(rename = "type")]
    pub assertion_type: AssertionType,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
