//! Local (synchronous) assertions: contains, notContains,
//! matches, jsonSchema, latency, tokenUsage. Each records exactly one
//! [`AssertionResult`] and never panics.

use fabrik_types::{AgentResponse, AssertionResult, AssertionType};

pub fn assert_contains(response: &AgentResponse, needle: &str) -> AssertionResult {
    AssertionResult {
        assertion_type: AssertionType::Contains,
        passed: response.text.contains(needle),
        expected: Some(serde_json::Value::String(needle.to_string())),
        actual: Some(serde_json::Value::String(response.text.clone())),
        reasoning: None,
        latency_ms: None,
        error: None,
    }
}

pub fn assert_not_contains(response: &AgentResponse, needle: &str) -> AssertionResult {
    AssertionResult {
        assertion_type: AssertionType::NotContains,
        passed: !response.text.contains(needle),
        expected: Some(serde_json::Value::String(needle.to_string())),
        actual: Some(serde_json::Value::String(response.text.clone())),
        reasoning: None,
        latency_ms: None,
        error: None,
    }
}

pub fn assert_matches(response: &AgentResponse, pattern: &str) -> AssertionResult {
    match regex::Regex::new(pattern) {
        Ok(re) => AssertionResult {
            assertion_type: AssertionType::Matches,
            passed: re.is_match(&response.text),
            expected: Some(serde_json::Value::String(pattern.to_string())),
            actual: Some(serde_json::Value::String(response.text.clone())),
            reasoning: None,
            latency_ms: None,
            error: None,
        },
        Err(e) => AssertionResult {
            assertion_type: AssertionType::Matches,
            passed: false,
            expected: Some(serde_json::Value::String(pattern.to_string())),
            actual: Some(serde_json::Value::String(response.text.clone())),
            reasoning: None,
            latency_ms: None,
            error: Some(format!("invalid regex: {e}")),
        },
    }
}

pub fn assert_json_schema(response: &AgentResponse, schema: &serde_json::Value) -> AssertionResult {
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(&response.text);
    let Ok(value) = parsed else {
        return AssertionResult {
            assertion_type: AssertionType::JsonSchema,
            passed: false,
            expected: Some(schema.clone()),
            actual: Some(serde_json::Value::String(response.text.clone())),
            reasoning: None,
            latency_ms: None,
            error: Some("response was not valid JSON".to_string()),
        };
    };

    match jsonschema::validator_for(schema) {
        Ok(validator) => AssertionResult {
            assertion_type: AssertionType::JsonSchema,
            passed: validator.is_valid(&value),
            expected: Some(schema.clone()),
            actual: Some(value),
            reasoning: None,
            latency_ms: None,
            error: None,
        },
        Err(e) => AssertionResult {
            assertion_type: AssertionType::JsonSchema,
            passed: false,
            expected: Some(schema.clone()),
            actual: Some(value),
            reasoning: None,
            latency_ms: None,
            error: Some(format!("invalid schema: {e}")),
        },
    }
}

pub fn assert_latency(response: &AgentResponse, max_ms: u64) -> AssertionResult {
    AssertionResult {
        assertion_type: AssertionType::Latency,
        passed: response.latency_ms <= max_ms,
        expected: Some(serde_json::json!(max_ms)),
        actual: Some(serde_json::json!(response.latency_ms)),
        reasoning: None,
        latency_ms: Some(response.latency_ms),
        error: None,
    }
}

pub fn assert_token_usage(response: &AgentResponse, max_total: u32) -> AssertionResult {
    match &response.token_usage {
        Some(usage) => AssertionResult {
            assertion_type: AssertionType::TokenUsage,
            passed: usage.total_tokens <= max_total,
            expected: Some(serde_json::json!(max_total)),
            actual: Some(serde_json::json!(usage.total_tokens)),
            reasoning: None,
            latency_ms: None,
            error: None,
        },
        None => AssertionResult {
            assertion_type: AssertionType::TokenUsage,
            passed: false,
            expected: Some(serde_json::json!(max_total)),
            actual: None,
            reasoning: None,
            latency_ms: None,
            error: Some("no token usage reported for this response".to_string()),
        },
    }
}
