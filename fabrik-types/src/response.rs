//! [`AgentResponse`]: an immutable record of one AUT reply.

use serde::{Deserialize, Serialize};

/// A single tool invocation the AUT made while producing a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Token usage reported alongside an [`AgentResponse`], when the transport
/// surfaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Immutable record of one `agent.send()` call. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl AgentResponse {
    /// True when the AUT invoked a tool with the given name this turn.
    pub fn called_tool(&self, name: &str) -> bool {
        self.tool_calls.iter().any(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn called_tool_matches_by_name() {
        let response = AgentResponse {
            text: "ok".to_string(),
            tool_calls: vec![ToolCall {
                name: "lookup_order".to_string(),
                arguments: serde_json::json!({"id": "123"}),
            }],
            latency_ms: 42,
            token_usage: None,
            raw: None,
        };
        assert!(response.called_tool("lookup_order"));
        assert!(!response.called_tool("initiate_refund"));
    }
}
