//! Response-shape normalizers: JSON body, SSE, AI-SDK data-stream.

use fabrik_types::ToolCall;

use super::AdapterError;
use crate::sse::{from_ai_sdk_line, from_anthropic_sse_data, from_openai_sse_data, looks_like_error, StreamEvent};

/// Key-extraction priority for a plain JSON response body.
const TEXT_KEYS: [&str; 4] = ["message", "text", "content", "response"];

/// `{message: ...} | {text: ...} | ... | choices[0].message.content | stringified body`.
pub fn extract_text_from_json(body: &serde_json::Value) -> String {
    for key in TEXT_KEYS {
        if let Some(text) = body.get(key).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    if let Some(text) = body["choices"][0]["message"]["content"].as_str() {
        return text.to_string();
    }
    body.to_string()
}

pub fn extract_tool_calls(body: &serde_json::Value) -> Vec<ToolCall> {
    body.get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let name = c.get("name")?.as_str()?.to_string();
                    let arguments = c.get("arguments").cloned().unwrap_or(serde_json::json!({}));
                    Some(ToolCall { name, arguments })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Accumulates an SSE body (`text/event-stream`) into plain text. A payload
/// shaped like an error MUST fail the send.
pub fn accumulate_sse(body: &str) -> Result<String, AdapterError> {
    let mut text = String::new();
    let mut current_event: Option<String> = None;

    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            current_event = Some(rest.trim().to_string());
            continue;
        }
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
            if let Some(message) = looks_like_error(&value) {
                return Err(AdapterError::AutError(message));
            }
        }

        let events = match current_event.as_deref() {
            Some(event) if event.starts_with("content_block") || event.starts_with("message") => {
                from_anthropic_sse_data(data)
            }
            _ => from_openai_sse_data(data),
        };
        for event in events {
            match event {
                StreamEvent::TextDelta(delta) => text.push_str(&delta),
                StreamEvent::Error(message) => return Err(AdapterError::AutError(message)),
                _ => {}
            }
        }
    }

    Ok(text)
}

/// Accumulates an AI-SDK data-stream body (plain `<digit>:<payload>` lines,
/// not SSE-framed) into text.
pub fn accumulate_ai_sdk(body: &str) -> String {
    let mut text = String::new();
    for line in body.lines() {
        for event in from_ai_sdk_line(line) {
            if let StreamEvent::TextDelta(delta) = event {
                text.push_str(&delta);
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_prefers_message_key() {
        let body = serde_json::json!({"message": "hi", "text": "lower priority"});
        assert_eq!(extract_text_from_json(&body), "hi");
    }

    #[test]
    fn extract_text_falls_back_to_choices() {
        let body = serde_json::json!({"choices": [{"message": {"content": "from choices"}}]});
        assert_eq!(extract_text_from_json(&body), "from choices");
    }

    #[test]
    fn extract_text_stringifies_when_no_known_key() {
        let body = serde_json::json!({"unexpected": true});
        assert_eq!(extract_text_from_json(&body), body.to_string());
    }

    #[test]
    fn extract_tool_calls_reads_top_level_array() {
        let body = serde_json::json!({"tool_calls": [{"name": "lookup_order", "arguments": {"id": "1"}}]});
        let calls = extract_tool_calls(&body);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "lookup_order");
    }

    #[test]
    fn accumulate_sse_concatenates_text_deltas() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n";
        assert_eq!(accumulate_sse(body).unwrap(), "hello");
    }

    #[test]
    fn accumulate_sse_fails_on_error_payload() {
        let body = "data: {\"error\": \"boom\"}\n\n";
        assert!(accumulate_sse(body).is_err());
    }

    #[test]
    fn accumulate_ai_sdk_reads_text_prefix_only() {
        let body = "0:\"hel\"\n2:{\"ignored\":true}\n0:\"lo\"\n";
        assert_eq!(accumulate_ai_sdk(body), "hello");
    }
}
