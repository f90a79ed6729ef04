//! Shared SSE/data-stream decoding for both the LLM gateway and the agent
//! adapter.
//!
//! Rather than duplicating prefix-heuristics per transport, every event
//! family (OpenAI delta, Anthropic content parts, AI-SDK data-stream lines)
//! is normalized into one [`StreamEvent`] enum. Callers fold a stream of
//! `StreamEvent`s into a single `text` by concatenating `TextDelta`s and
//! ignoring anything they don't recognize.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCallDelta { name: Option<String>, arguments_delta: String },
    Usage { prompt_tokens: u32, completion_tokens: u32 },
    /// A payload shaped like an error (`type:"error"`, or top-level
    /// `error`/`errorText`) — callers MUST fail the send.
    Error(String),
    Done,
    /// Recognized envelope, nothing actionable in it.
    Ignored,
}

#[derive(Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCallDelta>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    #[serde(default)]
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize, Default)]
struct OpenAiFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
}

/// One `data:` payload from an OpenAI-compatible chat-completions stream.
/// `[DONE]` yields [`StreamEvent::Done`]; a top-level `error` key yields
/// [`StreamEvent::Error`].
pub fn from_openai_sse_data(data: &str) -> Vec<StreamEvent> {
    let data = data.trim();
    if data == "[DONE]" {
        return vec![StreamEvent::Done];
    }
    let chunk: OpenAiChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(_) => return vec![],
    };
    if let Some(err) = chunk.error {
        return vec![StreamEvent::Error(err.to_string())];
    }
    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::TextDelta(content));
            }
        }
        for tool_call in choice.delta.tool_calls {
            let function = tool_call.function.unwrap_or_default();
            events.push(StreamEvent::ToolCallDelta {
                name: function.name,
                arguments_delta: function.arguments.unwrap_or_default(),
            });
        }
    }
    events
}

/// One SSE event from Anthropic's messages API: `event:` line gives the
/// type, `data:` the JSON payload.
pub fn from_anthropic_sse_data(data: &str) -> Vec<StreamEvent> {
    let event: AnthropicEvent = match serde_json::from_str(data.trim()) {
        Ok(e) => e,
        Err(_) => return vec![],
    };
    if let Some(err) = event.error {
        return vec![StreamEvent::Error(err.to_string())];
    }
    match event.event_type.as_str() {
        "content_block_delta" => {
            let text = event.delta.and_then(|d| d.text).unwrap_or_default();
            if text.is_empty() {
                vec![StreamEvent::Ignored]
            } else {
                vec![StreamEvent::TextDelta(text)]
            }
        }
        "message_stop" => vec![StreamEvent::Done],
        _ => vec![StreamEvent::Ignored],
    }
}

/// One line of an AI-SDK data-stream: `<digit>:<json-payload>`. Prefix `0`
/// is a text delta; every other prefix is ignored.
pub fn from_ai_sdk_line(line: &str) -> Vec<StreamEvent> {
    let Some((prefix, payload)) = line.split_once(':') else {
        return vec![];
    };
    if prefix != "0" {
        return vec![StreamEvent::Ignored];
    }
    match serde_json::from_str::<String>(payload) {
        Ok(text) if !text.is_empty() => vec![StreamEvent::TextDelta(text)],
        Ok(_) => vec![],
        Err(_) => vec![],
    }
}

/// True when a decoded JSON payload looks like an error envelope:
/// `type:"error"`, or a top-level `error`/`errorText` key.
pub fn looks_like_error(value: &serde_json::Value) -> Option<String> {
    if value.get("type").and_then(|t| t.as_str()) == Some("error") {
        return Some(value.to_string());
    }
    if let Some(err) = value.get("error") {
        return Some(err.to_string());
    }
    if let Some(err) = value.get("errorText").and_then(|t| t.as_str()) {
        return Some(err.to_string());
    }
    None
}
