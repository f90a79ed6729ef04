//! The agent adapter: send a user message, receive a normalized
//! [`AgentResponse`].

mod error;
mod normalize;

pub use error::AdapterError;

use std::time::Instant;

use fabrik_types::{AdapterConfig, AgentResponse, RequestFormat};
use serde_json::json;

/// Prior turns to re-send, when the caller wants the adapter to carry
/// conversation history across sends.
#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    pub turns: Vec<fabrik_types::ChatMessage>,
}

/// Sends a message to the AUT and normalizes its reply. Only the `http`
/// variant of [`AdapterConfig`] ships with this crate.
pub struct HttpAdapter {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
    request_format: RequestFormat,
    streaming: bool,
}

impl HttpAdapter {
    pub fn new(config: &AdapterConfig) -> Result<Self, AdapterError> {
        let AdapterConfig::Http {
            url,
            headers,
            request_format,
            streaming,
            ..
        } = config
        else {
            return Err(AdapterError::WrongKind(match config {
                AdapterConfig::Subprocess { .. } => "subprocess",
                AdapterConfig::OpenaiAssistant { .. } => "openai-assistant",
                AdapterConfig::Custom { .. } => "custom",
                AdapterConfig::Http { .. } => unreachable!(),
            }));
        };
        Ok(Self {
            client: reqwest::Client::new(),
            url: url.clone(),
            headers: headers.clone().unwrap_or_default().into_iter().collect(),
            request_format: *request_format,
            streaming: *streaming,
        })
    }

    /// Stateless per send: the HTTP adapter holds no conversation state of
    /// its own, so `reset` is a no-op.
    pub fn reset(&self) {}

    fn build_body(&self, message: &str, context: Option<&AdapterContext>) -> serde_json::Value {
        match self.request_format {
            RequestFormat::Messages => {
                let mut messages: Vec<_> = context
                    .map(|c| {
                        c.turns
                            .iter()
                            .map(|m| {
                                json!({"role": role_str(m.role), "content": m.content})
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                messages.push(json!({"role": "user", "content": message}));
                json!({"messages": messages})
            }
            RequestFormat::Legacy => {
                json!({"message": message, "conversation_id": serde_json::Value::Null})
            }
        }
    }

    pub async fn send(
        &self,
        message: &str,
        context: Option<&AdapterContext>,
    ) -> Result<AgentResponse, AdapterError> {
        let body = self.build_body(message, context);
        let started = Instant::now();

        let mut request = self.client.post(&self.url).json(&body);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        let response = request.send().await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let raw_body = response.text().await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (text, raw, tool_calls) = if content_type.contains("text/event-stream") {
            (normalize::accumulate_sse(&raw_body)?, None, Vec::new())
        } else if self.streaming && !content_type.contains("application/json") {
            (normalize::accumulate_ai_sdk(&raw_body), None, Vec::new())
        } else {
            let json_body: serde_json::Value =
                serde_json::from_str(&raw_body).unwrap_or(serde_json::Value::String(raw_body.clone()));
            let text = normalize::extract_text_from_json(&json_body);
            let tool_calls = normalize::extract_tool_calls(&json_body);
            (text, Some(json_body), tool_calls)
        };

        Ok(AgentResponse {
            text,
            tool_calls,
            latency_ms,
            token_usage: None,
            raw,
        })
    }
}

fn role_str(role: fabrik_types::Role) -> &'static str {
    match role {
        fabrik_types::Role::System => "system",
        fabrik_types::Role::User => "user",
        fabrik_types::Role::Assistant => "assistant",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_config(url: String, request_format: RequestFormat) -> AdapterConfig {
        AdapterConfig::Http {
            url,
            headers: None,
            request_format,
            body_template: None,
            response_parser: None,
            streaming: false,
        }
    }

    #[tokio::test]
    async fn send_extracts_text_and_measures_latency() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Hello! How can I help?"
            })))
            .mount(&server)
            .await;

        let adapter =
            HttpAdapter::new(&http_config(server.uri(), RequestFormat::Messages)).unwrap();
        let response = adapter.send("Hi there!", None).await.unwrap();

        assert_eq!(response.text, "Hello! How can I help?");
        assert!(response.latency_ms < 5000);
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn send_extracts_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "looking that up",
                "tool_calls": [{"name": "lookup_order", "arguments": {"id": "42"}}]
            })))
            .mount(&server)
            .await;

        let adapter =
            HttpAdapter::new(&http_config(server.uri(), RequestFormat::Messages)).unwrap();
        let response = adapter.send("where's my order?", None).await.unwrap();

        assert!(response.called_tool("lookup_order"));
    }

    #[tokio::test]
    async fn legacy_request_format_sends_message_and_conversation_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "ok"})))
            .mount(&server)
            .await;

        let adapter = HttpAdapter::new(&http_config(server.uri(), RequestFormat::Legacy)).unwrap();
        let response = adapter.send("hi", None).await.unwrap();
        assert_eq!(response.text, "ok");
    }

    #[test]
    fn new_rejects_non_http_config() {
        let config = AdapterConfig::Subprocess {
            command: "echo".to_string(),
            args: vec![],
            cwd: None,
        };
        assert!(HttpAdapter::new(&config).is_err());
    }
}
