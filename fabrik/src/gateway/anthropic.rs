//! Anthropic messages API transport: the `system` message is separated out
//! of the turn list, and JSON decoding tolerates a markdown fence.

use async_trait::async_trait;
use serde_json::json;

use super::error::GatewayError;
use super::{decode_structured, GenerateRequest, GenerateResponse, LlmGateway, TokenUsage};
use fabrik_types::Role;

const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            GatewayError::NotConfigured("ANTHROPIC_API_KEY is not set".to_string())
        })?;
        Ok(Self::new("https://api.anthropic.com/v1", api_key, model))
    }
}

#[async_trait]
impl LlmGateway for AnthropicGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        let system: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .collect();
        let turns: Vec<_> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::User { "user" } else { "assistant" };
                json!({"role": role, "content": m.content})
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::AuthExpired(
                "Anthropic request returned 401".to_string(),
            ));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!("{status}: {text}")));
        }

        let payload: serde_json::Value = response.json().await?;
        let text = payload["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        let token_usage = payload.get("usage").map(|u| TokenUsage {
            prompt_tokens: u["input_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: u["output_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: (u["input_tokens"].as_u64().unwrap_or(0)
                + u["output_tokens"].as_u64().unwrap_or(0)) as u32,
        });

        let parsed = decode_structured(&text, request.output_schema.as_ref());

        Ok(GenerateResponse {
            text,
            parsed,
            token_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_types::ChatMessage;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn generate_separates_system_and_joins_content_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "hi "}, {"type": "text", "text": "there"}],
                "usage": {"input_tokens": 10, "output_tokens": 4}
            })))
            .mount(&server)
            .await;

        let gateway = AnthropicGateway::new(server.uri(), "test-key", "claude-test");
        let response = gateway
            .generate(GenerateRequest {
                messages: vec![ChatMessage::system("be terse"), ChatMessage::user("hi")],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.text, "hi there");
        assert_eq!(response.token_usage.unwrap().total_tokens, 14);
    }
}
