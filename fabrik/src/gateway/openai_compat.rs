//! OpenAI-compatible chat-completions transport. Uses `response_format:
//! json_object` when a schema is requested.

use async_trait::async_trait;
use serde_json::json;

use super::error::GatewayError;
use super::{decode_structured, GenerateRequest, GenerateResponse, LlmGateway, TokenUsage};
use fabrik_types::Role;

pub struct OpenAiCompatGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Reads `OPENAI_API_KEY` from the environment. Fails with
    /// [`GatewayError::NotConfigured`] if unset.
    pub fn from_env(model: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GatewayError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self::new("https://api.openai.com/v1", api_key, model))
    }
}

fn role_str(role: fabrik_types::Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LlmGateway for OpenAiCompatGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        let messages: Vec<_> = request
            .messages
            .iter()
            .map(|m| json!({"role": role_str(m.role), "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.output_schema.is_some() {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::AuthExpired(
                "OpenAI-compatible request returned 401".to_string(),
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            return Err(GatewayError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!(
                "{status}: {text}"
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let token_usage = payload.get("usage").map(|u| TokenUsage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0) as u32,
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
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn generate_extracts_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "hello there"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            })))
            .mount(&server)
            .await;

        let gateway = OpenAiCompatGateway::new(server.uri(), "test-key", "gpt-test");
        let response = gateway
            .generate(GenerateRequest {
                messages: vec![ChatMessage::user("hi")],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.text, "hello there");
        assert_eq!(response.token_usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn generate_surfaces_401_as_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let gateway = OpenAiCompatGateway::new(server.uri(), "stale-key", "gpt-test");
        let err = gateway
            .generate(GenerateRequest {
                messages: vec![ChatMessage::user("hi")],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthExpired(_)));
    }

    #[tokio::test]
    async fn generate_decodes_structured_output_when_schema_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"name\": \"lookup_order\"}"}}]
            })))
            .mount(&server)
            .await;

        let gateway = OpenAiCompatGateway::new(server.uri(), "test-key", "gpt-test");
        let schema = serde_json::json!({"type": "object", "required": ["name"]});
        let response = gateway
            .generate(GenerateRequest {
                messages: vec![ChatMessage::user("hi")],
                output_schema: Some(schema),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.parsed.unwrap()["name"], "lookup_order");
    }
}
