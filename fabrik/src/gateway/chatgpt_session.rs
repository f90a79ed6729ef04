//! ChatGPT session transport: authenticates with the bearer token cached by
//! the `codex` CLI at `~/.codex/auth.json`, rather than an API key.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::error::GatewayError;
use super::{decode_structured, GenerateRequest, GenerateResponse, LlmGateway, TokenUsage};
use fabrik_types::Role;

const BACKEND_URL: &str = "https://chatgpt.com/backend-api/conversation";

#[derive(Deserialize)]
struct AuthFile {
    tokens: AuthTokens,
}

#[derive(Deserialize)]
struct AuthTokens {
    access_token: String,
    expires_at: i64,
}

fn load_session_token(path: &std::path::Path) -> Result<String, GatewayError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::AuthExpired(format!("could not read {}: {e}", path.display()))
    })?;
    let auth: AuthFile = serde_json::from_str(&content)
        .map_err(|e| GatewayError::AuthExpired(format!("malformed session file: {e}")))?;
    let now = chrono::Utc::now().timestamp();
    if auth.tokens.expires_at <= now {
        return Err(GatewayError::AuthExpired(
            "ChatGPT session expired, run `codex login` to reauthenticate".to_string(),
        ));
    }
    Ok(auth.tokens.access_token)
}

pub struct ChatGptSessionGateway {
    client: reqwest::Client,
    auth_path: std::path::PathBuf,
    model: String,
}

impl ChatGptSessionGateway {
    pub fn new(model: impl Into<String>) -> Result<Self, GatewayError> {
        let home = dirs_home()?;
        Ok(Self {
            client: reqwest::Client::new(),
            auth_path: home.join(".codex").join("auth.json"),
            model: model.into(),
        })
    }
}

fn dirs_home() -> Result<std::path::PathBuf, GatewayError> {
    std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .ok_or_else(|| GatewayError::NotConfigured("HOME is not set".to_string()))
}

#[async_trait]
impl LlmGateway for ChatGptSessionGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        let token = load_session_token(&self.auth_path)?;

        let input: Vec<_> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({"role": role, "content": m.content})
            })
            .collect();

        let body = json!({
            "model": self.model,
            "input": input,
            "stream": true,
        });

        let response = self
            .client
            .post(BACKEND_URL)
            .bearer_auth(&token)
            .header("accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::AuthExpired(
                "ChatGPT session rejected, run `codex login` to reauthenticate".to_string(),
            ));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!("{status}: {text}")));
        }

        let body = response.text().await?;
        let text = decode_codex_stream(&body);
        let parsed = decode_structured(&text, request.output_schema.as_ref());

        Ok(GenerateResponse {
            text,
            parsed,
            token_usage: None::<TokenUsage>,
        })
    }
}

/// Folds a raw SSE body into text, preferring incremental deltas
/// (`response.output_text.delta`, `response.content_part.delta`) and
/// falling back to the final `response.completed` envelope when no deltas
/// were seen.
fn decode_codex_stream(body: &str) -> String {
    let mut deltas = String::new();
    let mut completed_text: Option<String> = None;

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
        let Ok(payload) = serde_json::from_str::<serde_json::Value>(data) else {
            continue;
        };
        match current_event.as_deref() {
            Some("response.output_text.delta") | Some("response.content_part.delta") => {
                if let Some(delta) = payload["delta"].as_str() {
                    deltas.push_str(delta);
                }
            }
            Some("response.completed") => {
                completed_text = payload["response"]["output_text"]
                    .as_str()
                    .map(|s| s.to_string());
            }
            _ => {}
        }
    }

    if !deltas.is_empty() {
        deltas
    } else {
        completed_text.unwrap_or_default()
    }
}
