//! LLM-backed assertions: one gateway call each, with a
//! fixed threshold rule per kind. A judge call that fails or doesn't parse
//! becomes `passed: false` with the raw text recorded as `error`, never a
//! propagated error.

use serde::Deserialize;
use serde_json::json;

use fabrik_types::{AgentProfile, AgentResponse, AssertionResult, AssertionType, ChatMessage, Role};

use crate::gateway::{decode_structured, GenerateRequest, LlmGateway};
use super::profile_context;

const SCORE_THRESHOLD: f64 = 3.0;

#[derive(Debug, Default, Deserialize)]
struct SentimentVerdict {
    #[serde(default)]
    matches: Option<bool>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoreVerdict {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PassVerdict {
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FactualityVerdict {
    #[serde(default)]
    factual: Option<bool>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Prepends the profile context prelude to `prompt` when a profile is
/// bound to the runner.
fn with_profile_context(prompt: String, profile: Option<&AgentProfile>) -> String {
    match profile {
        Some(profile) => format!("{}\n\n{prompt}", profile_context(profile)),
        None => prompt,
    }
}

fn verdict_schema(fields: &[&str]) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": fields.iter().map(|f| (f.to_string(), json!({}))).collect::<serde_json::Map<_, _>>(),
    })
}

async fn call_judge(
    gateway: &dyn LlmGateway,
    assertion_type: AssertionType,
    prompt: String,
    schema_fields: &[&str],
) -> Result<serde_json::Value, AssertionResult> {
    let schema = verdict_schema(schema_fields);
    let response = gateway
        .generate(GenerateRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: prompt,
            }],
            output_schema: Some(schema.clone()),
            ..Default::default()
        })
        .await
        .map_err(|e| unparseable(assertion_type, e.to_string()))?;

    response
        .parsed
        .or_else(|| decode_structured(&response.text, Some(&schema)))
        .ok_or_else(|| unparseable(assertion_type, response.text.clone()))
}

fn unparseable(assertion_type: AssertionType, raw: String) -> AssertionResult {
    AssertionResult {
        assertion_type,
        passed: false,
        expected: None,
        actual: None,
        reasoning: None,
        latency_ms: None,
        error: Some(raw),
    }
}

/// sentiment: `matches == true` OR `score >= 3`.
pub async fn judge_sentiment(
    gateway: &dyn LlmGateway,
    profile: Option<&AgentProfile>,
    response: &AgentResponse,
    expectation: &str,
) -> AssertionResult {
    let prompt = with_profile_context(
        format!(
            "Does the following response express a \"{expectation}\" sentiment? Respond with JSON {{matches: bool, score: 1-5, reasoning: string}}.\n\nResponse:\n{}",
            response.text
        ),
        profile,
    );
    match call_judge(gateway, AssertionType::Sentiment, prompt, &["matches", "score", "reasoning"]).await {
        Ok(value) => {
            let verdict: SentimentVerdict = serde_json::from_value(value).unwrap_or_default();
            let passed = verdict.matches.unwrap_or(false)
                || verdict.score.map(|s| s >= SCORE_THRESHOLD).unwrap_or(false);
            AssertionResult {
                assertion_type: AssertionType::Sentiment,
                passed,
                expected: Some(serde_json::Value::String(expectation.to_string())),
                actual: verdict.score.map(|s| json!(s)),
                reasoning: verdict.reasoning,
                latency_ms: None,
                error: None,
            }
        }
        Err(failed) => failed,
    }
}

/// llmJudge: `score >= threshold`.
pub async fn judge_llm(
    gateway: &dyn LlmGateway,
    profile: Option<&AgentProfile>,
    response: &AgentResponse,
    rubric: &str,
    threshold: f64,
) -> AssertionResult {
    let prompt = with_profile_context(
        format!(
            "Score the following response from 1-5 against this rubric: \"{rubric}\". Respond with JSON {{score: 1-5, reasoning: string}}.\n\nResponse:\n{}",
            response.text
        ),
        profile,
    );
    match call_judge(gateway, AssertionType::LlmJudge, prompt, &["score", "reasoning"]).await {
        Ok(value) => {
            let verdict: ScoreVerdict = serde_json::from_value(value).unwrap_or_default();
            let passed = verdict.score.map(|s| s >= threshold).unwrap_or(false);
            AssertionResult {
                assertion_type: AssertionType::LlmJudge,
                passed,
                expected: Some(json!(threshold)),
                actual: verdict.score.map(|s| json!(s)),
                reasoning: verdict.reasoning,
                latency_ms: None,
                error: None,
            }
        }
        Err(failed) => failed,
    }
}

/// guardrail: `passed == true`.
pub async fn judge_guardrail(
    gateway: &dyn LlmGateway,
    profile: Option<&AgentProfile>,
    response: &AgentResponse,
    rule: &str,
) -> AssertionResult {
    let prompt = with_profile_context(
        format!(
            "Does the following response violate this guardrail: \"{rule}\"? Respond with JSON {{passed: bool (true means NOT violated), reasoning: string}}.\n\nResponse:\n{}",
            response.text
        ),
        profile,
    );
    match call_judge(gateway, AssertionType::Guardrail, prompt, &["passed", "reasoning"]).await {
        Ok(value) => {
            let verdict: PassVerdict = serde_json::from_value(value).unwrap_or_default();
            AssertionResult {
                assertion_type: AssertionType::Guardrail,
                passed: verdict.passed.unwrap_or(false),
                expected: Some(serde_json::Value::String(rule.to_string())),
                actual: None,
                reasoning: verdict.reasoning,
                latency_ms: None,
                error: None,
            }
        }
        Err(failed) => failed,
    }
}

/// factuality: `factual == true` OR `score >= 3`.
pub async fn judge_factuality(
    gateway: &dyn LlmGateway,
    profile: Option<&AgentProfile>,
    response: &AgentResponse,
    claim: &str,
) -> AssertionResult {
    let prompt = with_profile_context(
        format!(
            "Is the following response factually consistent with: \"{claim}\"? Respond with JSON {{factual: bool, score: 1-5, reasoning: string}}.\n\nResponse:\n{}",
            response.text
        ),
        profile,
    );
    match call_judge(gateway, AssertionType::Factuality, prompt, &["factual", "score", "reasoning"]).await {
        Ok(value) => {
            let verdict: FactualityVerdict = serde_json::from_value(value).unwrap_or_default();
            let passed = verdict.factual.unwrap_or(false)
                || verdict.score.map(|s| s >= SCORE_THRESHOLD).unwrap_or(false);
            AssertionResult {
                assertion_type: AssertionType::Factuality,
                passed,
                expected: Some(serde_json::Value::String(claim.to_string())),
                actual: verdict.score.map(|s| json!(s)),
                reasoning: verdict.reasoning,
                latency_ms: None,
                error: None,
            }
        }
        Err(failed) => failed,
    }
}

/// custom: the instruction itself defines what "passed" means; the judge
/// is asked to decide directly.
pub async fn judge_custom(
    gateway: &dyn LlmGateway,
    profile: Option<&AgentProfile>,
    response: &AgentResponse,
    instruction: &str,
) -> AssertionResult {
    let prompt = with_profile_context(
        format!(
            "{instruction}\n\nRespond with JSON {{passed: bool, reasoning: string}} about the following response.\n\nResponse:\n{}",
            response.text
        ),
        profile,
    );
    match call_judge(gateway, AssertionType::Custom, prompt, &["passed", "reasoning"]).await {
        Ok(value) => {
            let verdict: PassVerdict = serde_json::from_value(value).unwrap_or_default();
            AssertionResult {
                assertion_type: AssertionType::Custom,
                passed: verdict.passed.unwrap_or(false),
                expected: Some(serde_json::Value::String(instruction.to_string())),
                actual: None,
                reasoning: verdict.reasoning,
                latency_ms: None,
                error: None,
            }
        }
        Err(failed) => failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::gateway::{GatewayError, GenerateResponse};

    struct StubGateway(&'static str);

    #[async_trait]
    impl LlmGateway for StubGateway {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
            Ok(GenerateResponse {
                text: self.0.to_string(),
                parsed: None,
                token_usage: None,
            })
        }
    }

    fn response(text: &str) -> AgentResponse {
        AgentResponse {
            text: text.to_string(),
            tool_calls: vec![],
            latency_ms: 10,
            token_usage: None,
            raw: None,
        }
    }

    #[tokio::test]
    async fn sentiment_passes_on_matches_true() {
        let gateway = StubGateway(r#"{"matches": true, "score": 2, "reasoning": "polite"}"#);
        let result = judge_sentiment(&gateway, None, &response("hi"), "positive").await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn sentiment_passes_on_high_score_without_matches() {
        let gateway = StubGateway(r#"{"matches": false, "score": 4, "reasoning": "close enough"}"#);
        let result = judge_sentiment(&gateway, None, &response("hi"), "positive").await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn llm_judge_respects_threshold() {
        let gateway = StubGateway(r#"{"score": 3, "reasoning": "ok"}"#);
        assert!(judge_llm(&gateway, None, &response("hi"), "be polite", 3.0).await.passed);
        assert!(!judge_llm(&gateway, None, &response("hi"), "be polite", 4.0).await.passed);
    }

    #[tokio::test]
    async fn guardrail_requires_explicit_passed_true() {
        let gateway = StubGateway(r#"{"passed": false, "reasoning": "mentions banned topic"}"#);
        assert!(!judge_guardrail(&gateway, None, &response("hi"), "no medical advice").await.passed);
    }

    #[tokio::test]
    async fn factuality_passes_on_factual_true_or_high_score() {
        let gateway = StubGateway(r#"{"factual": false, "score": 3, "reasoning": "mostly right"}"#);
        assert!(judge_factuality(&gateway, None, &response("hi"), "claim").await.passed);
    }

    #[tokio::test]
    async fn unparseable_judge_response_records_raw_text_as_error() {
        let gateway = StubGateway("not json");
        let result = judge_llm(&gateway, None, &response("hi"), "rubric", 3.0).await;
        assert!(!result.passed);
        assert_eq!(result.error, Some("not json".to_string()));
    }

    #[tokio::test]
    async fn llm_judge_prepends_profile_context_when_bound() {
        use fabrik_types::{AgentProfileBuilder, ProfileSource};

        let gateway = StubGateway(r#"{"score": 3, "reasoning": "ok"}"#);
        let profile = AgentProfileBuilder::new(ProfileSource::LocalDir { path: ".".into() }, chrono::Utc::now())
            .confidence(0.5)
            .identity("Support Bot", "handles support tickets", "support")
            .build()
            .unwrap();

        let prompt = with_profile_context("rubric text".to_string(), Some(&profile));
        assert!(prompt.starts_with("Agent: Support Bot"));
        assert!(prompt.ends_with("rubric text"));

        let result = judge_llm(&gateway, Some(&profile), &response("hi"), "be polite", 3.0).await;
        assert!(result.passed);
    }
}
