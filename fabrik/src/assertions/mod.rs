//! The assertion kernel: local synchronous checks plus
//! LLM-backed async checks, all recorded through one append-only
//! [`AssertionCollector`] and guaranteed never to throw.

mod judge;
mod local;

pub use local::{
    assert_contains, assert_json_schema, assert_latency, assert_matches, assert_not_contains,
    assert_token_usage,
};

use fabrik_types::{AgentProfile, AgentResponse, AssertionResult, AssertionType};

use crate::gateway::LlmGateway;

/// Renders the profile context prelude ("description, constraints, tools,
/// tone") judge prompts are prefixed with when a profile is bound to the
/// runner.
pub(crate) fn profile_context(profile: &AgentProfile) -> String {
    let mut lines = vec![format!("Agent: {} — {}", profile.name, profile.description)];
    if !profile.known_constraints.is_empty() {
        lines.push(format!("Constraints: {}", profile.known_constraints.join("; ")));
    }
    if !profile.tools.is_empty() {
        let tools = profile
            .tools
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Tools: {tools}"));
    }
    if let Some(tone) = &profile.expected_tone {
        lines.push(format!("Expected tone: {tone}"));
    }
    lines.join("\n")
}

/// Append-only collector of [`AssertionResult`]s for one scenario run.
#[derive(Debug, Default)]
pub struct AssertionCollector {
    results: Vec<AssertionResult>,
}

impl AssertionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: AssertionResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[AssertionResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<AssertionResult> {
        self.results
    }
}

/// The bound `assert` proxy a scenario function is handed: local checks
/// run inline, LLM-backed checks issue one gateway call each. Every method
/// records exactly one [`AssertionResult`] and never returns `Err` to the
/// caller — failures become a failed assertion with `error` set, never a
/// panic or a propagated error.
pub struct AssertProxy<'a> {
    collector: &'a mut AssertionCollector,
    gateway: &'a dyn LlmGateway,
    profile: Option<&'a AgentProfile>,
}

/// The tool names `response` called, or the literal "(no tools called)"
/// when it called none.
fn called_tool_names(response: &AgentResponse) -> serde_json::Value {
    if response.tool_calls.is_empty() {
        serde_json::Value::String("(no tools called)".to_string())
    } else {
        serde_json::json!(response
            .tool_calls
            .iter()
            .map(|t| t.name.clone())
            .collect::<Vec<_>>())
    }
}

impl<'a> AssertProxy<'a> {
    pub fn new(
        collector: &'a mut AssertionCollector,
        gateway: &'a dyn LlmGateway,
        profile: Option<&'a AgentProfile>,
    ) -> Self {
        Self {
            collector,
            gateway,
            profile,
        }
    }

    pub fn contains(&mut self, response: &AgentResponse, needle: &str) {
        self.collector.push(assert_contains(response, needle));
    }

    pub fn not_contains(&mut self, response: &AgentResponse, needle: &str) {
        self.collector.push(assert_not_contains(response, needle));
    }

    pub fn matches(&mut self, response: &AgentResponse, pattern: &str) {
        self.collector.push(assert_matches(response, pattern));
    }

    pub fn json_schema(&mut self, response: &AgentResponse, schema: &serde_json::Value) {
        self.collector.push(assert_json_schema(response, schema));
    }

    pub fn latency(&mut self, response: &AgentResponse, max_ms: u64) {
        self.collector.push(assert_latency(response, max_ms));
    }

    pub fn token_usage(&mut self, response: &AgentResponse, max_total: u32) {
        self.collector.push(assert_token_usage(response, max_total));
    }

    pub fn tool_called(&mut self, response: &AgentResponse, name: &str) {
        let passed = response.called_tool(name);
        self.collector.push(AssertionResult {
            assertion_type: AssertionType::ToolCalled,
            passed,
            expected: Some(serde_json::Value::String(name.to_string())),
            actual: Some(called_tool_names(response)),
            reasoning: None,
            latency_ms: None,
            error: None,
        });
    }

    pub fn tool_not_called(&mut self, response: &AgentResponse, name: &str) {
        let passed = !response.called_tool(name);
        self.collector.push(AssertionResult {
            assertion_type: AssertionType::ToolNotCalled,
            passed,
            expected: Some(serde_json::Value::String(name.to_string())),
            actual: Some(called_tool_names(response)),
            reasoning: None,
            latency_ms: None,
            error: None,
        });
    }

    pub async fn sentiment(&mut self, response: &AgentResponse, expectation: &str) {
        let result = judge::judge_sentiment(self.gateway, self.profile, response, expectation).await;
        self.collector.push(result);
    }

    pub async fn llm_judge(&mut self, response: &AgentResponse, rubric: &str, threshold: f64) {
        let result = judge::judge_llm(self.gateway, self.profile, response, rubric, threshold).await;
        self.collector.push(result);
    }

    pub async fn guardrail(&mut self, response: &AgentResponse, rule: &str) {
        let result = judge::judge_guardrail(self.gateway, self.profile, response, rule).await;
        self.collector.push(result);
    }

    pub async fn factuality(&mut self, response: &AgentResponse, claim: &str) {
        let result = judge::judge_factuality(self.gateway, self.profile, response, claim).await;
        self.collector.push(result);
    }

    pub async fn custom(&mut self, response: &AgentResponse, instruction: &str) {
        let result = judge::judge_custom(self.gateway, self.profile, response, instruction).await;
        self.collector.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::gateway::{GatewayError, GenerateRequest, GenerateResponse};

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
            latency_ms: 100,
            token_usage: None,
            raw: None,
        }
    }

    #[test]
    fn tool_called_records_expected_and_actual() {
        let mut collector = AssertionCollector::new();
        let gateway = StubGateway("{}");
        let mut proxy = AssertProxy::new(&mut collector, &gateway, None);
        proxy.tool_called(&response("hi"), "lookup_order");
        assert_eq!(collector.results().len(), 1);
        assert!(!collector.results()[0].passed);
        assert_eq!(
            collector.results()[0].actual,
            Some(serde_json::Value::String("(no tools called)".to_string()))
        );
    }

    #[tokio::test]
    async fn sentiment_never_panics_on_unparseable_judge_response() {
        let mut collector = AssertionCollector::new();
        let gateway = StubGateway("not json at all");
        let mut proxy = AssertProxy::new(&mut collector, &gateway, None);
        proxy.sentiment(&response("hi"), "positive").await;
        assert_eq!(collector.results().len(), 1);
        assert!(!collector.results()[0].passed);
        assert!(collector.results()[0].error.is_some());
    }
}
