//! Scenario Runner: drives one scenario's conversation,
//! collects assertions, and computes pass/fail and score.

mod agent_handle;
mod error;
pub mod scenario;

pub use agent_handle::AgentHandle;
pub use error::RunError;
pub use scenario::{load_yaml_scenario, load_yaml_scenario_file, registered_scenarios, Scenario, ScenarioCheck};

use std::time::{Duration, Instant};

use fabrik_types::{AgentProfile, RunResult};

use crate::adapter::HttpAdapter;
use crate::assertions::{AssertProxy, AssertionCollector};
use crate::gateway::LlmGateway;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runner knobs.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub parallelism: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            parallelism: 1,
        }
    }
}

/// Runs every check against the latest response, recording one
/// [`fabrik_types::AssertionResult`] per check via `proxy` — never
/// propagates an error.
async fn run_checks(
    proxy: &mut AssertProxy<'_>,
    response: &fabrik_types::AgentResponse,
    checks: &[ScenarioCheck],
) {
    for check in checks {
        match check {
            ScenarioCheck::Contains { needle } => proxy.contains(response, needle),
            ScenarioCheck::NotContains { needle } => proxy.not_contains(response, needle),
            ScenarioCheck::Matches { pattern } => proxy.matches(response, pattern),
            ScenarioCheck::JsonSchema { schema } => proxy.json_schema(response, schema),
            ScenarioCheck::Latency { max_ms } => proxy.latency(response, *max_ms),
            ScenarioCheck::TokenUsage { max_total } => proxy.token_usage(response, *max_total),
            ScenarioCheck::ToolCalled { name } => proxy.tool_called(response, name),
            ScenarioCheck::ToolNotCalled { name } => proxy.tool_not_called(response, name),
            ScenarioCheck::Sentiment { expectation } => proxy.sentiment(response, expectation).await,
            ScenarioCheck::LlmJudge { rubric, threshold } => {
                proxy.llm_judge(response, rubric, *threshold).await
            }
            ScenarioCheck::Guardrail { rule } => proxy.guardrail(response, rule).await,
            ScenarioCheck::Factuality { claim } => proxy.factuality(response, claim).await,
            ScenarioCheck::Custom { instruction } => proxy.custom(response, instruction).await,
        }
    }
}

/// Drives every turn of `scenario`, running its checks after each
/// response, then returns the collected assertions/turns/error. Does not
/// itself apply the timeout or compute score/pass — see [`run_scenario`].
///
/// The collector and handle are owned locally rather than published to a
/// process-wide "current" slot: each concurrent scenario gets its own
/// task with its own stack-local state, so nothing needs a mutable global
/// to stay scenario-local.
async fn drive_scenario(
    gateway: &dyn LlmGateway,
    adapter: &HttpAdapter,
    scenario: &Scenario,
    profile: Option<&AgentProfile>,
) -> (Vec<fabrik_types::Turn>, AssertionCollector, Option<String>) {
    let mut handle = AgentHandle::new(adapter);
    let mut collector = AssertionCollector::new();
    let mut error = None;

    for turn in &scenario.turns {
        match handle.send(&turn.says).await {
            Ok(response) => {
                let mut proxy = AssertProxy::new(&mut collector, gateway, profile);
                run_checks(&mut proxy, &response, &scenario.checks).await;
            }
            Err(e) => {
                error = Some(e.to_string());
                break;
            }
        }
    }

    (handle.turns, collector, error)
}

/// Runs one scenario once: fresh collector/turns/context, raced against
/// `timeout`, checks drained before returning.
async fn run_once(
    gateway: &dyn LlmGateway,
    adapter: &HttpAdapter,
    scenario: &Scenario,
    timeout: Duration,
    profile: Option<&AgentProfile>,
) -> RunResult {
    let started = Instant::now();

    let outcome = tokio::time::timeout(timeout, drive_scenario(gateway, adapter, scenario, profile)).await;

    let (turns, collector, error) = match outcome {
        Ok(result) => result,
        Err(_) => (Vec::new(), AssertionCollector::new(), Some("scenario timed out".to_string())),
    };

    RunResult::new(
        scenario.name.clone(),
        scenario.tags.clone(),
        collector.into_results(),
        turns,
        started.elapsed(),
        error,
    )
}

/// Runs one scenario with retry: a failed scenario reruns up to
/// `retries + 1` times, resetting the adapter between attempts. The last
/// result is the one kept.
pub async fn run_scenario(
    gateway: &dyn LlmGateway,
    adapter: &HttpAdapter,
    scenario: &Scenario,
    opts: &RunOptions,
    profile: Option<&AgentProfile>,
) -> RunResult {
    let attempts = opts.retries + 1;
    let mut last = run_once(gateway, adapter, scenario, opts.timeout, profile).await;
    for _ in 1..attempts {
        if last.passed {
            break;
        }
        adapter.reset();
        last = run_once(gateway, adapter, scenario, opts.timeout, profile).await;
    }
    last
}

/// Runs every scenario, batched by `opts.parallelism`. Scenarios within a
/// batch never share adapter state (the HTTP adapter is per-send
/// stateless); results preserve input order.
pub async fn run_all(
    gateway: &dyn LlmGateway,
    adapter: &HttpAdapter,
    scenarios: &[Scenario],
    opts: &RunOptions,
    profile: Option<&AgentProfile>,
) -> Vec<RunResult> {
    let mut results = Vec::with_capacity(scenarios.len());
    for batch in scenarios.chunks(opts.parallelism.max(1)) {
        let futures = batch
            .iter()
            .map(|scenario| run_scenario(gateway, adapter, scenario, opts, profile));
        results.extend(futures::future::join_all(futures).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::gateway::{GatewayError, GenerateRequest, GenerateResponse};
    use fabrik_types::{AdapterConfig, RequestFormat};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubGateway;

    #[async_trait]
    impl LlmGateway for StubGateway {
        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
            Ok(GenerateResponse {
                text: r#"{"passed": true, "reasoning": "fine"}"#.to_string(),
                parsed: None,
                token_usage: None,
            })
        }
    }

    fn scenario_with_checks(checks: Vec<ScenarioCheck>) -> Scenario {
        Scenario {
            name: "greeting".to_string(),
            tags: vec!["happy-path".to_string()],
            turns: vec![scenario::ScenarioTurn {
                says: "Hi!".to_string(),
            }],
            checks,
        }
    }

    #[tokio::test]
    async fn scenario_with_no_assertions_never_vacuously_passes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "hello!"})))
            .mount(&server)
            .await;
        let adapter = HttpAdapter::new(&AdapterConfig::Http {
            url: server.uri(),
            headers: None,
            request_format: RequestFormat::Messages,
            body_template: None,
            response_parser: None,
            streaming: false,
        })
        .unwrap();

        let scenario = scenario_with_checks(vec![]);
        let result = run_scenario(&StubGateway, &adapter, &scenario, &RunOptions::default(), None).await;
        assert!(!result.passed);
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn scenario_with_passing_check_passes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "hello there!"})))
            .mount(&server)
            .await;
        let adapter = HttpAdapter::new(&AdapterConfig::Http {
            url: server.uri(),
            headers: None,
            request_format: RequestFormat::Messages,
            body_template: None,
            response_parser: None,
            streaming: false,
        })
        .unwrap();

        let scenario = scenario_with_checks(vec![ScenarioCheck::Contains {
            needle: "hello".to_string(),
        }]);
        let result = run_scenario(&StubGateway, &adapter, &scenario, &RunOptions::default(), None).await;
        assert!(result.passed);
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn run_all_preserves_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "hi"})))
            .mount(&server)
            .await;
        let adapter = HttpAdapter::new(&AdapterConfig::Http {
            url: server.uri(),
            headers: None,
            request_format: RequestFormat::Messages,
            body_template: None,
            response_parser: None,
            streaming: false,
        })
        .unwrap();

        let scenarios = vec![
            Scenario {
                name: "first".to_string(),
                tags: vec![],
                turns: vec![scenario::ScenarioTurn { says: "hi".to_string() }],
                checks: vec![],
            },
            Scenario {
                name: "second".to_string(),
                tags: vec![],
                turns: vec![scenario::ScenarioTurn { says: "hi".to_string() }],
                checks: vec![],
            },
        ];

        let results = run_all(
            &StubGateway,
            &adapter,
            &scenarios,
            &RunOptions {
                timeout: DEFAULT_TIMEOUT,
                retries: 0,
                parallelism: 2,
            },
            None,
        )
        .await;
        assert_eq!(results[0].scenario, "first");
        assert_eq!(results[1].scenario, "second");
    }

    #[tokio::test]
    async fn bound_profile_reaches_the_llm_judge_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "hi"})))
            .mount(&server)
            .await;
        let adapter = HttpAdapter::new(&AdapterConfig::Http {
            url: server.uri(),
            headers: None,
            request_format: RequestFormat::Messages,
            body_template: None,
            response_parser: None,
            streaming: false,
        })
        .unwrap();

        let profile = fabrik_types::AgentProfileBuilder::new(
            fabrik_types::ProfileSource::LocalDir { path: ".".into() },
            chrono::Utc::now(),
        )
        .confidence(0.5)
        .identity("Support Bot", "handles support tickets", "support")
        .build()
        .unwrap();

        let scenario = scenario_with_checks(vec![ScenarioCheck::LlmJudge {
            rubric: "is polite".to_string(),
            threshold: 1.0,
        }]);
        let result = run_scenario(
            &StubGateway,
            &adapter,
            &scenario,
            &RunOptions::default(),
            Some(&profile),
        )
        .await;
        assert!(result.passed);
    }
}
