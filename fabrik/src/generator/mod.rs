//! Generation: profile → test plan → scenario source artifacts.

mod error;
mod planner;
mod writer;

pub use error::GeneratorError;
pub use planner::{plan, PlannerOptions};
pub use writer::write_scenario;

use fabrik_types::{AgentProfile, TestPlan};

/// One generated scenario: the plan entry plus its rendered source.
#[derive(Debug, Clone)]
pub struct ScenarioArtifact {
    pub category: fabrik_types::TestCategory,
    pub scenario: fabrik_types::PlannedScenario,
    pub source: String,
}

/// Runs the planner, then the writer for every planned scenario, in plan
/// order. A single scenario's writer failure is surfaced to the caller
/// rather than silently dropped, unlike discovery's fallback-to-minimal-profile
/// behavior.
pub async fn generate(
    gateway: &dyn crate::gateway::LlmGateway,
    profile: &AgentProfile,
    opts: &PlannerOptions,
) -> Result<Vec<ScenarioArtifact>, GeneratorError> {
    let test_plan: TestPlan = plan(gateway, profile, opts).await?;

    let mut artifacts = Vec::with_capacity(test_plan.total_scenarios());
    for category_block in &test_plan.categories {
        let Some(category) = category_block.category else {
            continue;
        };
        for scenario in &category_block.scenarios {
            let source = write_scenario(gateway, profile, category, scenario).await?;
            artifacts.push(ScenarioArtifact {
                category,
                scenario: scenario.clone(),
                source,
            });
        }
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::gateway::{GatewayError, GenerateRequest, GenerateResponse};
    use fabrik_types::{AgentProfileBuilder, Evidence, ProfileSource};

    struct StubGateway;

    #[async_trait]
    impl crate::gateway::LlmGateway for StubGateway {
        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
            let is_plan_call = request
                .messages
                .first()
                .map(|m| m.content.contains("Generate a test plan"))
                .unwrap_or(false);
            if is_plan_call {
                return Ok(GenerateResponse {
                    text: r#"{"categories": [{"category": "happy-path", "scenarios": [{"name": "Greeting", "slug": "greeting", "description": "says hi", "persona": {"role": "customer", "tone": "friendly", "backstory": ""}, "turns": [{"says": "hi"}], "intent": "greet", "success_criteria": ["responds politely"], "failure_indicators": []}]}]}"#.to_string(),
                    parsed: None,
                    token_usage: None,
                });
            }
            Ok(GenerateResponse {
                text: "- kind: contains\n  needle: hello\n".to_string(),
                parsed: None,
                token_usage: None,
            })
        }
    }

    fn profile() -> AgentProfile {
        AgentProfileBuilder::new(ProfileSource::LocalDir { path: ".".into() }, chrono::Utc::now())
            .confidence(0.5)
            .push_evidence(Evidence {
                evidence_type: "file".into(),
                source: "a".into(),
                finding: "f".into(),
                confidence: 0.5,
            })
            .identity("Bot", "desc", "support")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn generate_produces_one_artifact_per_scenario() {
        let artifacts = generate(&StubGateway, &profile(), &PlannerOptions::default())
            .await
            .unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].scenario.slug, "greeting");
        assert!(artifacts[0].source.contains("name: Greeting"));
        assert!(artifacts[0].source.contains("kind: contains"));
    }
}
