//! Planner stage: one gateway call turning a profile into
//! an ordered [`TestPlan`].

use serde_json::json;

use fabrik_types::{AgentProfile, ChatMessage, Role, TestCategory, TestPlan, TestPlanCategory};

use crate::gateway::{decode_structured, GenerateRequest, LlmGateway};

use super::error::GeneratorError;

/// Planner knobs.
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub count: usize,
    pub categories: Option<Vec<TestCategory>>,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            count: 10,
            categories: None,
        }
    }
}

fn categories_for(profile: &AgentProfile, filter: Option<&[TestCategory]>) -> Vec<TestCategory> {
    let mut categories = TestCategory::UNCONDITIONAL.to_vec();
    if !profile.tools.is_empty() {
        categories.push(TestCategory::ToolUse);
    }
    match filter {
        Some(allowed) => categories
            .into_iter()
            .filter(|c| allowed.contains(c))
            .collect(),
        None => categories,
    }
}

fn plan_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["categories"],
        "properties": {
            "categories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["category", "scenarios"],
                    "properties": {
                        "category": {"type": "string"},
                        "scenarios": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name", "slug", "description", "persona", "turns", "intent", "success_criteria", "failure_indicators"],
                            }
                        }
                    }
                }
            }
        }
    })
}

fn projected_profile(profile: &AgentProfile) -> serde_json::Value {
    json!({
        "name": profile.name,
        "description": profile.description,
        "domain": profile.domain,
        "tools": profile.tools.iter().map(|t| json!({"name": t.name, "description": t.description})).collect::<Vec<_>>(),
        "knownConstraints": profile.known_constraints,
        "expectedTone": profile.expected_tone,
        "systemPrompt": profile.system_prompt.as_ref().map(|p| p.chars().take(2000).collect::<String>()),
    })
}

/// Runs the planner call and enforces the total/category/ordering rules.
pub async fn plan(
    gateway: &dyn LlmGateway,
    profile: &AgentProfile,
    opts: &PlannerOptions,
) -> Result<TestPlan, GeneratorError> {
    let categories = categories_for(profile, opts.categories.as_deref());
    let schema = plan_schema();

    let prompt = format!(
        "Agent profile:\n{}\n\nGenerate a test plan covering these categories: {}. Produce realistic personas, multi-turn conversations, explicit success criteria and failure indicators for each scenario.",
        serde_json::to_string_pretty(&projected_profile(profile)).unwrap_or_default(),
        categories
            .iter()
            .map(|c| format!("{c:?}"))
            .collect::<Vec<_>>()
            .join(", "),
    );

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
        .map_err(|e| GeneratorError::PlannerFailed(e.to_string()))?;

    let parsed = response
        .parsed
        .or_else(|| decode_structured(&response.text, Some(&schema)))
        .ok_or(GeneratorError::PlanUnparseable)?;

    let mut test_plan: TestPlan =
        serde_json::from_value(parsed).map_err(|_| GeneratorError::PlanUnparseable)?;

    // Drop categories the call produced but weren't requested, and any
    // the model invented that aren't in our allowed set (e.g. tool-use
    // when the profile has no tools).
    test_plan
        .categories
        .retain(|c| c.category.map(|cat| categories.contains(&cat)).unwrap_or(false));

    truncate_to_count(&mut test_plan, opts.count);

    Ok(test_plan)
}

/// Truncates total scenarios to `count`, preserving within-category order.
fn truncate_to_count(plan: &mut TestPlan, count: usize) {
    let mut remaining = count;
    for category in &mut plan.categories {
        if remaining == 0 {
            category.scenarios.clear();
            continue;
        }
        if category.scenarios.len() > remaining {
            category.scenarios.truncate(remaining);
        }
        remaining -= category.scenarios.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabrik_types::{AgentProfileBuilder, DiscoveredTool, Evidence, Persona, PlannedScenario, ProfileSource};

    fn profile_without_tools() -> AgentProfile {
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

    fn profile_with_tool() -> AgentProfile {
        AgentProfileBuilder::new(ProfileSource::LocalDir { path: ".".into() }, chrono::Utc::now())
            .confidence(0.5)
            .push_evidence(Evidence {
                evidence_type: "file".into(),
                source: "a".into(),
                finding: "f".into(),
                confidence: 0.5,
            })
            .identity("Bot", "desc", "support")
            .add_tool(DiscoveredTool {
                name: "lookup_order".into(),
                description: "d".into(),
                parameters: None,
                source_citation: "a".into(),
            })
            .build()
            .unwrap()
    }

    #[test]
    fn categories_for_excludes_tool_use_without_tools() {
        let categories = categories_for(&profile_without_tools(), None);
        assert!(!categories.contains(&TestCategory::ToolUse));
        assert_eq!(categories.len(), 6);
    }

    #[test]
    fn categories_for_includes_tool_use_with_tools() {
        let categories = categories_for(&profile_with_tool(), None);
        assert!(categories.contains(&TestCategory::ToolUse));
        assert_eq!(categories.len(), 7);
    }

    fn scenario(name: &str) -> PlannedScenario {
        PlannedScenario {
            name: name.to_string(),
            slug: name.to_string(),
            description: "d".to_string(),
            persona: Persona::default(),
            turns: vec![],
            intent: "i".to_string(),
            success_criteria: vec![],
            failure_indicators: vec![],
        }
    }

    #[test]
    fn truncate_to_count_preserves_within_category_order() {
        let mut plan = TestPlan {
            categories: vec![
                TestPlanCategory {
                    category: Some(TestCategory::HappyPath),
                    scenarios: vec![scenario("a"), scenario("b"), scenario("c")],
                },
                TestPlanCategory {
                    category: Some(TestCategory::EdgeCase),
                    scenarios: vec![scenario("d"), scenario("e")],
                },
            ],
        };
        truncate_to_count(&mut plan, 4);
        assert_eq!(plan.total_scenarios(), 4);
        let names: Vec<_> = plan.scenarios().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }
}
