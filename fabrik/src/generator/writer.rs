//! Writer stage: one gateway call per scenario producing the scenario's
//! checks, followed by mandatory post-processing and assembly into a
//! runnable YAML scenario document.

use fabrik_types::{AgentProfile, ChatMessage, PlannedScenario, Role, TestCategory};

use crate::gateway::{GenerateRequest, LlmGateway};
use crate::runner::scenario::{Scenario, ScenarioCheck, ScenarioTurn};

use super::error::GeneratorError;

/// Check kinds the writer's gateway call may emit. Anything else gets
/// stripped in post-processing: `toolCalled`/`toolNotCalled` require
/// evidence the writer never sees, and `sentiment`/`guardrail`/
/// `factuality`/`custom` are reserved for hand-authored scenarios.
fn is_allowed(check: &ScenarioCheck) -> bool {
    matches!(
        check,
        ScenarioCheck::Contains { .. }
            | ScenarioCheck::NotContains { .. }
            | ScenarioCheck::Matches { .. }
            | ScenarioCheck::JsonSchema { .. }
            | ScenarioCheck::Latency { .. }
            | ScenarioCheck::TokenUsage { .. }
            | ScenarioCheck::LlmJudge { .. }
    )
}

/// Generates the check list for `scenario` and assembles a complete
/// runnable [`Scenario`] document, rendered as YAML.
pub async fn write_scenario(
    gateway: &dyn LlmGateway,
    profile: &AgentProfile,
    category: TestCategory,
    scenario: &PlannedScenario,
) -> Result<String, GeneratorError> {
    let prompt = format!(
        "Write the assertion checks for a test scenario against the agent \"{}\" ({}).\n\n\
         Category: {category:?}\nScenario: {}\nPersona: {} ({})\nIntent: {}\n\
         Success criteria: {}\nFailure indicators: {}\n\n\
         Respond with ONLY a YAML list of checks, each a mapping with a `kind` field plus its \
         own fields:\n\
         - kind: contains, needle: <string>\n\
         - kind: not-contains, needle: <string>\n\
         - kind: matches, pattern: <string>\n\
         - kind: json-schema, schema: <JSON schema object>\n\
         - kind: latency, max_ms: <integer>\n\
         - kind: token-usage, max_total: <integer>\n\
         - kind: llm-judge, rubric: <string>, threshold: <number 1-5>\n\n\
         Do not emit tool-called, tool-not-called, guardrail, sentiment, factuality or custom \
         checks.",
        profile.name,
        profile.description,
        scenario.description,
        scenario.persona.role,
        scenario.persona.tone,
        scenario.intent,
        scenario.success_criteria.join("; "),
        scenario.failure_indicators.join("; "),
    );

    let response = gateway
        .generate(GenerateRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: prompt,
            }],
            ..Default::default()
        })
        .await
        .map_err(|e| GeneratorError::WriterFailed {
            slug: scenario.slug.clone(),
            reason: e.to_string(),
        })?;

    let checks = parse_checks(&response.text).map_err(|e| GeneratorError::WriterFailed {
        slug: scenario.slug.clone(),
        reason: e,
    })?;

    let document = assemble(category, scenario, checks);
    serde_yaml::to_string(&document).map_err(|e| GeneratorError::WriterFailed {
        slug: scenario.slug.clone(),
        reason: e.to_string(),
    })
}

/// Step 1: strip a leading/trailing triple-backtick fence, with or
/// without a language tag.
fn strip_markdown_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
}

/// Steps 1-2: strip the fence, parse the YAML check list, then drop any
/// check kind the writer isn't allowed to emit.
fn parse_checks(raw: &str) -> Result<Vec<ScenarioCheck>, String> {
    let stripped = strip_markdown_fence(raw);
    let checks: Vec<ScenarioCheck> = serde_yaml::from_str(&stripped).map_err(|e| e.to_string())?;
    Ok(checks.into_iter().filter(is_allowed).collect())
}

/// Step 3: assembles the final scenario document — name, a category tag,
/// the planner's own turns (never LLM-rewritten), and the filtered checks.
fn assemble(category: TestCategory, scenario: &PlannedScenario, checks: Vec<ScenarioCheck>) -> Scenario {
    let category_tag = serde_json::to_value(category)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{category:?}"));

    Scenario {
        name: scenario.name.clone(),
        tags: vec![category_tag],
        turns: scenario
            .turns
            .iter()
            .map(|t| ScenarioTurn { says: t.says.clone() })
            .collect(),
        checks,
    }
}
