//! Planner output: categories × scenarios, the
//! structured-output schema the LLM gateway validates the planner call
//! against. Also doubles as the in-memory shape a YAML scenario artifact
//! compiles into.

use serde::{Deserialize, Serialize};

/// Test categories the planner generates. `ToolUse` is only emitted when
/// the profile lists at least one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestCategory {
    HappyPath,
    EdgeCase,
    Adversarial,
    Guardrail,
    MultiTurn,
    Tone,
    ToolUse,
}

impl TestCategory {
    /// Categories generated unconditionally, ahead of the conditional
    /// `ToolUse` category.
    pub const UNCONDITIONAL: [TestCategory; 6] = [
        TestCategory::HappyPath,
        TestCategory::EdgeCase,
        TestCategory::Adversarial,
        TestCategory::Guardrail,
        TestCategory::MultiTurn,
        TestCategory::Tone,
    ];
}

/// A persona the scenario's simulated user plays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
    pub tone: String,
    #[serde(default)]
    pub backstory: String,
}

/// One planned conversational turn: what the persona says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub says: String,
}

/// A reason a scenario should be judged to have failed, surfaced to the
/// writer so it knows what assertion to emit.
pub type FailureIndicator = String;

/// One scenario as emitted by the planner, before the writer turns it into
/// a runnable artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedScenario {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub persona: Persona,
    pub turns: Vec<Turn>,
    pub intent: String,
    pub success_criteria: Vec<String>,
    pub failure_indicators: Vec<FailureIndicator>,
}

/// One category's worth of planned scenarios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPlanCategory {
    pub category: Option<TestCategory>,
    pub scenarios: Vec<PlannedScenario>,
}

/// Full planner output: categories × scenarios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    pub categories: Vec<TestPlanCategory>,
}

impl TestPlan {
    /// Flattened scenario list across all categories, in category order
    /// then within-category order. Truncation to a scenario count budget
    /// relies on this ordering to preserve within-category order.
    pub fn scenarios(&self) -> impl Iterator<Item = &PlannedScenario> {
        self.categories.iter().flat_map(|c| c.scenarios.iter())
    }

    pub fn total_scenarios(&self) -> usize {
        self.categories.iter().map(|c| c.scenarios.len()).sum()
    }
}
