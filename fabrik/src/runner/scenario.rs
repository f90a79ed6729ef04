//! Scenario artifacts. Rust has
//! no safe dynamic-module import, so two artifact kinds are recognized:
//! a YAML description compiled at load time (the generator's writer stage
//! emits this by default), and a compiled-in Rust scenario pushed into a
//! static registry via the [`scenario!`](crate::scenario) macro, gathered
//! with `inventory` rather than a scripting-language-style `dlopen`.

use serde::{Deserialize, Serialize};

use super::error::RunError;

/// One persona turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioTurn {
    pub says: String,
}

/// One post-turn assertion to run against the AUT's latest response. This
/// is the declarative shape a YAML artifact compiles into — it mirrors
/// the allowed assertion surface of the checker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ScenarioCheck {
    Contains { needle: String },
    NotContains { needle: String },
    Matches { pattern: String },
    JsonSchema { schema: serde_json::Value },
    Latency { max_ms: u64 },
    TokenUsage { max_total: u32 },
    ToolCalled { name: String },
    ToolNotCalled { name: String },
    Sentiment { expectation: String },
    LlmJudge { rubric: String, threshold: f64 },
    Guardrail { rule: String },
    Factuality { claim: String },
    Custom { instruction: String },
}

/// A runnable scenario: a sequence of persona turns, each followed by zero
/// or more checks against the AUT's response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub turns: Vec<ScenarioTurn>,
    #[serde(default)]
    pub checks: Vec<ScenarioCheck>,
}

/// Compiles a YAML scenario artifact into a [`Scenario`]. Errors here are
/// non-fatal: the caller logs and skips the scenario.
pub fn load_yaml_scenario(source: &str) -> Result<Scenario, RunError> {
    serde_yaml::from_str(source).map_err(|e| RunError::ScenarioLoad {
        path: "<inline>".to_string(),
        reason: e.to_string(),
    })
}

/// Compiles a YAML scenario artifact read from `path`.
pub fn load_yaml_scenario_file(path: &std::path::Path) -> Result<Scenario, RunError> {
    let source = std::fs::read_to_string(path).map_err(|e| RunError::ScenarioLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_yaml::from_str(&source).map_err(|e| RunError::ScenarioLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// A compiled-in Rust scenario, registered at program start via
/// [`scenario!`](crate::scenario) rather than loaded from disk.
pub struct RegisteredScenario {
    pub factory: fn() -> Scenario,
}

inventory::collect!(RegisteredScenario);

/// Registers a hand-written Rust scenario for static linking into the
/// `fabrik` binary/tests, the compiled-in counterpart to a YAML artifact.
#[macro_export]
macro_rules! scenario {
    ($factory:expr) => {
        $crate::inventory::submit! {
            $crate::runner::scenario::RegisteredScenario { factory: $factory }
        }
    };
}

/// All statically-registered Rust scenarios, built at call time.
pub fn registered_scenarios() -> Vec<Scenario> {
    inventory::iter::<RegisteredScenario>()
        .map(|r| (r.factory)())
        .collect()
}
