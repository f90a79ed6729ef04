//! [`RunResult`] and [`StoredRun`]: the output of Execution and what the
//! trace store persists.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assertion::AssertionResult;
use crate::response::AgentResponse;

/// One turn in a scenario's conversation: either what the persona said, or
/// the AUT's response (including its measured latency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    Persona { message: String },
    Agent { response: AgentResponse },
}

/// Per-scenario outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub scenario: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub passed: bool,
    pub score: f64,
    pub assertions: Vec<AssertionResult>,
    pub turns: Vec<Turn>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Computes the score for a set of assertions: the fraction that passed,
/// or `1.0` when there are none.
///
/// This is deliberately independent from the pass/fail rule: a
/// zero-assertion scenario scores `1.0` but is never marked `passed` (see
/// [`passes`]) — both facets are retained so reports can choose which to
/// surface.
pub fn score(assertions: &[AssertionResult]) -> f64 {
    if assertions.is_empty() {
        return 1.0;
    }
    let passed = assertions.iter().filter(|a| a.passed).count();
    passed as f64 / assertions.len() as f64
}

/// A scenario passes iff there was no error, at least one assertion was
/// recorded, and every assertion passed. Zero-assertion scenarios never
/// vacuously pass.
pub fn passes(assertions: &[AssertionResult], error: &Option<String>) -> bool {
    error.is_none() && !assertions.is_empty() && assertions.iter().all(|a| a.passed)
}

impl RunResult {
    /// Builds a `RunResult` from its constituent parts, deriving `score`
    /// and `passed` from the assertions and error so callers can't
    /// construct an inconsistent result by hand.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scenario: impl Into<String>,
        tags: Vec<String>,
        assertions: Vec<AssertionResult>,
        turns: Vec<Turn>,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        let passed = passes(&assertions, &error);
        let score = score(&assertions);
        Self {
            scenario: scenario.into(),
            tags,
            passed,
            score,
            assertions,
            turns,
            duration_ms: duration.as_millis() as u64,
            error,
        }
    }
}

/// Pass/fail/total counts for a [`StoredRun`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunCounts {
    pub fn from_results(results: &[RunResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }
}

/// Metadata for one persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub id: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub counts: RunCounts,
    pub total_duration_ms: u64,
}

/// A full run as persisted by the trace store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub meta: RunMeta,
    pub results: Vec<RunResult>,
}

impl StoredRun {
    pub fn new(id: impl Into<String>, version: impl Into<String>, results: Vec<RunResult>) -> Self {
        let counts = RunCounts::from_results(&results);
        let total_duration_ms = results.iter().map(|r| r.duration_ms).sum();
        Self {
            meta: RunMeta {
                id: id.into(),
                version: version.into(),
                created_at: Utc::now(),
                counts,
                total_duration_ms,
            },
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionType;

    fn passing_assertion() -> AssertionResult {
        AssertionResult {
            assertion_type: AssertionType::Contains,
            passed: true,
            expected: None,
            actual: None,
            reasoning: None,
            latency_ms: None,
            error: None,
        }
    }

    fn failing_assertion() -> AssertionResult {
        let mut a = passing_assertion();
        a.passed = false;
        a
    }

    #[test]
    fn score_is_one_when_no_assertions() {
        assert_eq!(score(&[]), 1.0);
    }

    #[test]
    fn score_is_fraction_passed() {
        let assertions = vec![passing_assertion(), failing_assertion()];
        assert_eq!(score(&assertions), 0.5);
    }

    #[test]
    fn zero_assertions_never_vacuously_pass() {
        assert!(!passes(&[], &None));
    }

    #[test]
    fn passes_requires_no_error_and_all_passed() {
        assert!(passes(&[passing_assertion()], &None));
        assert!(!passes(&[passing_assertion()], &Some("boom".to_string())));
        assert!(!passes(
            &[passing_assertion(), failing_assertion()],
            &None
        ));
    }

    #[test]
    fn run_result_new_derives_score_and_passed() {
        let result = RunResult::new(
            "greeting",
            vec![],
            vec![passing_assertion(), passing_assertion()],
            vec![],
            Duration::from_millis(120),
            None,
        );
        assert!(result.passed);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.duration_ms, 120);
    }

    #[test]
    fn stored_run_aggregates_counts_and_duration() {
        let results = vec![
            RunResult::new("a", vec![], vec![passing_assertion()], vec![], Duration::from_millis(10), None),
            RunResult::new("b", vec![], vec![failing_assertion()], vec![], Duration::from_millis(20), None),
        ];
        let stored = StoredRun::new("run-1", "v1", results);
        assert_eq!(stored.meta.counts.total, 2);
        assert_eq!(stored.meta.counts.passed, 1);
        assert_eq!(stored.meta.counts.failed, 1);
        assert_eq!(stored.meta.total_duration_ms, 30);
    }
}
