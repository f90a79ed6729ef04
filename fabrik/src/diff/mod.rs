//! Diff: compares two [`StoredRun`]s and flags regressions.

use std::collections::HashMap;

use fabrik_types::StoredRun;
use serde::Serialize;

/// A scenario present in both runs, whose outcome changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    pub scenario: String,
    pub previous_passed: bool,
    pub current_passed: bool,
    pub previous_score: f64,
    pub current_score: f64,
}

/// Aggregate diff between a baseline and a candidate run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunDiff {
    pub regressions: Vec<Regression>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: usize,
}

/// Default score-drop threshold that counts as a regression even without
/// a pass→fail flip.
pub const DEFAULT_SCORE_DROP_THRESHOLD: f64 = 0.1;

/// Compares `baseline` against `candidate`. A regression is a pass→fail
/// flip, OR a score drop greater than `score_drop_threshold`, for any
/// scenario present in both runs. Summary counts do not depend on the
/// order scenarios appear in either run.
pub fn diff(baseline: &StoredRun, candidate: &StoredRun, score_drop_threshold: f64) -> RunDiff {
    let baseline_by_name: HashMap<&str, &fabrik_types::RunResult> = baseline
        .results
        .iter()
        .map(|r| (r.scenario.as_str(), r))
        .collect();
    let candidate_by_name: HashMap<&str, &fabrik_types::RunResult> = candidate
        .results
        .iter()
        .map(|r| (r.scenario.as_str(), r))
        .collect();

    let mut regressions = Vec::new();
    let mut unchanged = 0;

    for (name, prev) in &baseline_by_name {
        let Some(curr) = candidate_by_name.get(name) else {
            continue;
        };
        let flipped = prev.passed && !curr.passed;
        let score_dropped = prev.score - curr.score > score_drop_threshold;
        if flipped || score_dropped {
            regressions.push(Regression {
                scenario: name.to_string(),
                previous_passed: prev.passed,
                current_passed: curr.passed,
                previous_score: prev.score,
                current_score: curr.score,
            });
        } else {
            unchanged += 1;
        }
    }

    let mut added: Vec<String> = candidate_by_name
        .keys()
        .filter(|name| !baseline_by_name.contains_key(*name))
        .map(|s| s.to_string())
        .collect();
    added.sort();

    let mut removed: Vec<String> = baseline_by_name
        .keys()
        .filter(|name| !candidate_by_name.contains_key(*name))
        .map(|s| s.to_string())
        .collect();
    removed.sort();

    regressions.sort_by(|a, b| a.scenario.cmp(&b.scenario));

    RunDiff {
        regressions,
        added,
        removed,
        unchanged,
    }
}
