use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("planner call failed: {0}")]
    PlannerFailed(String),
    #[error("planner response did not match the test plan schema")]
    PlanUnparseable,
    #[error("writer call failed for scenario {slug}: {reason}")]
    WriterFailed { slug: String, reason: String },
}
