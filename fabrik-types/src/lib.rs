//! # fabrik-types
//!
//! Shared data model for Fabrik: the canonical [`AgentProfile`] produced by
//! Discovery, the [`AgentResponse`]/[`AssertionResult`]/[`RunResult`]/
//! [`StoredRun`] types produced by Execution, and the small DTOs
//! ([`TestPlan`], [`AdapterConfig`], [`ChatMessage`]) that Generation and
//! the LLM gateway pass across the crate boundary.
//!
//! This crate has no I/O and no async: it is pure data plus its own
//! validation invariants (unique tool names, bounded confidence,
//! append-only evidence). The pipeline crate (`fabrik`) is the only
//! consumer that touches a network or a filesystem.

mod adapter;
mod assertion;
mod message;
mod plan;
mod profile;
mod response;
mod run;

pub use adapter::{AdapterConfig, RequestFormat};
pub use assertion::{AssertionResult, AssertionType};
pub use message::{ChatMessage, Role};
pub use plan::{
    FailureIndicator, Persona, PlannedScenario, TestCategory, TestPlan, TestPlanCategory,
    Turn as PlannedTurn,
};
pub use profile::{
    AgentProfile, AgentProfileBuilder, Codebase, DiscoveredTool, Endpoint, Evidence,
    ModelInfo, ProfileError, ProfileSource, RelevantFile,
};
pub use response::{AgentResponse, TokenUsage, ToolCall};
pub use run::{RunCounts, RunMeta, RunResult, StoredRun, Turn};
