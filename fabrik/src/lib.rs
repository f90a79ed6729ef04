//! # Fabrik
//!
//! An evaluation harness for AI agents: point it at a codebase or a live
//! HTTP endpoint, and it discovers what the agent is supposed to do,
//! generates test scenarios, runs them against the agent, and tracks
//! regressions across versions.
//!
//! ## Pipeline
//!
//! - [`discovery`]: codebase/HTTP probing → [`fabrik_types::AgentProfile`].
//! - [`generator`]: profile → [`fabrik_types::TestPlan`] → rendered scenario
//!   source, one [`generator::ScenarioArtifact`] per planned scenario.
//! - [`runner`]: loads scenarios (YAML or statically-registered Rust via
//!   [`scenario!`]), drives each against the [`adapter::HttpAdapter`], and
//!   records outcomes through the [`assertions`] kernel.
//! - [`store`]: persists runs to SQLite; [`diff`] compares two runs for
//!   regressions.
//!
//! [`gateway`] is the one seam all four stages share: a single
//! `generate` operation against an LLM, with three transports.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use fabrik::discovery::discover;
//! use fabrik::gateway::OpenAiCompatGateway;
//! use fabrik_types::ProfileSource;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let gateway = OpenAiCompatGateway::from_env("gpt-4o-mini").unwrap();
//! let profile = discover(
//!     &gateway,
//!     ProfileSource::LocalDir { path: ".".to_string() },
//!     None,
//! )
//! .await;
//! println!("discovered {} with confidence {}", profile.description, profile.confidence);
//! # }
//! ```

pub mod adapter;
pub mod assertions;
pub mod diff;
pub mod discovery;
pub mod error;
pub mod generator;
pub mod gateway;
pub mod runner;
pub mod sse;
pub mod store;

pub use error::FabrikError;

/// Re-exported so the [`scenario!`] macro can expand to
/// `$crate::inventory::submit!` from any downstream crate without that
/// crate depending on `inventory` directly.
pub use inventory;

/// Everything a hand-written Rust scenario body needs in scope. The
/// generator's writer stage always prepends `use fabrik::prelude::*;` to
/// the scenarios it emits.
pub mod prelude {
    pub use crate::assertions::AssertProxy;
    pub use crate::runner::{Scenario, ScenarioCheck};
    pub use crate::scenario;
    pub use fabrik_types::AgentResponse;
}
