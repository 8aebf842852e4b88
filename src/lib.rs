//! Autohelm — orchestration core for an autonomous browser agent
//!
//! Drives a language model through observe, decide, act rounds against a
//! host-provided tool registry: conversation history with a token budget,
//! a guarded execution-state machine with cooperative cancellation,
//! streaming turn execution, sequential tool dispatch, and two control
//! strategies (a direct turn loop and plan-execute-validate cycles).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use autohelm::prelude::*;
//!
//! # async fn example(provider: Arc<dyn ModelProvider>) -> autohelm::error::Result<()> {
//! let orchestrator = Orchestrator::new(provider, ToolRegistry::new(), HelmConfig::load()?)?;
//! let summary = orchestrator
//!     .run(TaskRequest::new("Find the contact email on example.com"))
//!     .await?;
//! println!("{}", summary.message);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod history;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
